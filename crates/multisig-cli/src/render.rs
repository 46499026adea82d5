//! Plain-text rendering of dashboard data.

use multisig_core::dashboard::Stats;
use multisig_core::types::{MultisigTx, SyncState, TxTab};

const HEADER: &str = "  ID  TO                                          AMOUNT          CONF  TIMELOCK    STATUS";

pub fn tab_label(tab: TxTab) -> &'static str {
    match tab {
        TxTab::Pending => "pending",
        TxTab::Executed => "executed",
        TxTab::All => "all",
    }
}

pub fn tx_row(tx: &MultisigTx, symbol: &str, required: u32) -> String {
    let amount = format!("{} {symbol}", tx.amount);
    let status = if tx.executed { "Executed" } else { "Pending" };
    format!(
        "{:>4}  {:<42}  {:<14}  {:>4}  {:<10}  {status}",
        tx.id,
        tx.to,
        amount,
        format!("{}/{required}", tx.confirmations),
        tx.proposed_at,
    )
}

pub fn transactions(state: &SyncState, tab: TxTab, symbol: &str, required: u32) -> String {
    let mut out = String::new();
    if let Some(err) = &state.error {
        out.push_str(&format!("error: {err}\n"));
    }

    let rows: Vec<String> = state
        .transactions
        .iter()
        .filter(|tx| tab.includes(tx))
        .map(|tx| tx_row(tx, symbol, required))
        .collect();

    if rows.is_empty() {
        out.push_str(&format!("No {} transactions\n", tab_label(tab)));
        return out;
    }
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row);
        out.push('\n');
    }
    out
}

pub fn stats(stats: &Stats, owner: Option<&str>, is_owner: bool) -> String {
    format!(
        "Owner:       {}{}\nSigners:     {}\nRequired:    {}\nPending:     {}\nBalance:     {}\n",
        owner.unwrap_or("unknown"),
        if is_owner { " (you)" } else { "" },
        stats.signers,
        stats.required_confirmations,
        stats.pending,
        stats.balance.as_deref().unwrap_or("unavailable"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use multisig_core::types::SyncState;

    fn tx(id: u64, executed: bool) -> MultisigTx {
        MultisigTx {
            id,
            to: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into(),
            amount: 0.5,
            value_wei: Default::default(),
            confirmations: 2,
            executed,
            proposed_at: 1000,
        }
    }

    #[test]
    fn row_shows_confirmation_progress() {
        let row = tx_row(&tx(7, false), "ETH", 3);
        assert!(row.starts_with("   7  0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(row.contains("0.5 ETH"));
        assert!(row.contains("2/3"));
        assert!(row.ends_with("Pending"));
    }

    #[test]
    fn empty_tab_is_reported() {
        let state = SyncState {
            transactions: vec![tx(0, false)],
            ..Default::default()
        };
        assert_eq!(
            transactions(&state, TxTab::Executed, "ETH", 3),
            "No executed transactions\n"
        );
    }

    #[test]
    fn error_precedes_stale_rows() {
        let state = SyncState {
            transactions: vec![tx(1, true), tx(0, false)],
            loading: false,
            error: Some("RPC request failed: timeout".into()),
        };
        let out = transactions(&state, TxTab::All, "ETH", 3);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "error: RPC request failed: timeout");
        assert_eq!(lines[1], HEADER);
        assert_eq!(lines.len(), 4);
        assert!(lines[2].ends_with("Executed"));
    }

    #[test]
    fn stats_marks_owner() {
        let s = Stats {
            signers: 5,
            required_confirmations: 3,
            pending: 2,
            balance: Some("1.25 ETH".into()),
        };
        let out = stats(&s, Some("0xabc"), true);
        assert!(out.contains("Owner:       0xabc (you)"));
        assert!(out.contains("Balance:     1.25 ETH"));
        assert!(stats(&s, None, false).contains("Owner:       unknown\n"));
    }
}

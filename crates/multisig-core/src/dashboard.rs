//! Owner-gated actions and summary figures for one multisig contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::contract::{ContractCall, ContractReader, ContractWriter};
use crate::error::SyncError;
use crate::sync::TransactionSync;
use crate::types::{MultisigTx, Receipt, Session, TxTab};
use crate::units::{format_native, parse_native};

const NOT_CONNECTED: &str = "Please connect your wallet";
const NOT_OWNER: &str = "Only the contract owner may propose transactions";
const NOT_CONFIGURED: &str = "Contract address not configured for this chain";
const BUSY: &str = "Another transaction is in progress";

/// Summary figures shown above the transaction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub signers: u32,
    pub required_confirmations: u32,
    pub pending: usize,
    /// `"<amount> <SYMBOL>"`, or `None` when the balance could not be read.
    pub balance: Option<String>,
}

/// Static figures the dashboard displays alongside live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub signers: u32,
    pub required_confirmations: u32,
    pub symbol: &'static str,
}

/// Result of a confirm/revoke/execute submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Submitted { hash: String },
    Mined(Receipt),
}

pub struct Dashboard {
    session: Session,
    contract: Option<String>,
    reader: Arc<dyn ContractReader>,
    writer: Option<Arc<dyn ContractWriter>>,
    sync: TransactionSync,
    owner: Option<String>,
    writing: AtomicBool,
    display: DisplayConfig,
}

/// Clears the in-flight flag when a write finishes, however it finishes.
struct WritingGuard<'a>(&'a AtomicBool);

impl Drop for WritingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Dashboard {
    pub fn new(
        session: Session,
        contract: Option<String>,
        reader: Arc<dyn ContractReader>,
        writer: Option<Arc<dyn ContractWriter>>,
        sync: TransactionSync,
        display: DisplayConfig,
    ) -> Self {
        Self {
            session,
            contract,
            reader,
            writer,
            sync,
            owner: None,
            writing: AtomicBool::new(false),
            display,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sync(&self) -> &TransactionSync {
        &self.sync
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_writing(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    /// Reads `owner()` from the contract. A failed read leaves the owner
    /// unknown, which in turn disables proposing.
    pub async fn load_owner(&mut self) -> Option<&str> {
        let Some(contract) = self.contract.as_deref() else {
            self.owner = None;
            return None;
        };
        self.owner = match self.reader.owner(contract).await {
            Ok(owner) => Some(owner),
            Err(e) => {
                warn!(%contract, error = %e, "failed to read contract owner");
                None
            }
        };
        self.owner.as_deref()
    }

    /// Connected and the connected account is the contract owner.
    pub fn is_owner(&self) -> bool {
        match (&self.session.account, &self.owner) {
            (Some(account), Some(owner)) => chain_eth::address::addresses_equal(account, owner),
            _ => false,
        }
    }

    /// Published transactions in `tab`, newest first.
    pub fn transactions(&self, tab: TxTab) -> Vec<MultisigTx> {
        self.sync
            .snapshot()
            .transactions
            .into_iter()
            .filter(|tx| tab.includes(tx))
            .collect()
    }

    pub async fn stats(&self) -> Stats {
        let pending = self.transactions(TxTab::Pending).len();
        let balance = match self.contract.as_deref() {
            Some(contract) => match self.reader.balance(contract).await {
                Ok(wei) => Some(format!("{} {}", format_native(wei), self.display.symbol)),
                Err(e) => {
                    warn!(%contract, error = %e, "failed to read wallet balance");
                    None
                }
            },
            None => None,
        };
        Stats {
            signers: self.display.signers,
            required_confirmations: self.display.required_confirmations,
            pending,
            balance,
        }
    }

    /// Proposes sending `amount` native units to `to` with optional hex
    /// calldata, waits for it to be mined, and refreshes the list.
    pub async fn propose(&self, to: &str, amount: &str, data: &str) -> Result<Receipt, SyncError> {
        let (writer, contract) = self.connected()?;
        if !self.is_owner() {
            return Err(SyncError::Action(NOT_OWNER.into()));
        }
        let contract = contract.ok_or_else(|| SyncError::Action(NOT_CONFIGURED.into()))?;

        if !chain_eth::address::validate_address(to).unwrap_or(false) {
            return Err(SyncError::Action(format!("Invalid recipient address: {to}")));
        }
        let call = ContractCall::Propose {
            to: to.to_string(),
            value: parse_native(amount)?,
            data: parse_calldata(data)?,
        };

        let _guard = self.begin_write()?;
        let hash = self.submit(writer.as_ref(), contract, &call).await?;
        let receipt = self.await_mined(writer.as_ref(), &hash).await?;
        info!(block = receipt.block_number, %hash, "proposal mined");
        self.refresh().await;
        Ok(receipt)
    }

    pub async fn confirm(&self, id: u64, wait: bool) -> Result<WriteOutcome, SyncError> {
        self.write_by_id(ContractCall::Confirm(id), wait).await
    }

    pub async fn revoke(&self, id: u64, wait: bool) -> Result<WriteOutcome, SyncError> {
        self.write_by_id(ContractCall::Revoke(id), wait).await
    }

    /// Quorum and timelock are enforced by the contract; a premature
    /// execute surfaces as a revert.
    pub async fn execute(&self, id: u64, wait: bool) -> Result<WriteOutcome, SyncError> {
        self.write_by_id(ContractCall::Execute(id), wait).await
    }

    async fn write_by_id(&self, call: ContractCall, wait: bool) -> Result<WriteOutcome, SyncError> {
        let (writer, contract) = self.connected()?;
        let contract = contract.ok_or_else(|| SyncError::Action(NOT_CONFIGURED.into()))?;

        let _guard = self.begin_write()?;
        let hash = self.submit(writer.as_ref(), contract, &call).await?;
        if !wait {
            return Ok(WriteOutcome::Submitted { hash });
        }
        let receipt = self.await_mined(writer.as_ref(), &hash).await?;
        self.refresh().await;
        Ok(WriteOutcome::Mined(receipt))
    }

    fn connected(&self) -> Result<(&Arc<dyn ContractWriter>, Option<&str>), SyncError> {
        match (&self.writer, self.session.is_connected()) {
            (Some(writer), true) => Ok((writer, self.contract.as_deref())),
            _ => Err(SyncError::Action(NOT_CONNECTED.into())),
        }
    }

    fn begin_write(&self) -> Result<WritingGuard<'_>, SyncError> {
        self.writing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::Action(BUSY.into()))?;
        Ok(WritingGuard(&self.writing))
    }

    async fn submit(
        &self,
        writer: &dyn ContractWriter,
        contract: &str,
        call: &ContractCall,
    ) -> Result<String, SyncError> {
        writer.submit(contract, call).await.map_err(|e| {
            error!(call = call.name(), error = %e, "submission failed");
            e
        })
    }

    async fn await_mined(&self, writer: &dyn ContractWriter, hash: &str) -> Result<Receipt, SyncError> {
        let receipt = writer.wait_for_receipt(hash).await?;
        if !receipt.success {
            return Err(SyncError::Reverted(hash.to_string()));
        }
        Ok(receipt)
    }

    /// Refresh failures are recorded in the sync state, not returned: the
    /// write itself already succeeded.
    async fn refresh(&self) {
        if let Err(e) = self.sync.refetch().await {
            warn!(error = %e, "refetch after write failed");
        }
    }
}

/// Parses optional `0x`-prefixed calldata; empty input means no calldata.
fn parse_calldata(data: &str) -> Result<Vec<u8>, SyncError> {
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "0x" {
        return Ok(Vec::new());
    }
    let digits = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| SyncError::Action("Calldata must start with 0x".into()))?;
    hex::decode(digits).map_err(|e| SyncError::Action(format!("Invalid calldata: {e}")))
}

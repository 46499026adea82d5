//! Cross-crate tests exercising the full pipeline:
//! ABI-encoded contract data -> reader -> sync -> cache -> dashboard.
//!
//! The fake reader serves real `getTransaction` return data decoded through
//! chain-eth, so these catch regressions at the crate boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::U256;
use async_trait::async_trait;
use chain_eth::abi::{encode_params, AbiParam};
use chain_eth::address::{addresses_equal, parse_address};
use chain_eth::multisig::{decode_transaction, OnChainTransaction};
use multisig_core::cache::{cache_key, CachePolicy, KeyValueStore, MemoryStore};
use multisig_core::contract::{ContractCall, ContractReader, ContractWriter};
use multisig_core::dashboard::{Dashboard, DisplayConfig, WriteOutcome};
use multisig_core::sync::TransactionSync;
use multisig_core::types::{MultisigTx, Receipt, Session, TxTab};
use multisig_core::SyncError;

const MULTISIG: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
const OTHER_MULTISIG: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
const OWNER: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
const STRANGER: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";
const TO_A: &str = "0xAAAaaAAaAaaAaAAAAAAaaaAAAAAaaAaAaaaaaaAA";
const TO_B: &str = "0xBBbBbBbbBbbbbbBbbBbBbBbbbBBBBbBBbbbbBBbB";

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Clone)]
struct Proposal {
    to: &'static str,
    value: u128,
    confirmations: u64,
    proposed_at: u64,
    executed: bool,
}

/// Mimics the deployed contract: each record goes through real ABI
/// encoding and decoding on every read.
struct ChainReader {
    txs: Mutex<Vec<Proposal>>,
    fail_at: Mutex<Option<u64>>,
}

impl ChainReader {
    fn new(txs: Vec<Proposal>) -> Self {
        Self {
            txs: Mutex::new(txs),
            fail_at: Mutex::new(None),
        }
    }

    fn push(&self, proposal: Proposal) {
        self.txs.lock().unwrap().push(proposal);
    }

    fn fail_at(&self, index: Option<u64>) {
        *self.fail_at.lock().unwrap() = index;
    }
}

#[async_trait]
impl ContractReader for ChainReader {
    async fn owner(&self, _: &str) -> Result<String, SyncError> {
        Ok(OWNER.to_string())
    }

    async fn transaction_count(&self, _: &str) -> Result<u64, SyncError> {
        Ok(self.txs.lock().unwrap().len() as u64)
    }

    async fn transaction(&self, _: &str, index: u64) -> Result<OnChainTransaction, SyncError> {
        if *self.fail_at.lock().unwrap() == Some(index) {
            return Err(SyncError::RpcResponse {
                code: -32000,
                message: "header not found".into(),
            });
        }
        let p = self.txs.lock().unwrap()[index as usize].clone();
        let encoded = encode_params(&[
            AbiParam::Address(parse_address(p.to).unwrap()),
            AbiParam::Uint256(U256::from(p.value)),
            AbiParam::Bytes(Vec::new()),
            AbiParam::Uint256(U256::from(p.confirmations)),
            AbiParam::Uint256(U256::from(p.proposed_at)),
            AbiParam::Bool(p.executed),
        ]);
        Ok(decode_transaction(&encoded)?)
    }

    async fn balance(&self, _: &str) -> Result<U256, SyncError> {
        Ok(U256::from(5_500_000_000_000_000_000u128))
    }
}

/// Records submitted calls; each submission "mines" immediately.
struct RecordingWriter {
    account: String,
    calls: Mutex<Vec<ContractCall>>,
    reject: AtomicBool,
    revert: AtomicBool,
    chain: Option<Arc<ChainReader>>,
}

impl RecordingWriter {
    fn new(account: &str, chain: Option<Arc<ChainReader>>) -> Self {
        Self {
            account: account.to_string(),
            calls: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
            revert: AtomicBool::new(false),
            chain,
        }
    }
}

#[async_trait]
impl ContractWriter for RecordingWriter {
    fn account(&self) -> &str {
        &self.account
    }

    async fn submit(&self, _: &str, call: &ContractCall) -> Result<String, SyncError> {
        // Let a concurrent caller observe the in-flight write.
        tokio::task::yield_now().await;
        if self.reject.load(Ordering::SeqCst) {
            return Err(SyncError::Rpc("user rejected the request".into()));
        }
        self.calls.lock().unwrap().push(call.clone());
        if let (Some(chain), ContractCall::Propose { value, .. }) = (&self.chain, call) {
            chain.push(Proposal {
                to: TO_A,
                value: u128::try_from(*value).unwrap(),
                confirmations: 0,
                proposed_at: 3000,
                executed: false,
            });
        }
        Ok(format!("0x{:064x}", self.calls.lock().unwrap().len()))
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt, SyncError> {
        Ok(Receipt {
            transaction_hash: hash.to_string(),
            block_number: 42,
            success: !self.revert.load(Ordering::SeqCst),
        })
    }
}

fn scenario() -> Vec<Proposal> {
    vec![
        Proposal {
            to: TO_A,
            value: 500_000_000_000_000_000,
            confirmations: 2,
            proposed_at: 1000,
            executed: false,
        },
        Proposal {
            to: TO_B,
            value: 5_000_000_000_000_000_000,
            confirmations: 3,
            proposed_at: 2000,
            executed: false,
        },
    ]
}

fn sync_for(reader: Arc<ChainReader>, store: Arc<MemoryStore>, address: &str) -> TransactionSync {
    TransactionSync::new(
        Some(reader),
        Some(address.to_string()),
        store,
        CachePolicy::EvictOnTeardown,
    )
}

fn dashboard(
    account: Option<&str>,
    chain: Arc<ChainReader>,
    writer: Option<Arc<RecordingWriter>>,
    contract: Option<&str>,
) -> Dashboard {
    let sync = TransactionSync::new(
        Some(chain.clone()),
        contract.map(str::to_string),
        Arc::new(MemoryStore::new()),
        CachePolicy::EvictOnTeardown,
    );
    Dashboard::new(
        Session {
            account: account.map(str::to_string),
            chain_id: 31337,
        },
        contract.map(str::to_string),
        chain,
        writer.map(|w| w as Arc<dyn ContractWriter>),
        sync,
        DisplayConfig {
            signers: 5,
            required_confirmations: 3,
            symbol: "ETH",
        },
    )
}

// ─── Sync ───────────────────────────────────────────────────────────

#[tokio::test]
async fn two_proposals_publish_newest_first() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let sync = sync_for(chain, Arc::new(MemoryStore::new()), MULTISIG);

    sync.sync().await.unwrap();
    let txs = sync.snapshot().transactions;

    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].id, 1);
    assert_eq!(txs[0].amount, 5.0);
    assert!(addresses_equal(&txs[0].to, TO_B));
    assert_eq!(txs[0].confirmations, 3);
    assert_eq!(txs[0].proposed_at, 2000);
    assert_eq!(txs[1].id, 0);
    assert_eq!(txs[1].amount, 0.5);
    assert_eq!(txs[1].confirmations, 2);
    assert!(!txs[1].executed);
}

#[tokio::test]
async fn awaited_activation_hands_subscriber_a_settled_list() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let sync = sync_for(chain.clone(), Arc::new(MemoryStore::new()), MULTISIG);
    let mut updates = sync.subscribe();

    sync.activate().unwrap().await.unwrap();

    assert!(updates.has_changed().unwrap());
    let state = updates.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.transactions.len(), 2);

    // A later refetch starts from the settled list, not alongside the first fetch.
    chain.push(scenario()[0].clone());
    sync.refetch().await.unwrap();
    let ids: Vec<u64> = sync.snapshot().transactions.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 1, 0]);
}

#[tokio::test]
async fn record_count_matches_contract_for_several_sizes() {
    for n in [0usize, 1, 7, 20] {
        let proposals = (0..n)
            .map(|i| Proposal {
                to: TO_A,
                value: i as u128,
                confirmations: 0,
                proposed_at: i as u64,
                executed: i % 2 == 0,
            })
            .collect();
        let sync = sync_for(
            Arc::new(ChainReader::new(proposals)),
            Arc::new(MemoryStore::new()),
            MULTISIG,
        );

        sync.sync().await.unwrap();
        let ids: Vec<u64> = sync.snapshot().transactions.iter().map(|t| t.id).collect();
        let expected: Vec<u64> = (0..n as u64).rev().collect();
        assert_eq!(ids, expected, "count {n}");
    }
}

#[tokio::test]
async fn cache_is_written_and_matches_published_list() {
    let store = Arc::new(MemoryStore::new());
    let sync = sync_for(Arc::new(ChainReader::new(scenario())), store.clone(), MULTISIG);

    sync.sync().await.unwrap();

    let raw = store.get(&cache_key(Some(MULTISIG))).unwrap().unwrap();
    let cached: Vec<MultisigTx> = serde_json::from_str(&raw).unwrap();
    assert_eq!(cached, sync.snapshot().transactions);
}

#[tokio::test]
async fn partial_failure_never_leaks_partial_list() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let sync = sync_for(chain.clone(), Arc::new(MemoryStore::new()), MULTISIG);
    sync.sync().await.unwrap();
    let before = sync.snapshot().transactions;

    chain.push(scenario()[0].clone());
    chain.push(scenario()[1].clone());
    chain.fail_at(Some(3));
    assert!(sync.refetch().await.is_err());

    let state = sync.snapshot();
    assert_eq!(state.transactions, before);
    assert_eq!(state.error.as_deref(), Some("RPC error -32000: header not found"));
    assert!(!state.loading);
}

#[tokio::test]
async fn hydrates_from_cache_before_fetch_completes() {
    let store = Arc::new(MemoryStore::new());
    let cached = vec![MultisigTx {
        id: 9,
        to: TO_B.to_string(),
        amount: 1.0,
        value_wei: U256::from(1_000_000_000_000_000_000u128),
        confirmations: 1,
        executed: false,
        proposed_at: 500,
    }];
    store
        .set(&cache_key(Some(MULTISIG)), &serde_json::to_string(&cached).unwrap())
        .unwrap();

    let sync = sync_for(Arc::new(ChainReader::new(scenario())), store, MULTISIG);
    let mut rx = sync.subscribe();

    let handle = sync.activate().unwrap();
    assert_eq!(rx.borrow_and_update().transactions, cached);

    handle.await.unwrap();
    assert_eq!(sync.snapshot().transactions.len(), 2);
}

#[tokio::test]
async fn malformed_cache_starts_empty_and_is_cleared() {
    let store = Arc::new(MemoryStore::new());
    store.set(&cache_key(Some(MULTISIG)), "[{\"id\":").unwrap();

    let chain = Arc::new(ChainReader::new(scenario()));
    chain.fail_at(Some(0));
    let sync = sync_for(chain, store.clone(), MULTISIG);

    sync.activate().unwrap().await.unwrap();

    assert!(sync.snapshot().transactions.is_empty());
    assert_eq!(store.get(&cache_key(Some(MULTISIG))).unwrap(), None);
}

#[tokio::test]
async fn cache_for_one_contract_is_never_read_for_another() {
    let store = Arc::new(MemoryStore::new());
    let first = sync_for(Arc::new(ChainReader::new(scenario())), store.clone(), MULTISIG);
    first.sync().await.unwrap();

    let empty = Arc::new(ChainReader::new(Vec::new()));
    let second = sync_for(empty, store.clone(), OTHER_MULTISIG);
    let mut rx = second.subscribe();
    second.activate().unwrap().await.unwrap();

    assert!(rx.borrow_and_update().transactions.is_empty());
    assert!(store.get(&cache_key(Some(MULTISIG))).unwrap().is_some());
}

// ─── Dashboard ──────────────────────────────────────────────────────

#[tokio::test]
async fn owner_can_propose_and_list_refreshes() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let writer = Arc::new(RecordingWriter::new(OWNER, Some(chain.clone())));
    let mut dash = dashboard(Some(OWNER), chain, Some(writer.clone()), Some(MULTISIG));

    assert_eq!(dash.load_owner().await, Some(OWNER));
    assert!(dash.is_owner());

    let receipt = dash.propose(TO_A, "1.5", "").await.unwrap();
    assert_eq!(receipt.block_number, 42);
    assert!(!dash.is_writing());

    let calls = writer.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![ContractCall::Propose {
            to: TO_A.to_string(),
            value: U256::from(1_500_000_000_000_000_000u128),
            data: Vec::new(),
        }]
    );

    let pending = dash.transactions(TxTab::Pending);
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].id, 2);
    assert_eq!(pending[0].amount, 1.5);
}

#[tokio::test]
async fn owner_check_ignores_address_case() {
    let chain = Arc::new(ChainReader::new(Vec::new()));
    let lower = OWNER.to_lowercase();
    let mut dash = dashboard(Some(&lower), chain, None, Some(MULTISIG));
    dash.load_owner().await;
    assert!(dash.is_owner());
}

#[tokio::test]
async fn non_owner_proposal_never_reaches_writer() {
    let chain = Arc::new(ChainReader::new(Vec::new()));
    let writer = Arc::new(RecordingWriter::new(STRANGER, None));
    let mut dash = dashboard(Some(STRANGER), chain, Some(writer.clone()), Some(MULTISIG));
    dash.load_owner().await;

    let err = dash.propose(TO_A, "1", "").await.unwrap_err();
    assert_eq!(err.to_string(), "Only the contract owner may propose transactions");
    assert!(writer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn disconnected_session_is_rejected_first() {
    let chain = Arc::new(ChainReader::new(Vec::new()));
    let dash = dashboard(None, chain, None, None);

    let err = dash.confirm(0, false).await.unwrap_err();
    assert_eq!(err.to_string(), "Please connect your wallet");
    let err = dash.propose(TO_A, "1", "").await.unwrap_err();
    assert_eq!(err.to_string(), "Please connect your wallet");
}

#[tokio::test]
async fn missing_contract_address_is_reported() {
    let chain = Arc::new(ChainReader::new(Vec::new()));
    let writer = Arc::new(RecordingWriter::new(STRANGER, None));
    let dash = dashboard(Some(STRANGER), chain, Some(writer.clone()), None);

    let err = dash.execute(1, false).await.unwrap_err();
    assert_eq!(err.to_string(), "Contract address not configured for this chain");
    assert!(writer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn confirm_revoke_execute_submit_by_id() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let writer = Arc::new(RecordingWriter::new(STRANGER, None));
    let dash = dashboard(Some(STRANGER), chain, Some(writer.clone()), Some(MULTISIG));

    assert!(matches!(
        dash.confirm(0, false).await.unwrap(),
        WriteOutcome::Submitted { .. }
    ));
    assert!(matches!(dash.revoke(0, false).await.unwrap(), WriteOutcome::Submitted { .. }));
    assert!(matches!(dash.execute(1, true).await.unwrap(), WriteOutcome::Mined(_)));

    assert_eq!(
        writer.calls.lock().unwrap().clone(),
        vec![
            ContractCall::Confirm(0),
            ContractCall::Revoke(0),
            ContractCall::Execute(1),
        ]
    );
    // Waiting for the receipt refreshes the list.
    assert_eq!(dash.transactions(TxTab::All).len(), 2);
}

#[tokio::test]
async fn rejected_submission_surfaces_and_clears_writing_flag() {
    let chain = Arc::new(ChainReader::new(Vec::new()));
    let writer = Arc::new(RecordingWriter::new(STRANGER, None));
    writer.reject.store(true, Ordering::SeqCst);
    let dash = dashboard(Some(STRANGER), chain, Some(writer), Some(MULTISIG));

    let err = dash.confirm(3, true).await.unwrap_err();
    assert!(err.to_string().contains("user rejected"));
    assert!(!dash.is_writing());
}

#[tokio::test]
async fn invalid_amount_and_recipient_are_rejected_before_submit() {
    let chain = Arc::new(ChainReader::new(Vec::new()));
    let writer = Arc::new(RecordingWriter::new(OWNER, None));
    let mut dash = dashboard(Some(OWNER), chain, Some(writer.clone()), Some(MULTISIG));
    dash.load_owner().await;

    assert!(dash.propose(TO_A, "abc", "").await.is_err());
    assert!(dash.propose("0x1234", "1", "").await.is_err());
    assert!(dash.propose(TO_A, "1", "nothex").await.is_err());
    assert!(writer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stats_count_pending_and_format_balance() {
    let mut proposals = scenario();
    proposals[0].executed = true;
    let chain = Arc::new(ChainReader::new(proposals));
    let dash = dashboard(None, chain, None, Some(MULTISIG));
    dash.sync().sync().await.unwrap();

    let stats = dash.stats().await;
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.signers, 5);
    assert_eq!(stats.required_confirmations, 3);
    assert_eq!(stats.balance.as_deref(), Some("5.5 ETH"));
    assert_eq!(dash.transactions(TxTab::Executed).len(), 1);
}

#[tokio::test]
async fn reverted_receipt_is_an_error_and_skips_refresh() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let writer = Arc::new(RecordingWriter::new(STRANGER, None));
    writer.revert.store(true, Ordering::SeqCst);
    let dash = dashboard(Some(STRANGER), chain, Some(writer), Some(MULTISIG));

    let err = dash.execute(0, true).await.unwrap_err();
    assert!(matches!(err, SyncError::Reverted(_)));
    assert!(dash.transactions(TxTab::All).is_empty());

    // Without waiting, the revert is not observed.
    assert!(dash.execute(0, false).await.is_ok());
}

#[tokio::test]
async fn second_write_while_one_is_in_flight_is_refused() {
    let chain = Arc::new(ChainReader::new(scenario()));
    let writer = Arc::new(RecordingWriter::new(STRANGER, None));
    let dash = dashboard(Some(STRANGER), chain, Some(writer.clone()), Some(MULTISIG));

    let (first, second) = tokio::join!(dash.confirm(0, false), dash.confirm(1, false));

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err().to_string(), "Another transaction is in progress");
    assert_eq!(writer.calls.lock().unwrap().clone(), vec![ContractCall::Confirm(0)]);
    assert!(!dash.is_writing());
}

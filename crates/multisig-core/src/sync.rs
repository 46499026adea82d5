//! Locally cached, eventually consistent view of a multisig contract's
//! transaction list.
//!
//! A [`TransactionSync`] is bound to at most one contract address at a time.
//! On activation it publishes whatever the cache holds for that address and
//! then refreshes from the contract in the background. Every successful
//! refresh replaces both the cache entry and the published list as a whole;
//! a failed refresh leaves both untouched and records the error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CachePolicy, KeyValueStore, TransactionCache};
use crate::contract::ContractReader;
use crate::error::SyncError;
use crate::types::{MultisigTx, SyncState};

const FALLBACK_ERROR: &str = "Failed to load transactions";

/// Cloneable handle that performs the actual fetch. Background tasks hold
/// one of these so they can outlive a borrow of the owning sync.
///
/// `generation` is the binding the task was created for. The shared
/// `epoch` advances whenever the sync is rebound or dropped; a task whose
/// generation no longer matches neither writes the cache nor publishes.
#[derive(Clone)]
struct SyncTask {
    reader: Option<Arc<dyn ContractReader>>,
    store: Arc<dyn KeyValueStore>,
    policy: CachePolicy,
    address: Option<String>,
    state: Arc<watch::Sender<SyncState>>,
    epoch: Arc<Mutex<u64>>,
    generation: u64,
}

impl SyncTask {
    fn epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self) -> Result<(), SyncError> {
        let (Some(reader), Some(address)) = (&self.reader, &self.address) else {
            debug!("sync skipped: reader or contract address not configured");
            return Ok(());
        };

        {
            let epoch = self.epoch();
            if *epoch != self.generation {
                debug!(%address, "sync skipped: binding superseded");
                return Ok(());
            }
            self.state.send_modify(|s| {
                s.loading = true;
                s.error = None;
            });
        }

        let result = fetch_all(reader.as_ref(), address).await;

        // Held until the result is stored and published so a concurrent
        // rebind cannot evict in between.
        let epoch = self.epoch();
        if *epoch != self.generation {
            debug!(%address, "discarding result for superseded binding");
            return result.map(|_| ());
        }

        match result {
            Ok(txs) => {
                let cache = TransactionCache::new(self.store.as_ref(), self.policy);
                if let Err(e) = cache.store(address, &txs) {
                    warn!(%address, error = %e, "failed to cache transactions");
                }
                info!(%address, count = txs.len(), "transactions synced");
                self.state.send_modify(|s| {
                    s.transactions = txs;
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                warn!(%address, error = %e, "transaction sync failed");
                let message = match e.to_string() {
                    m if m.is_empty() => FALLBACK_ERROR.to_string(),
                    m => m,
                };
                self.state.send_modify(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
                Err(e)
            }
        }
    }
}

/// Reads every transaction in ascending id order, one call at a time, and
/// returns them newest first. Nothing is returned unless all reads succeed.
///
/// The count comes from the contract and is not trusted for allocation.
async fn fetch_all(
    reader: &dyn ContractReader,
    address: &str,
) -> Result<Vec<MultisigTx>, SyncError> {
    let count = reader.transaction_count(address).await?;
    debug!(%address, count, "fetching transactions");

    let mut txs = Vec::new();
    for id in 0..count {
        let raw = reader.transaction(address, id).await?;
        txs.push(MultisigTx::from_on_chain(id, raw)?);
    }

    txs.reverse();
    Ok(txs)
}

pub struct TransactionSync {
    task: SyncTask,
}

impl TransactionSync {
    /// Creates an inactive sync. Nothing is read or published until
    /// [`activate`](Self::activate) is called.
    pub fn new(
        reader: Option<Arc<dyn ContractReader>>,
        address: Option<String>,
        store: Arc<dyn KeyValueStore>,
        policy: CachePolicy,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            task: SyncTask {
                reader,
                store,
                policy,
                address,
                state: Arc::new(state),
                epoch: Arc::new(Mutex::new(0)),
                generation: 0,
            },
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.task.address.as_deref()
    }

    /// Receives every published state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.task.state.subscribe()
    }

    /// Current published state.
    pub fn snapshot(&self) -> SyncState {
        self.task.state.borrow().clone()
    }

    /// Publishes the cached list for the current address, then starts a
    /// background refresh.
    ///
    /// Returns the refresh task, or `None` when no address is set.
    pub fn activate(&self) -> Option<JoinHandle<()>> {
        let address = self.task.address.clone()?;

        let cache = TransactionCache::new(self.task.store.as_ref(), self.task.policy);
        if let Some(cached) = cache.load(&address) {
            self.task.state.send_modify(|s| s.transactions = cached);
        }

        let task = self.task.clone();
        Some(tokio::spawn(async move {
            // Errors are already recorded in the published state.
            let _ = task.run().await;
        }))
    }

    /// Re-reads the contract now and waits for the result.
    pub async fn sync(&self) -> Result<(), SyncError> {
        self.task.run().await
    }

    /// Same as [`sync`](Self::sync); called after a write is confirmed.
    pub async fn refetch(&self) -> Result<(), SyncError> {
        self.sync().await
    }

    /// Points the sync at another contract.
    ///
    /// The previous address is released from the cache, the published list
    /// is cleared so one contract's transactions are never shown under
    /// another, and the new address is activated. A refresh still running
    /// for the previous address finishes without effect.
    pub fn set_address(&mut self, address: Option<String>) -> Option<JoinHandle<()>> {
        if self.task.address == address {
            return None;
        }
        self.task.generation = self.teardown();
        self.task.address = address;
        self.task.state.send_replace(SyncState::default());
        self.activate()
    }

    /// Supersedes every in-flight refresh and releases the current entry.
    /// Returns the new generation.
    fn teardown(&self) -> u64 {
        let mut epoch = self.task.epoch();
        *epoch += 1;
        if let Some(previous) = &self.task.address {
            let cache = TransactionCache::new(self.task.store.as_ref(), self.task.policy);
            if let Err(e) = cache.release(previous) {
                warn!(address = %previous, error = %e, "failed to release cache entry");
            }
        }
        *epoch
    }
}

impl Drop for TransactionSync {
    fn drop(&mut self) {
        self.teardown();
    }
}

//! Wires configuration into a ready-to-use [`Dashboard`].

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::cache::FileStore;
use crate::config::ClientConfig;
use crate::contract::{ContractReader, ContractWriter, RpcReader, RpcSigner};
use crate::dashboard::{Dashboard, DisplayConfig};
use crate::error::SyncError;
use crate::rpc::RpcClient;
use crate::sync::TransactionSync;
use crate::types::Session;

/// Connects to the configured node and assembles the dashboard.
///
/// With a signer key the session is connected as the key's address and
/// writes are enabled. Without one, `config.account` (if any) is used for
/// owner display only.
pub async fn connect(
    config: &ClientConfig,
    signer_key: Option<SecretString>,
) -> Result<Dashboard, SyncError> {
    let rpc = RpcClient::new(config.resolved_rpc_url()?, config.request_timeout())?;

    let node_chain = rpc.chain_id().await?;
    if node_chain != config.chain_id {
        return Err(SyncError::Config(format!(
            "node at {} reports chain {node_chain}, configured chain is {}",
            rpc.url(),
            config.chain_id
        )));
    }

    let writer: Option<Arc<dyn ContractWriter>> = match signer_key {
        Some(key) => Some(Arc::new(RpcSigner::new(
            rpc.clone(),
            config.chain_id,
            key,
            config.receipt_polling(),
        )?)),
        None => None,
    };

    let session = Session {
        account: writer
            .as_ref()
            .map(|w| w.account().to_string())
            .or_else(|| config.account.clone()),
        chain_id: config.chain_id,
    };

    let contract = config.multisig_address().map(str::to_string);
    let reader: Arc<dyn ContractReader> = Arc::new(RpcReader::new(rpc.clone()));
    let store = Arc::new(FileStore::open(&config.cache_dir)?);
    let sync = TransactionSync::new(
        Some(reader.clone()),
        contract.clone(),
        store,
        config.cache_policy(),
    );

    info!(
        rpc = rpc.url(),
        chain_id = config.chain_id,
        contract = contract.as_deref().unwrap_or("<none>"),
        account = session.account.as_deref().unwrap_or("<none>"),
        "client connected"
    );

    Ok(Dashboard::new(
        session,
        contract,
        reader,
        writer,
        sync,
        DisplayConfig {
            signers: config.signers,
            required_confirmations: config.required_confirmations,
            symbol: config.native_symbol(),
        },
    ))
}

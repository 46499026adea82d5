use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::checksum_address;
use crate::error::EthError;

/// Built-in knowledge about a network the client can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub name: &'static str,
    /// Native currency symbol used when displaying balances.
    pub symbol: &'static str,
    /// Public endpoint used when no RPC URL is configured.
    pub default_rpc_url: &'static str,
    /// Block explorer base URL, if the network has one.
    pub explorer: Option<&'static str>,
}

impl ChainInfo {
    /// Explorer page for a transaction hash.
    pub fn tx_url(&self, hash: &str) -> Option<String> {
        self.explorer.map(|base| format!("{base}/tx/{hash}"))
    }
}

const fn chain(
    chain_id: u64,
    name: &'static str,
    symbol: &'static str,
    default_rpc_url: &'static str,
    explorer: Option<&'static str>,
) -> ChainInfo {
    ChainInfo {
        chain_id,
        name,
        symbol,
        default_rpc_url,
        explorer,
    }
}

pub const ETHEREUM: ChainInfo = chain(
    1,
    "Ethereum",
    "ETH",
    "https://eth.llamarpc.com",
    Some("https://etherscan.io"),
);
pub const SEPOLIA: ChainInfo = chain(
    11155111,
    "Sepolia",
    "ETH",
    "https://rpc.sepolia.org",
    Some("https://sepolia.etherscan.io"),
);
pub const POLYGON: ChainInfo = chain(
    137,
    "Polygon",
    "POL",
    "https://polygon-rpc.com",
    Some("https://polygonscan.com"),
);
pub const ARBITRUM: ChainInfo = chain(
    42161,
    "Arbitrum One",
    "ETH",
    "https://arb1.arbitrum.io/rpc",
    Some("https://arbiscan.io"),
);
pub const BASE: ChainInfo = chain(
    8453,
    "Base",
    "ETH",
    "https://mainnet.base.org",
    Some("https://basescan.org"),
);
/// Local development node (anvil / hardhat).
pub const ANVIL: ChainInfo = chain(31337, "Anvil", "ETH", "http://127.0.0.1:8545", None);

const KNOWN: [ChainInfo; 6] = [ETHEREUM, SEPOLIA, POLYGON, ARBITRUM, BASE, ANVIL];

pub fn get_chain(chain_id: u64) -> Option<&'static ChainInfo> {
    KNOWN.iter().find(|c| c.chain_id == chain_id)
}

/// Where the multisig timelock contract is deployed on each chain.
///
/// Keys are chain IDs; values are checksummed contract addresses. A chain
/// without an entry has no deployment, and callers treat the contract
/// address as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Deployments(BTreeMap<u64, String>);

// TOML table keys are strings; chain IDs are parsed from them.
impl TryFrom<BTreeMap<String, String>> for Deployments {
    type Error = EthError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut out = Self::new();
        for (key, address) in raw {
            let chain_id = key.trim().parse::<u64>().map_err(|e| {
                EthError::DecodingError(format!("invalid chain id {key:?}: {e}"))
            })?;
            out.insert(chain_id, &address)?;
        }
        Ok(out)
    }
}

impl From<Deployments> for BTreeMap<String, String> {
    fn from(deployments: Deployments) -> Self {
        deployments
            .0
            .into_iter()
            .map(|(chain_id, address)| (chain_id.to_string(), address))
            .collect()
    }
}

impl Deployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a deployment, normalizing the address to its checksum form.
    pub fn insert(&mut self, chain_id: u64, address: &str) -> Result<(), EthError> {
        let checksummed = checksum_address(address)?;
        self.0.insert(chain_id, checksummed);
        Ok(())
    }

    /// The multisig contract address for `chain_id`, if deployed there.
    pub fn multisig_address(&self, chain_id: u64) -> Option<&str> {
        self.0.get(&chain_id).map(String::as_str)
    }
}

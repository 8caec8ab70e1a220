//! ERC-20 metadata resolution.
//!
//! When a token address is seen for the first time its symbol, name,
//! decimals and total supply are read from the token contract. Every read
//! can fail: contracts revert, return `bytes32` instead of `string`, or do
//! not implement the optional metadata methods at all.
//!
//! [`MetadataResolver`] folds those failures into values:
//! - `symbol` / `name` fall back to [`UNKNOWN_METADATA`]
//! - `total_supply` falls back to zero
//! - `decimals` becomes `None`, which the pair-creation handler rejects
//!
//! [`RpcMetadataResolver`] implements the lookups over JSON-RPC `eth_call`s,
//! with a `bytes32` fallback for legacy tokens and a static table for tokens
//! whose on-chain metadata is unusable.

use alloy::primitives::{address, Address, B256, U256};
use alloy::sol;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::rpc::Provider;

/// Symbol and name recorded when the contract cannot supply them.
pub const UNKNOWN_METADATA: &str = "unknown";

sol! {
    #[sol(rpc)]
    contract ERC20 {
        function symbol() external view returns (string);
        function name() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    contract ERC20SymbolBytes {
        function symbol() external view returns (bytes32);
    }
}

sol! {
    #[sol(rpc)]
    contract ERC20NameBytes {
        function name() external view returns (bytes32);
    }
}

/// Source of token metadata.
///
/// Each method is one independent lookup; implementations never fail, they
/// return the documented fallback instead.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Ticker symbol, or [`UNKNOWN_METADATA`].
    async fn fetch_symbol(&self, token: Address) -> String;

    /// Display name, or [`UNKNOWN_METADATA`].
    async fn fetch_name(&self, token: Address) -> String;

    /// Decimal precision, or `None` if it cannot be determined.
    async fn fetch_decimals(&self, token: Address) -> Option<u8>;

    /// Raw total supply, or zero.
    async fn fetch_total_supply(&self, token: Address) -> U256;
}

/// Hard-coded metadata for tokens whose contracts report it incorrectly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticTokenDefinition {
    /// Token contract.
    pub address: Address,
    /// Symbol to record.
    pub symbol: &'static str,
    /// Name to record.
    pub name: &'static str,
    /// Decimals to record.
    pub decimals: u8,
}

/// Tokens with broken or missing metadata methods.
pub const STATIC_TOKEN_DEFINITIONS: [StaticTokenDefinition; 6] = [
    StaticTokenDefinition {
        address: address!("e0b7927c4af23765cb51314a0e0521a9645f0e2a"),
        symbol: "DGD",
        name: "DGD",
        decimals: 9,
    },
    StaticTokenDefinition {
        address: address!("7fc66500c84a76ad7e9c93437bfc5ac33e2ddae9"),
        symbol: "AAVE",
        name: "Aave Token",
        decimals: 18,
    },
    StaticTokenDefinition {
        address: address!("eb9951021698b42e4399f9cbb6267aa35f82d59d"),
        symbol: "LIF",
        name: "Lif",
        decimals: 18,
    },
    StaticTokenDefinition {
        address: address!("bdeb4b83251fb146687fa19d1c660f99411eefe3"),
        symbol: "SVD",
        name: "savedroid",
        decimals: 18,
    },
    StaticTokenDefinition {
        address: address!("bb9bc244d798123fde783fcc1c72d3bb8c189413"),
        symbol: "TheDAO",
        name: "TheDAO",
        decimals: 16,
    },
    StaticTokenDefinition {
        address: address!("38c6a68304cdefb9bec48bbfaaba5c5b47818bb2"),
        symbol: "HPB",
        name: "HPBCoin",
        decimals: 18,
    },
];

/// Static override for `token`, if any.
#[must_use]
pub fn static_definition(token: Address) -> Option<&'static StaticTokenDefinition> {
    STATIC_TOKEN_DEFINITIONS
        .iter()
        .find(|definition| definition.address == token)
}

/// Decode a `bytes32` metadata value: bytes up to the first NUL as UTF-8.
///
/// Returns `None` for an all-zero value.
#[must_use]
pub fn bytes32_to_string(value: B256) -> Option<String> {
    if value.is_zero() {
        return None;
    }

    let end = value.iter().position(|b| *b == 0).unwrap_or(32);
    let text = String::from_utf8_lossy(&value[..end]).into_owned();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// [`MetadataResolver`] backed by `eth_call`s against an RPC node.
#[derive(Debug, Clone)]
pub struct RpcMetadataResolver {
    provider: Provider,
}

impl RpcMetadataResolver {
    /// Create a resolver issuing calls through `provider`.
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MetadataResolver for RpcMetadataResolver {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_symbol(&self, token: Address) -> String {
        if let Some(definition) = static_definition(token) {
            return definition.symbol.to_string();
        }

        let contract = ERC20::new(token, self.provider.clone());
        match contract.symbol().call().await {
            Ok(symbol) => return symbol._0,
            Err(e) => debug!(%token, error = %e, "symbol() as string failed, trying bytes32"),
        }

        let contract = ERC20SymbolBytes::new(token, self.provider.clone());
        match contract.symbol().call().await {
            Ok(symbol) => bytes32_to_string(symbol._0)
                .unwrap_or_else(|| UNKNOWN_METADATA.to_string()),
            Err(e) => {
                debug!(%token, error = %e, "symbol() as bytes32 failed");
                UNKNOWN_METADATA.to_string()
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_name(&self, token: Address) -> String {
        if let Some(definition) = static_definition(token) {
            return definition.name.to_string();
        }

        let contract = ERC20::new(token, self.provider.clone());
        match contract.name().call().await {
            Ok(name) => return name._0,
            Err(e) => debug!(%token, error = %e, "name() as string failed, trying bytes32"),
        }

        let contract = ERC20NameBytes::new(token, self.provider.clone());
        match contract.name().call().await {
            Ok(name) => {
                bytes32_to_string(name._0).unwrap_or_else(|| UNKNOWN_METADATA.to_string())
            }
            Err(e) => {
                debug!(%token, error = %e, "name() as bytes32 failed");
                UNKNOWN_METADATA.to_string()
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_decimals(&self, token: Address) -> Option<u8> {
        if let Some(definition) = static_definition(token) {
            return Some(definition.decimals);
        }

        let contract = ERC20::new(token, self.provider.clone());
        match contract.decimals().call().await {
            Ok(decimals) => Some(decimals._0),
            Err(e) => {
                debug!(%token, error = %e, "decimals() failed");
                None
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_total_supply(&self, token: Address) -> U256 {
        let contract = ERC20::new(token, self.provider.clone());
        match contract.totalSupply().call().await {
            Ok(supply) => supply._0,
            Err(e) => {
                debug!(%token, error = %e, "totalSupply() failed");
                U256::ZERO
            }
        }
    }
}

//! Entity graph materialized from factory events.
//!
//! Four entity kinds are stored, each identified by a stable string key:
//!
//! | Kind      | Key                                   |
//! |-----------|---------------------------------------|
//! | `Factory` | factory contract address (lower-case) |
//! | `Bundle`  | the constant [`BUNDLE_ID`]            |
//! | `Token`   | token contract address (lower-case)   |
//! | `Pair`    | pair contract address (lower-case)    |
//!
//! Constructors here only produce the zero-initialized shape of each record.
//! Accumulators (volumes, reserves, prices, liquidity) belong to swap and
//! sync handlers and are never touched by the pair-creation path.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Fixed key of the [`Bundle`] singleton.
pub const BUNDLE_ID: &str = "1";

/// Discriminator for stored entity documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// [`Factory`] singleton.
    Factory,
    /// [`Bundle`] singleton.
    Bundle,
    /// [`Token`] record.
    Token,
    /// [`Pair`] record.
    Pair,
}

impl EntityKind {
    /// Name used as the `kind` column in the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factory => "Factory",
            Self::Bundle => "Bundle",
            Self::Token => "Token",
            Self::Pair => "Pair",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record that can be loaded from and saved to an
/// [`EntityStore`](crate::store::EntityStore).
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind under which documents of this type are stored.
    const KIND: EntityKind;

    /// Stable key of this record.
    fn id(&self) -> &str;
}

/// Canonical entity key for an on-chain address: `0x` + 40 lower-case hex chars.
///
/// # Example
///
/// ```
/// use alloy::primitives::address;
/// use uniswap_factory_sync::entities::entity_id;
///
/// let id = entity_id(&address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));
/// assert_eq!(id, "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
/// ```
#[must_use]
pub fn entity_id(address: &Address) -> String {
    format!("{address:#x}")
}

/// Factory singleton aggregating every pair it deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factory {
    /// Factory contract address.
    pub id: String,
    /// Number of pair-creation events processed.
    pub pair_count: u64,
    /// Total volume in ETH.
    #[serde(rename = "totalVolumeETH")]
    pub total_volume_eth: Decimal,
    /// Total liquidity in ETH.
    #[serde(rename = "totalLiquidityETH")]
    pub total_liquidity_eth: Decimal,
    /// Total volume in USD.
    #[serde(rename = "totalVolumeUSD")]
    pub total_volume_usd: Decimal,
    /// Volume in USD including untracked tokens.
    #[serde(rename = "untrackedVolumeUSD")]
    pub untracked_volume_usd: Decimal,
    /// Total liquidity in USD.
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: Decimal,
    /// Transactions across all pairs.
    pub tx_count: u64,
    /// Token keys ordered by liquidity.
    pub most_liquid_tokens: Vec<String>,
}

impl Factory {
    /// Zero-initialized factory with `pair_count = 0`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pair_count: 0,
            total_volume_eth: Decimal::ZERO,
            total_liquidity_eth: Decimal::ZERO,
            total_volume_usd: Decimal::ZERO,
            untracked_volume_usd: Decimal::ZERO,
            total_liquidity_usd: Decimal::ZERO,
            tx_count: 0,
            most_liquid_tokens: Vec::new(),
        }
    }
}

impl Entity for Factory {
    const KIND: EntityKind = EntityKind::Factory;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Global record holding the shared ETH reference price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Always [`BUNDLE_ID`].
    pub id: String,
    /// ETH price in USD.
    pub eth_price: Decimal,
}

impl Bundle {
    /// Bundle with a zero ETH price.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: BUNDLE_ID.to_string(),
            eth_price: Decimal::ZERO,
        }
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for Bundle {
    const KIND: EntityKind = EntityKind::Bundle;

    fn id(&self) -> &str {
        &self.id
    }
}

/// ERC-20 token participating in at least one pair.
///
/// `symbol`, `name`, `decimals` and `total_supply` are resolved once when
/// the token is first seen and never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token contract address.
    pub id: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Decimal precision; `None` when the contract could not report it.
    pub decimals: Option<u8>,
    /// Raw total supply at first sight.
    pub total_supply: U256,
    /// Price in ETH.
    #[serde(rename = "derivedETH")]
    pub derived_eth: Decimal,
    /// Volume in token units.
    pub trade_volume: Decimal,
    /// Volume in USD.
    #[serde(rename = "tradeVolumeUSD")]
    pub trade_volume_usd: Decimal,
    /// Volume in USD including untracked pairs.
    #[serde(rename = "untrackedVolumeUSD")]
    pub untracked_volume_usd: Decimal,
    /// Liquidity across all pairs in token units.
    pub total_liquidity: Decimal,
    /// Pair keys ordered by liquidity.
    pub most_liquid_pairs: Vec<String>,
    /// Transactions touching this token.
    pub tx_count: u64,
}

impl Token {
    /// Token with the given resolved metadata and zeroed accumulators.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: Option<u8>,
        total_supply: U256,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals,
            total_supply,
            derived_eth: Decimal::ZERO,
            trade_volume: Decimal::ZERO,
            trade_volume_usd: Decimal::ZERO,
            untracked_volume_usd: Decimal::ZERO,
            total_liquidity: Decimal::ZERO,
            most_liquid_pairs: Vec::new(),
            tx_count: 0,
        }
    }
}

impl Entity for Token {
    const KIND: EntityKind = EntityKind::Token;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Trading pair deployed by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    /// Pair contract address.
    pub id: String,
    /// Key of the first token.
    pub token0: String,
    /// Key of the second token.
    pub token1: String,
    /// Reserve of token0.
    pub reserve0: Decimal,
    /// Reserve of token1.
    pub reserve1: Decimal,
    /// LP token supply.
    pub total_supply: Decimal,
    /// Reserves valued in ETH.
    #[serde(rename = "reserveETH")]
    pub reserve_eth: Decimal,
    /// Reserves valued in USD.
    #[serde(rename = "reserveUSD")]
    pub reserve_usd: Decimal,
    /// Reserves in ETH counting whitelisted tokens only.
    #[serde(rename = "trackedReserveETH")]
    pub tracked_reserve_eth: Decimal,
    /// token0 per token1.
    pub token0_price: Decimal,
    /// token1 per token0.
    pub token1_price: Decimal,
    /// Volume of token0.
    pub volume_token0: Decimal,
    /// Volume of token1.
    pub volume_token1: Decimal,
    /// Volume in USD.
    #[serde(rename = "volumeUSD")]
    pub volume_usd: Decimal,
    /// Volume in USD including untracked tokens.
    #[serde(rename = "untrackedVolumeUSD")]
    pub untracked_volume_usd: Decimal,
    /// Transactions on this pair.
    pub tx_count: u64,
    /// Timestamp of the creating block.
    pub created_at_timestamp: u64,
    /// Number of the creating block.
    pub created_at_block_number: u64,
    /// Distinct liquidity providers.
    pub liquidity_provider_count: u64,
}

impl Pair {
    /// Freshly deployed pair: token references set, every accumulator zero.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        token0: impl Into<String>,
        token1: impl Into<String>,
        created_at_timestamp: u64,
        created_at_block_number: u64,
    ) -> Self {
        Self {
            id: id.into(),
            token0: token0.into(),
            token1: token1.into(),
            reserve0: Decimal::ZERO,
            reserve1: Decimal::ZERO,
            total_supply: Decimal::ZERO,
            reserve_eth: Decimal::ZERO,
            reserve_usd: Decimal::ZERO,
            tracked_reserve_eth: Decimal::ZERO,
            token0_price: Decimal::ZERO,
            token1_price: Decimal::ZERO,
            volume_token0: Decimal::ZERO,
            volume_token1: Decimal::ZERO,
            volume_usd: Decimal::ZERO,
            untracked_volume_usd: Decimal::ZERO,
            tx_count: 0,
            created_at_timestamp,
            created_at_block_number,
            liquidity_provider_count: 0,
        }
    }
}

impl Entity for Pair {
    const KIND: EntityKind = EntityKind::Pair;

    fn id(&self) -> &str {
        &self.id
    }
}

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use uniswap_factory_sync::events::PairCreatedEvent;
use uniswap_factory_sync::metadata::MetadataResolver;

pub const FACTORY_ID: &str = "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f";

pub const TOKEN_A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
pub const TOKEN_B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
pub const TOKEN_C: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

pub const PAIR_AB: Address = address!("00000000000000000000000000000000000000ab");
pub const PAIR_AC: Address = address!("00000000000000000000000000000000000000ac");
pub const PAIR_BC: Address = address!("00000000000000000000000000000000000000bc");

/// Per-field call counts of a [`FakeResolver`].
#[derive(Debug, Default)]
pub struct CallCounts {
    pub symbol: AtomicUsize,
    pub name: AtomicUsize,
    pub decimals: AtomicUsize,
    pub total_supply: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.symbol.load(Ordering::SeqCst)
            + self.name.load(Ordering::SeqCst)
            + self.decimals.load(Ordering::SeqCst)
            + self.total_supply.load(Ordering::SeqCst)
    }
}

/// Deterministic resolver: 18 decimals unless overridden per token.
#[derive(Debug, Default)]
pub struct FakeResolver {
    decimals: HashMap<Address, Option<u8>>,
    pub calls: CallCounts,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decimals(mut self, token: Address, decimals: Option<u8>) -> Self {
        self.decimals.insert(token, decimals);
        self
    }
}

#[async_trait]
impl MetadataResolver for FakeResolver {
    async fn fetch_symbol(&self, token: Address) -> String {
        self.calls.symbol.fetch_add(1, Ordering::SeqCst);
        format!("SYM{}", token.0[19])
    }

    async fn fetch_name(&self, token: Address) -> String {
        self.calls.name.fetch_add(1, Ordering::SeqCst);
        format!("Token {}", token.0[19])
    }

    async fn fetch_decimals(&self, token: Address) -> Option<u8> {
        self.calls.decimals.fetch_add(1, Ordering::SeqCst);
        self.decimals.get(&token).copied().unwrap_or(Some(18))
    }

    async fn fetch_total_supply(&self, _token: Address) -> U256 {
        self.calls.total_supply.fetch_add(1, Ordering::SeqCst);
        U256::from(1_000_000u64)
    }
}

/// Event at `block_number` creating `pair` from `token0` and `token1`.
pub fn pair_created(
    token0: Address,
    token1: Address,
    pair: Address,
    block_number: u64,
) -> PairCreatedEvent {
    PairCreatedEvent {
        token0,
        token1,
        pair,
        block_number,
        block_hash: B256::repeat_byte(0x11),
        block_timestamp: 1_588_710_145 + block_number,
        transaction_hash: B256::repeat_byte(0x22),
        log_index: 0,
    }
}

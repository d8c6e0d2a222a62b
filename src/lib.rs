//! Kuru orderbook DEX SDK.
//!
//! # Overview
//!
//! Thin typed layer over the exchange smart contracts and its companion
//! event feed. Matching, margin accounting and settlement all happen on-chain;
//! this crate prepares and signs the calls, normalizes prices and sizes
//! to the market precision, and relays feed events to the caller.
//!
//! Use [`client::KuruClient`] for the common flow: deposit into the margin
//! account, place orders by client order ID (CLOID), cancel them, and
//! follow their lifecycle through [`client::KuruClient::subscribe`].
//!
//! Lower level building blocks are available on their own:
//!
//! * [`orderbook::Orderbook`] wraps a single market contract.
//! * [`margin::MarginAccount`] and [`token::Token`] cover collateral.
//! * [`executor::OrderExecutor`] adds receipt decoding and CLOID tracking.
//! * [`ws::WebSocketHandler`] speaks to the event feed.
//! * [`api::KuruApi`] queries the indexer REST API.
//! * [`stream::raw`] polls orderbook logs directly from the node.
//!
//! # Limitations/follow-ups
//!
//! * The orderbook contract does not know about CLOIDs, so batch placements
//!   are matched back to requests by price and side. Two requests with the
//!   same price and side in one batch get distinct order IDs, but which CLOID
//!   receives which ID is unspecified.

pub mod abi;
pub mod api;
pub mod client;
pub mod error;
pub mod executor;
pub mod margin;
pub mod num;
pub mod orderbook;
pub mod stream;
pub mod token;
pub mod tracker;
pub mod types;
pub mod ws;

use alloy::primitives::{Address, address};
use url::Url;

const TESTNET_WS_URL: &str = "wss://ws.testnet.kuru.io";
const TESTNET_API_URL: &str = "https://api.testnet.kuru.io/api/v2";

#[derive(Clone, Debug)]
/// Chain the exchange is operating on.
pub struct Chain {
    chain_id: u64,
    margin_account: Address,
    ws_url: Url,
    api_url: Url,
}

impl Chain {
    /// Monad testnet deployment.
    pub fn testnet() -> Self {
        Self {
            chain_id: 10143,
            margin_account: address!("0x4B186949F31FCA0aD08497Df9169a6bEbF0e26ef"),
            ws_url: Url::parse(TESTNET_WS_URL).expect("valid testnet ws url"),
            api_url: Url::parse(TESTNET_API_URL).expect("valid testnet api url"),
        }
    }

    pub fn custom(chain_id: u64, margin_account: Address, ws_url: Url, api_url: Url) -> Self {
        Self {
            chain_id,
            margin_account,
            ws_url,
            api_url,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn margin_account(&self) -> Address {
        self.margin_account
    }

    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }
}

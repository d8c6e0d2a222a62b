mod book;
mod event;
pub(crate) mod flexible;
mod market;
mod order;
mod tx;

use std::fmt;

pub use book::{L2Book, PriceLevel};
pub use event::*;
pub use market::{Asset, MarketParams};
pub use order::{OrderKind, OrderRequest, Side};
pub use tx::TxOptions;

#[cfg(test)]
pub(crate) use market::tests::mon_usdc;

/// Orderbook internal ID of the order, unique within a market.
pub type OrderId = u64;

/// Client-assigned order ID used for local tracking.
///
/// The orderbook contract has no notion of CLOIDs, the SDK binds them to
/// [`OrderId`]s after the placing transaction is mined.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Cloid(String);

impl Cloid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form expected by the indexer API.
    pub fn to_hex_prefixed(&self) -> String {
        if self.0.starts_with("0x") {
            self.0.clone()
        } else {
            format!("0x{}", self.0)
        }
    }
}

impl fmt::Display for Cloid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cloid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Cloid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloid_hex_prefix() {
        assert_eq!(Cloid::from("abc").to_hex_prefixed(), "0xabc");
        assert_eq!(Cloid::from("0xabc").to_hex_prefixed(), "0xabc");
        assert_eq!(Cloid::from("mm_1").to_string(), "mm_1");
    }
}

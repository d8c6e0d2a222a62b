use alloy::primitives::U256;
use fastnum::UD128;

use crate::{error::KuruError, num::Converter};

const WORD: usize = 32;

/// Aggregated price level.
#[derive(Clone, Copy, derive_more::Debug, PartialEq, Eq)]
#[debug("{price}@{size}")]
pub struct PriceLevel {
    price: UD128,
    size: UD128,
}

impl PriceLevel {
    pub fn new(price: UD128, size: UD128) -> Self {
        Self { price, size }
    }

    pub fn price(&self) -> UD128 {
        self.price
    }

    pub fn size(&self) -> UD128 {
        self.size
    }
}

/// Snapshot of the aggregated orderbook.
///
/// Bids are ordered from the best (highest) price, asks from the best
/// (lowest) price.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct L2Book {
    block_num: u64,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
}

impl L2Book {
    /// Decodes the packed `getL2Book` response.
    ///
    /// Layout is a sequence of 32-byte big-endian words: the block number,
    /// then `(price, size)` pairs of bids, a zero price word, then
    /// `(price, size)` pairs of asks from the worst price up.
    pub fn decode(
        data: &[u8],
        price_converter: Converter,
        size_converter: Converter,
    ) -> Result<Self, KuruError> {
        if data.len() < WORD {
            return Err(KuruError::Decode(format!(
                "l2 book response too short: {} bytes",
                data.len()
            )));
        }
        let word = |offset: usize| U256::from_be_slice(&data[offset..offset + WORD]);

        let block_num = word(0).saturating_to::<u64>();
        let mut bids = Vec::new();
        let mut asks = Vec::new();
        let mut on_asks = false;

        let mut offset = WORD;
        while offset + WORD <= data.len() {
            let price = word(offset);
            if price.is_zero() {
                on_asks = true;
                offset += WORD;
                continue;
            }
            if offset + 2 * WORD > data.len() {
                break;
            }
            let size = word(offset + WORD);
            let level = PriceLevel::new(
                price_converter.from_unsigned(price)?,
                size_converter.from_unsigned(size)?,
            );
            if on_asks {
                asks.push(level);
            } else {
                bids.push(level);
            }
            offset += 2 * WORD;
        }
        asks.reverse();

        Ok(Self {
            block_num,
            bids,
            asks,
        })
    }

    pub fn block_num(&self) -> u64 {
        self.block_num
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec128;

    use super::*;

    fn words(values: &[u64]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| U256::from(*v).to_be_bytes::<32>())
            .collect()
    }

    #[test]
    fn test_decode_bids_and_asks() {
        let data = words(&[
            1234, // block
            350, 20, 340, 10, // bids
            0,  // separator
            380, 5, 370, 7, 360, 9, // asks, worst first
        ]);
        let book = L2Book::decode(&data, Converter::new(2), Converter::new(1)).unwrap();

        assert_eq!(book.block_num(), 1234);
        assert_eq!(
            book.bids(),
            &[
                PriceLevel::new(udec128!(3.5), udec128!(2)),
                PriceLevel::new(udec128!(3.4), udec128!(1)),
            ]
        );
        assert_eq!(
            book.asks(),
            &[
                PriceLevel::new(udec128!(3.6), udec128!(0.9)),
                PriceLevel::new(udec128!(3.7), udec128!(0.7)),
                PriceLevel::new(udec128!(3.8), udec128!(0.5)),
            ]
        );
        assert_eq!(book.best_bid().map(|l| l.price()), Some(udec128!(3.5)));
        assert_eq!(book.best_ask().map(|l| l.price()), Some(udec128!(3.6)));
    }

    #[test]
    fn test_decode_ignores_trailing_partial_pair() {
        let data = words(&[7, 100, 1, 0, 200]);
        let book = L2Book::decode(&data, Converter::new(0), Converter::new(0)).unwrap();
        assert_eq!(book.bids().len(), 1);
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_decode_rejects_oversized_word() {
        let mut data = words(&[1, 100]);
        data.extend(U256::MAX.to_be_bytes::<32>());
        assert!(matches!(
            L2Book::decode(&data, Converter::new(0), Converter::new(0)),
            Err(KuruError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_empty_book() {
        let book = L2Book::decode(&words(&[42]), Converter::new(0), Converter::new(0)).unwrap();
        assert_eq!(book.block_num(), 42);
        assert!(book.bids().is_empty() && book.asks().is_empty());
        assert!(matches!(
            L2Book::decode(&[0u8; 16], Converter::new(0), Converter::new(0)),
            Err(KuruError::Decode(_))
        ));
    }
}

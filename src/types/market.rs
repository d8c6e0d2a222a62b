use alloy::primitives::{Address, U256, aliases::U96, ruint::UintTryFrom};
use fastnum::UD128;

use crate::{
    abi::orderbook::OrderBook::getMarketParamsReturn,
    error::KuruError,
    num::{Converter, Rounding},
};

/// Asset traded on a market, the zero address stands for the native asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Asset {
    address: Address,
    decimals: u8,
}

impl Asset {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }

    pub fn native(decimals: u8) -> Self {
        Self::new(Address::ZERO, decimals)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_native(&self) -> bool {
        self.address.is_zero()
    }

    pub fn converter(&self) -> Converter {
        Converter::new(self.decimals)
    }
}

/// Market configuration as reported by the orderbook contract.
///
/// Prices are quoted in `price_precision` units and must be a multiple of
/// `tick_size`, sizes are quoted in `size_precision` units of the base asset.
#[derive(Clone, Copy, Debug)]
pub struct MarketParams {
    price_converter: Converter,
    size_converter: Converter,
    base: Asset,
    quote: Asset,
    tick_size: u32,
    min_size: U256,
    max_size: U256,
    taker_fee_bps: u64,
    maker_fee_bps: u64,
}

impl MarketParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        price_precision: u32,
        size_precision: U256,
        base: Asset,
        quote: Asset,
        tick_size: u32,
        min_size: U256,
        max_size: U256,
        taker_fee_bps: u64,
        maker_fee_bps: u64,
    ) -> Result<Self, KuruError> {
        let price_converter = Converter::from_precision(U256::from(price_precision))
            .ok_or_else(|| {
                KuruError::Precision(format!(
                    "price precision {price_precision} is not a power of ten"
                ))
            })?;
        let size_converter = Converter::from_precision(size_precision).ok_or_else(|| {
            KuruError::Precision(format!(
                "size precision {size_precision} is not a power of ten"
            ))
        })?;
        if tick_size == 0 {
            return Err(KuruError::Precision("zero tick size".to_string()));
        }
        Ok(Self {
            price_converter,
            size_converter,
            base,
            quote,
            tick_size,
            min_size,
            max_size,
            taker_fee_bps,
            maker_fee_bps,
        })
    }

    pub fn price_converter(&self) -> Converter {
        self.price_converter
    }

    pub fn size_converter(&self) -> Converter {
        self.size_converter
    }

    pub fn price_precision(&self) -> U256 {
        self.price_converter.precision()
    }

    pub fn size_precision(&self) -> U256 {
        self.size_converter.precision()
    }

    pub fn base(&self) -> Asset {
        self.base
    }

    pub fn quote(&self) -> Asset {
        self.quote
    }

    /// Raw price step.
    pub fn tick_size(&self) -> u32 {
        self.tick_size
    }

    pub fn min_size(&self) -> U256 {
        self.min_size
    }

    pub fn max_size(&self) -> U256 {
        self.max_size
    }

    pub fn taker_fee_bps(&self) -> u64 {
        self.taker_fee_bps
    }

    pub fn maker_fee_bps(&self) -> u64 {
        self.maker_fee_bps
    }

    pub fn is_native_base(&self) -> bool {
        self.base.is_native()
    }

    pub fn is_native_quote(&self) -> bool {
        self.quote.is_native()
    }

    /// Limit price in contract units snapped to the tick grid.
    pub fn price_to_raw(&self, price: UD128, rounding: Rounding) -> Result<u32, KuruError> {
        let raw = self
            .price_converter
            .normalize(price, U256::from(self.tick_size), rounding)
            .ok_or_else(|| {
                KuruError::Precision(format!(
                    "price {price} is not a multiple of tick size {}",
                    self.tick_size
                ))
            })?;
        if raw.is_zero() {
            return Err(KuruError::Precision(format!(
                "price {price} rounds to zero"
            )));
        }
        u32::try_from(raw)
            .map_err(|_| KuruError::Precision(format!("price {price} overflows uint32")))
    }

    /// Base size in contract units, extra digits are truncated.
    pub fn size_to_raw(&self, size: UD128) -> Result<U96, KuruError> {
        let raw = self.size_converter.truncate(size);
        if raw.is_zero() {
            return Err(KuruError::Precision(format!(
                "size {size} is below size precision"
            )));
        }
        <U96 as UintTryFrom<_>>::uint_try_from(raw).ok()
            .ok_or_else(|| KuruError::Precision(format!("size {size} overflows uint96")))
    }

    /// Quote amount of a market buy, expressed in price precision.
    pub fn quote_size_to_raw(&self, quote_size: UD128) -> Result<U96, KuruError> {
        let raw = self.price_converter.truncate(quote_size);
        if raw.is_zero() {
            return Err(KuruError::Precision(format!(
                "quote size {quote_size} is below price precision"
            )));
        }
        <U96 as UintTryFrom<_>>::uint_try_from(raw).ok().ok_or_else(|| {
            KuruError::Precision(format!("quote size {quote_size} overflows uint96"))
        })
    }

    pub fn price_from_raw(&self, raw: U256) -> Result<UD128, KuruError> {
        self.price_converter.from_unsigned(raw)
    }

    pub fn size_from_raw(&self, raw: U256) -> Result<UD128, KuruError> {
        self.size_converter.from_unsigned(raw)
    }

    /// Base asset amount in token units.
    pub fn base_amount_to_raw(&self, amount: UD128) -> U256 {
        self.base.converter().truncate(amount)
    }

    /// Quote asset amount in token units.
    pub fn quote_amount_to_raw(&self, amount: UD128) -> U256 {
        self.quote.converter().truncate(amount)
    }
}

impl TryFrom<getMarketParamsReturn> for MarketParams {
    type Error = KuruError;

    fn try_from(value: getMarketParamsReturn) -> Result<Self, Self::Error> {
        let decimals = |value: U256, what: &str| {
            u8::try_from(value)
                .map_err(|_| KuruError::Decode(format!("{what} decimals out of range: {value}")))
        };
        let bps = |value: U256, what: &str| {
            u64::try_from(value)
                .map_err(|_| KuruError::Decode(format!("{what} fee out of range: {value}")))
        };
        Self::new(
            value.pricePrecision,
            U256::from(value.sizePrecision),
            Asset::new(
                value.baseAssetAddress,
                decimals(value.baseAssetDecimals, "base asset")?,
            ),
            Asset::new(
                value.quoteAssetAddress,
                decimals(value.quoteAssetDecimals, "quote asset")?,
            ),
            value.tickSize,
            U256::from(value.minSize),
            U256::from(value.maxSize),
            bps(value.takerFeeBps, "taker")?,
            bps(value.makerFeeBps, "maker")?,
        )
    }
}

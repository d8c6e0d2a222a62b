//! Single market orderbook contract wrapper.

use alloy::{
    network::Ethereum,
    primitives::{Address, U256, aliases::{U40, U96}},
    providers::{PendingTransactionBuilder, Provider},
};
use alloy::primitives::ruint::UintTryFrom;
use fastnum::UD128;
use tracing::{debug, info};

use crate::{
    abi::orderbook::OrderBook::OrderBookInstance,
    error::KuruError,
    num::{Converter, Rounding},
    types::{L2Book, MarketParams, OrderId, PriceLevel, Side, TxOptions},
};

/// Decimals of the prices reported by `bestBidAsk`.
const BEST_PRICE_DECIMALS: u8 = 18;

pub type PendingTx = PendingTransactionBuilder<Ethereum>;

/// `batchUpdate` arguments in contract units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchUpdate {
    pub buy_prices: Vec<u32>,
    pub buy_sizes: Vec<U96>,
    pub sell_prices: Vec<u32>,
    pub sell_sizes: Vec<U96>,
    pub order_ids_to_cancel: Vec<OrderId>,
    pub post_only: bool,
}

impl BatchUpdate {
    pub fn is_empty(&self) -> bool {
        self.buy_prices.is_empty()
            && self.sell_prices.is_empty()
            && self.order_ids_to_cancel.is_empty()
    }
}

/// Wrapper over one orderbook contract.
///
/// Decimal amounts are converted with the market parameters fetched once on
/// [`Orderbook::connect`]. Every write returns the pending transaction right
/// after it is sent, waiting for the receipt is up to the caller.
pub struct Orderbook<P: Provider> {
    instance: OrderBookInstance<P>,
    params: MarketParams,
}

impl<P: Provider> Orderbook<P> {
    /// Connects to the orderbook at `address` and fetches its market parameters.
    pub async fn connect(address: Address, provider: P) -> Result<Self, KuruError> {
        let instance = OrderBookInstance::new(address, provider);
        let params = MarketParams::try_from(instance.getMarketParams().call().await?)?;
        info!(
            market = %address,
            base = %params.base().address(),
            quote = %params.quote().address(),
            tick_size = params.tick_size(),
            "connected to orderbook"
        );
        Ok(Self { instance, params })
    }

    /// Wrapper with already known market parameters, no RPC calls are made.
    pub fn with_market_params(address: Address, provider: P, params: MarketParams) -> Self {
        Self {
            instance: OrderBookInstance::new(address, provider),
            params,
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    pub fn market_params(&self) -> &MarketParams {
        &self.params
    }

    pub fn provider(&self) -> &P {
        self.instance.provider()
    }

    pub async fn add_buy_order(
        &self,
        price: UD128,
        size: UD128,
        post_only: bool,
        tick_normalization: Rounding,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        let price = self.params.price_to_raw(price, tick_normalization)?;
        let size = self.params.size_to_raw(size)?;
        self.add_order_raw(Side::Buy, price, size, post_only, tx)
            .await
    }

    pub async fn add_sell_order(
        &self,
        price: UD128,
        size: UD128,
        post_only: bool,
        tick_normalization: Rounding,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        let price = self.params.price_to_raw(price, tick_normalization)?;
        let size = self.params.size_to_raw(size)?;
        self.add_order_raw(Side::Sell, price, size, post_only, tx)
            .await
    }

    /// Places a limit order with price and size already in contract units.
    pub async fn add_order_raw(
        &self,
        side: Side,
        price: u32,
        size: U96,
        post_only: bool,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        debug!(market = %self.address(), ?side, price, %size, post_only, "sending limit order");
        let pending = match side {
            Side::Buy => {
                tx.apply(self.instance.addBuyOrder(price, size, post_only))
                    .send()
                    .await?
            }
            Side::Sell => {
                tx.apply(self.instance.addSellOrder(price, size, post_only))
                    .send()
                    .await?
            }
        };
        Ok(pending)
    }

    /// Buys with `quote_size` of the quote asset, receiving at least
    /// `min_amount_out` of the base asset.
    pub async fn market_buy(
        &self,
        quote_size: UD128,
        min_amount_out: UD128,
        is_margin: bool,
        fill_or_kill: bool,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        let raw_quote = self.params.quote_size_to_raw(quote_size)?;
        let min_out = self.params.base_amount_to_raw(min_amount_out);
        let value = (!is_margin && self.params.is_native_quote())
            .then(|| self.params.quote_amount_to_raw(quote_size))
            .unwrap_or_default();
        debug!(
            market = %self.address(),
            quote_size = %raw_quote,
            %min_out,
            is_margin,
            fill_or_kill,
            %value,
            "sending market buy"
        );
        let pending = tx
            .apply(
                self.instance
                    .placeAndExecuteMarketBuy(raw_quote, min_out, is_margin, fill_or_kill)
                    .value(value),
            )
            .send()
            .await?;
        Ok(pending)
    }

    /// Sells `size` of the base asset, receiving at least `min_amount_out`
    /// of the quote asset.
    pub async fn market_sell(
        &self,
        size: UD128,
        min_amount_out: UD128,
        is_margin: bool,
        fill_or_kill: bool,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        let raw_size = self.params.size_to_raw(size)?;
        let min_out = self.params.quote_amount_to_raw(min_amount_out);
        let value = (!is_margin && self.params.is_native_base())
            .then(|| self.params.base_amount_to_raw(size))
            .unwrap_or_default();
        debug!(
            market = %self.address(),
            size = %raw_size,
            %min_out,
            is_margin,
            fill_or_kill,
            %value,
            "sending market sell"
        );
        let pending = tx
            .apply(
                self.instance
                    .placeAndExecuteMarketSell(raw_size, min_out, is_margin, fill_or_kill)
                    .value(value),
            )
            .send()
            .await?;
        Ok(pending)
    }

    pub async fn batch_cancel_orders(
        &self,
        order_ids: &[OrderId],
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        if order_ids.is_empty() {
            return Err(KuruError::InvalidOrder(
                "no order ids to cancel".to_string(),
            ));
        }
        let ids = order_ids_to_raw(order_ids)?;
        debug!(market = %self.address(), order_ids = ?order_ids, "sending batch cancel");
        let pending = tx
            .apply(self.instance.batchCancelOrders(ids))
            .send()
            .await?;
        Ok(pending)
    }

    /// Places and cancels several orders in a single transaction.
    ///
    /// Each level of `buys` and `sells` is one limit order, prices are
    /// normalized with `tick_normalization`.
    pub async fn batch_update(
        &self,
        buys: &[PriceLevel],
        sells: &[PriceLevel],
        cancels: &[OrderId],
        post_only: bool,
        tick_normalization: Rounding,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        let (buy_prices, buy_sizes) = self.levels_to_raw(buys, tick_normalization)?;
        let (sell_prices, sell_sizes) = self.levels_to_raw(sells, tick_normalization)?;
        let update = BatchUpdate {
            buy_prices,
            buy_sizes,
            sell_prices,
            sell_sizes,
            order_ids_to_cancel: cancels.to_vec(),
            post_only,
        };
        self.batch_update_raw(&update, tx).await
    }

    pub async fn batch_update_raw(
        &self,
        update: &BatchUpdate,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        if update.is_empty() {
            return Err(KuruError::InvalidOrder("empty batch update".to_string()));
        }
        if update.buy_prices.len() != update.buy_sizes.len()
            || update.sell_prices.len() != update.sell_sizes.len()
        {
            return Err(KuruError::InvalidOrder(
                "batch update prices and sizes differ in length".to_string(),
            ));
        }
        let cancels = order_ids_to_raw(&update.order_ids_to_cancel)?;
        debug!(market = %self.address(), ?update, "sending batch update");
        let pending = tx
            .apply(self.instance.batchUpdate(
                update.buy_prices.clone(),
                update.buy_sizes.clone(),
                update.sell_prices.clone(),
                update.sell_sizes.clone(),
                cancels,
                update.post_only,
            ))
            .send()
            .await?;
        Ok(pending)
    }

    /// Best bid and best ask, zero when the side is empty.
    pub async fn best_bid_ask(&self) -> Result<(UD128, UD128), KuruError> {
        let (bid, ask) = self.best_bid_ask_raw().await?;
        let converter = Converter::new(BEST_PRICE_DECIMALS);
        Ok((converter.from_unsigned(bid)?, converter.from_unsigned(ask)?))
    }

    pub async fn best_bid_ask_raw(&self) -> Result<(U256, U256), KuruError> {
        let res = self.instance.bestBidAsk().call().await?;
        Ok((res.bestBid, res.bestAsk))
    }

    pub async fn fetch_l2_book(&self) -> Result<L2Book, KuruError> {
        let data = self.instance.getL2Book().call().await?;
        L2Book::decode(
            &data,
            self.params.price_converter(),
            self.params.size_converter(),
        )
    }

    fn levels_to_raw(
        &self,
        levels: &[PriceLevel],
        rounding: Rounding,
    ) -> Result<(Vec<u32>, Vec<U96>), KuruError> {
        let raw: Vec<(u32, U96)> = levels
            .iter()
            .map(|level| {
                Ok((
                    self.params.price_to_raw(level.price(), rounding)?,
                    self.params.size_to_raw(level.size())?,
                ))
            })
            .collect::<Result<_, KuruError>>()?;
        Ok(raw.into_iter().unzip())
    }
}

pub(crate) fn order_ids_to_raw(order_ids: &[OrderId]) -> Result<Vec<U40>, KuruError> {
    order_ids
        .iter()
        .map(|id| {
            <U40 as UintTryFrom<_>>::uint_try_from(*id).ok().ok_or_else(|| {
                KuruError::InvalidOrder(format!("order id {id} overflows uint40"))
            })
        })
        .collect()
}

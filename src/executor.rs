//! Order placement with receipt decoding and CLOID tracking.

use std::sync::Arc;

use alloy::{
    primitives::Address,
    providers::Provider,
    rpc::types::TransactionReceipt,
};
use tracing::{debug, info, warn};

use crate::{
    error::KuruError,
    orderbook::{BatchUpdate, Orderbook, PendingTx},
    tracker::{OrderStatus, OrderTracker},
    types::{Cloid, OrderCreatedEvent, OrderId, OrderKind, OrderRequest, Side, TxOptions, WsEvent},
};

/// Limit order sent in a batch, waiting to be matched with its `OrderCreated` event.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Placement {
    cloid: Option<Cloid>,
    side: Side,
    price: u32,
}

/// Places orders on one market and keeps CLOIDs in sync with orderbook IDs.
pub struct OrderExecutor<P: Provider> {
    orderbook: Orderbook<P>,
    tracker: Arc<OrderTracker>,
}

impl<P: Provider> OrderExecutor<P> {
    pub fn new(orderbook: Orderbook<P>) -> Self {
        Self {
            orderbook,
            tracker: Arc::new(OrderTracker::new()),
        }
    }

    pub async fn connect(market: Address, provider: P) -> Result<Self, KuruError> {
        Ok(Self::new(Orderbook::connect(market, provider).await?))
    }

    pub fn orderbook(&self) -> &Orderbook<P> {
        &self.orderbook
    }

    pub fn market(&self) -> Address {
        self.orderbook.address()
    }

    pub fn tracker(&self) -> Arc<OrderTracker> {
        self.tracker.clone()
    }

    pub fn order_id(&self, cloid: &Cloid) -> Option<OrderId> {
        self.tracker.order_id(cloid)
    }

    /// Sends the request, waits for its receipt and updates the tracker.
    ///
    /// A limit order with a CLOID is bound to the ID of the first
    /// `OrderCreated` event of the receipt. If there is none the order was
    /// filled entirely on placement.
    pub async fn place_order(
        &self,
        request: &OrderRequest,
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        self.check_request(request)?;

        if let OrderKind::Cancel { order_ids, cloids } = request.kind() {
            let mut ids = order_ids.clone();
            ids.extend(self.resolve_cloids(cloids)?);
            return self.cancel(ids, cloids, tx).await;
        }

        let cloid = request.cloid();
        if let Some(cloid) = cloid {
            self.tracker
                .track(cloid.clone(), self.market(), request.side());
        }

        let pending = self
            .send_placement(request, tx)
            .await
            .inspect_err(|_| self.fail(cloid))?;
        let receipt = self.confirm(pending, cloid.into_iter()).await?;

        if let Some(cloid) = cloid {
            match request.kind() {
                OrderKind::Limit { .. } => {
                    let created = OrderCreatedEvent::from_receipt(&receipt, self.market());
                    match created.first() {
                        Some(event) => {
                            self.tracker.bind(cloid, event.order_id);
                            info!(%cloid, order_id = event.order_id, tx_hash = %receipt.transaction_hash, "limit order placed");
                        }
                        None => {
                            self.tracker.mark_filled(cloid);
                            info!(%cloid, tx_hash = %receipt.transaction_hash, "limit order filled on placement");
                        }
                    }
                }
                _ => self.tracker.mark_filled(cloid),
            }
        }
        Ok(receipt)
    }

    /// Cancels orders previously placed with the given CLOIDs.
    pub async fn cancel_orders(
        &self,
        cloids: &[Cloid],
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        self.place_order(&OrderRequest::cancel_cloids(self.market(), cloids.to_vec()), tx)
            .await
    }

    /// Sends limit and cancel requests as one `batchUpdate` transaction.
    ///
    /// The batch is post-only if any of the limit requests is. Market orders
    /// cannot be batched.
    pub async fn batch_orders(
        &self,
        requests: &[OrderRequest],
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        if requests.is_empty() {
            return Err(KuruError::InvalidOrder("empty batch".to_string()));
        }
        let params = self.orderbook.market_params();
        let mut update = BatchUpdate::default();
        let mut placements = Vec::new();
        let mut cancel_cloids = Vec::new();

        for request in requests {
            self.check_request(request)?;
            match request.kind() {
                OrderKind::Limit {
                    price,
                    post_only,
                    tick_normalization,
                } => {
                    let (Some(side), Some(size)) = (request.side(), request.size()) else {
                        return Err(KuruError::InvalidOrder(
                            "limit order without side or size".to_string(),
                        ));
                    };
                    let raw_price = params.price_to_raw(*price, *tick_normalization)?;
                    let raw_size = params.size_to_raw(size)?;
                    match side {
                        Side::Buy => {
                            update.buy_prices.push(raw_price);
                            update.buy_sizes.push(raw_size);
                        }
                        Side::Sell => {
                            update.sell_prices.push(raw_price);
                            update.sell_sizes.push(raw_size);
                        }
                    }
                    update.post_only |= *post_only;
                    placements.push(Placement {
                        cloid: request.cloid().cloned(),
                        side,
                        price: raw_price,
                    });
                }
                OrderKind::Cancel { order_ids, cloids } => {
                    update.order_ids_to_cancel.extend(order_ids);
                    update
                        .order_ids_to_cancel
                        .extend(self.resolve_cloids(cloids)?);
                    cancel_cloids.extend(cloids.iter().cloned());
                }
                OrderKind::Market { .. } => {
                    return Err(KuruError::InvalidOrder(
                        "market orders can not be batched".to_string(),
                    ));
                }
            }
        }

        for placement in &placements {
            if let Some(cloid) = &placement.cloid {
                self.tracker
                    .track(cloid.clone(), self.market(), Some(placement.side));
            }
        }
        let cancelling = self.begin_cancellation(&cancel_cloids);

        let placed = placements.iter().filter_map(|p| p.cloid.as_ref());
        let pending = match self.orderbook.batch_update_raw(&update, tx).await {
            Ok(pending) => pending,
            Err(err) => {
                placed.for_each(|c| self.tracker.mark_failed(c));
                self.revert_cancellation(&cancelling);
                return Err(err);
            }
        };
        let receipt = self
            .confirm(pending, placed.clone())
            .await
            .inspect_err(|_| self.revert_cancellation(&cancelling))?;

        let created = OrderCreatedEvent::from_receipt(&receipt, self.market());
        let bound = match_created_orders(&placements, &created);
        for cloid in placed {
            match bound.iter().find(|(c, _)| c == cloid) {
                Some((_, order_id)) => {
                    self.tracker.bind(cloid, *order_id);
                }
                None => self.tracker.mark_filled(cloid),
            }
        }
        for cloid in &cancel_cloids {
            self.tracker.mark_cancelled(cloid);
        }
        info!(
            market = %self.market(),
            placed = placements.len(),
            bound = bound.len(),
            cancelled = update.order_ids_to_cancel.len(),
            tx_hash = %receipt.transaction_hash,
            "batch update executed"
        );
        Ok(receipt)
    }

    /// Applies a feed event of this market to the tracker.
    pub fn handle_event(&self, event: &WsEvent) -> Vec<Cloid> {
        let market = match event {
            WsEvent::OrderCreated(p) => p.market_address,
            WsEvent::Trade(p) => p.market_address,
            WsEvent::OrdersCanceled(p) => p.market_address,
        };
        if market.is_some_and(|m| m != self.market()) {
            return vec![];
        }
        self.tracker.apply(event)
    }

    fn check_request(&self, request: &OrderRequest) -> Result<(), KuruError> {
        request.validate()?;
        if request.market_address() != self.market() {
            return Err(KuruError::InvalidOrder(format!(
                "request for market {} sent to executor of {}",
                request.market_address(),
                self.market()
            )));
        }
        Ok(())
    }

    fn resolve_cloids(&self, cloids: &[Cloid]) -> Result<Vec<OrderId>, KuruError> {
        cloids
            .iter()
            .map(|cloid| {
                self.tracker
                    .order_id(cloid)
                    .ok_or_else(|| KuruError::UnknownCloid(cloid.clone()))
            })
            .collect()
    }

    async fn send_placement(
        &self,
        request: &OrderRequest,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        let (Some(side), Some(size)) = (request.side(), request.size()) else {
            return Err(KuruError::InvalidOrder(
                "order without side or size".to_string(),
            ));
        };
        let ob = &self.orderbook;
        match request.kind() {
            OrderKind::Limit {
                price,
                post_only,
                tick_normalization,
            } => {
                let params = ob.market_params();
                let raw_price = params.price_to_raw(*price, *tick_normalization)?;
                let raw_size = params.size_to_raw(size)?;
                ob.add_order_raw(side, raw_price, raw_size, *post_only, tx)
                    .await
            }
            OrderKind::Market {
                min_amount_out,
                is_margin,
                fill_or_kill,
            } => match side {
                Side::Buy => {
                    ob.market_buy(size, *min_amount_out, *is_margin, *fill_or_kill, tx)
                        .await
                }
                Side::Sell => {
                    ob.market_sell(size, *min_amount_out, *is_margin, *fill_or_kill, tx)
                        .await
                }
            },
            OrderKind::Cancel { .. } => Err(KuruError::InvalidOrder(
                "cancel request is not a placement".to_string(),
            )),
        }
    }

    async fn cancel(
        &self,
        order_ids: Vec<OrderId>,
        cloids: &[Cloid],
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let cancelling = self.begin_cancellation(cloids);
        let receipt = match self.send_cancel(&order_ids, tx).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.revert_cancellation(&cancelling);
                return Err(err);
            }
        };
        for cloid in cloids {
            self.tracker.mark_cancelled(cloid);
        }
        info!(?order_ids, tx_hash = %receipt.transaction_hash, "orders cancelled");
        Ok(receipt)
    }

    async fn send_cancel(
        &self,
        order_ids: &[OrderId],
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let pending = self.orderbook.batch_cancel_orders(order_ids, tx).await?;
        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            warn!(tx_hash = %receipt.transaction_hash, ?order_ids, "cancel transaction reverted");
            return Err(KuruError::TransactionFailed(receipt.transaction_hash));
        }
        Ok(receipt)
    }

    /// Marks the orders as pending cancellation, returning their previous statuses.
    fn begin_cancellation(&self, cloids: &[Cloid]) -> Vec<(Cloid, OrderStatus)> {
        cloids
            .iter()
            .filter_map(|cloid| {
                let previous = self.tracker.mark_pending_cancellation(cloid)?;
                Some((cloid.clone(), previous))
            })
            .collect()
    }

    fn revert_cancellation(&self, cancelling: &[(Cloid, OrderStatus)]) {
        for (cloid, previous) in cancelling {
            debug!(%cloid, ?previous, "cancellation failed, restoring status");
            self.tracker.revert_cancellation(cloid, *previous);
        }
    }

    /// Waits for the receipt, failing the given CLOIDs if it reverted.
    async fn confirm<'a>(
        &self,
        pending: PendingTx,
        cloids: impl Iterator<Item = &'a Cloid> + Clone,
    ) -> Result<TransactionReceipt, KuruError> {
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "waiting for receipt");
        let receipt = pending
            .get_receipt()
            .await
            .inspect_err(|_| cloids.clone().for_each(|c| self.tracker.mark_failed(c)))?;
        if !receipt.status() {
            warn!(%tx_hash, "transaction reverted");
            cloids.for_each(|c| self.tracker.mark_failed(c));
            return Err(KuruError::TransactionFailed(tx_hash));
        }
        Ok(receipt)
    }

    fn fail(&self, cloid: Option<&Cloid>) {
        if let Some(cloid) = cloid {
            self.tracker.mark_failed(cloid);
        }
    }
}

/// Pairs placements with `OrderCreated` events of the same raw price and
/// side, in request order. Each event is bound to at most one placement,
/// placements without a CLOID consume their event but are not returned.
fn match_created_orders(
    placements: &[Placement],
    events: &[OrderCreatedEvent],
) -> Vec<(Cloid, OrderId)> {
    let mut used = vec![false; events.len()];
    placements
        .iter()
        .filter_map(|placement| {
            let idx = (0..events.len()).find(|&idx| {
                !used[idx]
                    && events[idx].price == placement.price
                    && events[idx].side() == placement.side
            })?;
            used[idx] = true;
            let cloid = placement.cloid.clone()?;
            Some((cloid, events[idx].order_id))
        })
        .collect()
}

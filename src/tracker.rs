//! Client order lifecycle tracking.

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::types::{
    Cloid, OrderCreatedPayload, OrderId, OrdersCanceledPayload, Side, TradePayload, WsEvent,
};

/// Lifecycle status of a tracked order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Transaction sent, order ID not known yet.
    Pending,
    /// Resting on the book.
    Active,
    PartiallyFilled,
    Filled,
    Cancelled,
    /// Cancellation sent, not confirmed yet.
    PendingCancellation,
    /// Placing transaction reverted or was not sent.
    Failed,
}

impl OrderStatus {
    /// Status that no later event can change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Active | OrderStatus::PartiallyFilled | OrderStatus::PendingCancellation
        )
    }
}

/// Order known by its CLOID.
#[derive(Clone, Debug)]
pub struct TrackedOrder {
    cloid: Cloid,
    market: Address,
    side: Option<Side>,
    order_id: Option<OrderId>,
    status: OrderStatus,
    remaining_size: Option<U256>,
    trades: Vec<TradePayload>,
}

impl TrackedOrder {
    pub fn cloid(&self) -> &Cloid {
        &self.cloid
    }

    pub fn market(&self) -> Address {
        self.market
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Raw remaining size as last reported by the feed.
    pub fn remaining_size(&self) -> Option<U256> {
        self.remaining_size
    }

    /// Fills against this order in the order they were received.
    pub fn trades(&self) -> &[TradePayload] {
        &self.trades
    }

    fn set_status(&mut self, status: OrderStatus) {
        if self.status.is_terminal() {
            trace!(cloid = %self.cloid, from = ?self.status, to = ?status, "ignoring transition of terminal order");
            return;
        }
        if self.status != status {
            debug!(cloid = %self.cloid, from = ?self.status, to = ?status, "order status changed");
            self.status = status;
        }
    }
}

/// Concurrent CLOID keyed order registry.
///
/// Orders enter as [`OrderStatus::Pending`] when sent and are bound to their
/// orderbook ID once the placing receipt is decoded. Feed events only affect
/// bound orders.
///
/// Finished orders stay queryable until they are [removed](Self::remove) or
/// [pruned](Self::prune_finished), long running clients should do either.
#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: DashMap<Cloid, TrackedOrder>,
    cloids: DashMap<OrderId, Cloid>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a new order, replacing any previous order with the same CLOID.
    pub fn track(&self, cloid: Cloid, market: Address, side: Option<Side>) {
        if let Some((_, previous)) = self.orders.remove(&cloid)
            && let Some(order_id) = previous.order_id
        {
            self.cloids.remove(&order_id);
        }
        self.orders.insert(
            cloid.clone(),
            TrackedOrder {
                cloid,
                market,
                side,
                order_id: None,
                status: OrderStatus::Pending,
                remaining_size: None,
                trades: Vec::new(),
            },
        );
    }

    /// Binds a tracked CLOID to the orderbook ID of the placed order.
    ///
    /// Returns `false` if the CLOID is not tracked.
    pub fn bind(&self, cloid: &Cloid, order_id: OrderId) -> bool {
        let Some(mut order) = self.orders.get_mut(cloid) else {
            return false;
        };
        order.order_id = Some(order_id);
        if order.status == OrderStatus::Pending {
            order.set_status(OrderStatus::Active);
        }
        drop(order);
        self.cloids.insert(order_id, cloid.clone());
        true
    }

    pub fn mark_failed(&self, cloid: &Cloid) {
        if let Some(mut order) = self.orders.get_mut(cloid) {
            order.set_status(OrderStatus::Failed);
        }
    }

    /// Marks an order whose cancellation is being sent, returning the status
    /// it had before.
    pub fn mark_pending_cancellation(&self, cloid: &Cloid) -> Option<OrderStatus> {
        let mut order = self.orders.get_mut(cloid)?;
        let previous = order.status;
        order.set_status(OrderStatus::PendingCancellation);
        Some(previous)
    }

    /// Puts back `status` after the cancelling transaction failed.
    ///
    /// Does nothing if a feed event moved the order on in the meantime.
    pub fn revert_cancellation(&self, cloid: &Cloid, status: OrderStatus) {
        if let Some(mut order) = self.orders.get_mut(cloid)
            && order.status == OrderStatus::PendingCancellation
        {
            order.set_status(status);
        }
    }

    /// Marks an order that executed without resting on the book.
    pub fn mark_filled(&self, cloid: &Cloid) {
        if let Some(mut order) = self.orders.get_mut(cloid) {
            order.set_status(OrderStatus::Filled);
        }
    }

    /// Marks an order cancelled once the cancelling transaction is mined.
    pub fn mark_cancelled(&self, cloid: &Cloid) {
        if let Some(mut order) = self.orders.get_mut(cloid) {
            order.set_status(OrderStatus::Cancelled);
        }
    }

    pub fn order_id(&self, cloid: &Cloid) -> Option<OrderId> {
        self.orders.get(cloid).and_then(|o| o.order_id)
    }

    pub fn cloid(&self, order_id: OrderId) -> Option<Cloid> {
        self.cloids.get(&order_id).map(|c| c.clone())
    }

    pub fn status(&self, cloid: &Cloid) -> Option<OrderStatus> {
        self.orders.get(cloid).map(|o| o.status)
    }

    pub fn get(&self, cloid: &Cloid) -> Option<TrackedOrder> {
        self.orders.get(cloid).map(|o| o.clone())
    }

    pub fn trades(&self, cloid: &Cloid) -> Vec<TradePayload> {
        self.orders
            .get(cloid)
            .map(|o| o.trades.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, cloid: &Cloid) -> bool {
        self.orders.contains_key(cloid)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// CLOIDs and orderbook IDs of orders that may still rest on the book.
    pub fn open_orders(&self) -> Vec<(Cloid, OrderId)> {
        self.orders
            .iter()
            .filter(|o| o.status.is_open())
            .filter_map(|o| o.order_id.map(|id| (o.cloid.clone(), id)))
            .collect()
    }

    /// Stops tracking the order.
    pub fn remove(&self, cloid: &Cloid) -> Option<TrackedOrder> {
        let (_, order) = self.orders.remove(cloid)?;
        if let Some(order_id) = order.order_id {
            self.cloids.remove(&order_id);
        }
        Some(order)
    }

    /// Drops filled, cancelled and failed orders, returning how many were dropped.
    pub fn prune_finished(&self) -> usize {
        let finished: Vec<Cloid> = self
            .orders
            .iter()
            .filter(|o| o.status.is_terminal() || o.status == OrderStatus::Failed)
            .map(|o| o.cloid.clone())
            .collect();
        finished
            .iter()
            .filter(|cloid| self.remove(cloid).is_some())
            .count()
    }

    /// Applies a feed event, returning the CLOIDs it affected.
    pub fn apply(&self, event: &WsEvent) -> Vec<Cloid> {
        match event {
            WsEvent::OrderCreated(payload) => self.apply_order_created(payload).into_iter().collect(),
            WsEvent::Trade(payload) => self.apply_trade(payload).into_iter().collect(),
            WsEvent::OrdersCanceled(payload) => self.apply_orders_canceled(payload),
        }
    }

    pub fn apply_order_created(&self, payload: &OrderCreatedPayload) -> Option<Cloid> {
        let cloid = self.cloid(payload.order_id)?;
        let mut order = self.orders.get_mut(&cloid)?;
        let status = if payload.is_canceled {
            OrderStatus::Cancelled
        } else if payload.remaining_size.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::Active
        };
        order.remaining_size = Some(payload.remaining_size);
        order.set_status(status);
        Some(cloid)
    }

    pub fn apply_trade(&self, payload: &TradePayload) -> Option<Cloid> {
        let cloid = self.cloid(payload.order_id)?;
        let mut order = self.orders.get_mut(&cloid)?;
        let status = if payload.updated_size.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        order.trades.push(payload.clone());
        order.remaining_size = Some(payload.updated_size);
        order.set_status(status);
        Some(cloid)
    }

    pub fn apply_orders_canceled(&self, payload: &OrdersCanceledPayload) -> Vec<Cloid> {
        payload
            .order_ids
            .iter()
            .filter_map(|order_id| {
                let cloid = self.cloid(*order_id)?;
                self.mark_cancelled(&cloid);
                Some(cloid)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    const MARKET: Address = address!("0x05e6f736b5dedd60693fa806ce353156a1b73cf3");

    fn tracker_with(cloid: &str, order_id: OrderId) -> OrderTracker {
        let tracker = OrderTracker::new();
        tracker.track(Cloid::from(cloid), MARKET, Some(Side::Buy));
        assert_eq!(tracker.status(&Cloid::from(cloid)), Some(OrderStatus::Pending));
        assert!(tracker.bind(&Cloid::from(cloid), order_id));
        tracker
    }

    fn trade(order_id: OrderId, updated_size: u64) -> TradePayload {
        TradePayload {
            order_id,
            updated_size: U256::from(updated_size),
            filled_size: U256::from(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_bind_and_lookup() {
        let tracker = tracker_with("a", 10);
        let cloid = Cloid::from("a");
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Active));
        assert_eq!(tracker.order_id(&cloid), Some(10));
        assert_eq!(tracker.cloid(10), Some(cloid.clone()));
        assert!(!tracker.bind(&Cloid::from("missing"), 11));
        assert_eq!(tracker.open_orders(), vec![(cloid, 10)]);
    }

    #[test]
    fn test_order_created_statuses() {
        let tracker = tracker_with("a", 1);
        let cloid = Cloid::from("a");
        let mut payload = OrderCreatedPayload {
            order_id: 1,
            remaining_size: U256::from(5),
            ..Default::default()
        };
        assert_eq!(tracker.apply_order_created(&payload), Some(cloid.clone()));
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Active));

        payload.remaining_size = U256::ZERO;
        tracker.apply_order_created(&payload);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Filled));

        let tracker = tracker_with("b", 2);
        let payload = OrderCreatedPayload {
            order_id: 2,
            remaining_size: U256::from(5),
            is_canceled: true,
            ..Default::default()
        };
        tracker.apply_order_created(&payload);
        assert_eq!(tracker.status(&Cloid::from("b")), Some(OrderStatus::Cancelled));
    }

    #[test]
    fn test_trades_drive_fill_status() {
        let tracker = tracker_with("a", 1);
        let cloid = Cloid::from("a");

        tracker.apply(&WsEvent::Trade(trade(1, 4)));
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::PartiallyFilled));
        tracker.apply(&WsEvent::Trade(trade(1, 0)));
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Filled));
        assert_eq!(tracker.trades(&cloid).len(), 2);
        assert_eq!(tracker.get(&cloid).unwrap().remaining_size(), Some(U256::ZERO));
        assert!(tracker.open_orders().is_empty());

        // Unknown order ids are ignored
        assert!(tracker.apply(&WsEvent::Trade(trade(99, 0))).is_empty());
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        let tracker = tracker_with("a", 1);
        let cloid = Cloid::from("a");
        tracker.mark_pending_cancellation(&cloid);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::PendingCancellation));

        let affected = tracker.apply(&WsEvent::OrdersCanceled(OrdersCanceledPayload {
            order_ids: vec![1, 2],
            ..Default::default()
        }));
        assert_eq!(affected, vec![cloid.clone()]);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Cancelled));

        tracker.apply(&WsEvent::Trade(trade(1, 3)));
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Cancelled));
        tracker.mark_failed(&cloid);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Cancelled));
    }

    #[test]
    fn test_revert_cancellation() {
        let tracker = tracker_with("a", 1);
        let cloid = Cloid::from("a");
        tracker.apply(&WsEvent::Trade(trade(1, 4)));

        let previous = tracker.mark_pending_cancellation(&cloid);
        assert_eq!(previous, Some(OrderStatus::PartiallyFilled));
        tracker.revert_cancellation(&cloid, OrderStatus::PartiallyFilled);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::PartiallyFilled));

        // The feed reported the fill before the cancel failed
        tracker.mark_pending_cancellation(&cloid);
        tracker.apply(&WsEvent::Trade(trade(1, 0)));
        tracker.revert_cancellation(&cloid, OrderStatus::PartiallyFilled);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Filled));

        assert_eq!(tracker.mark_pending_cancellation(&Cloid::from("missing")), None);
    }

    #[test]
    fn test_prune_finished() {
        let tracker = tracker_with("open", 1);
        for (cloid, order_id) in [("filled", 2), ("cancelled", 3)] {
            tracker.track(Cloid::from(cloid), MARKET, Some(Side::Buy));
            tracker.bind(&Cloid::from(cloid), order_id);
        }
        tracker.track(Cloid::from("failed"), MARKET, None);
        tracker.track(Cloid::from("pending"), MARKET, None);

        tracker.mark_filled(&Cloid::from("filled"));
        tracker.mark_cancelled(&Cloid::from("cancelled"));
        tracker.mark_failed(&Cloid::from("failed"));

        assert_eq!(tracker.prune_finished(), 3);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.contains(&Cloid::from("open")));
        assert!(tracker.contains(&Cloid::from("pending")));
        assert_eq!(tracker.cloid(2), None);
        assert_eq!(tracker.cloid(1), Some(Cloid::from("open")));
    }

    #[test]
    fn test_retrack_and_remove() {
        let tracker = tracker_with("a", 1);
        let cloid = Cloid::from("a");
        tracker.track(cloid.clone(), MARKET, Some(Side::Sell));
        assert_eq!(tracker.cloid(1), None);
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Pending));

        tracker.bind(&cloid, 2);
        let removed = tracker.remove(&cloid).unwrap();
        assert_eq!(removed.order_id(), Some(2));
        assert_eq!(removed.side(), Some(Side::Sell));
        assert!(tracker.is_empty());
        assert_eq!(tracker.cloid(2), None);
    }
}

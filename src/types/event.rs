use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionReceipt,
    sol_types::SolEvent,
};
use serde::Deserialize;

use super::{OrderId, Side, flexible};
use crate::abi::orderbook::OrderBook;

/// Events from a specific block.
#[derive(Debug)]
pub struct BlockEvents<T> {
    block_number: u64,
    block_timestamp: u64,
    events: Vec<T>,
}

/// Event along with transaction context.
#[derive(Debug)]
pub struct EventContext<T> {
    pub(crate) tx_hash: TxHash,
    pub(crate) tx_index: u64,
    pub(crate) log_index: u64,
    pub(crate) address: Address,
    pub(crate) event: T,
}

impl<T> BlockEvents<T> {
    pub(crate) fn new(block_number: u64, block_timestamp: u64, events: Vec<T>) -> Self {
        Self {
            block_number,
            block_timestamp,
            events,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Zero when the node does not report log timestamps.
    pub fn block_timestamp(&self) -> u64 {
        self.block_timestamp
    }

    /// Raw orderbook events
    pub fn events(&self) -> &[T] {
        &self.events
    }
}

impl<T> EventContext<T> {
    pub(crate) fn new(
        tx_hash: TxHash,
        tx_index: u64,
        log_index: u64,
        address: Address,
        event: T,
    ) -> Self {
        Self {
            tx_hash,
            tx_index,
            log_index,
            address,
            event,
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn tx_index(&self) -> u64 {
        self.tx_index
    }

    pub fn log_index(&self) -> u64 {
        self.log_index
    }

    /// Orderbook contract that emitted the event.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn event(&self) -> &T {
        &self.event
    }
}

/// Order placement decoded from a transaction receipt.
///
/// Price and size stay in contract units so they can be compared with the
/// normalized values of the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub owner: Address,
    pub price: u32,
    pub size: U256,
    pub is_buy: bool,
}

impl OrderCreatedEvent {
    /// All `OrderCreated` events emitted by `orderbook` in the receipt, in log order.
    pub fn from_receipt(receipt: &TransactionReceipt, orderbook: Address) -> Vec<Self> {
        receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.address() == orderbook)
            .filter_map(|log| OrderBook::OrderCreated::decode_log(&log.inner).ok())
            .map(|log| Self::from(&log.data))
            .collect()
    }

    pub fn side(&self) -> Side {
        Side::from(self.is_buy)
    }
}

impl From<&OrderBook::OrderCreated> for OrderCreatedEvent {
    fn from(value: &OrderBook::OrderCreated) -> Self {
        Self {
            order_id: value.orderId.to::<u64>(),
            owner: value.owner,
            price: value.price,
            size: U256::from(value.size),
            is_buy: value.isBuy,
        }
    }
}

/// Event received from the WebSocket feed.
#[derive(Clone, Debug, PartialEq)]
pub enum WsEvent {
    OrderCreated(OrderCreatedPayload),
    Trade(TradePayload),
    OrdersCanceled(OrdersCanceledPayload),
}

impl WsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WsEvent::OrderCreated(_) => "OrderCreated",
            WsEvent::Trade(_) => "Trade",
            WsEvent::OrdersCanceled(_) => "OrdersCanceled",
        }
    }
}

/// Feed notification of an order placed on the book.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderCreatedPayload {
    #[serde(deserialize_with = "flexible::u64")]
    pub order_id: OrderId,
    pub market_address: Option<Address>,
    #[serde(alias = "ownerAddress")]
    pub owner: Address,
    #[serde(deserialize_with = "flexible::u256")]
    pub price: U256,
    #[serde(deserialize_with = "flexible::u256")]
    pub size: U256,
    #[serde(deserialize_with = "flexible::u256")]
    pub remaining_size: U256,
    pub is_buy: bool,
    pub is_canceled: bool,
    #[serde(deserialize_with = "flexible::u64")]
    pub block_number: u64,
    pub transaction_hash: Option<TxHash>,
    #[serde(deserialize_with = "flexible::u64")]
    pub trigger_time: u64,
}

/// Feed notification of a fill against a resting order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradePayload {
    #[serde(deserialize_with = "flexible::u64")]
    pub order_id: OrderId,
    pub market_address: Option<Address>,
    pub maker_address: Address,
    pub taker_address: Address,
    pub tx_origin: Option<Address>,
    pub is_buy: bool,
    #[serde(deserialize_with = "flexible::u256")]
    pub price: U256,
    #[serde(deserialize_with = "flexible::u256")]
    pub updated_size: U256,
    #[serde(deserialize_with = "flexible::u256")]
    pub filled_size: U256,
    #[serde(deserialize_with = "flexible::u64")]
    pub block_number: u64,
    pub transaction_hash: Option<TxHash>,
    #[serde(deserialize_with = "flexible::u64")]
    pub trigger_time: u64,
}

/// Feed notification of cancelled orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrdersCanceledPayload {
    #[serde(alias = "orderId", deserialize_with = "flexible::u64_vec")]
    pub order_ids: Vec<OrderId>,
    pub market_address: Option<Address>,
    #[serde(alias = "owner")]
    pub maker_address: Address,
    #[serde(deserialize_with = "flexible::u64")]
    pub block_number: u64,
    pub transaction_hash: Option<TxHash>,
}

use alloy::primitives::Address;
use fastnum::UD128;

use crate::{error::KuruError, num::Rounding};

use super::{Cloid, OrderId};

/// Side of the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl From<bool> for Side {
    fn from(is_buy: bool) -> Self {
        if is_buy { Side::Buy } else { Side::Sell }
    }
}

/// Kind of the order request along with kind-specific parameters.
///
/// * [`OrderKind::Limit`] rests on the book at `price` unless it crosses.
///   With `post_only` the whole order reverts instead of taking liquidity.
///   `tick_normalization` decides what happens to prices off the tick grid.
/// * [`OrderKind::Market`] executes immediately against the book and
///   reverts if less than `min_amount_out` is received. With `is_margin` the
///   funds are taken from and credited to the margin account instead of the
///   wallet. With `fill_or_kill` a partial fill reverts.
/// * [`OrderKind::Cancel`] cancels resting orders by orderbook ID or by
///   CLOIDs previously bound by the SDK.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub enum OrderKind {
    Limit {
        #[debug("{price}")]
        price: UD128,
        post_only: bool,
        tick_normalization: Rounding,
    },
    Market {
        #[debug("{min_amount_out}")]
        min_amount_out: UD128,
        is_margin: bool,
        fill_or_kill: bool,
    },
    Cancel {
        order_ids: Vec<OrderId>,
        cloids: Vec<Cloid>,
    },
}

/// Request to place or cancel orders on a single market.
#[derive(Clone, derive_more::Debug)]
pub struct OrderRequest {
    market: Address,
    kind: OrderKind,
    side: Option<Side>,
    #[debug("{size:?}")]
    size: Option<UD128>,
    cloid: Option<Cloid>,
}

impl OrderRequest {
    /// Limit order of `size` base units at `price` quote per base.
    pub fn limit(market: Address, side: Side, price: UD128, size: UD128) -> Self {
        Self {
            market,
            kind: OrderKind::Limit {
                price,
                post_only: false,
                tick_normalization: Rounding::Exact,
            },
            side: Some(side),
            size: Some(size),
            cloid: None,
        }
    }

    /// Market order.
    ///
    /// For [`Side::Buy`] the `size` is the quote amount to spend and
    /// `min_amount_out` is in base units, for [`Side::Sell`] the `size` is the
    /// base amount to sell and `min_amount_out` is in quote units.
    pub fn market(market: Address, side: Side, size: UD128, min_amount_out: UD128) -> Self {
        Self {
            market,
            kind: OrderKind::Market {
                min_amount_out,
                is_margin: false,
                fill_or_kill: false,
            },
            side: Some(side),
            size: Some(size),
            cloid: None,
        }
    }

    /// Cancellation of orders by their orderbook IDs.
    pub fn cancel(market: Address, order_ids: Vec<OrderId>) -> Self {
        Self {
            market,
            kind: OrderKind::Cancel {
                order_ids,
                cloids: vec![],
            },
            side: None,
            size: None,
            cloid: None,
        }
    }

    /// Cancellation of orders by their CLOIDs.
    pub fn cancel_cloids(market: Address, cloids: Vec<Cloid>) -> Self {
        Self {
            market,
            kind: OrderKind::Cancel {
                order_ids: vec![],
                cloids,
            },
            side: None,
            size: None,
            cloid: None,
        }
    }

    pub fn with_cloid(mut self, cloid: impl Into<Cloid>) -> Self {
        self.cloid = Some(cloid.into());
        self
    }

    /// Ignored for non-limit orders.
    pub fn with_post_only(mut self, value: bool) -> Self {
        if let OrderKind::Limit { post_only, .. } = &mut self.kind {
            *post_only = value;
        }
        self
    }

    /// Ignored for non-limit orders.
    pub fn with_tick_normalization(mut self, rounding: Rounding) -> Self {
        if let OrderKind::Limit {
            tick_normalization, ..
        } = &mut self.kind
        {
            *tick_normalization = rounding;
        }
        self
    }

    /// Ignored for non-market orders.
    pub fn with_margin(mut self, value: bool) -> Self {
        if let OrderKind::Market { is_margin, .. } = &mut self.kind {
            *is_margin = value;
        }
        self
    }

    /// Ignored for non-market orders.
    pub fn with_fill_or_kill(mut self, value: bool) -> Self {
        if let OrderKind::Market { fill_or_kill, .. } = &mut self.kind {
            *fill_or_kill = value;
        }
        self
    }

    pub fn market_address(&self) -> Address {
        self.market
    }

    pub fn kind(&self) -> &OrderKind {
        &self.kind
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn size(&self) -> Option<UD128> {
        self.size
    }

    pub fn cloid(&self) -> Option<&Cloid> {
        self.cloid.as_ref()
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self.kind, OrderKind::Cancel { .. })
    }

    /// Checks the request is complete before any call is prepared.
    pub fn validate(&self) -> Result<(), KuruError> {
        match &self.kind {
            OrderKind::Cancel { order_ids, cloids } => {
                if order_ids.is_empty() && cloids.is_empty() {
                    return Err(KuruError::InvalidOrder(
                        "either order ids or cloids must be provided to cancel".to_string(),
                    ));
                }
            }
            OrderKind::Limit { price, .. } => {
                if price.is_zero() {
                    return Err(KuruError::InvalidOrder(
                        "limit price must be positive".to_string(),
                    ));
                }
                self.validate_size()?;
            }
            OrderKind::Market { .. } => self.validate_size()?,
        }
        Ok(())
    }

    fn validate_size(&self) -> Result<(), KuruError> {
        match self.size {
            Some(size) if !size.is_zero() => Ok(()),
            _ => Err(KuruError::InvalidOrder(
                "order size must be positive".to_string(),
            )),
        }
    }
}

//! Trade and confirmation types produced by the matching core.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketId, Order, OrderId, PartyId, Side, TradeId};

/// The immutable record of one fill between a buyer and a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Assigned by the book once the uncrossing that produced the fill is
    /// committed. `None` for simulated (indicative) trades.
    pub id: Option<TradeId>,
    pub market: MarketId,
    /// Execution price in market precision.
    pub price: Decimal,
    pub size: u64,
    pub buyer: PartyId,
    pub seller: PartyId,
    /// Which side the aggressor was on; `None` for auction uncrossings
    /// where neither side aggressed.
    pub aggressor: Option<Side>,
    pub buy_order: OrderId,
    pub sell_order: OrderId,
    /// Chain time of execution, nanoseconds.
    pub timestamp: i64,
}

impl Trade {
    /// Build a trade between an aggressive and a passive order.
    ///
    /// Buyer and seller are derived from the aggressor's side; the price is
    /// always the passive order's price.
    #[must_use]
    pub fn between(aggressive: &Order, passive: &Order, size: u64) -> Self {
        let (buyer, seller, buy_order, sell_order) = match aggressive.side {
            Side::Buy => (
                aggressive.party.clone(),
                passive.party.clone(),
                aggressive.id.clone(),
                passive.id.clone(),
            ),
            Side::Sell => (
                passive.party.clone(),
                aggressive.party.clone(),
                passive.id.clone(),
                aggressive.id.clone(),
            ),
        };
        Self {
            id: None,
            market: aggressive.market.clone(),
            price: passive.price,
            size,
            buyer,
            seller,
            aggressor: Some(aggressive.side),
            buy_order,
            sell_order,
            timestamp: aggressive.created_at,
        }
    }

    /// Notional value (price times size).
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.size)
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade {} {} @ {} ({} -> {})",
            self.market, self.size, self.price, self.seller, self.buyer,
        )
    }
}

/// Everything a submission produced: the (possibly mutated) aggressive
/// order, the fills, and the passive orders whose state changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order: Order,
    pub trades: Vec<Trade>,
    pub passive_orders_affected: Vec<Order>,
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancellationConfirmation {
    pub order: Order,
}

//! Order model for the ChainMatch book.
//!
//! Orders arrive fully validated for shape upstream (signatures, balances);
//! the book only checks matching-level validity. Prices are carried in
//! market precision as [`Decimal`]; sizes are integer contract counts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketId, MatchingError, OrderId, PartyId};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an aggressor on this side trades against.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The type of order.
///
/// `Network` orders are created by the venue itself to close out distressed
/// positions; they skip party-level validation and never rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    Network,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
            Self::Network => write!(f, "NETWORK"),
        }
    }
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled.
    Gtc,
    /// Good till time (requires `expires_at`).
    Gtt,
    /// Immediate or cancel.
    Ioc,
    /// Fill or kill.
    Fok,
    /// Good for auction only.
    Gfa,
    /// Good for normal (continuous) trading only.
    Gfn,
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gtc => write!(f, "GTC"),
            Self::Gtt => write!(f, "GTT"),
            Self::Ioc => write!(f, "IOC"),
            Self::Fok => write!(f, "FOK"),
            Self::Gfa => write!(f, "GFA"),
            Self::Gfn => write!(f, "GFN"),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Expired,
    Cancelled,
    /// Stopped by the venue (wash-trade prevention, unfilled FOK/IOC, ...).
    Stopped,
    Filled,
    Rejected,
    PartiallyFilled,
    /// Pegged order lifted off the book (e.g. reference price unavailable).
    Parked,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Parked => write!(f, "PARKED"),
        }
    }
}

/// What a pegged order's price is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PeggedReference {
    Mid,
    BestBid,
    BestAsk,
}

/// Peg details attached to an order whose price tracks a reference.
///
/// Repricing happens outside the book; the book only tracks which resting
/// orders are pegged so it can report their population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeggedOrder {
    pub reference: PeggedReference,
    pub offset: Decimal,
}

/// Iceberg details: only `peak_size` of the order is visible at once, the
/// rest is held in `reserved_remaining` and replenished between aggressors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcebergOrder {
    pub peak_size: u64,
    pub minimum_visible_size: u64,
    pub reserved_remaining: u64,
}

/// An order as the book sees it.
///
/// `remaining` counts the visible portion only; for icebergs the hidden
/// part lives in `iceberg.reserved_remaining` and [`Order::true_remaining`]
/// is the sum of both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub market: MarketId,
    pub party: PartyId,
    pub side: Side,
    pub price: Decimal,
    /// Price before market-precision scaling, used when the scale factor
    /// changes and for tick derivation during uncrossing.
    pub original_price: Option<Decimal>,
    pub size: u64,
    pub remaining: u64,
    pub time_in_force: TimeInForce,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Chain time of creation, nanoseconds. Assigned upstream.
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub updated_at: i64,
    pub version: u64,
    pub batch_id: u64,
    pub pegged_order: Option<PeggedOrder>,
    pub iceberg_order: Option<IcebergOrder>,
    /// Synthesized by an off-book source during uncrossing rather than
    /// submitted by a party.
    pub generated_offbook: bool,
    /// Why the order was rejected or stopped, if it was.
    pub reason: Option<MatchingError>,
}

impl Order {
    /// Remaining including any hidden iceberg reserve.
    #[must_use]
    pub fn true_remaining(&self) -> u64 {
        let reserved = self
            .iceberg_order
            .as_ref()
            .map_or(0, |ice| ice.reserved_remaining);
        self.remaining + reserved
    }

    /// Persistent orders rest on the book when they do not trade.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(
            self.time_in_force,
            TimeInForce::Gtc | TimeInForce::Gtt | TimeInForce::Gfn | TimeInForce::Gfa
        ) && self.order_type == OrderType::Limit
    }

    /// Expirable orders carry a cutoff time and are swept by the expiry pass.
    #[must_use]
    pub fn is_expirable(&self) -> bool {
        matches!(
            self.time_in_force,
            TimeInForce::Gtt | TimeInForce::Gfn | TimeInForce::Gfa
        ) && self.expires_at.is_some()
    }

    /// Whether the order has left the book for good.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self.status, OrderStatus::Active | OrderStatus::Parked)
    }

    /// Whether any part of the order has executed.
    #[must_use]
    pub fn has_traded(&self) -> bool {
        self.size != self.true_remaining()
    }

    /// An iceberg whose visible peak dropped below its minimum and which
    /// still has reserve to replenish from.
    #[must_use]
    pub fn iceberg_needs_refresh(&self) -> bool {
        self.iceberg_order.as_ref().is_some_and(|ice| {
            ice.reserved_remaining > 0 && self.remaining < ice.minimum_visible_size
        })
    }

    /// Restore the visible peak from the reserve, up to `peak_size`.
    /// No-op for non-icebergs.
    pub fn set_iceberg_peaks(&mut self) {
        if let Some(ice) = self.iceberg_order.as_mut() {
            let total = self.remaining + ice.reserved_remaining;
            self.remaining = total.min(ice.peak_size);
            ice.reserved_remaining = total - self.remaining;
        }
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order[{}] {} {} {}/{} @ {} ({})",
            self.id, self.side, self.time_in_force, self.remaining, self.size, self.price, self.status,
        )
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(id: &str, party: &str, side: Side, price: u64, size: u64) -> Self {
        Self {
            id: OrderId::new(id),
            market: MarketId::new("market-1"),
            party: PartyId::new(party),
            side,
            price: Decimal::from(price),
            original_price: Some(Decimal::from(price)),
            size,
            remaining: size,
            time_in_force: TimeInForce::Gtc,
            order_type: OrderType::Limit,
            status: OrderStatus::Active,
            created_at: 0,
            expires_at: None,
            updated_at: 0,
            version: 1,
            batch_id: 0,
            pegged_order: None,
            iceberg_order: None,
            generated_offbook: false,
            reason: None,
        }
    }

    pub fn dummy_market(id: &str, party: &str, side: Side, size: u64) -> Self {
        Self {
            price: Decimal::ZERO,
            original_price: None,
            time_in_force: TimeInForce::Ioc,
            order_type: OrderType::Market,
            ..Self::dummy_limit(id, party, side, 0, size)
        }
    }

    #[must_use]
    pub fn with_iceberg(mut self, peak_size: u64, minimum_visible_size: u64) -> Self {
        self.remaining = self.remaining.min(peak_size);
        self.iceberg_order = Some(IcebergOrder {
            peak_size,
            minimum_visible_size,
            reserved_remaining: self.size - self.remaining,
        });
        self
    }

    #[must_use]
    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn persistence() {
        let gtc = Order::dummy_limit("o1", "p1", Side::Buy, 100, 10);
        assert!(gtc.is_persistent());
        let ioc = gtc.clone().with_tif(TimeInForce::Ioc);
        assert!(!ioc.is_persistent());
        let market = Order::dummy_market("o2", "p1", Side::Buy, 10);
        assert!(!market.is_persistent());
    }

    #[test]
    fn true_remaining_includes_reserve() {
        let ice = Order::dummy_limit("o1", "p1", Side::Buy, 100, 50).with_iceberg(10, 5);
        assert_eq!(ice.remaining, 10);
        assert_eq!(ice.true_remaining(), 50);
        assert!(!ice.has_traded());
    }

    #[test]
    fn iceberg_refresh_cycle() {
        let mut ice = Order::dummy_limit("o1", "p1", Side::Buy, 100, 50).with_iceberg(10, 5);
        ice.remaining = 3;
        assert!(ice.iceberg_needs_refresh());
        ice.set_iceberg_peaks();
        assert_eq!(ice.remaining, 10);
        assert_eq!(ice.iceberg_order.as_ref().unwrap().reserved_remaining, 33);
        assert!(!ice.iceberg_needs_refresh());
    }

    #[test]
    fn iceberg_peaks_drain_reserve_at_the_end() {
        let mut ice = Order::dummy_limit("o1", "p1", Side::Buy, 100, 12).with_iceberg(10, 5);
        // trade down to 0 visible, leaving 2 in reserve
        ice.remaining = 0;
        assert!(ice.iceberg_needs_refresh());
        ice.set_iceberg_peaks();
        assert_eq!(ice.remaining, 2);
        assert_eq!(ice.iceberg_order.as_ref().unwrap().reserved_remaining, 0);
    }

    #[test]
    fn expirable_requires_expiry() {
        let mut gtt = Order::dummy_limit("o1", "p1", Side::Buy, 100, 10).with_tif(TimeInForce::Gtt);
        assert!(!gtt.is_expirable());
        gtt.expires_at = Some(1_000);
        assert!(gtt.is_expirable());
    }

    #[test]
    fn order_serde_roundtrip() {
        let order = Order::dummy_limit("o1", "p1", Side::Sell, 101, 7);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}

//! Serializable book state for replica sync and restarts.
//!
//! A snapshot carries the resting orders in price then time priority per
//! side plus the scalar book state. Restoring into a non-empty book is
//! refused: the caller decides whether to wipe first.

use chainmatch_types::{MarketId, MatchingError, Order, OrderStatus, Result, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::book::OrderBook;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub market: MarketId,
    pub auction: bool,
    pub batch_id: u64,
    pub last_traded_price: Option<Decimal>,
    /// Buy orders, best price first, time priority within a level.
    pub buy_orders: Vec<Order>,
    /// Sell orders, same ordering.
    pub sell_orders: Vec<Order>,
}

impl OrderBook {
    /// Capture the book's full resting state.
    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        let collect = |ids: Vec<chainmatch_types::OrderId>| -> Vec<Order> {
            ids.iter().map(|id| self.store.expect(id).clone()).collect()
        };
        BookSnapshot {
            market: self.market.clone(),
            auction: self.auction,
            batch_id: self.batch_id,
            last_traded_price: self.last_traded_price,
            buy_orders: collect(self.buy.all_order_ids()),
            sell_orders: collect(self.sell.all_order_ids()),
        }
    }

    /// Rebuild this book from a snapshot. The book must be empty.
    pub fn restore_from_snapshot(&mut self, snapshot: BookSnapshot) -> Result<()> {
        if self.store.len() > 0 {
            return Err(MatchingError::SnapshotTargetNotEmpty);
        }
        self.market = snapshot.market;
        self.auction = snapshot.auction;
        self.batch_id = snapshot.batch_id;
        self.fill_seq = 0;
        self.last_traded_price = snapshot.last_traded_price;

        let orders = snapshot.buy_orders.into_iter().chain(snapshot.sell_orders);
        for order in orders {
            debug_assert_eq!(order.status, OrderStatus::Active);
            self.latest_timestamp = self.latest_timestamp.max(order.created_at);
            if order.pegged_order.is_some() {
                self.pegged_orders.insert(order.id.clone());
            }
            match order.side {
                Side::Buy => self.buy.add_order(&mut self.store, order),
                Side::Sell => self.sell.add_order(&mut self.store, order),
            }
        }
        if self.auction {
            self.rebuild_ipv();
        }
        info!(market = %self.market, orders = self.store.len(), "book restored from snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chainmatch_types::{MatchingConfig, OrderId};

    use super::*;

    fn populated_book() -> OrderBook {
        let mut book = OrderBook::new(MarketId::new("market-1"), MatchingConfig::default(), false);
        book.submit_order(Order::dummy_limit("b1", "alice", Side::Buy, 100, 10))
            .unwrap();
        book.submit_order(Order::dummy_limit("b2", "bob", Side::Buy, 99, 5))
            .unwrap();
        book.submit_order(Order::dummy_limit("s1", "carol", Side::Sell, 105, 7))
            .unwrap();
        book
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let book = populated_book();
        let snapshot = book.snapshot();

        let mut restored =
            OrderBook::new(MarketId::new("market-1"), MatchingConfig::default(), false);
        restored.restore_from_snapshot(snapshot).unwrap();

        assert_eq!(restored.get_total_number_of_orders(), 3);
        assert_eq!(restored.hash(), book.hash());
        assert_eq!(
            restored.get_order_by_id(&OrderId::new("b1")).unwrap().remaining,
            10
        );
    }

    #[test]
    fn snapshot_survives_serde() {
        let book = populated_book();
        let snapshot = book.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: BookSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored =
            OrderBook::new(MarketId::new("market-1"), MatchingConfig::default(), false);
        restored.restore_from_snapshot(back).unwrap();
        assert_eq!(restored.hash(), book.hash());
    }

    #[test]
    fn restore_refuses_populated_target() {
        let book = populated_book();
        let snapshot = book.snapshot();
        let mut target = populated_book();
        assert_eq!(
            target.restore_from_snapshot(snapshot),
            Err(MatchingError::SnapshotTargetNotEmpty)
        );
    }

    #[test]
    fn snapshot_preserves_time_priority() {
        let mut book = OrderBook::new(MarketId::new("market-1"), MatchingConfig::default(), false);
        book.submit_order(Order::dummy_limit("first", "alice", Side::Sell, 100, 5))
            .unwrap();
        book.submit_order(Order::dummy_limit("second", "bob", Side::Sell, 100, 5))
            .unwrap();

        let mut restored =
            OrderBook::new(MarketId::new("market-1"), MatchingConfig::default(), false);
        restored.restore_from_snapshot(book.snapshot()).unwrap();

        // the first resting order still trades first
        let conf = restored
            .submit_order(Order::dummy_limit("agg", "carol", Side::Buy, 100, 5))
            .unwrap();
        assert_eq!(conf.trades.len(), 1);
        assert_eq!(conf.trades[0].sell_order, OrderId::new("first"));
    }
}

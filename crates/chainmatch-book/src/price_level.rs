//! A single price level: a FIFO queue of order ids plus the tradable
//! volume resting at that price.
//!
//! `volume` counts true remaining, so iceberg reserves are part of the
//! level's depth even though only the visible peak trades in time
//! priority. Hidden reserve is consumed in a second, pro-rata pass once
//! every visible peak at the level is exhausted.

use chainmatch_types::{MatchingError, Order, OrderId, Trade};
use rust_decimal::Decimal;

use crate::store::OrderStore;

/// What uncrossing one level produced. Trades and an error can coexist:
/// a wash-trade abort keeps the fills made before the offending order.
#[derive(Debug, Default)]
pub struct LevelUncross {
    pub trades: Vec<Trade>,
    pub affected: Vec<OrderId>,
    pub error: Option<MatchingError>,
}

#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Decimal,
    /// Resting order ids in time priority, earliest first.
    orders: Vec<OrderId>,
    /// Sum of true remaining across the queue.
    volume: u64,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: Vec::new(),
            volume: 0,
        }
    }

    #[must_use]
    pub fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub fn volume(&self) -> u64 {
        self.volume
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    #[must_use]
    pub fn order_ids(&self) -> &[OrderId] {
        &self.orders
    }

    /// Append an order at the back of the queue.
    pub fn add_order(&mut self, order: &Order) {
        debug_assert_eq!(order.price, self.price);
        self.volume += order.true_remaining();
        self.orders.push(order.id.clone());
    }

    /// Remove an order from the queue, returning whether it was present.
    /// `true_remaining` must be the order's depth still counted in
    /// `volume` at the time of removal.
    pub fn remove_order(&mut self, id: &OrderId, true_remaining: u64) -> bool {
        let Some(pos) = self.orders.iter().position(|o| o == id) else {
            return false;
        };
        self.orders.remove(pos);
        self.volume -= true_remaining;
        true
    }

    /// Apply a size amendment in place, keeping queue position.
    pub fn adjust_volume(&mut self, old_true_remaining: u64, new_true_remaining: u64) {
        self.volume = self.volume - old_true_remaining + new_true_remaining;
    }

    /// Uncross the aggressor against this level, mutating passives in the
    /// store. Fills walk visible peaks in time priority; leftover demand is
    /// then shared across iceberg reserves pro rata. Fully consumed orders
    /// leave the queue; icebergs holding reserve stay for the refresh pass.
    pub fn uncross(
        &mut self,
        agg: &mut Order,
        store: &mut OrderStore,
        check_wash: bool,
    ) -> LevelUncross {
        let mut out = LevelUncross::default();

        let ids: Vec<OrderId> = self.orders.clone();
        for id in &ids {
            if agg.remaining == 0 {
                break;
            }
            let passive = store.expect_mut(id);
            if check_wash && passive.party == agg.party {
                out.error = Some(MatchingError::WashTrade);
                break;
            }
            let size = agg.remaining.min(passive.remaining);
            if size > 0 {
                let trade = Trade::between(agg, passive, size);
                agg.remaining -= size;
                passive.remaining -= size;
                self.volume -= size;
                out.trades.push(trade);
                out.affected.push(id.clone());
            }
        }

        if out.error.is_none() && agg.remaining > 0 {
            self.uncross_icebergs(agg, store, &out.affected, &mut out.trades);
        }

        self.orders.retain(|id| store.expect(id).true_remaining() > 0);
        out
    }

    /// Share leftover aggressive volume across the reserves of the icebergs
    /// already hit at this level, proportionally to each reserve. Floored
    /// shares leave a remainder that goes to the earliest iceberg in time
    /// priority, capped by its reserve. Each share is folded into the
    /// passive's existing trade rather than emitted as a new one.
    fn uncross_icebergs(
        &mut self,
        agg: &mut Order,
        store: &mut OrderStore,
        affected: &[OrderId],
        trades: &mut Vec<Trade>,
    ) {
        let icebergs: Vec<(OrderId, u64)> = affected
            .iter()
            .filter_map(|id| {
                let reserve = store
                    .expect(id)
                    .iceberg_order
                    .as_ref()
                    .map_or(0, |ice| ice.reserved_remaining);
                (reserve > 0).then(|| (id.clone(), reserve))
            })
            .collect();
        let total_reserve: u64 = icebergs.iter().map(|(_, r)| *r).sum();
        if total_reserve == 0 {
            return;
        }

        let extra = agg.remaining.min(total_reserve);
        let mut shares: Vec<(OrderId, u64, u64)> = icebergs
            .iter()
            .map(|(id, reserve)| {
                let share =
                    u64::try_from(u128::from(extra) * u128::from(*reserve) / u128::from(total_reserve))
                        .unwrap_or(0);
                (id.clone(), share, *reserve)
            })
            .collect();

        let mut leftover = extra - shares.iter().map(|(_, s, _)| *s).sum::<u64>();
        for (_, share, reserve) in &mut shares {
            if leftover == 0 {
                break;
            }
            let add = leftover.min(*reserve - *share);
            *share += add;
            leftover -= add;
        }

        for (id, share, _) in shares {
            if share == 0 {
                continue;
            }
            let passive = store.expect_mut(&id);
            if let Some(ice) = passive.iceberg_order.as_mut() {
                ice.reserved_remaining -= share;
            }
            agg.remaining -= share;
            self.volume -= share;
            if let Some(trade) = trades
                .iter_mut()
                .rev()
                .find(|t| t.buy_order == id || t.sell_order == id)
            {
                trade.size += share;
            }
        }
    }

    /// Read-only variant of [`uncross`](Self::uncross): mutates only the
    /// fake aggressor's remaining, producing the trades a real pass would.
    pub fn fake_uncross(
        &self,
        agg: &mut Order,
        store: &OrderStore,
        check_wash: bool,
    ) -> LevelUncross {
        let mut out = LevelUncross::default();
        let mut reserves: Vec<(OrderId, u64)> = Vec::new();

        for id in &self.orders {
            if agg.remaining == 0 {
                break;
            }
            let passive = store.expect(id);
            if check_wash && passive.party == agg.party {
                out.error = Some(MatchingError::WashTrade);
                break;
            }
            let size = agg.remaining.min(passive.remaining);
            if size > 0 {
                out.trades.push(Trade::between(agg, passive, size));
                out.affected.push(id.clone());
                agg.remaining -= size;
                let reserve = passive
                    .iceberg_order
                    .as_ref()
                    .map_or(0, |ice| ice.reserved_remaining);
                if reserve > 0 {
                    reserves.push((id.clone(), reserve));
                }
            }
        }

        if out.error.is_none() && agg.remaining > 0 {
            let total_reserve: u64 = reserves.iter().map(|(_, r)| *r).sum();
            if total_reserve > 0 {
                let extra = agg.remaining.min(total_reserve);
                let mut shares: Vec<(OrderId, u64, u64)> = reserves
                    .iter()
                    .map(|(id, reserve)| {
                        let share = u64::try_from(
                            u128::from(extra) * u128::from(*reserve) / u128::from(total_reserve),
                        )
                        .unwrap_or(0);
                        (id.clone(), share, *reserve)
                    })
                    .collect();
                let mut leftover = extra - shares.iter().map(|(_, s, _)| *s).sum::<u64>();
                for (_, share, reserve) in &mut shares {
                    if leftover == 0 {
                        break;
                    }
                    let add = leftover.min(*reserve - *share);
                    *share += add;
                    leftover -= add;
                }
                for (id, share, _) in shares {
                    if share == 0 {
                        continue;
                    }
                    agg.remaining -= share;
                    if let Some(trade) = out
                        .trades
                        .iter_mut()
                        .rev()
                        .find(|t| t.buy_order == id || t.sell_order == id)
                    {
                        trade.size += share;
                    }
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use chainmatch_types::Side;

    use super::*;

    fn make_level(store: &mut OrderStore, orders: Vec<Order>) -> PriceLevel {
        let mut level = PriceLevel::new(orders[0].price);
        for order in orders {
            level.add_order(&order);
            store.insert(order);
        }
        level
    }

    #[test]
    fn fifo_fill_in_time_priority() {
        let mut store = OrderStore::new();
        let mut level = make_level(
            &mut store,
            vec![
                Order::dummy_limit("s1", "alice", Side::Sell, 100, 5),
                Order::dummy_limit("s2", "bob", Side::Sell, 100, 5),
            ],
        );
        let mut agg = Order::dummy_limit("b1", "carol", Side::Buy, 100, 7);

        let res = level.uncross(&mut agg, &mut store, true);
        assert!(res.error.is_none());
        assert_eq!(res.trades.len(), 2);
        assert_eq!(res.trades[0].size, 5);
        assert_eq!(res.trades[1].size, 2);
        assert_eq!(agg.remaining, 0);
        assert_eq!(level.volume(), 3);
        // s1 fully consumed, left the queue
        assert_eq!(level.order_ids(), &[OrderId::new("s2")]);
        assert_eq!(store.expect(&OrderId::new("s2")).remaining, 3);
    }

    #[test]
    fn wash_trade_aborts_with_partial_fills() {
        let mut store = OrderStore::new();
        let mut level = make_level(
            &mut store,
            vec![
                Order::dummy_limit("s1", "alice", Side::Sell, 100, 5),
                Order::dummy_limit("s2", "carol", Side::Sell, 100, 5),
            ],
        );
        let mut agg = Order::dummy_limit("b1", "carol", Side::Buy, 100, 10);

        let res = level.uncross(&mut agg, &mut store, true);
        assert_eq!(res.error, Some(MatchingError::WashTrade));
        assert_eq!(res.trades.len(), 1);
        assert_eq!(res.trades[0].size, 5);
        assert_eq!(agg.remaining, 5);
    }

    #[test]
    fn iceberg_reserve_shared_pro_rata() {
        let mut store = OrderStore::new();
        let mut level = make_level(
            &mut store,
            vec![
                Order::dummy_limit("i1", "alice", Side::Sell, 100, 20).with_iceberg(5, 1),
                Order::dummy_limit("i2", "bob", Side::Sell, 100, 20).with_iceberg(5, 1),
                Order::dummy_limit("i3", "dave", Side::Sell, 100, 20).with_iceberg(5, 1),
            ],
        );
        assert_eq!(level.volume(), 60);

        // 15 consumes the three visible peaks, 6 more is split 2/2/2 from
        // the equal reserves and folded into the same trades.
        let mut agg = Order::dummy_limit("b1", "carol", Side::Buy, 100, 21);
        let res = level.uncross(&mut agg, &mut store, true);
        assert!(res.error.is_none());
        assert_eq!(res.trades.len(), 3);
        assert_eq!(
            res.trades.iter().map(|t| t.size).collect::<Vec<_>>(),
            vec![7, 7, 7]
        );
        assert_eq!(agg.remaining, 0);
        assert_eq!(level.volume(), 39);
        // icebergs keep their queue slots while reserve remains
        assert_eq!(level.len(), 3);
        let i1 = store.expect(&OrderId::new("i1"));
        assert_eq!(i1.remaining, 0);
        assert_eq!(i1.iceberg_order.as_ref().unwrap().reserved_remaining, 13);
    }

    #[test]
    fn iceberg_remainder_goes_to_time_priority() {
        let mut store = OrderStore::new();
        let mut level = make_level(
            &mut store,
            vec![
                Order::dummy_limit("i1", "alice", Side::Sell, 100, 12).with_iceberg(5, 1),
                Order::dummy_limit("i2", "bob", Side::Sell, 100, 12).with_iceberg(5, 1),
            ],
        );
        // visible 10, reserves 7+7. Aggressive 13 leaves 3 extra: floor
        // shares are 1/1, the remainder lands on i1.
        let mut agg = Order::dummy_limit("b1", "carol", Side::Buy, 100, 13);
        let res = level.uncross(&mut agg, &mut store, true);
        assert_eq!(
            res.trades.iter().map(|t| t.size).collect::<Vec<_>>(),
            vec![7, 6]
        );
        assert_eq!(agg.remaining, 0);
    }

    #[test]
    fn fake_uncross_leaves_book_untouched() {
        let mut store = OrderStore::new();
        let level = make_level(
            &mut store,
            vec![Order::dummy_limit("s1", "alice", Side::Sell, 100, 5)],
        );
        let mut agg = Order::dummy_limit("b1", "carol", Side::Buy, 100, 3);

        let res = level.fake_uncross(&mut agg, &store, true);
        assert_eq!(res.trades.len(), 1);
        assert_eq!(res.trades[0].size, 3);
        assert_eq!(agg.remaining, 0);
        assert_eq!(level.volume(), 5);
        assert_eq!(store.expect(&OrderId::new("s1")).remaining, 5);
    }
}

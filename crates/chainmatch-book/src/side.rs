//! One side of the book: the ordered stack of price levels and the
//! sweeping logic an aggressor runs against them.
//!
//! Levels are stored with the best price at the tail of the vector, so
//! matching pops from the end and insertion keeps the vector sorted
//! (ascending price for buys, descending for sells).

use chainmatch_types::{
    MatchingError, Order, OrderId, OrderStatus, OrderType, Result, Side, TimeInForce, Trade,
};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::offbook::OffbookSource;
use crate::price_level::PriceLevel;
use crate::store::OrderStore;

/// Everything one sweep of a side produced. Trades and an error can
/// coexist when a wash trade aborts the sweep part way through.
#[derive(Debug, Default)]
pub struct SideUncross {
    pub trades: Vec<Trade>,
    /// Resting passives whose remaining changed, in fill order.
    pub affected: Vec<OrderId>,
    /// Orders synthesized by the off-book source and consumed as passives,
    /// with their post-fill remaining.
    pub offbook_orders: Vec<Order>,
    pub last_traded_price: Option<Decimal>,
    pub error: Option<MatchingError>,
}

#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: Vec<PriceLevel>,
}

impl BookSide {
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: Vec::new(),
        }
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Levels from worst to best. The best price sits at the tail.
    #[must_use]
    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    fn level_index(&self, price: Decimal) -> std::result::Result<usize, usize> {
        self.levels.binary_search_by(|level| match self.side {
            Side::Buy => level.price().cmp(&price),
            Side::Sell => price.cmp(&level.price()),
        })
    }

    /// Whether a level at `price` is reachable by the aggressor. The side
    /// being swept is the opposite of the aggressor's.
    fn crosses_at(&self, agg: &Order, price: Decimal) -> bool {
        if agg.order_type != OrderType::Limit {
            return true;
        }
        match self.side {
            Side::Sell => price <= agg.price,
            Side::Buy => price >= agg.price,
        }
    }

    // ========================================================================
    // Resting order maintenance
    // ========================================================================

    /// Rest an order on this side, creating its price level if needed.
    pub fn add_order(&mut self, store: &mut OrderStore, order: Order) {
        debug_assert_eq!(order.side, self.side);
        let idx = match self.level_index(order.price) {
            Ok(idx) => idx,
            Err(idx) => {
                self.levels.insert(idx, PriceLevel::new(order.price));
                idx
            }
        };
        self.levels[idx].add_order(&order);
        store.insert(order);
    }

    /// Remove a resting order, returning the stored copy. `order` must be
    /// the stored state (price and remaining as resting).
    pub fn remove_order(&mut self, store: &mut OrderStore, order: &Order) -> Result<Order> {
        let idx = self
            .level_index(order.price)
            .map_err(|_| MatchingError::OrderNotFound(order.id.clone()))?;
        if !self.levels[idx].remove_order(&order.id, order.true_remaining()) {
            return Err(MatchingError::OrderNotFound(order.id.clone()));
        }
        if self.levels[idx].is_empty() {
            self.levels.remove(idx);
        }
        store
            .remove(&order.id)
            .ok_or(MatchingError::OrderRemovalFailure)
    }

    /// Amend a resting order in place, keeping its queue position. Plain
    /// orders may only shrink; anything else is a cancel/replace at the
    /// book level. Icebergs may additionally grow their hidden reserve, as
    /// long as the visible peak does not grow. Returns the signed volume
    /// taken off the level (negative when the reserve grew).
    pub fn amend_order(&mut self, store: &mut OrderStore, amended: Order) -> Result<i64> {
        let idx = self
            .level_index(amended.price)
            .map_err(|_| MatchingError::OrderNotFound(amended.id.clone()))?;
        if !self.levels[idx].order_ids().contains(&amended.id) {
            return Err(MatchingError::OrderNotFound(amended.id.clone()));
        }
        let existing = store.expect_mut(&amended.id);
        if existing.party != amended.party {
            return Err(MatchingError::AmendFailure);
        }
        let old_true = existing.true_remaining();
        let new_true = amended.true_remaining();
        if amended.iceberg_order.is_some() && existing.iceberg_order.is_some() {
            if amended.remaining > existing.remaining {
                return Err(MatchingError::AmendFailure);
            }
        } else if amended.size > existing.size || new_true > old_true {
            return Err(MatchingError::AmendFailure);
        }
        *existing = amended;
        self.levels[idx].adjust_volume(old_true, new_true);
        if new_true > old_true {
            Ok(-i64::try_from(new_true - old_true).unwrap_or(i64::MAX))
        } else {
            Ok(i64::try_from(old_true - new_true).unwrap_or(i64::MAX))
        }
    }

    /// Replenish an iceberg's visible peak from its reserve and move it to
    /// the back of its level's queue.
    pub fn refresh_iceberg(&mut self, store: &mut OrderStore, id: &OrderId) {
        let price = store.expect(id).price;
        let Ok(idx) = self.level_index(price) else {
            return;
        };
        let true_remaining = store.expect(id).true_remaining();
        if !self.levels[idx].remove_order(id, true_remaining) {
            return;
        }
        let order = store.expect_mut(id);
        order.set_iceberg_peaks();
        order.status = OrderStatus::Active;
        let snapshot = order.clone();
        self.levels[idx].add_order(&snapshot);
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Sweep this side with an aggressor, mutating the book. Between the
    /// starting bound and each level about to trade, the off-book source is
    /// offered the price interval first; its generated orders fill ahead of
    /// the level. A final interval up to the aggressor's own limit is
    /// offered once the book is exhausted.
    pub fn uncross(
        &mut self,
        agg: &mut Order,
        check_wash: bool,
        bound: Option<Decimal>,
        store: &mut OrderStore,
        mut offbook: Option<&mut (dyn OffbookSource + '_)>,
    ) -> SideUncross {
        let mut out = SideUncross::default();
        let mut inner = bound;

        while agg.remaining > 0 && !self.levels.is_empty() {
            let idx = self.levels.len() - 1;
            let price = self.levels[idx].price();
            if !self.crosses_at(agg, price) {
                break;
            }

            if let Some(src) = offbook.as_deref_mut() {
                let generated = src.submit_order(agg, inner, Some(price));
                consume_generated(agg, generated, &mut out);
                inner = Some(price);
                if agg.remaining == 0 {
                    break;
                }
            }

            let res = self.levels[idx].uncross(agg, store, check_wash);
            if let Some(last) = res.trades.last() {
                out.last_traded_price = Some(last.price);
            }
            out.trades.extend(res.trades);
            out.affected.extend(res.affected);
            if self.levels[idx].is_empty() {
                self.levels.remove(idx);
            }
            if res.error.is_some() {
                out.error = res.error;
                return out;
            }
        }

        if agg.remaining > 0 && agg.price > Decimal::ZERO {
            if let Some(src) = offbook {
                let generated = src.submit_order(agg, inner, Some(agg.price));
                consume_generated(agg, generated, &mut out);
            }
        }
        out
    }

    /// The trades [`uncross`](Self::uncross) would produce, without
    /// mutating the book. The off-book source is still offered the same
    /// intervals so its answer matches the real pass.
    pub fn fake_uncross(
        &self,
        agg: &mut Order,
        check_wash: bool,
        bound: Option<Decimal>,
        store: &OrderStore,
        mut offbook: Option<&mut (dyn OffbookSource + '_)>,
    ) -> SideUncross {
        let mut out = SideUncross::default();
        let mut inner = bound;

        for level in self.levels.iter().rev() {
            if agg.remaining == 0 || !self.crosses_at(agg, level.price()) {
                break;
            }

            if let Some(src) = offbook.as_deref_mut() {
                let generated = src.submit_order(agg, inner, Some(level.price()));
                consume_generated(agg, generated, &mut out);
                inner = Some(level.price());
                if agg.remaining == 0 {
                    break;
                }
            }

            let res = level.fake_uncross(agg, store, check_wash);
            if let Some(last) = res.trades.last() {
                out.last_traded_price = Some(last.price);
            }
            out.trades.extend(res.trades);
            out.affected.extend(res.affected);
            if res.error.is_some() {
                out.error = res.error;
                return out;
            }
        }

        if agg.remaining > 0 && agg.price > Decimal::ZERO {
            if let Some(src) = offbook {
                let generated = src.submit_order(agg, inner, Some(agg.price));
                consume_generated(agg, generated, &mut out);
            }
        }
        out
    }

    /// Simulate an auction uncrossing: run each extracted order through a
    /// real sweep against scratch copies of this side and the store, so
    /// consumption carries across aggressors exactly as it would live.
    pub fn fake_uncross_auction(
        &self,
        orders: &[Order],
        bound: Option<Decimal>,
        store: &OrderStore,
        mut offbook: Option<&mut (dyn OffbookSource + '_)>,
    ) -> Result<Vec<Trade>> {
        let mut side = self.clone();
        let mut scratch = store.clone();
        let mut trades = Vec::new();
        for order in orders {
            let mut agg = order.clone();
            let res = side.uncross(&mut agg, false, bound, &mut scratch, offbook.as_deref_mut());
            if let Some(err) = res.error {
                return Err(err);
            }
            trades.extend(res.trades);
        }
        Ok(trades)
    }

    /// Pull up to `volume` out of the best levels, down to (and including)
    /// `price`. With `remove` set the extracted orders leave the book; a
    /// trailing partial split reduces the resting order instead. Panics if
    /// the crossed region holds less than asked, which means the caller's
    /// indicative volume went out of sync.
    pub fn extract_orders(
        &mut self,
        store: &mut OrderStore,
        price: Decimal,
        volume: u64,
        remove: bool,
    ) -> Vec<Order> {
        let mut extracted = Vec::new();
        let mut needed = volume;
        // levels already walked and kept; removal deletes emptied levels so
        // the tail advances by itself on that path
        let mut kept = 0usize;

        while needed > 0 {
            let Some(level_pos) = self.levels.len().checked_sub(1 + kept) else {
                break;
            };
            let level_price = self.levels[level_pos].price();
            let within = match self.side {
                Side::Buy => level_price >= price,
                Side::Sell => level_price <= price,
            };
            if !within {
                break;
            }
            for id in self.levels[level_pos].order_ids().to_vec() {
                if needed == 0 {
                    break;
                }
                let available = store.expect(&id).true_remaining();
                if needed >= available {
                    needed -= available;
                    if remove {
                        let order = store.expect(&id).clone();
                        match self.remove_order(store, &order) {
                            Ok(order) => extracted.push(order),
                            Err(_) => panic!("extracted order {id} vanished from the book"),
                        }
                    } else {
                        extracted.push(store.expect(&id).clone());
                    }
                } else {
                    let mut part = store.expect(&id).clone();
                    part.remaining = needed;
                    if let Some(ice) = part.iceberg_order.as_mut() {
                        ice.reserved_remaining = 0;
                    }
                    if remove {
                        let order = store.expect_mut(&id);
                        let mut take = needed;
                        let from_visible = take.min(order.remaining);
                        order.remaining -= from_visible;
                        take -= from_visible;
                        if let Some(ice) = order.iceberg_order.as_mut() {
                            ice.reserved_remaining -= take;
                        }
                        self.levels[level_pos].adjust_volume(available, available - needed);
                    }
                    extracted.push(part);
                    needed = 0;
                }
            }
            if !remove {
                kept += 1;
            }
        }

        assert!(
            needed == 0,
            "extraction of {volume} fell short by {needed} at bound {price}"
        );
        extracted
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn best_price_and_volume(&self) -> Result<(Decimal, u64)> {
        self.levels
            .last()
            .map(|l| (l.price(), l.volume()))
            .ok_or(match self.side {
                Side::Buy => MatchingError::NoBestBid,
                Side::Sell => MatchingError::NoBestAsk,
            })
    }

    /// Best price and volume counting only non-pegged orders.
    pub fn best_static_price_and_volume(&self, store: &OrderStore) -> Result<(Decimal, u64)> {
        for level in self.levels.iter().rev() {
            let volume: u64 = level
                .order_ids()
                .iter()
                .map(|id| store.expect(id))
                .filter(|o| o.pegged_order.is_none())
                .map(Order::true_remaining)
                .sum();
            if volume > 0 {
                return Ok((level.price(), volume));
            }
        }
        Err(match self.side {
            Side::Buy => MatchingError::NoBestBid,
            Side::Sell => MatchingError::NoBestAsk,
        })
    }

    /// Volume resting exactly at `price`.
    #[must_use]
    pub fn volume_at_price(&self, price: Decimal) -> u64 {
        self.level_index(price)
            .map(|idx| self.levels[idx].volume())
            .unwrap_or(0)
    }

    /// Volume at `price` or better.
    #[must_use]
    pub fn volume_at_or_better(&self, price: Decimal) -> u64 {
        self.levels
            .iter()
            .rev()
            .take_while(|l| match self.side {
                Side::Buy => l.price() >= price,
                Side::Sell => l.price() <= price,
            })
            .map(PriceLevel::volume)
            .sum()
    }

    /// Whether a persistent limit order rests strictly outside the crossed
    /// region, i.e. one that survives an uncrossing untouched. GFA orders
    /// do not count: they are cancelled on leaving the auction.
    #[must_use]
    pub fn has_persistent_outside(&self, bound: Decimal, store: &OrderStore) -> bool {
        // levels run worst to best, so the outside region is a prefix
        for level in &self.levels {
            let outside = match self.side {
                Side::Buy => level.price() < bound,
                Side::Sell => level.price() > bound,
            };
            if !outside {
                break;
            }
            for id in level.order_ids() {
                let order = store.expect(id);
                if order.order_type == OrderType::Limit
                    && order.time_in_force != TimeInForce::Gfa
                {
                    return true;
                }
            }
        }
        false
    }

    /// Whether this side still holds a persistent order once the crossed
    /// region has traded `uncross_volume`: walking from the best price to
    /// `bound`, some non-GFA order must sit past the traded volume.
    #[must_use]
    pub fn survives_uncross(
        &self,
        bound: Decimal,
        uncross_volume: u64,
        store: &OrderStore,
    ) -> bool {
        let mut vol = 0u64;
        for level in self.levels.iter().rev() {
            let within = match self.side {
                Side::Buy => level.price() >= bound,
                Side::Sell => level.price() <= bound,
            };
            if !within {
                break;
            }
            for id in level.order_ids() {
                let order = store.expect(id);
                vol += order.true_remaining();
                if vol > uncross_volume && order.time_in_force != TimeInForce::Gfa {
                    return true;
                }
            }
        }
        false
    }

    /// Sweep `volume` off the best levels and return the notional filled
    /// and how much was actually available.
    #[must_use]
    pub fn notional_consuming(&self, volume: u64) -> (Decimal, u64) {
        let mut needed = volume;
        let mut notional = Decimal::ZERO;
        for level in self.levels.iter().rev() {
            if needed == 0 {
                break;
            }
            let take = needed.min(level.volume());
            notional += level.price() * Decimal::from(take);
            needed -= take;
        }
        (notional, volume - needed)
    }

    /// Ids of resting orders with the given time in force, best level
    /// first.
    #[must_use]
    pub fn orders_with_tif(&self, tif: TimeInForce, store: &OrderStore) -> Vec<OrderId> {
        self.all_order_ids()
            .into_iter()
            .filter(|id| store.expect(id).time_in_force == tif)
            .collect()
    }

    /// All resting order ids in price then time priority.
    #[must_use]
    pub fn all_order_ids(&self) -> Vec<OrderId> {
        self.levels
            .iter()
            .rev()
            .flat_map(|l| l.order_ids().iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn order_count(&self) -> u64 {
        self.levels.iter().map(|l| l.len() as u64).sum()
    }

    #[must_use]
    pub fn total_volume(&self) -> u64 {
        self.levels.iter().map(PriceLevel::volume).sum()
    }

    /// Deterministic digest of the side's shape, level by level from the
    /// best price out.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"chainmatch:book_side:v1:");
        hasher.update(match self.side {
            Side::Buy => b"buy:".as_slice(),
            Side::Sell => b"sell:".as_slice(),
        });
        for level in self.levels.iter().rev() {
            hasher.update(level.price().normalize().to_string().as_bytes());
            hasher.update(level.volume().to_le_bytes());
        }
        hasher.finalize().into()
    }
}

/// Trade the aggressor against orders synthesized by the off-book source.
/// Each generated order fills at its own price and is handed back with its
/// remaining reduced by what it traded.
fn consume_generated(agg: &mut Order, generated: Vec<Order>, out: &mut SideUncross) {
    for mut passive in generated {
        let size = agg.remaining.min(passive.remaining);
        if size > 0 {
            let trade = Trade::between(agg, &passive, size);
            out.last_traded_price = Some(trade.price);
            out.trades.push(trade);
            agg.remaining -= size;
            passive.remaining -= size;
        }
        if passive.remaining == 0 {
            passive.status = OrderStatus::Filled;
        }
        out.offbook_orders.push(passive);
    }
}

//! The order book for a single market.
//!
//! All mutation funnels through here: submissions, cancels and amends,
//! auction entry and exit, and the queries the rest of the venue asks of
//! the matching core. The book owns the order arena, one [`BookSide`] per
//! direction, the auction's indicative view, and an optional off-book
//! liquidity source.

use std::collections::BTreeSet;

use chainmatch_types::{
    MarketId, MatchingConfig, MatchingError, Order, OrderCancellationConfirmation,
    OrderConfirmation, OrderId, OrderStatus, OrderType, PartyId, Result, Side, TimeInForce,
    Trade, TradeId,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::indicative::IndicativePriceAndVolume;
use crate::offbook::OffbookSource;
use crate::side::{BookSide, SideUncross};
use crate::store::OrderStore;

type PeggedNotify = Box<dyn Fn(i64) + Send>;

pub struct OrderBook {
    pub(crate) market: MarketId,
    pub(crate) buy: BookSide,
    pub(crate) sell: BookSide,
    pub(crate) store: OrderStore,
    pub(crate) last_traded_price: Option<Decimal>,
    pub(crate) latest_timestamp: i64,
    pub(crate) auction: bool,
    pub(crate) batch_id: u64,
    /// Sequence of fills within the current batch, feeding trade ids.
    pub(crate) fill_seq: u64,
    pub(crate) ipv: Option<IndicativePriceAndVolume>,
    pub(crate) pegged_orders: BTreeSet<OrderId>,
    pegged_count_notify: Option<PeggedNotify>,
    /// Hot-reloadable; held apart from the book state so a reload never
    /// contends with matching.
    config: Mutex<MatchingConfig>,
    pub(crate) offbook: Option<Box<dyn OffbookSource>>,
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("market", &self.market)
            .field("auction", &self.auction)
            .field("batch_id", &self.batch_id)
            .field("orders", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl OrderBook {
    #[must_use]
    pub fn new(market: MarketId, config: MatchingConfig, auction: bool) -> Self {
        let mut book = Self {
            market,
            buy: BookSide::new(Side::Buy),
            sell: BookSide::new(Side::Sell),
            store: OrderStore::new(),
            last_traded_price: None,
            latest_timestamp: 0,
            auction,
            batch_id: 0,
            fill_seq: 0,
            ipv: None,
            pegged_orders: BTreeSet::new(),
            pegged_count_notify: None,
            config: Mutex::new(config),
            offbook: None,
        };
        if auction {
            book.rebuild_ipv();
        }
        book
    }

    /// Attach the off-book liquidity source for this market.
    pub fn set_offbook_source(&mut self, source: Box<dyn OffbookSource>) {
        self.offbook = Some(source);
    }

    /// Sink receiving +1/-1 whenever a pegged order enters or leaves the
    /// book.
    pub fn set_pegged_count_notify(&mut self, notify: impl Fn(i64) + Send + 'static) {
        self.pegged_count_notify = Some(Box::new(notify));
    }

    /// Swap in a new configuration at runtime.
    pub fn reload_conf(&self, config: MatchingConfig) {
        *self.config.lock() = config;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn market(&self) -> &MarketId {
        &self.market
    }

    #[must_use]
    pub fn in_auction(&self) -> bool {
        self.auction
    }

    #[must_use]
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    #[must_use]
    pub fn last_traded_price(&self) -> Option<Decimal> {
        self.last_traded_price
    }

    #[must_use]
    pub fn get_total_number_of_orders(&self) -> u64 {
        self.store.len() as u64
    }

    #[must_use]
    pub fn get_order_book_level_count(&self) -> u64 {
        (self.buy.levels().len() + self.sell.levels().len()) as u64
    }

    #[must_use]
    pub fn get_total_volume(&self) -> u64 {
        self.buy.total_volume() + self.sell.total_volume()
    }

    pub fn get_order_by_id(&self, id: &OrderId) -> Result<Order> {
        self.store
            .get(id)
            .cloned()
            .ok_or_else(|| MatchingError::OrderNotFound(id.clone()))
    }

    /// A party's resting orders, ordered by id.
    #[must_use]
    pub fn get_orders_per_party(&self, party: &PartyId) -> Vec<Order> {
        self.store
            .party_order_ids(party)
            .iter()
            .map(|id| self.store.expect(id).clone())
            .collect()
    }

    /// Ids of pegged orders live on the book, in id order. A parked order
    /// reaching this set means parking failed to take it off the book.
    #[must_use]
    pub fn get_active_pegged_order_ids(&self) -> Vec<OrderId> {
        for id in &self.pegged_orders {
            let order = self.store.expect(id);
            assert!(
                order.status != OrderStatus::Parked,
                "parked order {id} still resting on the book"
            );
        }
        self.pegged_orders.iter().cloned().collect()
    }

    /// Deterministic digest over both sides.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.buy.hash());
        hasher.update(self.sell.hash());
        hasher.finalize().into()
    }

    /// [`hash`](Self::hash) as a hex string, for logs and replica
    /// comparison.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    // ========================================================================
    // Best prices
    // ========================================================================

    fn offbook_bests(&self) -> (Option<(Decimal, u64)>, Option<(Decimal, u64)>) {
        let Some(src) = self.offbook.as_deref() else {
            return (None, None);
        };
        let (bid, bid_vol, ask, ask_vol) = src.best_prices_and_volumes();
        // a zero volume side counts as absent
        let bid = bid.filter(|_| bid_vol > 0).map(|p| (p, bid_vol));
        let ask = ask.filter(|_| ask_vol > 0).map(|p| (p, ask_vol));
        (bid, ask)
    }

    fn merge_best(
        book: Result<(Decimal, u64)>,
        offbook: Option<(Decimal, u64)>,
        prefer_high: bool,
    ) -> Result<(Decimal, u64)> {
        match (book, offbook) {
            (Ok((bp, bv)), Some((op, ov))) => {
                if op == bp {
                    Ok((bp, bv + ov))
                } else if (op > bp) == prefer_high {
                    Ok((op, ov))
                } else {
                    Ok((bp, bv))
                }
            }
            (Ok(best), None) => Ok(best),
            (Err(_), Some(best)) => Ok(best),
            (Err(err), None) => Err(err),
        }
    }

    pub fn get_best_bid_price_and_volume(&self) -> Result<(Decimal, u64)> {
        let (ob_bid, _) = self.offbook_bests();
        Self::merge_best(self.buy.best_price_and_volume(), ob_bid, true)
    }

    pub fn get_best_ask_price_and_volume(&self) -> Result<(Decimal, u64)> {
        let (_, ob_ask) = self.offbook_bests();
        Self::merge_best(self.sell.best_price_and_volume(), ob_ask, false)
    }

    pub fn get_best_bid_price(&self) -> Result<Decimal> {
        self.get_best_bid_price_and_volume().map(|(p, _)| p)
    }

    pub fn get_best_ask_price(&self) -> Result<Decimal> {
        self.get_best_ask_price_and_volume().map(|(p, _)| p)
    }

    /// Best bid counting only non-pegged book orders, merged with off-book
    /// liquidity.
    pub fn get_best_static_bid_price_and_volume(&self) -> Result<(Decimal, u64)> {
        let (ob_bid, _) = self.offbook_bests();
        Self::merge_best(
            self.buy.best_static_price_and_volume(&self.store),
            ob_bid,
            true,
        )
    }

    pub fn get_best_static_ask_price_and_volume(&self) -> Result<(Decimal, u64)> {
        let (_, ob_ask) = self.offbook_bests();
        Self::merge_best(
            self.sell.best_static_price_and_volume(&self.store),
            ob_ask,
            false,
        )
    }

    /// A side whose entire top of book is pegged needs off-book volume
    /// behind it, otherwise repricing the pegs has nothing to anchor to.
    #[must_use]
    pub fn check_book(&self) -> bool {
        let (ob_bid, ob_ask) = self.offbook_bests();
        for (side, ob) in [(&self.buy, ob_bid), (&self.sell, ob_ask)] {
            let populated = side.best_price_and_volume().is_ok();
            let static_ok = side.best_static_price_and_volume(&self.store).is_ok();
            if populated && !static_ok && ob.is_none() {
                return false;
            }
        }
        true
    }

    /// Volume resting at `price` or better on one side.
    #[must_use]
    pub fn get_volume_at_price(&self, price: Decimal, side: Side) -> u64 {
        match side {
            Side::Buy => self.buy.volume_at_or_better(price),
            Side::Sell => self.sell.volume_at_or_better(price),
        }
    }

    /// Volume weighted average price over the best `volume` of one side.
    /// A zero volume asks for the best price.
    pub fn vwap(&self, volume: u64, side: Side) -> Result<Decimal> {
        let book_side = match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        };
        if volume == 0 {
            return book_side.best_price_and_volume().map(|(p, _)| p);
        }
        let (notional, filled) = book_side.notional_consuming(volume);
        if filled < volume {
            return Err(MatchingError::NotEnoughOrders);
        }
        Ok(notional / Decimal::from(volume))
    }

    /// The price a hypothetical order of `volume` on `side` would fill at.
    /// In auction that is the indicative uncross price.
    pub fn get_fill_price(&mut self, volume: u64, side: Side) -> Result<Decimal> {
        if volume == 0 {
            return Err(MatchingError::InvalidVolume);
        }
        if self.auction {
            let (price, tradable, _, _) = self.indicative_internal();
            if tradable == 0 {
                return Err(MatchingError::NotEnoughOrders);
            }
            return Ok(price);
        }
        let opposite = match side {
            Side::Buy => &self.sell,
            Side::Sell => &self.buy,
        };
        let (notional, filled) = opposite.notional_consuming(volume);
        if filled < volume {
            return Err(MatchingError::NotEnoughOrders);
        }
        Ok(notional / Decimal::from(volume))
    }

    /// Mark price for closing out a position of `volume` on `side`.
    pub fn get_closeout_price(&mut self, volume: u64, side: Side) -> Result<Decimal> {
        self.get_fill_price(volume, side)
    }

    // ========================================================================
    // Submission and matching
    // ========================================================================

    fn validate_order(&self, order: &Order) -> Result<()> {
        if order.market != self.market {
            return Err(MatchingError::InvalidMarketId);
        }
        if order.party.as_str().is_empty() {
            return Err(MatchingError::InvalidPartyId);
        }
        if order.size == 0 {
            return Err(MatchingError::InvalidSize);
        }
        if order.remaining == 0 || order.remaining > order.size {
            return Err(MatchingError::InvalidRemainingSize);
        }
        if order.order_type == OrderType::Market && !order.price.is_zero() {
            return Err(MatchingError::InvalidType);
        }
        // network orders close out positions and may never rest or partially
        // fill
        if order.order_type == OrderType::Network && order.time_in_force != TimeInForce::Fok {
            return Err(MatchingError::InvalidPersistence);
        }
        if order.order_type != OrderType::Limit
            && !matches!(order.time_in_force, TimeInForce::Ioc | TimeInForce::Fok)
        {
            return Err(MatchingError::InvalidPersistence);
        }
        if order.time_in_force == TimeInForce::Gtt && order.expires_at.is_none() {
            return Err(MatchingError::InvalidExpirationDatetime);
        }
        if let Some(expires_at) = order.expires_at {
            if !matches!(
                order.time_in_force,
                TimeInForce::Gtt | TimeInForce::Gfa | TimeInForce::Gfn
            ) || expires_at < order.created_at
            {
                return Err(MatchingError::InvalidExpirationDatetime);
            }
        }
        if let Some(ice) = &order.iceberg_order {
            if !order.is_persistent() {
                return Err(MatchingError::InvalidPersistence);
            }
            if ice.peak_size == 0
                || ice.minimum_visible_size == 0
                || ice.minimum_visible_size > ice.peak_size
                || ice.peak_size > order.size
            {
                return Err(MatchingError::InvalidSize);
            }
        }
        if self.auction {
            if order.time_in_force == TimeInForce::Gfn {
                return Err(MatchingError::GfnOrderDuringAuction);
            }
            if matches!(order.time_in_force, TimeInForce::Ioc | TimeInForce::Fok) {
                return Err(MatchingError::InvalidTimeInForce);
            }
        } else if order.time_in_force == TimeInForce::Gfa {
            return Err(MatchingError::GfaOrderDuringContinuousTrading);
        }
        Ok(())
    }

    fn notify_pegged(&self, delta: i64) {
        if let Some(notify) = &self.pegged_count_notify {
            notify(delta);
        }
    }

    fn add_to_book(&mut self, order: Order) {
        if order.pegged_order.is_some() && self.pegged_orders.insert(order.id.clone()) {
            self.notify_pegged(1);
        }
        if self.auction {
            if let Some(ipv) = &mut self.ipv {
                ipv.add_volume_at_price(order.price, order.true_remaining(), order.side, false);
            }
        }
        match order.side {
            Side::Buy => self.buy.add_order(&mut self.store, order),
            Side::Sell => self.sell.add_order(&mut self.store, order),
        }
    }

    fn remove_from_book(&mut self, id: &OrderId) -> Result<Order> {
        let order = self
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| MatchingError::OrderNotFound(id.clone()))?;
        let removed = match order.side {
            Side::Buy => self.buy.remove_order(&mut self.store, &order),
            Side::Sell => self.sell.remove_order(&mut self.store, &order),
        }?;
        if self.auction {
            if let Some(ipv) = &mut self.ipv {
                ipv.remove_volume_at_price(
                    removed.price,
                    removed.true_remaining(),
                    removed.side,
                    false,
                );
            }
        }
        if removed.pegged_order.is_some() && self.pegged_orders.remove(id) {
            self.notify_pegged(-1);
        }
        if self.config.lock().log_price_levels {
            debug!(
                order = %removed.id,
                buy_levels = self.buy.levels().len(),
                sell_levels = self.sell.levels().len(),
                "removed order from the book"
            );
        }
        Ok(removed)
    }

    /// Price just inside the aggressor's own side of the book, used as the
    /// inner edge of the first off-book interval in continuous trading.
    fn theoretical_best_trade_price(&self, agg: &Order) -> Option<Decimal> {
        let own = match agg.side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        };
        own.best_price_and_volume()
            .ok()
            .map(|(price, _)| match agg.side {
                Side::Buy => price + Decimal::ONE,
                Side::Sell => price - Decimal::ONE,
            })
    }

    /// Seal a sweep's trades with ids and a timestamp, replenish or retire
    /// the affected passives, and fold in any off-book fills. Returns the
    /// trades and the affected orders as the confirmation reports them.
    fn finalize_pass(
        &mut self,
        res: SideUncross,
        passive_side: Side,
        timestamp: i64,
        auction: bool,
    ) -> (Vec<Trade>, Vec<Order>) {
        let SideUncross {
            mut trades,
            affected,
            offbook_orders,
            last_traded_price,
            ..
        } = res;

        for trade in &mut trades {
            trade.id = Some(TradeId::deterministic(self.batch_id, self.fill_seq));
            self.fill_seq += 1;
            trade.timestamp = timestamp;
            if auction {
                trade.aggressor = None;
            }
        }
        if !auction {
            if let Some(price) = last_traded_price {
                self.last_traded_price = Some(price);
            }
        }

        let mut affected_orders = Vec::with_capacity(affected.len() + offbook_orders.len());
        for id in affected {
            if self.store.expect(&id).iceberg_needs_refresh() {
                match passive_side {
                    Side::Buy => self.buy.refresh_iceberg(&mut self.store, &id),
                    Side::Sell => self.sell.refresh_iceberg(&mut self.store, &id),
                }
            }
            let order = self.store.expect(&id).clone();
            if order.true_remaining() == 0 {
                let Some(mut removed) = self.store.remove(&id) else {
                    continue;
                };
                removed.status = OrderStatus::Filled;
                if removed.pegged_order.is_some() && self.pegged_orders.remove(&id) {
                    self.notify_pegged(-1);
                }
                affected_orders.push(removed);
            } else {
                affected_orders.push(order);
            }
        }
        for mut generated in offbook_orders {
            if auction {
                generated.created_at = timestamp;
            }
            generated.batch_id = self.batch_id;
            affected_orders.push(generated);
        }
        (trades, affected_orders)
    }

    /// Submit an order for matching. In continuous trading it uncrosses
    /// immediately against the opposite side and any off-book liquidity;
    /// in auction it rests on the book and feeds the indicative view.
    pub fn submit_order(&mut self, mut order: Order) -> Result<OrderConfirmation> {
        self.validate_order(&order)?;
        assert!(
            !self.store.contains(&order.id),
            "duplicate submission of order id {}",
            order.id
        );
        self.latest_timestamp = self.latest_timestamp.max(order.created_at);

        if self.auction {
            order.batch_id = self.batch_id;
            order.set_iceberg_peaks();
            self.add_to_book(order.clone());
            debug!(order = %order.id, "order rested during auction");
            return Ok(OrderConfirmation {
                order,
                trades: Vec::new(),
                passive_orders_affected: Vec::new(),
            });
        }

        let bound = self.theoretical_best_trade_price(&order);

        if order.time_in_force == TimeInForce::Fok {
            let mut probe = order.clone();
            let probe_res = match order.side {
                Side::Buy => self.sell.fake_uncross(
                    &mut probe,
                    true,
                    bound,
                    &self.store,
                    self.offbook.as_deref_mut(),
                ),
                Side::Sell => self.buy.fake_uncross(
                    &mut probe,
                    true,
                    bound,
                    &self.store,
                    self.offbook.as_deref_mut(),
                ),
            };
            if let Some(src) = self.offbook.as_deref_mut() {
                src.notify_finished();
            }
            if probe_res.error.is_some() {
                order.status = OrderStatus::Stopped;
                order.reason = Some(MatchingError::WashTrade);
                return Ok(OrderConfirmation {
                    order,
                    trades: Vec::new(),
                    passive_orders_affected: Vec::new(),
                });
            }
            if probe.remaining > 0 {
                order.status = OrderStatus::Stopped;
                return Ok(OrderConfirmation {
                    order,
                    trades: Vec::new(),
                    passive_orders_affected: Vec::new(),
                });
            }
        }

        let res = match order.side {
            Side::Buy => self.sell.uncross(
                &mut order,
                true,
                bound,
                &mut self.store,
                self.offbook.as_deref_mut(),
            ),
            Side::Sell => self.buy.uncross(
                &mut order,
                true,
                bound,
                &mut self.store,
                self.offbook.as_deref_mut(),
            ),
        };
        if let Some(src) = self.offbook.as_deref_mut() {
            src.notify_finished();
        }

        if order.order_type == OrderType::Network {
            let notional: Decimal = res
                .trades
                .iter()
                .map(|t| t.price * Decimal::from(t.size))
                .sum();
            order.price = (notional / Decimal::from(order.size)).floor();
        }

        let washed = res.error == Some(MatchingError::WashTrade);
        let (trades, affected) =
            self.finalize_pass(res, order.side.opposite(), self.latest_timestamp, false);

        if washed {
            order.status = if order.remaining == order.size {
                OrderStatus::Stopped
            } else {
                OrderStatus::PartiallyFilled
            };
            order.reason = Some(MatchingError::WashTrade);
        } else if order.remaining == 0 {
            order.status = OrderStatus::Filled;
        } else if order.time_in_force == TimeInForce::Ioc {
            order.status = if order.remaining == order.size {
                OrderStatus::Stopped
            } else {
                OrderStatus::PartiallyFilled
            };
        } else if order.is_persistent() {
            order.batch_id = self.batch_id;
            order.set_iceberg_peaks();
            self.add_to_book(order.clone());
        } else {
            order.status = OrderStatus::Stopped;
        }

        debug!(
            order = %order.id,
            trades = trades.len(),
            status = %order.status,
            "order submitted"
        );
        Ok(OrderConfirmation {
            order,
            trades,
            passive_orders_affected: affected,
        })
    }

    /// The trades a submission would produce right now, without touching
    /// the book. A wash trade cuts the simulation short but is not an
    /// error here.
    pub fn get_trades(&mut self, order: &Order) -> Result<Vec<Trade>> {
        self.validate_order(order)?;
        let mut probe = order.clone();
        let bound = self.theoretical_best_trade_price(&probe);
        let res = match probe.side {
            Side::Buy => self.sell.fake_uncross(
                &mut probe,
                true,
                bound,
                &self.store,
                self.offbook.as_deref_mut(),
            ),
            Side::Sell => self.buy.fake_uncross(
                &mut probe,
                true,
                bound,
                &self.store,
                self.offbook.as_deref_mut(),
            ),
        };
        if let Some(src) = self.offbook.as_deref_mut() {
            src.notify_finished();
        }
        Ok(res.trades)
    }

    // ========================================================================
    // Cancel, amend, replace
    // ========================================================================

    /// Cancel a resting order. The order must belong to this market;
    /// routing it here otherwise is a venue bug.
    pub fn cancel_order(&mut self, order: &Order) -> Result<OrderCancellationConfirmation> {
        assert!(
            order.market == self.market,
            "order {} for market {} routed to book {}",
            order.id,
            order.market,
            self.market
        );
        let mut removed = self.remove_from_book(&order.id)?;
        removed.status = OrderStatus::Cancelled;
        Ok(OrderCancellationConfirmation { order: removed })
    }

    /// Cancel every resting order of one party, in id order.
    pub fn cancel_all_orders(&mut self, party: &PartyId) -> Result<Vec<OrderCancellationConfirmation>> {
        let mut confirmations = Vec::new();
        for id in self.store.party_order_ids(party) {
            let mut removed = self.remove_from_book(&id)?;
            removed.status = OrderStatus::Cancelled;
            confirmations.push(OrderCancellationConfirmation { order: removed });
        }
        Ok(confirmations)
    }

    /// Take an order off the book as parked, keeping it resurrectable.
    pub fn remove_order(&mut self, id: &OrderId) -> Result<Order> {
        let mut removed = self.remove_from_book(id)?;
        removed.status = OrderStatus::Parked;
        Ok(removed)
    }

    /// Take an order off the book without a status transition.
    pub fn delete_order(&mut self, id: &OrderId) -> Result<Order> {
        self.remove_from_book(id)
    }

    /// Amend an order in place. Only reductions keep queue position; the
    /// amended order must match the creation time of the resting one.
    pub fn amend_order(&mut self, amended: Order) -> Result<()> {
        let existing = self
            .store
            .get(&amended.id)
            .ok_or_else(|| MatchingError::OrderNotFound(amended.id.clone()))?;
        if existing.created_at != amended.created_at {
            return Err(MatchingError::OutOfSequence);
        }
        self.validate_order(&amended)?;
        let price = amended.price;
        let side = amended.side;
        let delta = match side {
            Side::Buy => self.buy.amend_order(&mut self.store, amended),
            Side::Sell => self.sell.amend_order(&mut self.store, amended),
        }?;
        if self.auction && delta != 0 {
            if let Some(ipv) = &mut self.ipv {
                if delta > 0 {
                    ipv.remove_volume_at_price(price, delta.unsigned_abs(), side, false);
                } else {
                    ipv.add_volume_at_price(price, delta.unsigned_abs(), side, false);
                }
            }
        }
        Ok(())
    }

    /// Cancel one order and submit another atomically from the caller's
    /// point of view.
    pub fn replace_order(&mut self, existing: &Order, new_order: Order) -> Result<OrderConfirmation> {
        self.cancel_order(existing)?;
        self.submit_order(new_order)
    }

    /// Re-add a previously parked pegged order. Repricing happens before
    /// this call, so a crossing resubmission means the repricer is broken.
    pub fn resubmit_special_order(&mut self, mut order: Order) {
        assert!(
            order.pegged_order.is_some(),
            "resubmission is only for pegged orders, got {}",
            order.id
        );
        let crossing = match order.side {
            Side::Buy => self
                .get_best_ask_price()
                .is_ok_and(|ask| order.price >= ask),
            Side::Sell => self
                .get_best_bid_price()
                .is_ok_and(|bid| order.price <= bid),
        };
        assert!(
            self.auction || !crossing,
            "resubmitted pegged order {} would cross the book",
            order.id
        );
        order.status = OrderStatus::Active;
        self.add_to_book(order);
    }

    /// Stop and remove every order of the given distressed parties.
    pub fn remove_distressed_orders(&mut self, parties: &[PartyId]) -> Result<Vec<Order>> {
        let mut removed = Vec::new();
        for party in parties {
            for id in self.store.party_order_ids(party) {
                let mut order = self.remove_from_book(&id)?;
                order.status = OrderStatus::Stopped;
                removed.push(order);
            }
        }
        Ok(removed)
    }

    /// Sweep expired orders out of the book, in id order.
    pub fn remove_expired_orders(&mut self, now: i64) -> Vec<Order> {
        let mut expired = Vec::new();
        for id in self.store.sorted_ids() {
            let order = self.store.expect(&id);
            if order.is_expirable() && order.expires_at.is_some_and(|at| at <= now) {
                if let Ok(mut removed) = self.remove_from_book(&id) {
                    removed.status = OrderStatus::Expired;
                    expired.push(removed);
                }
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired orders removed");
        }
        expired
    }

    /// Wind the market down: every order is stopped and returned in id
    /// order, and the book is left empty.
    pub fn settled(&mut self) -> Vec<Order> {
        let mut stopped = Vec::new();
        for id in self.store.sorted_ids() {
            if let Some(mut order) = self.store.remove(&id) {
                order.status = OrderStatus::Stopped;
                if order.pegged_order.is_some() && self.pegged_orders.remove(&id) {
                    self.notify_pegged(-1);
                }
                stopped.push(order);
            }
        }
        self.buy = BookSide::new(Side::Buy);
        self.sell = BookSide::new(Side::Sell);
        self.ipv = None;
        self.last_traded_price = None;
        info!(market = %self.market, orders = stopped.len(), "market settled");
        stopped
    }

    /// Rescale every resting price from its original precision. Used when
    /// the market's price factor changes.
    pub fn apply_price_factor(&mut self, factor: Decimal) {
        let ids: Vec<OrderId> = self
            .buy
            .all_order_ids()
            .into_iter()
            .chain(self.sell.all_order_ids())
            .collect();
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(mut order) = self.store.remove(&id) {
                if let Some(original) = order.original_price {
                    order.price = (original * factor).floor();
                }
                orders.push(order);
            }
        }
        self.buy = BookSide::new(Side::Buy);
        self.sell = BookSide::new(Side::Sell);
        for order in orders {
            match order.side {
                Side::Buy => self.buy.add_order(&mut self.store, order),
                Side::Sell => self.sell.add_order(&mut self.store, order),
            }
        }
        if self.auction {
            self.rebuild_ipv();
        }
    }

    // ========================================================================
    // Auctions
    // ========================================================================

    pub(crate) fn rebuild_ipv(&mut self) {
        let best_bid = self.get_best_bid_price().ok();
        let best_ask = self.get_best_ask_price().ok();
        self.ipv = Some(IndicativePriceAndVolume::new(
            &self.buy,
            &self.sell,
            best_bid,
            best_ask,
            self.offbook.as_deref(),
        ));
    }

    /// Move the market into auction mode. Good-for-normal orders cannot
    /// live through an auction and come back cancelled.
    pub fn enter_auction(&mut self) -> Vec<Order> {
        let mut cancelled = Vec::new();
        let gfn: Vec<OrderId> = self
            .buy
            .orders_with_tif(TimeInForce::Gfn, &self.store)
            .into_iter()
            .chain(self.sell.orders_with_tif(TimeInForce::Gfn, &self.store))
            .collect();
        for id in gfn {
            if let Ok(mut order) = self.remove_from_book(&id) {
                order.status = OrderStatus::Cancelled;
                cancelled.push(order);
            }
        }
        self.auction = true;
        self.rebuild_ipv();
        info!(market = %self.market, cancelled = cancelled.len(), "entered auction");
        cancelled
    }

    /// Uncross and leave auction mode. Returns the uncrossing
    /// confirmations and the cancelled good-for-auction orders.
    pub fn leave_auction(
        &mut self,
        timestamp: i64,
    ) -> Result<(Vec<OrderConfirmation>, Vec<Order>)> {
        if !self.auction {
            return Err(MatchingError::Internal(
                "leave_auction called outside an auction".into(),
            ));
        }
        self.batch_id += 1;
        self.fill_seq = 0;
        self.latest_timestamp = self.latest_timestamp.max(timestamp);

        let confirmations = self.uncross_book(timestamp)?;

        let mut cancelled = Vec::new();
        let gfa: Vec<OrderId> = self
            .buy
            .orders_with_tif(TimeInForce::Gfa, &self.store)
            .into_iter()
            .chain(self.sell.orders_with_tif(TimeInForce::Gfa, &self.store))
            .collect();
        for id in gfa {
            if let Ok(mut order) = self.remove_from_book(&id) {
                order.status = OrderStatus::Cancelled;
                cancelled.push(order);
            }
        }

        self.auction = false;
        self.ipv = None;
        if let Some(src) = self.offbook.as_deref_mut() {
            src.notify_finished();
        }
        info!(
            market = %self.market,
            uncrossed = confirmations.len(),
            cancelled = cancelled.len(),
            "left auction"
        );
        Ok((confirmations, cancelled))
    }

    pub fn can_leave_auction(&mut self) -> bool {
        self.can_uncross_inner(false)
    }

    /// Whether both sides would still quote once the auction ends.
    pub fn bid_and_ask_present_after_auction(&mut self) -> bool {
        self.can_uncross_inner(false)
    }

    /// Whether uncrossing now both trades and leaves limit orders resting
    /// on both sides afterwards. False means the auction should be
    /// extended.
    pub fn can_uncross(&mut self) -> bool {
        self.can_uncross_inner(true)
    }

    fn can_uncross_inner(&mut self, require_trades: bool) -> bool {
        if !self.auction {
            return false;
        }
        let (Ok(bid), Ok(ask)) = (self.get_best_bid_price(), self.get_best_ask_price()) else {
            return false;
        };
        if bid.is_zero() || ask.is_zero() || (require_trades && bid < ask) {
            return false;
        }
        // a persistent limit order strictly outside the crossed region
        // survives the uncross untouched; one on each side settles it
        let buy_match = self.buy.has_persistent_outside(ask, &self.store);
        let sell_match = self.sell.has_persistent_outside(bid, &self.store);
        if buy_match && sell_match {
            return true;
        }
        // a side without one must hold more crossed volume than the
        // uncross consumes
        let (_, volume, _, _) = self.indicative_internal();
        (buy_match || self.buy.survives_uncross(ask, volume, &self.store))
            && (sell_match || self.sell.survives_uncross(bid, volume, &self.store))
    }

    /// Indicative uncross price, volume, and the side the uncross volume
    /// would be taken from.
    pub fn get_indicative_price_and_volume(&mut self) -> (Decimal, u64, Option<Side>) {
        let (price, volume, side, _) = self.indicative_internal();
        (price, volume, side)
    }

    fn indicative_internal(&mut self) -> (Decimal, u64, Option<Side>, u64) {
        let empty = (Decimal::ZERO, 0, None, 0);
        if self.ipv.is_none() {
            return empty;
        }
        let (Ok(bid), Ok(ask)) = (self.get_best_bid_price(), self.get_best_ask_price()) else {
            return empty;
        };
        if ask > bid {
            return empty;
        }
        let Some(ipv) = self.ipv.as_mut() else {
            return empty;
        };
        let (rows, max_tradable) =
            ipv.get_cumulative_price_levels(bid, ask, self.offbook.as_deref());
        if max_tradable == 0 {
            return empty;
        }

        let mut min_price: Option<Decimal> = None;
        let mut max_price: Option<Decimal> = None;
        for row in &rows {
            if row.max_tradable_amount == max_tradable {
                min_price = Some(min_price.map_or(row.price, |p| p.min(row.price)));
                max_price = Some(max_price.map_or(row.price, |p| p.max(row.price)));
            }
        }
        let (Some(min_price), Some(max_price)) = (min_price, max_price) else {
            return empty;
        };
        let price = ((min_price + max_price) / Decimal::TWO).floor();

        // which side supplies the uncross volume: if the bid volume from
        // the top down lands exactly on the tradable amount we sweep with
        // the buys, otherwise with the sells
        let mut side = Side::Buy;
        let mut rem = i128::from(max_tradable);
        for row in &rows {
            rem -= i128::from(row.bid_volume);
            if rem == 0 {
                break;
            }
            if rem < 0 {
                side = Side::Sell;
                break;
            }
        }

        let offbook_volume = match side {
            Side::Buy => rows
                .iter()
                .filter(|r| r.price >= price)
                .map(|r| r.bid_offbook_volume)
                .sum::<u64>(),
            Side::Sell => rows
                .iter()
                .filter(|r| r.price <= price)
                .map(|r| r.ask_offbook_volume)
                .sum::<u64>(),
        }
        .min(max_tradable);

        (price, max_tradable, Some(side), offbook_volume)
    }

    /// The trades leaving auction now would produce, ids unassigned.
    pub fn get_indicative_trades(&mut self) -> Result<Vec<Trade>> {
        let (price, volume, side, offbook_volume) = self.indicative_internal();
        let Some(side) = side else {
            return Ok(Vec::new());
        };
        if volume == 0 {
            return Ok(Vec::new());
        }

        let mut orders = Vec::new();
        if offbook_volume > 0 {
            if let Some(ipv) = &self.ipv {
                orders.extend(ipv.extract_offbook_orders(price, side, offbook_volume));
            }
        }
        let book_volume = volume - offbook_volume;
        if book_volume > 0 {
            let extracted = match side {
                Side::Buy => self
                    .buy
                    .extract_orders(&mut self.store, price, book_volume, false),
                Side::Sell => self
                    .sell
                    .extract_orders(&mut self.store, price, book_volume, false),
            };
            orders.extend(extracted);
        }
        for order in &mut orders {
            if let Some(ice) = order.iceberg_order.as_mut() {
                order.remaining += ice.reserved_remaining;
                ice.reserved_remaining = 0;
            }
        }

        let bound = self.uncross_bound(&orders, side);
        let mut trades = match side {
            Side::Buy => self.sell.fake_uncross_auction(
                &orders,
                bound,
                &self.store,
                self.offbook.as_deref_mut(),
            ),
            Side::Sell => self.buy.fake_uncross_auction(
                &orders,
                bound,
                &self.store,
                self.offbook.as_deref_mut(),
            ),
        }?;
        if let Some(src) = self.offbook.as_deref_mut() {
            src.notify_finished();
        }
        for trade in &mut trades {
            trade.price = price;
            trade.aggressor = None;
        }
        Ok(trades)
    }

    /// Outer edge for the off-book sweep when uncrossing an auction: one
    /// tick beyond the crossed region on the sweeping side. The tick comes
    /// from the price factor of the first extracted order; an unknown
    /// factor falls back to one market unit.
    fn uncross_bound(&self, orders: &[Order], side: Side) -> Option<Decimal> {
        let tick = orders
            .iter()
            .find_map(|o| {
                o.original_price.and_then(|original| {
                    if original > Decimal::ZERO {
                        Some((o.price / original).floor().max(Decimal::ONE))
                    } else {
                        None
                    }
                })
            })
            .unwrap_or(Decimal::ONE);
        self.ipv
            .as_ref()
            .and_then(IndicativePriceAndVolume::get_crossed_region)
            .map(|(min, max)| match side {
                Side::Buy => min - tick,
                Side::Sell => max + tick,
            })
    }

    fn uncross_book(&mut self, timestamp: i64) -> Result<Vec<OrderConfirmation>> {
        let (price, volume, side, offbook_volume) = self.indicative_internal();
        let Some(side) = side else {
            return Ok(Vec::new());
        };
        if volume == 0 {
            return Ok(Vec::new());
        }
        debug!(%price, volume, ?side, offbook_volume, "uncrossing auction");

        let mut uncross_orders = Vec::new();
        if offbook_volume > 0 {
            if let Some(ipv) = &self.ipv {
                uncross_orders.extend(ipv.extract_offbook_orders(price, side, offbook_volume));
            }
        }
        let book_volume = volume - offbook_volume;
        if book_volume > 0 {
            let extracted = match side {
                Side::Buy => self
                    .buy
                    .extract_orders(&mut self.store, price, book_volume, true),
                Side::Sell => self
                    .sell
                    .extract_orders(&mut self.store, price, book_volume, true),
            };
            for order in &extracted {
                if order.pegged_order.is_some() && self.pegged_orders.remove(&order.id) {
                    self.notify_pegged(-1);
                }
            }
            uncross_orders.extend(extracted);
        }

        let bound = self.uncross_bound(&uncross_orders, side);
        for order in &mut uncross_orders {
            if let Some(ice) = order.iceberg_order.as_mut() {
                order.remaining += ice.reserved_remaining;
                ice.reserved_remaining = 0;
            }
        }

        let mut confirmations = Vec::with_capacity(uncross_orders.len());
        let mut traded = false;
        for mut order in uncross_orders {
            let mut res = match side {
                Side::Buy => self.sell.uncross(
                    &mut order,
                    false,
                    bound,
                    &mut self.store,
                    self.offbook.as_deref_mut(),
                ),
                Side::Sell => self.buy.uncross(
                    &mut order,
                    false,
                    bound,
                    &mut self.store,
                    self.offbook.as_deref_mut(),
                ),
            };
            if let Some(err) = res.error {
                return Err(err);
            }
            for trade in &mut res.trades {
                trade.price = price;
            }
            traded = traded || !res.trades.is_empty();
            let (trades, affected) =
                self.finalize_pass(res, side.opposite(), timestamp, true);
            if order.remaining == 0 {
                order.status = OrderStatus::Filled;
            } else {
                warn!(order = %order.id, remaining = order.remaining, "uncross left volume unfilled");
            }
            if order.generated_offbook {
                order.created_at = timestamp;
            }
            confirmations.push(OrderConfirmation {
                order,
                trades,
                passive_orders_affected: affected,
            });
        }
        if traded {
            self.last_traded_price = Some(price);
        }
        Ok(confirmations)
    }

    /// One party's off-book liquidity changed; refresh its slice of the
    /// indicative view.
    pub fn update_amm(&mut self, party: &PartyId) {
        if let (Some(ipv), Some(src)) = (&mut self.ipv, self.offbook.as_deref()) {
            ipv.update_party_shape(src, party);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_book() -> OrderBook {
        OrderBook::new(MarketId::new("market-1"), MatchingConfig::default(), false)
    }

    fn submit(book: &mut OrderBook, order: Order) -> OrderConfirmation {
        book.submit_order(order).unwrap()
    }

    #[test]
    fn ioc_partially_fills_resting_order() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("s1", "alice", Side::Sell, 100, 100),
        );
        let conf = submit(
            &mut book,
            Order::dummy_limit("b1", "bob", Side::Buy, 100, 10).with_tif(TimeInForce::Ioc),
        );
        assert_eq!(conf.trades.len(), 1);
        assert_eq!(conf.trades[0].size, 10);
        assert_eq!(conf.order.status, OrderStatus::Filled);
        assert_eq!(conf.passive_orders_affected[0].remaining, 90);
        assert_eq!(book.get_order_by_id(&OrderId::new("s1")).unwrap().remaining, 90);
        assert_eq!(book.last_traded_price(), Some(Decimal::from(100u64)));
    }

    #[test]
    fn unfilled_ioc_is_stopped() {
        let mut book = make_book();
        let conf = submit(
            &mut book,
            Order::dummy_limit("b1", "bob", Side::Buy, 100, 10).with_tif(TimeInForce::Ioc),
        );
        assert!(conf.trades.is_empty());
        assert_eq!(conf.order.status, OrderStatus::Stopped);
        assert_eq!(book.get_total_number_of_orders(), 0);
    }

    #[test]
    fn fok_is_all_or_nothing() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("s1", "alice", Side::Sell, 100, 5),
        );
        let conf = submit(
            &mut book,
            Order::dummy_limit("b1", "bob", Side::Buy, 100, 10).with_tif(TimeInForce::Fok),
        );
        assert!(conf.trades.is_empty());
        assert_eq!(conf.order.status, OrderStatus::Stopped);
        // resting order untouched by the probe
        assert_eq!(book.get_order_by_id(&OrderId::new("s1")).unwrap().remaining, 5);

        let conf = submit(
            &mut book,
            Order::dummy_limit("b2", "bob", Side::Buy, 100, 5).with_tif(TimeInForce::Fok),
        );
        assert_eq!(conf.trades.len(), 1);
        assert_eq!(conf.order.status, OrderStatus::Filled);
    }

    #[test]
    fn wash_trade_stops_the_aggressor() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("s1", "alice", Side::Sell, 100, 5),
        );
        let conf = submit(
            &mut book,
            Order::dummy_limit("b1", "alice", Side::Buy, 100, 5),
        );
        assert!(conf.trades.is_empty());
        assert_eq!(conf.order.status, OrderStatus::Stopped);
        assert_eq!(conf.order.reason, Some(MatchingError::WashTrade));
    }

    #[test]
    fn persistent_remainder_rests() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("s1", "alice", Side::Sell, 100, 4),
        );
        let conf = submit(
            &mut book,
            Order::dummy_limit("b1", "bob", Side::Buy, 100, 10),
        );
        assert_eq!(conf.trades.len(), 1);
        assert_eq!(conf.order.status, OrderStatus::Active);
        assert_eq!(conf.order.remaining, 6);
        assert_eq!(
            book.get_best_bid_price_and_volume().unwrap(),
            (Decimal::from(100u64), 6)
        );
    }

    #[test]
    #[should_panic(expected = "duplicate submission")]
    fn duplicate_id_panics() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("o1", "alice", Side::Buy, 100, 5),
        );
        let _ = book.submit_order(Order::dummy_limit("o1", "bob", Side::Buy, 100, 5));
    }

    #[test]
    fn validation_rejects_bad_orders() {
        let mut book = make_book();
        let mut wrong_market = Order::dummy_limit("o1", "alice", Side::Buy, 100, 5);
        wrong_market.market = MarketId::new("other");
        assert_eq!(
            book.submit_order(wrong_market),
            Err(MatchingError::InvalidMarketId)
        );

        let mut zero_size = Order::dummy_limit("o2", "alice", Side::Buy, 100, 5);
        zero_size.size = 0;
        assert_eq!(book.submit_order(zero_size), Err(MatchingError::InvalidSize));

        let gtt_no_expiry =
            Order::dummy_limit("o3", "alice", Side::Buy, 100, 5).with_tif(TimeInForce::Gtt);
        assert_eq!(
            book.submit_order(gtt_no_expiry),
            Err(MatchingError::InvalidExpirationDatetime)
        );

        let gfa = Order::dummy_limit("o4", "alice", Side::Buy, 100, 5).with_tif(TimeInForce::Gfa);
        assert_eq!(
            book.submit_order(gfa),
            Err(MatchingError::GfaOrderDuringContinuousTrading)
        );

        let mut network_ioc = Order::dummy_market("o5", "network", Side::Buy, 5);
        network_ioc.order_type = OrderType::Network;
        network_ioc.time_in_force = TimeInForce::Ioc;
        assert_eq!(
            book.submit_order(network_ioc),
            Err(MatchingError::InvalidPersistence)
        );
    }

    #[test]
    fn amend_reduces_level_volume() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("b1", "alice", Side::Buy, 100, 2),
        );
        let mut amended = Order::dummy_limit("b1", "alice", Side::Buy, 100, 1);
        amended.version = 2;
        book.amend_order(amended).unwrap();
        assert_eq!(
            book.get_best_bid_price_and_volume().unwrap(),
            (Decimal::from(100u64), 1)
        );
    }

    #[test]
    fn amend_out_of_sequence() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("b1", "alice", Side::Buy, 100, 2),
        );
        let mut amended = Order::dummy_limit("b1", "alice", Side::Buy, 100, 1);
        amended.created_at = 99;
        assert_eq!(book.amend_order(amended), Err(MatchingError::OutOfSequence));
    }

    #[test]
    fn cancel_returns_cancelled_order() {
        let mut book = make_book();
        submit(
            &mut book,
            Order::dummy_limit("b1", "alice", Side::Buy, 100, 2),
        );
        let resting = book.get_order_by_id(&OrderId::new("b1")).unwrap();
        let conf = book.cancel_order(&resting).unwrap();
        assert_eq!(conf.order.status, OrderStatus::Cancelled);
        assert_eq!(book.get_total_number_of_orders(), 0);
        assert!(matches!(
            book.cancel_order(&resting),
            Err(MatchingError::OrderNotFound(_))
        ));
    }

    #[test]
    fn trade_ids_are_deterministic_per_batch() {
        let mut trades_a = {
            let mut book = make_book();
            submit(&mut book, Order::dummy_limit("s1", "alice", Side::Sell, 100, 5));
            submit(&mut book, Order::dummy_limit("b1", "bob", Side::Buy, 100, 5)).trades
        };
        let trades_b = {
            let mut book = make_book();
            submit(&mut book, Order::dummy_limit("s1", "alice", Side::Sell, 100, 5));
            submit(&mut book, Order::dummy_limit("b1", "bob", Side::Buy, 100, 5)).trades
        };
        assert_eq!(trades_a.len(), 1);
        assert_eq!(trades_a[0].id, trades_b[0].id);
        assert!(trades_a.pop().unwrap().id.is_some());
    }

    #[test]
    fn hash_tracks_book_shape() {
        let mut book = make_book();
        let empty = book.hash();
        submit(
            &mut book,
            Order::dummy_limit("b1", "alice", Side::Buy, 100, 2),
        );
        let one_order = book.hash();
        assert_ne!(empty, one_order);

        let mut other = make_book();
        submit(
            &mut other,
            Order::dummy_limit("b9", "zoe", Side::Buy, 100, 2),
        );
        // shape is what counts, not order identity
        assert_eq!(one_order, other.hash());
    }

    #[test]
    fn pegged_count_notifications() {
        use std::sync::atomic::{AtomicI64, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicI64::new(0));
        let mut book = make_book();
        let sink = Arc::clone(&count);
        book.set_pegged_count_notify(move |delta| {
            sink.fetch_add(delta, Ordering::Relaxed);
        });

        let mut pegged = Order::dummy_limit("p1", "alice", Side::Buy, 100, 2);
        pegged.pegged_order = Some(chainmatch_types::PeggedOrder {
            reference: chainmatch_types::PeggedReference::BestBid,
            offset: Decimal::ONE,
        });
        submit(&mut book, pegged);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(book.get_active_pegged_order_ids().len(), 1);

        book.remove_order(&OrderId::new("p1")).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 0);
        assert!(book.get_active_pegged_order_ids().is_empty());
    }

    #[test]
    fn expiry_sweep() {
        let mut book = make_book();
        let mut gtt = Order::dummy_limit("g1", "alice", Side::Buy, 100, 2).with_tif(TimeInForce::Gtt);
        gtt.expires_at = Some(50);
        submit(&mut book, gtt);
        submit(&mut book, Order::dummy_limit("b1", "bob", Side::Buy, 99, 2));

        assert!(book.remove_expired_orders(49).is_empty());
        let expired = book.remove_expired_orders(50);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, OrderStatus::Expired);
        assert_eq!(book.get_total_number_of_orders(), 1);
    }

    #[test]
    fn settled_stops_everything_sorted() {
        let mut book = make_book();
        submit(&mut book, Order::dummy_limit("z9", "alice", Side::Buy, 100, 2));
        submit(&mut book, Order::dummy_limit("a1", "bob", Side::Sell, 110, 2));
        let stopped = book.settled();
        assert_eq!(stopped.len(), 2);
        assert_eq!(stopped[0].id, OrderId::new("a1"));
        assert!(stopped.iter().all(|o| o.status == OrderStatus::Stopped));
        assert_eq!(book.get_total_volume(), 0);
    }

    #[test]
    fn network_order_carries_vwap_price() {
        let mut book = make_book();
        submit(&mut book, Order::dummy_limit("s1", "alice", Side::Sell, 100, 5));
        submit(&mut book, Order::dummy_limit("s2", "bob", Side::Sell, 110, 5));
        let mut network = Order::dummy_market("n1", "network", Side::Buy, 10);
        network.order_type = OrderType::Network;
        network.time_in_force = TimeInForce::Fok;
        let conf = submit(&mut book, network);
        assert_eq!(conf.trades.len(), 2);
        assert_eq!(conf.order.price, Decimal::from(105u64));
        assert_eq!(conf.order.status, OrderStatus::Filled);
    }
}

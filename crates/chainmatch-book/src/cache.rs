//! Memoized wrapper around [`OrderBook`].
//!
//! The indicative price, volume, and side are asked for far more often
//! than the book changes during an auction. The cached book answers from
//! memo cells and drops them on any mutating call.

use chainmatch_types::{
    Order, OrderCancellationConfirmation, OrderConfirmation, OrderId, PartyId, Result, Side,
};
use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::offbook::OffbookSource;

/// A single memoized value.
#[derive(Debug, Default, Clone)]
pub struct MemoCell<T> {
    value: Option<T>,
}

impl<T: Clone> MemoCell<T> {
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.value.clone()
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }
}

#[derive(Debug, Default)]
struct BookCache {
    indicative_price: MemoCell<Decimal>,
    indicative_volume: MemoCell<u64>,
    indicative_side: MemoCell<Option<Side>>,
}

impl BookCache {
    fn invalidate(&mut self) {
        self.indicative_price.invalidate();
        self.indicative_volume.invalidate();
        self.indicative_side.invalidate();
    }
}

/// An [`OrderBook`] with memoized indicative queries. Read-only book
/// methods are reachable through `Deref`; every mutation goes through a
/// wrapper that drops the cache first.
#[derive(Debug)]
pub struct CachedOrderBook {
    book: OrderBook,
    cache: BookCache,
}

impl std::ops::Deref for CachedOrderBook {
    type Target = OrderBook;

    fn deref(&self) -> &Self::Target {
        &self.book
    }
}

impl CachedOrderBook {
    #[must_use]
    pub fn new(book: OrderBook) -> Self {
        Self {
            book,
            cache: BookCache::default(),
        }
    }

    pub fn set_offbook_source(&mut self, source: Box<dyn OffbookSource>) {
        self.cache.invalidate();
        self.book.set_offbook_source(source);
    }

    pub fn set_pegged_count_notify(&mut self, notify: impl Fn(i64) + Send + 'static) {
        self.book.set_pegged_count_notify(notify);
    }

    pub fn get_indicative_price_and_volume(&mut self) -> (Decimal, u64, Option<Side>) {
        if let (Some(price), Some(volume), Some(side)) = (
            self.cache.indicative_price.get(),
            self.cache.indicative_volume.get(),
            self.cache.indicative_side.get(),
        ) {
            return (price, volume, side);
        }
        let (price, volume, side) = self.book.get_indicative_price_and_volume();
        self.cache.indicative_price.set(price);
        self.cache.indicative_volume.set(volume);
        self.cache.indicative_side.set(side);
        (price, volume, side)
    }

    // ========================================================================
    // Mutating operations, cache dropped first
    // ========================================================================

    pub fn submit_order(&mut self, order: Order) -> Result<OrderConfirmation> {
        self.cache.invalidate();
        self.book.submit_order(order)
    }

    pub fn cancel_order(&mut self, order: &Order) -> Result<OrderCancellationConfirmation> {
        self.cache.invalidate();
        self.book.cancel_order(order)
    }

    pub fn cancel_all_orders(
        &mut self,
        party: &PartyId,
    ) -> Result<Vec<OrderCancellationConfirmation>> {
        self.cache.invalidate();
        self.book.cancel_all_orders(party)
    }

    pub fn amend_order(&mut self, amended: Order) -> Result<()> {
        self.cache.invalidate();
        self.book.amend_order(amended)
    }

    pub fn replace_order(
        &mut self,
        existing: &Order,
        new_order: Order,
    ) -> Result<OrderConfirmation> {
        self.cache.invalidate();
        self.book.replace_order(existing, new_order)
    }

    pub fn remove_order(&mut self, id: &OrderId) -> Result<Order> {
        self.cache.invalidate();
        self.book.remove_order(id)
    }

    pub fn delete_order(&mut self, id: &OrderId) -> Result<Order> {
        self.cache.invalidate();
        self.book.delete_order(id)
    }

    pub fn resubmit_special_order(&mut self, order: Order) {
        self.cache.invalidate();
        self.book.resubmit_special_order(order);
    }

    pub fn remove_distressed_orders(&mut self, parties: &[PartyId]) -> Result<Vec<Order>> {
        self.cache.invalidate();
        self.book.remove_distressed_orders(parties)
    }

    pub fn remove_expired_orders(&mut self, now: i64) -> Vec<Order> {
        self.cache.invalidate();
        self.book.remove_expired_orders(now)
    }

    pub fn enter_auction(&mut self) -> Vec<Order> {
        self.cache.invalidate();
        self.book.enter_auction()
    }

    pub fn leave_auction(&mut self, timestamp: i64) -> Result<(Vec<OrderConfirmation>, Vec<Order>)> {
        self.cache.invalidate();
        self.book.leave_auction(timestamp)
    }

    pub fn settled(&mut self) -> Vec<Order> {
        self.cache.invalidate();
        self.book.settled()
    }

    pub fn apply_price_factor(&mut self, factor: Decimal) {
        self.cache.invalidate();
        self.book.apply_price_factor(factor);
    }

    pub fn update_amm(&mut self, party: &PartyId) {
        self.cache.invalidate();
        self.book.update_amm(party);
    }

    // ========================================================================
    // Non-mutating passthroughs needing &mut for the off-book probe
    // ========================================================================

    pub fn get_trades(&mut self, order: &Order) -> Result<Vec<chainmatch_types::Trade>> {
        self.book.get_trades(order)
    }

    pub fn get_indicative_trades(&mut self) -> Result<Vec<chainmatch_types::Trade>> {
        self.book.get_indicative_trades()
    }

    pub fn get_fill_price(&mut self, volume: u64, side: Side) -> Result<Decimal> {
        self.book.get_fill_price(volume, side)
    }

    pub fn get_closeout_price(&mut self, volume: u64, side: Side) -> Result<Decimal> {
        self.book.get_closeout_price(volume, side)
    }

    pub fn can_leave_auction(&mut self) -> bool {
        self.book.can_leave_auction()
    }

    pub fn can_uncross(&mut self) -> bool {
        self.book.can_uncross()
    }

    pub fn bid_and_ask_present_after_auction(&mut self) -> bool {
        self.book.bid_and_ask_present_after_auction()
    }
}

//! Boundary to off-book liquidity (automated market makers and other
//! venue-internal sources).
//!
//! The book never prices off-book volume itself. During uncrossing it
//! hands the source the aggressive order together with a price interval
//! it is about to sweep, and the source answers with synthesized orders
//! (`generated_offbook = true`) that the book consumes like resting
//! passives.

use chainmatch_types::{Order, PartyId};
use rust_decimal::Decimal;

/// A provider of off-book liquidity for one market.
pub trait OffbookSource {
    /// Best bid price and volume, best ask price and volume currently
    /// quotable off book. A `None` price means no liquidity on that side.
    fn best_prices_and_volumes(&self) -> (Option<Decimal>, u64, Option<Decimal>, u64);

    /// Offer the aggressor the interval between `inner` and `outer`
    /// (exclusive of prices already swept). Returns synthesized orders,
    /// best price first, that the book will trade against.
    fn submit_order(
        &mut self,
        agg: &Order,
        inner: Option<Decimal>,
        outer: Option<Decimal>,
    ) -> Vec<Order>;

    /// The volume shape between two prices, as (buys, sells). When `party`
    /// is set, only that party's shape is returned.
    fn orderbook_shape(
        &self,
        from: Decimal,
        to: Decimal,
        party: Option<&PartyId>,
    ) -> (Vec<Order>, Vec<Order>);

    /// Called once an uncrossing pass (real or simulated) is complete so
    /// the source can discard any per-pass state.
    fn notify_finished(&mut self);
}

// ============================================================================
// Test stub
// ============================================================================

#[cfg(any(test, feature = "test-helpers"))]
pub use stub::StubOffbookSource;

#[cfg(any(test, feature = "test-helpers"))]
mod stub {
    use super::{Decimal, OffbookSource, Order, PartyId};

    type Generator = Box<dyn Fn(&Order, Option<Decimal>, Option<Decimal>) -> Vec<Order>>;

    /// Scripted off-book source for tests: fixed best prices, a closure
    /// producing generated orders, and a log of the intervals it was
    /// offered.
    #[derive(Default)]
    pub struct StubOffbookSource {
        pub best_bid: Option<(Decimal, u64)>,
        pub best_ask: Option<(Decimal, u64)>,
        pub shape: Vec<Order>,
        generator: Option<Generator>,
        pub submissions: Vec<(Option<Decimal>, Option<Decimal>)>,
        pub finished_calls: usize,
    }

    impl StubOffbookSource {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_generator(
            &mut self,
            f: impl Fn(&Order, Option<Decimal>, Option<Decimal>) -> Vec<Order> + 'static,
        ) {
            self.generator = Some(Box::new(f));
        }
    }

    impl std::fmt::Debug for StubOffbookSource {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("StubOffbookSource")
                .field("best_bid", &self.best_bid)
                .field("best_ask", &self.best_ask)
                .field("submissions", &self.submissions)
                .field("finished_calls", &self.finished_calls)
                .finish_non_exhaustive()
        }
    }

    impl OffbookSource for StubOffbookSource {
        fn best_prices_and_volumes(&self) -> (Option<Decimal>, u64, Option<Decimal>, u64) {
            let (bid, bid_vol) = self.best_bid.map_or((None, 0), |(p, v)| (Some(p), v));
            let (ask, ask_vol) = self.best_ask.map_or((None, 0), |(p, v)| (Some(p), v));
            (bid, bid_vol, ask, ask_vol)
        }

        fn submit_order(
            &mut self,
            agg: &Order,
            inner: Option<Decimal>,
            outer: Option<Decimal>,
        ) -> Vec<Order> {
            self.submissions.push((inner, outer));
            self.generator.as_ref().map_or_else(Vec::new, |g| g(agg, inner, outer))
        }

        fn orderbook_shape(
            &self,
            from: Decimal,
            to: Decimal,
            party: Option<&PartyId>,
        ) -> (Vec<Order>, Vec<Order>) {
            let mut buys = Vec::new();
            let mut sells = Vec::new();
            for order in &self.shape {
                if order.price < from || order.price > to {
                    continue;
                }
                if party.is_some_and(|p| *p != order.party) {
                    continue;
                }
                match order.side {
                    chainmatch_types::Side::Buy => buys.push(order.clone()),
                    chainmatch_types::Side::Sell => sells.push(order.clone()),
                }
            }
            (buys, sells)
        }

        fn notify_finished(&mut self) {
            self.finished_calls += 1;
        }
    }
}

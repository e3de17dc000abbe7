//! # chainmatch-book
//!
//! The matching core of the **ChainMatch** trading venue: a price-time
//! priority limit order book with auction uncrossing, iceberg orders, and
//! pluggable off-book liquidity.
//!
//! The entry point is [`OrderBook`] (one per market), usually wrapped in
//! [`CachedOrderBook`] to memoize the indicative auction queries. Resting
//! orders live in an [`OrderStore`] arena; the book's sides and price
//! levels refer to them by id only, so execution is deterministic and
//! replayable across replicas. [`BookSnapshot`] captures and restores the
//! full resting state.

pub mod book;
pub mod cache;
pub mod indicative;
pub mod offbook;
pub mod price_level;
pub mod side;
pub mod snapshot;
pub mod store;

pub use book::OrderBook;
pub use cache::{CachedOrderBook, MemoCell};
pub use indicative::{CumulativeVolumeLevel, IndicativePriceAndVolume};
pub use offbook::OffbookSource;
pub use price_level::PriceLevel;
pub use side::{BookSide, SideUncross};
pub use snapshot::BookSnapshot;
pub use store::OrderStore;

#[cfg(any(test, feature = "test-helpers"))]
pub use offbook::StubOffbookSource;

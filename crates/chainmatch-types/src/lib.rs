//! # chainmatch-types
//!
//! Shared types, errors, and configuration for the **ChainMatch** order book.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`PartyId`], [`MarketId`], [`TradeId`]
//! - **Order model**: [`Order`], [`Side`], [`OrderType`], [`OrderStatus`],
//!   [`TimeInForce`], [`IcebergOrder`], [`PeggedOrder`]
//! - **Trade model**: [`Trade`], [`OrderConfirmation`], [`OrderCancellationConfirmation`]
//! - **Errors**: [`MatchingError`] with `CM_ERR_` prefix codes
//! - **Configuration**: [`MatchingConfig`]

pub mod config;
pub mod error;
pub mod ids;
pub mod order;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use chainmatch_types::{Order, Side, Trade, MatchingError, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use trade::*;

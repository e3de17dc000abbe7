//! Error types for the ChainMatch order book.
//!
//! All errors use the `CM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order validation errors
//! - 2xx: Lookup / amend errors
//! - 3xx: Matching errors
//! - 4xx: Liquidity / query errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::OrderId;

/// Central error enum for all book operations.
///
/// Validation and matching rejections are also attached to the rejected
/// order itself (see `Order::reason`), so the enum is cheap to clone and
/// serializable.
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchingError {
    // =================================================================
    // Order Validation Errors (1xx)
    // =================================================================
    /// The order names a different market than the book serves.
    #[error("CM_ERR_100: Order market does not match the book's market")]
    InvalidMarketId,

    /// The order has an empty party.
    #[error("CM_ERR_101: Order party is missing")]
    InvalidPartyId,

    /// The order type is not accepted by the book (e.g. unspecified).
    #[error("CM_ERR_102: Invalid order type")]
    InvalidType,

    /// Remaining size is zero or exceeds the total size.
    #[error("CM_ERR_103: Invalid remaining size")]
    InvalidRemainingSize,

    /// Total size is zero.
    #[error("CM_ERR_104: Invalid order size")]
    InvalidSize,

    /// GTT order without an expiry, or a non-GTT order carrying one.
    #[error("CM_ERR_105: Invalid expiration datetime")]
    InvalidExpirationDatetime,

    /// A persistent time-in-force paired with a Market order, or vice versa.
    #[error("CM_ERR_106: Invalid persistence for order type")]
    InvalidPersistence,

    /// GFN order submitted during an auction.
    #[error("CM_ERR_107: Good-for-normal order rejected during auction")]
    GfnOrderDuringAuction,

    /// GFA order submitted during continuous trading.
    #[error("CM_ERR_108: Good-for-auction order rejected during continuous trading")]
    GfaOrderDuringContinuousTrading,

    /// The time-in-force value is not one of the supported six.
    #[error("CM_ERR_109: Invalid time in force")]
    InvalidTimeInForce,

    // =================================================================
    // Lookup / Amend Errors (2xx)
    // =================================================================
    /// The requested order is not resting on the book.
    #[error("CM_ERR_200: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order was indexed but could not be removed from its side.
    #[error("CM_ERR_201: Order removal failure")]
    OrderRemovalFailure,

    /// The amend does not line up with the resting order (price, side,
    /// party or size arithmetic mismatch).
    #[error("CM_ERR_202: Amend failure")]
    AmendFailure,

    /// The amend carries an older version than the resting order.
    #[error("CM_ERR_203: Amend out of sequence")]
    OutOfSequence,

    // =================================================================
    // Matching Errors (3xx)
    // =================================================================
    /// Self-trade prevented: the aggressor would have traded with its own
    /// resting order.
    #[error("CM_ERR_300: Trade rejected, self trading is not allowed")]
    WashTrade,

    /// Auction uncrossing was requested but the book is not crossed.
    #[error("CM_ERR_301: Book is not crossed")]
    NotCrossed,

    // =================================================================
    // Liquidity / Query Errors (4xx)
    // =================================================================
    /// A volume extraction asked for more than the side holds.
    #[error("CM_ERR_400: Not enough orders to cover the requested volume")]
    NotEnoughOrders,

    /// A volume argument of zero (or otherwise out of range) was supplied.
    #[error("CM_ERR_401: Invalid volume")]
    InvalidVolume,

    /// The buy side is empty.
    #[error("CM_ERR_402: No best bid price available")]
    NoBestBid,

    /// The sell side is empty.
    #[error("CM_ERR_403: No best ask price available")]
    NoBestAsk,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// A snapshot restore was attempted on a book that still holds orders.
    #[error("CM_ERR_901: Snapshot restore target is not empty")]
    SnapshotTargetNotEmpty,
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MatchingError>;

//! Hold expiry policy
//!
//! Pure time arithmetic for the checkout soft-lock. The hold window protects
//! the checkout process only; it is independent of the booking's parking
//! window.

use crate::error::AppError;
use crate::AppResult;
use chrono::{DateTime, Duration, Utc};

/// Minimum checkout hold duration in minutes
pub const MIN_HOLD_MINUTES: i64 = 1;

/// Maximum checkout hold duration in minutes
pub const MAX_HOLD_MINUTES: i64 = 60;

/// Check whether a deadline has passed
#[inline]
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

/// Validate a requested hold duration against the allowed bounds
pub fn validate_hold_minutes(minutes: i64) -> AppResult<i64> {
    if !(MIN_HOLD_MINUTES..=MAX_HOLD_MINUTES).contains(&minutes) {
        return Err(AppError::Validation(format!(
            "hold duration must be between {} and {} minutes",
            MIN_HOLD_MINUTES, MAX_HOLD_MINUTES
        )));
    }
    Ok(minutes)
}

/// Compute the deadline for a hold taken now
pub fn hold_deadline(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(minutes)
}

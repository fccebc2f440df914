//! Booking entity and payment lifecycle
//!
//! A booking ties one slot to one holder for one time window. It is created
//! `pending` (online checkout) or directly `success` (offline, admin
//! confirmed) and moves to exactly one terminal-ish state. The record is
//! retained for history after the window passes.

use crate::error::AppError;
use crate::AppResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting a gateway outcome
    #[default]
    Pending,
    /// Paid and confirmed
    Success,
    /// Payment failed or hold expired before completion
    Failed,
    /// Cancelled by the holder or an admin
    Cancelled,
}

impl PaymentStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// Check whether this status still counts towards slot occupancy
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Success)
    }

    /// Check whether no further payment transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a payment resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Gateway reported paid
    Success,
    /// Gateway reported unpaid, or the hold lapsed
    Failed,
}

impl BookingOutcome {
    /// The payment status this outcome resolves to
    pub fn status(&self) -> PaymentStatus {
        match self {
            BookingOutcome::Success => PaymentStatus::Success,
            BookingOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// Booking provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingChannel {
    /// Customer-initiated, gateway-paid
    Online,
    /// Admin-entered at the facility
    Offline,
}

impl fmt::Display for BookingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingChannel::Online => write!(f, "online"),
            BookingChannel::Offline => write!(f, "offline"),
        }
    }
}

/// The party a booking belongs to: a registered user or a named guest,
/// exactly one of the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holder {
    /// Registered user id
    User(Uuid),
    /// Walk-in guest name
    Guest(String),
}

impl Holder {
    /// The user id, when the holder is a registered user
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Holder::User(id) => Some(*id),
            Holder::Guest(_) => None,
        }
    }
}

/// A reservation of one slot for one time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier
    pub id: Uuid,

    /// Reserved slot
    pub slot_id: Uuid,

    /// Facility of the reserved slot
    pub facility_id: Uuid,

    /// Booking party
    pub holder: Holder,

    /// Start of the parking window
    pub start_time: DateTime<Utc>,

    /// End of the parking window
    pub end_time: DateTime<Utc>,

    /// Parked duration in minutes
    pub duration_minutes: i64,

    /// Vehicle registration number
    pub vehicle_number: String,

    /// Vehicle type
    pub vehicle_type: String,

    /// Charged amount
    pub amount: Decimal,

    /// Gateway transaction reference, set on resolution
    pub payment_ref: Option<String>,

    /// Payment lifecycle state
    pub payment_status: PaymentStatus,

    /// Provenance
    pub channel: BookingChannel,

    /// Opaque ticket token, set only on success
    pub qr_payload: Option<String>,

    /// Fine charged on top of the booking amount
    pub fine_amount: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Check whether this booking currently occupies its slot:
    /// pending or success, with the window end still in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.payment_status.is_active() && self.end_time > now
    }
}

/// The opaque ticket token encoded into a booking QR code
pub fn qr_payload_for(booking_id: Uuid) -> String {
    format!("booking:{}", booking_id)
}

/// Parse a scanned ticket token back into a booking id
pub fn parse_qr_payload(payload: &str) -> Option<Uuid> {
    payload
        .strip_prefix("booking:")
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Validated input for creating a booking
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub slot_id: Uuid,
    pub facility_id: Uuid,
    pub holder: Holder,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub channel: BookingChannel,
}

impl BookingDraft {
    /// Validate the draft against the booking window rules.
    ///
    /// Online bookings must start in the future; offline bookings may start
    /// immediately. A small clock-skew grace is allowed on the start bound.
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.vehicle_number.trim().is_empty() {
            return Err(AppError::MissingField("vehicle_number".to_string()));
        }
        if self.vehicle_type.trim().is_empty() {
            return Err(AppError::MissingField("vehicle_type".to_string()));
        }
        if let Holder::Guest(name) = &self.holder {
            if name.trim().is_empty() {
                return Err(AppError::MissingField("guest_name".to_string()));
            }
        }
        if self.duration_minutes <= 0 {
            return Err(AppError::Validation(
                "duration must be positive".to_string(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(AppError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
        let window_minutes = (self.end_time - self.start_time).num_minutes();
        if window_minutes != self.duration_minutes {
            return Err(AppError::Validation(format!(
                "duration {} does not match window of {} minutes",
                self.duration_minutes, window_minutes
            )));
        }
        if self.channel == BookingChannel::Online
            && self.start_time < now - chrono::Duration::minutes(1)
        {
            return Err(AppError::Validation(
                "start_time is in the past".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(channel: BookingChannel) -> BookingDraft {
        let now = Utc::now();
        BookingDraft {
            slot_id: Uuid::new_v4(),
            facility_id: Uuid::new_v4(),
            holder: Holder::User(Uuid::new_v4()),
            start_time: now + chrono::Duration::minutes(5),
            end_time: now + chrono::Duration::minutes(35),
            duration_minutes: 30,
            vehicle_number: "BA-2-CHA-1234".to_string(),
            vehicle_type: "car".to_string(),
            channel,
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft(BookingChannel::Online).validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_rejects_empty_vehicle() {
        let mut d = draft(BookingChannel::Online);
        d.vehicle_number = "  ".to_string();
        assert!(matches!(
            d.validate(Utc::now()),
            Err(AppError::MissingField(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let mut d = draft(BookingChannel::Online);
        std::mem::swap(&mut d.start_time, &mut d.end_time);
        assert!(matches!(
            d.validate(Utc::now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_duration_mismatch() {
        let mut d = draft(BookingChannel::Online);
        d.duration_minutes = 45;
        assert!(matches!(
            d.validate(Utc::now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_online_rejects_past_start() {
        let mut d = draft(BookingChannel::Online);
        d.start_time = Utc::now() - chrono::Duration::minutes(30);
        d.end_time = d.start_time + chrono::Duration::minutes(30);
        assert!(d.validate(Utc::now()).is_err());
    }

    #[test]
    fn test_offline_allows_immediate_start() {
        let mut d = draft(BookingChannel::Offline);
        d.start_time = Utc::now() - chrono::Duration::minutes(30);
        d.end_time = d.start_time + chrono::Duration::minutes(30);
        assert!(d.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_qr_payload_round_trip() {
        let id = Uuid::new_v4();
        let payload = qr_payload_for(id);
        assert_eq!(payload, format!("booking:{}", id));
        assert_eq!(parse_qr_payload(&payload), Some(id));
        assert_eq!(parse_qr_payload("ticket:nope"), None);
        assert_eq!(parse_qr_payload("booking:not-a-uuid"), None);
    }

    #[test]
    fn test_payment_status() {
        assert!(PaymentStatus::Pending.is_active());
        assert!(PaymentStatus::Success.is_active());
        assert!(!PaymentStatus::Failed.is_active());
        assert!(PaymentStatus::Cancelled.is_terminal());
        assert_eq!(PaymentStatus::from_str("SUCCESS"), Some(PaymentStatus::Success));
        assert_eq!(PaymentStatus::from_str("unknown"), None);
    }
}

//! Booking DTOs

use chrono::{DateTime, Utc};
use parkhub_core::models::{Booking, BookingChannel, BookingDraft, Holder, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Online booking creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    /// Slot to reserve
    pub slot_id: Uuid,
    /// Start of the parking window
    pub start_time: DateTime<Utc>,
    /// End of the parking window
    pub end_time: DateTime<Utc>,
    /// Parked duration in minutes; must match the window
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i64,
    /// Vehicle registration number
    #[validate(length(min = 1, max = 20))]
    pub vehicle_number: String,
    /// Vehicle type
    #[validate(length(min = 1, max = 20))]
    pub vehicle_type: String,
}

impl CreateBookingRequest {
    /// Build a draft for the acting user
    pub fn into_draft(self, user_id: Uuid) -> BookingDraft {
        BookingDraft {
            slot_id: self.slot_id,
            facility_id: Uuid::nil(), // resolved from the slot
            holder: Holder::User(user_id),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            vehicle_number: self.vehicle_number,
            vehicle_type: self.vehicle_type,
            channel: BookingChannel::Online,
        }
    }
}

/// Offline booking entered at the counter
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OfflineBookingRequest {
    /// Slot to reserve
    pub slot_id: Uuid,
    /// Walk-in guest name
    #[validate(length(min = 1, max = 100))]
    pub guest_name: String,
    /// Start of the parking window
    pub start_time: DateTime<Utc>,
    /// End of the parking window
    pub end_time: DateTime<Utc>,
    /// Parked duration in minutes; must match the window
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i64,
    /// Vehicle registration number
    #[validate(length(min = 1, max = 20))]
    pub vehicle_number: String,
    /// Vehicle type
    #[validate(length(min = 1, max = 20))]
    pub vehicle_type: String,
}

impl OfflineBookingRequest {
    /// Build a guest draft
    pub fn into_draft(self) -> BookingDraft {
        BookingDraft {
            slot_id: self.slot_id,
            facility_id: Uuid::nil(), // resolved from the slot
            holder: Holder::Guest(self.guest_name),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            vehicle_number: self.vehicle_number,
            vehicle_type: self.vehicle_type,
            channel: BookingChannel::Offline,
        }
    }
}

/// Booking representation on the wire
#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub facility_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    pub channel: BookingChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    pub fine_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        let (user_id, guest_name) = match b.holder {
            Holder::User(id) => (Some(id), None),
            Holder::Guest(name) => (None, Some(name)),
        };
        Self {
            id: b.id,
            slot_id: b.slot_id,
            facility_id: b.facility_id,
            user_id,
            guest_name,
            start_time: b.start_time,
            end_time: b.end_time,
            duration_minutes: b.duration_minutes,
            vehicle_number: b.vehicle_number,
            vehicle_type: b.vehicle_type,
            amount: b.amount,
            payment_status: b.payment_status,
            payment_ref: b.payment_ref,
            channel: b.channel,
            qr_payload: b.qr_payload,
            fine_amount: b.fine_amount,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Response of starting an online booking
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    /// The pending booking
    pub booking: BookingResponse,
    /// Gateway session to complete payment against
    pub session_id: String,
    /// Where to send the customer
    pub redirect_url: String,
}

/// Query parameters of the success redirect leg
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentQuery {
    pub booking_id: Uuid,
    pub session_id: String,
}

/// Query parameters of the failure redirect leg
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFailedQuery {
    pub booking_id: Uuid,
}

/// Fine assignment request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FineRequest {
    /// Fine amount; zero clears it
    #[validate(range(min = 0.0))]
    pub amount: f64,
}

/// Ticket scan request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScanRequest {
    /// Scanned QR payload
    #[validate(length(min = 1, max = 100))]
    pub payload: String,
}

/// Ticket scan result
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    /// The booking the ticket refers to
    pub booking: BookingResponse,
    /// Whether the ticket admits entry right now
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_booking_response_splits_holder() {
        let user = Uuid::new_v4();
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            facility_id: Uuid::new_v4(),
            holder: Holder::User(user),
            start_time: now,
            end_time: now + Duration::minutes(30),
            duration_minutes: 30,
            vehicle_number: "BA-2-CHA-1234".to_string(),
            vehicle_type: "car".to_string(),
            amount: Decimal::from(300),
            payment_ref: None,
            payment_status: PaymentStatus::Pending,
            channel: BookingChannel::Online,
            qr_payload: None,
            fine_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        let resp = BookingResponse::from(booking);
        assert_eq!(resp.user_id, Some(user));
        assert_eq!(resp.guest_name, None);
    }

    #[test]
    fn test_request_validation() {
        let now = Utc::now();
        let req = CreateBookingRequest {
            slot_id: Uuid::new_v4(),
            start_time: now,
            end_time: now + Duration::minutes(30),
            duration_minutes: 0,
            vehicle_number: "BA-2-CHA-1234".to_string(),
            vehicle_type: "car".to_string(),
        };
        assert!(req.validate().is_err());

        let req = OfflineBookingRequest {
            slot_id: Uuid::new_v4(),
            guest_name: String::new(),
            start_time: now,
            end_time: now + Duration::minutes(30),
            duration_minutes: 30,
            vehicle_number: "BA-2-CHA-1234".to_string(),
            vehicle_type: "car".to_string(),
        };
        assert!(req.validate().is_err());
    }
}

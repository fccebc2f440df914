//! In-memory booking store
//!
//! Payment transitions go through `resolve`, which runs under the entry
//! guard so two funnel legs landing at once (webhook plus redirect)
//! serialize: the first one wins, the duplicate observes the terminal state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parkhub_core::models::{
    qr_payload_for, Actor, Booking, BookingChannel, BookingDraft, BookingOutcome, PaymentStatus,
};
use parkhub_core::traits::BookingStore;
use parkhub_core::AppError;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

/// Booking store backed by a sharded concurrent map
#[derive(Default)]
pub struct MemoryBookingStore {
    bookings: DashMap<Uuid, Booking>,
}

impl MemoryBookingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn build(draft: BookingDraft, amount: Decimal, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            slot_id: draft.slot_id,
            facility_id: draft.facility_id,
            holder: draft.holder,
            start_time: draft.start_time,
            end_time: draft.end_time,
            duration_minutes: draft.duration_minutes,
            vehicle_number: draft.vehicle_number,
            vehicle_type: draft.vehicle_type,
            amount,
            payment_ref: None,
            payment_status: PaymentStatus::Pending,
            channel: draft.channel,
            qr_payload: None,
            fine_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn create_pending(
        &self,
        draft: BookingDraft,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        draft.validate(now)?;
        if draft.channel != BookingChannel::Online {
            return Err(AppError::Validation(
                "pending bookings are online only".to_string(),
            ));
        }
        let booking = Self::build(draft, amount, now);
        self.bookings.insert(booking.id, booking.clone());
        debug!(booking_id = %booking.id, slot_id = %booking.slot_id, "pending booking created");
        Ok(booking)
    }

    async fn create_confirmed(
        &self,
        draft: BookingDraft,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        draft.validate(now)?;
        let mut booking = Self::build(draft, amount, now);
        booking.payment_status = PaymentStatus::Success;
        booking.qr_payload = Some(qr_payload_for(booking.id));
        self.bookings.insert(booking.id, booking.clone());
        debug!(booking_id = %booking.id, slot_id = %booking.slot_id, "confirmed booking created");
        Ok(booking)
    }

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.bookings.get(&booking_id).map(|b| b.clone()))
    }

    async fn resolve(
        &self,
        booking_id: Uuid,
        outcome: BookingOutcome,
        payment_ref: Option<String>,
        qr_payload: Option<String>,
    ) -> Result<Booking, AppError> {
        let mut booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(AppError::BookingNotFound(booking_id))?;
        match booking.payment_status {
            PaymentStatus::Pending => {
                booking.payment_status = outcome.status();
                if payment_ref.is_some() {
                    booking.payment_ref = payment_ref;
                }
                if outcome == BookingOutcome::Success {
                    booking.qr_payload = qr_payload;
                }
                booking.updated_at = Utc::now();
                debug!(booking_id = %booking_id, status = %booking.payment_status, "booking resolved");
                Ok(booking.clone())
            }
            // Duplicate confirmation of an already-paid booking is a no-op
            PaymentStatus::Success if outcome == BookingOutcome::Success => Ok(booking.clone()),
            current => Err(AppError::Conflict(format!(
                "booking is already {}",
                current
            ))),
        }
    }

    async fn cancel(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let mut booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(AppError::BookingNotFound(booking_id))?;
        if !actor.is_privileged() && booking.holder.user_id() != Some(actor.id) {
            return Err(AppError::OwnershipMismatch);
        }
        if booking.payment_status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "booking is already {}",
                booking.payment_status
            )));
        }
        if booking.end_time <= now {
            return Err(AppError::Conflict(
                "booking window has already ended".to_string(),
            ));
        }
        booking.payment_status = PaymentStatus::Cancelled;
        booking.updated_at = now;
        debug!(booking_id = %booking_id, "booking cancelled");
        Ok(booking.clone())
    }

    async fn set_fine(&self, booking_id: Uuid, amount: Decimal) -> Result<Booking, AppError> {
        let mut booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(AppError::BookingNotFound(booking_id))?;
        booking.fine_amount = amount;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn delete(&self, booking_id: Uuid) -> Result<bool, AppError> {
        Ok(self.bookings.remove(&booking_id).is_some())
    }

    async fn find_pending_by_slot(&self, slot_id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self
            .bookings
            .iter()
            .find(|b| b.slot_id == slot_id && b.payment_status == PaymentStatus::Pending)
            .map(|b| b.clone()))
    }

    async fn list_by_facility(&self, facility_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.facility_id == facility_id)
            .map(|b| b.clone())
            .collect();
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(bookings)
    }

    async fn list_active_by_facility(
        &self,
        facility_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| {
                b.facility_id == facility_id
                    && b.payment_status == PaymentStatus::Success
                    && b.end_time > now
            })
            .map(|b| b.clone())
            .collect();
        bookings.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(bookings)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.holder.user_id() == Some(user_id))
            .map(|b| b.clone())
            .collect();
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(bookings)
    }
}

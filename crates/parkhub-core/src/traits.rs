//! Common traits for stores and external collaborators
//!
//! The stores expose conditional, atomic state transitions: every operation
//! checks and writes in one indivisible step against the backing store, so
//! concurrent transitions on the same entity are linearizable. The payment
//! gateway trait captures the only contract the engine needs from the
//! external provider.

use crate::error::AppError;
use crate::models::{Actor, Booking, BookingDraft, BookingOutcome, Slot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Slot store with conditional atomic transitions
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Insert a new slot; fails if the slot number already exists in the facility
    async fn insert(&self, slot: Slot) -> Result<Slot, AppError>;

    /// Find slot by id
    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>, AppError>;

    /// List all slots of a facility
    async fn list_by_facility(&self, facility_id: Uuid) -> Result<Vec<Slot>, AppError>;

    /// Free -> Held. Fails with `SlotUnavailable` if already Held/Occupied,
    /// `Forbidden` for admin-only slots and non-privileged actors.
    async fn try_hold(
        &self,
        slot_id: Uuid,
        actor: &Actor,
        hold_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Slot, AppError>;

    /// Like `try_hold`, but a slot already Held by this actor refreshes its
    /// deadline instead of conflicting. Used when checkout starts without an
    /// explicit prior hold.
    async fn hold_for_checkout(
        &self,
        slot_id: Uuid,
        actor: &Actor,
        hold_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Slot, AppError>;

    /// Held -> Free. With `expected_holder` set, fails unless that actor
    /// holds the lock; `None` bypasses the holder check (privileged/system).
    async fn release(
        &self,
        slot_id: Uuid,
        expected_holder: Option<Uuid>,
    ) -> Result<Slot, AppError>;

    /// Held (or Free, for late-payment reconciliation) -> Occupied.
    /// A slot Held by anyone other than `expected_holder` conflicts, so a
    /// confirmation landing after the hold was swept and re-taken cannot
    /// steal the new holder's slot. Idempotent when already Occupied by the
    /// same booking.
    async fn occupy(
        &self,
        slot_id: Uuid,
        booking_id: Uuid,
        expected_holder: Option<Uuid>,
    ) -> Result<Slot, AppError>;

    /// Held or Occupied -> Free, unconditionally
    async fn free(&self, slot_id: Uuid) -> Result<Slot, AppError>;

    /// Occupied by this booking, or Held by `holder` -> Free, checked and
    /// written in one transition. Any other state is left alone; returns the
    /// freed slot, or `None` when the slot had already moved on.
    async fn free_if_owned(
        &self,
        slot_id: Uuid,
        booking_id: Uuid,
        holder: Option<Uuid>,
    ) -> Result<Option<Slot>, AppError>;

    /// Release every Held slot whose deadline has passed; returns the freed set
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Slot>, AppError>;

    /// Delete a slot; fails while Held or Occupied
    async fn delete(&self, slot_id: Uuid) -> Result<Slot, AppError>;

    /// Delete several slots; fails without deleting anything if any of them
    /// is not currently Free
    async fn delete_bulk(&self, slot_ids: &[Uuid]) -> Result<usize, AppError>;
}

/// Booking store with conditional atomic transitions
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Validate and persist a draft as `pending`
    async fn create_pending(
        &self,
        draft: BookingDraft,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError>;

    /// Validate and persist a draft directly as `success` with its ticket
    /// token already issued (offline path)
    async fn create_confirmed(
        &self,
        draft: BookingDraft,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError>;

    /// Find booking by id
    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError>;

    /// pending -> success/failed. Re-resolving an already-`success` booking
    /// to success is a no-op returning the existing record (duplicate
    /// webhook guard); any other terminal re-resolution is a conflict.
    async fn resolve(
        &self,
        booking_id: Uuid,
        outcome: BookingOutcome,
        payment_ref: Option<String>,
        qr_payload: Option<String>,
    ) -> Result<Booking, AppError>;

    /// pending|success -> cancelled; holder or privileged actor only, and
    /// only while the booking window has not elapsed
    async fn cancel(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError>;

    /// Record a fine on a booking
    async fn set_fine(&self, booking_id: Uuid, amount: Decimal) -> Result<Booking, AppError>;

    /// Delete a booking record
    async fn delete(&self, booking_id: Uuid) -> Result<bool, AppError>;

    /// The pending booking currently referencing a slot, if any
    async fn find_pending_by_slot(&self, slot_id: Uuid) -> Result<Option<Booking>, AppError>;

    /// All bookings of a facility, newest window first
    async fn list_by_facility(&self, facility_id: Uuid) -> Result<Vec<Booking>, AppError>;

    /// Confirmed bookings of a facility whose window has not elapsed
    async fn list_active_by_facility(
        &self,
        facility_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;

    /// All bookings held by a registered user
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError>;
}

/// A checkout session created at the gateway
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Gateway session identifier
    pub session_id: String,
    /// Where to send the customer to complete payment
    pub redirect_url: String,
}

/// Authoritative payment outcome reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The session was paid
    Paid {
        /// Gateway transaction reference
        payment_ref: String,
    },
    /// The session was not paid (failed, expired, or abandoned)
    Unpaid,
}

/// Payment gateway adapter
///
/// The gateway round trip is asynchronous and must never run while a store
/// entry guard is held; a slot stays reserved across it only through its
/// hold deadline.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for a booking amount
    async fn create_checkout_session(
        &self,
        booking: &Booking,
        amount: Decimal,
        currency: &str,
    ) -> Result<CheckoutSession, AppError>;

    /// Fetch the authoritative outcome of a checkout session
    async fn fetch_outcome(&self, session_id: &str) -> Result<PaymentOutcome, AppError>;
}

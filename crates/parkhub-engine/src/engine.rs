//! Reservation engine
//!
//! Orchestrates slot holds, bookings, and the payment funnel against the
//! stores and the gateway. The stores are the source of truth and perform
//! every conditional transition atomically; the engine never reads state and
//! writes it back across an await point.

use chrono::Utc;
use parkhub_core::config::{BookingConfig, GatewayConfig};
use parkhub_core::models::{
    parse_qr_payload, qr_payload_for, Actor, Booking, BookingDraft, BookingOutcome, PaymentStatus,
    Slot, SlotLayout,
};
use parkhub_core::traits::{BookingStore, CheckoutSession, PaymentGateway, PaymentOutcome, SlotStore};
use parkhub_core::{AppError, AppResult};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::notifier::{ChangeEvent, ChangeNotifier};

/// Tunables the engine needs at runtime
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Price per parked minute
    pub rate_per_minute: Decimal,
    /// Checkout hold duration when the caller does not ask for one
    pub default_hold_minutes: i64,
    /// Gateway settlement currency
    pub currency: String,
}

impl EngineSettings {
    /// Build settings from the loaded configuration
    pub fn from_config(booking: &BookingConfig, gateway: &GatewayConfig) -> AppResult<Self> {
        let rate = Decimal::from_f64_retain(booking.rate_per_minute)
            .filter(|r| !r.is_sign_negative())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "invalid rate_per_minute: {}",
                    booking.rate_per_minute
                ))
            })?;
        Ok(Self {
            rate_per_minute: rate,
            default_hold_minutes: booking.default_hold_minutes,
            currency: gateway.currency.clone(),
        })
    }
}

/// Outcome of one expiry sweep pass
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SweepReport {
    /// Holds released back to Free
    pub freed_slots: usize,
    /// Pending bookings marked failed because their hold lapsed
    pub failed_bookings: usize,
}

/// The reservation engine
///
/// Owned once per process and shared behind `Arc` by the HTTP handlers and
/// the background sweeper.
pub struct ReservationEngine {
    slots: Arc<dyn SlotStore>,
    bookings: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<ChangeNotifier>,
    settings: EngineSettings,
}

impl ReservationEngine {
    /// Create a new engine
    pub fn new(
        slots: Arc<dyn SlotStore>,
        bookings: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<ChangeNotifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            slots,
            bookings,
            gateway,
            notifier,
            settings,
        }
    }

    /// The notifier mutations publish through
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Price for a parked duration
    pub fn amount_for(&self, duration_minutes: i64) -> Decimal {
        self.settings.rate_per_minute * Decimal::from(duration_minutes)
    }

    // ---- Slot administration ----

    /// Create slots in a facility; fails on the first duplicate number
    #[instrument(skip(self, specs))]
    pub async fn create_slots(
        &self,
        facility_id: Uuid,
        specs: Vec<(String, SlotLayout)>,
    ) -> AppResult<Vec<Slot>> {
        let mut created = Vec::with_capacity(specs.len());
        for (number, layout) in specs {
            created.push(
                self.slots
                    .insert(Slot::new(facility_id, number, layout))
                    .await?,
            );
        }
        info!(facility_id = %facility_id, count = created.len(), "slots created");
        self.notifier
            .publish(ChangeEvent::SlotsChanged { facility_id });
        Ok(created)
    }

    /// Fetch a single slot
    pub async fn get_slot(&self, slot_id: Uuid) -> AppResult<Slot> {
        self.slots
            .find_by_id(slot_id)
            .await?
            .ok_or(AppError::SlotNotFound(slot_id))
    }

    /// All slots of a facility
    pub async fn list_slots(&self, facility_id: Uuid) -> AppResult<Vec<Slot>> {
        self.slots.list_by_facility(facility_id).await
    }

    /// Delete free slots; the whole batch is rejected if any slot is in use
    #[instrument(skip(self, slot_ids))]
    pub async fn delete_slots(&self, slot_ids: &[Uuid]) -> AppResult<usize> {
        let mut facilities: Vec<Uuid> = Vec::new();
        for id in slot_ids {
            if let Some(slot) = self.slots.find_by_id(*id).await? {
                if !facilities.contains(&slot.facility_id) {
                    facilities.push(slot.facility_id);
                }
            }
        }
        let deleted = self.slots.delete_bulk(slot_ids).await?;
        for facility_id in facilities {
            self.notifier
                .publish(ChangeEvent::SlotsChanged { facility_id });
        }
        Ok(deleted)
    }

    // ---- Holds ----

    /// Take a checkout hold on a slot
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn hold_slot(
        &self,
        actor: &Actor,
        slot_id: Uuid,
        hold_minutes: Option<i64>,
    ) -> AppResult<Slot> {
        let minutes = hold_minutes.unwrap_or(self.settings.default_hold_minutes);
        let slot = self
            .slots
            .try_hold(slot_id, actor, minutes, Utc::now())
            .await?;
        self.notifier.publish(ChangeEvent::SlotsChanged {
            facility_id: slot.facility_id,
        });
        Ok(slot)
    }

    /// Release a hold. Customers may only release their own; privileged
    /// actors may unlock any held slot.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn release_slot(&self, actor: &Actor, slot_id: Uuid) -> AppResult<Slot> {
        let expected = if actor.is_privileged() {
            None
        } else {
            Some(actor.id)
        };
        let slot = self.slots.release(slot_id, expected).await?;
        self.notifier.publish(ChangeEvent::SlotsChanged {
            facility_id: slot.facility_id,
        });
        Ok(slot)
    }

    // ---- Booking creation ----

    /// Start an online booking: hold the slot, record a pending booking,
    /// and open a checkout session at the gateway.
    ///
    /// If the gateway call fails the hold and the pending booking are both
    /// rolled back so the slot returns to the pool immediately.
    #[instrument(skip(self, actor, draft), fields(actor_id = %actor.id, slot_id = %draft.slot_id))]
    pub async fn create_online_booking(
        &self,
        actor: &Actor,
        mut draft: BookingDraft,
    ) -> AppResult<(Booking, CheckoutSession)> {
        let now = Utc::now();
        let slot = self.get_slot(draft.slot_id).await?;
        draft.facility_id = slot.facility_id;
        draft.validate(now)?;

        self.slots
            .hold_for_checkout(
                draft.slot_id,
                actor,
                self.settings.default_hold_minutes,
                now,
            )
            .await?;

        let amount = self.amount_for(draft.duration_minutes);
        let slot_id = draft.slot_id;
        let booking = match self.bookings.create_pending(draft, amount, now).await {
            Ok(b) => b,
            Err(e) => {
                self.rollback_hold(slot_id, Some(actor.id)).await;
                return Err(e);
            }
        };

        let session = match self
            .gateway
            .create_checkout_session(&booking, amount, &self.settings.currency)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "gateway session failed, rolling back");
                if let Err(e) = self
                    .bookings
                    .resolve(booking.id, BookingOutcome::Failed, None, None)
                    .await
                {
                    warn!(booking_id = %booking.id, error = %e, "rollback resolve failed");
                }
                self.rollback_hold(slot_id, Some(actor.id)).await;
                return Err(e);
            }
        };

        info!(booking_id = %booking.id, session_id = %session.session_id, "online booking started");
        self.publish_both(slot.facility_id);
        Ok((booking, session))
    }

    /// Record an offline booking confirmed at the counter: the acting admin
    /// takes a short hold on the slot, the booking is written as confirmed
    /// with its ticket issued, and the slot moves to Occupied without a
    /// gateway round trip.
    #[instrument(skip(self, actor, draft), fields(actor_id = %actor.id, slot_id = %draft.slot_id))]
    pub async fn create_offline_booking(
        &self,
        actor: &Actor,
        mut draft: BookingDraft,
    ) -> AppResult<Booking> {
        let now = Utc::now();
        let slot = self.get_slot(draft.slot_id).await?;
        draft.facility_id = slot.facility_id;
        draft.validate(now)?;

        self.slots
            .try_hold(
                draft.slot_id,
                actor,
                self.settings.default_hold_minutes,
                now,
            )
            .await?;

        let amount = self.amount_for(draft.duration_minutes);
        let slot_id = draft.slot_id;
        let booking = match self.bookings.create_confirmed(draft, amount, now).await {
            Ok(b) => b,
            Err(e) => {
                self.rollback_hold(slot_id, Some(actor.id)).await;
                return Err(e);
            }
        };
        if let Err(e) = self
            .slots
            .occupy(booking.slot_id, booking.id, Some(actor.id))
            .await
        {
            let _ = self.bookings.delete(booking.id).await;
            self.rollback_hold(slot_id, Some(actor.id)).await;
            return Err(e);
        }

        info!(booking_id = %booking.id, "offline booking recorded");
        self.publish_both(slot.facility_id);
        Ok(booking)
    }

    // ---- Payment funnel ----

    /// Confirm or fail a pending booking against the authoritative gateway
    /// session state. Both funnel legs (webhook and redirect) land here, so
    /// the whole path is idempotent: re-confirming a paid booking returns it
    /// unchanged.
    #[instrument(skip(self))]
    pub async fn resolve_payment(&self, booking_id: Uuid, session_id: &str) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound(booking_id))?;

        if booking.payment_status == PaymentStatus::Success {
            return Ok(booking);
        }

        match self.gateway.fetch_outcome(session_id).await? {
            PaymentOutcome::Paid { payment_ref } => {
                // Secure the slot first: a booking never goes `success`
                // without owning its slot. If the slot was lost while payment
                // was in flight (unlocked by an admin, or swept and re-taken)
                // the booking fails instead.
                if let Err(e) = self
                    .slots
                    .occupy(booking.slot_id, booking_id, booking.holder.user_id())
                    .await
                {
                    warn!(booking_id = %booking_id, error = %e, "paid booking lost its slot");
                    if let Err(resolve_err) = self
                        .bookings
                        .resolve(booking_id, BookingOutcome::Failed, None, None)
                        .await
                    {
                        warn!(booking_id = %booking_id, error = %resolve_err, "lost-slot resolve failed");
                    }
                    self.publish_both(booking.facility_id);
                    return Err(e);
                }

                let resolved = match self
                    .bookings
                    .resolve(
                        booking_id,
                        BookingOutcome::Success,
                        Some(payment_ref),
                        Some(qr_payload_for(booking_id)),
                    )
                    .await
                {
                    Ok(b) => b,
                    Err(e) => {
                        // The booking went terminal while the slot was being
                        // secured (sweep or cancellation won); hand it back.
                        if let Err(free_err) = self
                            .slots
                            .free_if_owned(booking.slot_id, booking_id, booking.holder.user_id())
                            .await
                        {
                            warn!(slot_id = %booking.slot_id, error = %free_err, "slot handback failed");
                        }
                        self.publish_both(booking.facility_id);
                        return Err(e);
                    }
                };
                info!(booking_id = %booking_id, "payment confirmed");
                self.publish_both(resolved.facility_id);
                Ok(resolved)
            }
            PaymentOutcome::Unpaid => {
                let resolved = self
                    .bookings
                    .resolve(booking_id, BookingOutcome::Failed, None, None)
                    .await?;
                self.rollback_hold(resolved.slot_id, resolved.holder.user_id())
                    .await;
                info!(booking_id = %booking_id, "payment reported unpaid");
                self.publish_both(resolved.facility_id);
                Ok(resolved)
            }
        }
    }

    /// The customer came back on the failure redirect: fail the pending
    /// booking and free the hold. A booking already resolved elsewhere is
    /// returned unchanged.
    #[instrument(skip(self))]
    pub async fn abandon_payment(&self, booking_id: Uuid) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound(booking_id))?;
        if booking.payment_status != PaymentStatus::Pending {
            return Ok(booking);
        }

        let resolved = self
            .bookings
            .resolve(booking_id, BookingOutcome::Failed, None, None)
            .await?;
        self.rollback_hold(resolved.slot_id, resolved.holder.user_id())
            .await;
        info!(booking_id = %booking_id, "checkout abandoned");
        self.publish_both(resolved.facility_id);
        Ok(resolved)
    }

    // ---- Cancellation and deletion ----

    /// Cancel a booking and return its slot to the pool
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn cancel_booking(&self, actor: &Actor, booking_id: Uuid) -> AppResult<Booking> {
        let cancelled = self.bookings.cancel(booking_id, actor, Utc::now()).await?;
        self.reclaim_slot(&cancelled).await;
        info!(booking_id = %booking_id, "booking cancelled");
        self.publish_both(cancelled.facility_id);
        Ok(cancelled)
    }

    /// Remove a booking record entirely, freeing its slot if it still
    /// occupies one. Admin surface.
    #[instrument(skip(self))]
    pub async fn delete_booking(&self, booking_id: Uuid) -> AppResult<()> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound(booking_id))?;
        self.reclaim_slot(&booking).await;
        self.bookings.delete(booking_id).await?;
        info!(booking_id = %booking_id, "booking deleted");
        self.publish_both(booking.facility_id);
        Ok(())
    }

    /// Record a fine on a booking
    pub async fn set_fine(&self, booking_id: Uuid, amount: Decimal) -> AppResult<Booking> {
        let booking = self.bookings.set_fine(booking_id, amount).await?;
        self.notifier.publish(ChangeEvent::BookingsChanged {
            facility_id: booking.facility_id,
        });
        Ok(booking)
    }

    // ---- Expiry sweep ----

    /// Release every lapsed hold and fail the pending bookings attached to
    /// the freed slots. Runs on a timer and on demand.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> AppResult<SweepReport> {
        let now = Utc::now();
        let freed = self.slots.sweep_expired(now).await?;
        let mut report = SweepReport {
            freed_slots: freed.len(),
            failed_bookings: 0,
        };

        let mut facilities: Vec<Uuid> = Vec::new();
        for slot in &freed {
            if !facilities.contains(&slot.facility_id) {
                facilities.push(slot.facility_id);
            }
            if let Some(pending) = self.bookings.find_pending_by_slot(slot.id).await? {
                match self
                    .bookings
                    .resolve(pending.id, BookingOutcome::Failed, None, None)
                    .await
                {
                    Ok(_) => report.failed_bookings += 1,
                    // A funnel leg confirmed it between the sweep and here
                    Err(AppError::Conflict(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if report.freed_slots > 0 {
            info!(
                freed = report.freed_slots,
                failed = report.failed_bookings,
                "expiry sweep completed"
            );
            for facility_id in facilities {
                self.publish_both(facility_id);
            }
        }
        Ok(report)
    }

    // ---- Lookups ----

    /// Fetch a booking
    pub async fn get_booking(&self, booking_id: Uuid) -> AppResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound(booking_id))
    }

    /// Full booking history of a facility
    pub async fn booking_history(&self, facility_id: Uuid) -> AppResult<Vec<Booking>> {
        self.bookings.list_by_facility(facility_id).await
    }

    /// Confirmed bookings of a facility whose window is still open
    pub async fn active_bookings(&self, facility_id: Uuid) -> AppResult<Vec<Booking>> {
        self.bookings
            .list_active_by_facility(facility_id, Utc::now())
            .await
    }

    /// All bookings of a registered user
    pub async fn user_bookings(&self, user_id: Uuid) -> AppResult<Vec<Booking>> {
        self.bookings.list_by_user(user_id).await
    }

    /// Look up a booking from a scanned ticket token and report whether it
    /// is currently valid for entry.
    pub async fn scan_ticket(&self, payload: &str) -> AppResult<(Booking, bool)> {
        let booking_id = parse_qr_payload(payload)
            .ok_or_else(|| AppError::Validation("unrecognized ticket payload".to_string()))?;
        let booking = self.get_booking(booking_id).await?;
        let valid =
            booking.payment_status == PaymentStatus::Success && booking.end_time > Utc::now();
        Ok((booking, valid))
    }

    // ---- Internal ----

    /// Free a slot held for a booking that will not complete. Only `holder`'s
    /// hold is released; a slot that moved on (already free, re-held by
    /// someone else, or occupied) is left alone.
    async fn rollback_hold(&self, slot_id: Uuid, holder: Option<Uuid>) {
        match self.slots.release(slot_id, holder).await {
            Ok(_)
            | Err(AppError::NotLocked(_))
            | Err(AppError::SlotNotFound(_))
            | Err(AppError::OwnershipMismatch) => {}
            Err(e) => warn!(slot_id = %slot_id, error = %e, "hold rollback failed"),
        }
    }

    /// Return a slot to Free if this booking still holds or occupies it.
    /// The ownership check and the write are one store transition, so a slot
    /// held or occupied by anyone else is never disturbed.
    async fn reclaim_slot(&self, booking: &Booking) {
        match self
            .slots
            .free_if_owned(booking.slot_id, booking.id, booking.holder.user_id())
            .await
        {
            Ok(_) | Err(AppError::SlotNotFound(_)) => {}
            Err(e) => warn!(slot_id = %booking.slot_id, error = %e, "slot reclaim failed"),
        }
    }

    fn publish_both(&self, facility_id: Uuid) {
        self.notifier
            .publish(ChangeEvent::SlotsChanged { facility_id });
        self.notifier
            .publish(ChangeEvent::BookingsChanged { facility_id });
    }
}

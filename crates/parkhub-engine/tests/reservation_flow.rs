//! End-to-end reservation lifecycle tests against in-memory stores and a
//! scripted payment gateway.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parkhub_core::models::{
    Actor, Booking, BookingChannel, BookingDraft, Holder, PaymentStatus, Role, SlotLayout,
    SlotState,
};
use parkhub_core::traits::{
    BookingStore, CheckoutSession, PaymentGateway, PaymentOutcome, SlotStore,
};
use parkhub_core::AppError;
use parkhub_engine::{ChangeEvent, ChangeNotifier, EngineSettings, ReservationEngine};
use parkhub_store::{MemoryBookingStore, MemorySlotStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Gateway double: sessions are numbered, outcomes are scripted per session
#[derive(Default)]
struct MockGateway {
    counter: AtomicUsize,
    outcomes: Mutex<HashMap<String, PaymentOutcome>>,
    fail_create: AtomicBool,
}

impl MockGateway {
    fn script(&self, session_id: &str, outcome: PaymentOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(session_id.to_string(), outcome);
    }

    fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        _booking: &Booking,
        _amount: Decimal,
        _currency: &str,
    ) -> Result<CheckoutSession, AppError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::Gateway("provider unavailable".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("cs_{}", n);
        Ok(CheckoutSession {
            redirect_url: format!("https://gateway.test/checkout/{}", session_id),
            session_id,
        })
    }

    async fn fetch_outcome(&self, session_id: &str) -> Result<PaymentOutcome, AppError> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or(PaymentOutcome::Unpaid))
    }
}

struct Harness {
    engine: Arc<ReservationEngine>,
    slots: Arc<MemorySlotStore>,
    bookings: Arc<MemoryBookingStore>,
    gateway: Arc<MockGateway>,
    notifier: Arc<ChangeNotifier>,
}

fn harness() -> Harness {
    let slots = Arc::new(MemorySlotStore::new());
    let bookings = Arc::new(MemoryBookingStore::new());
    let gateway = Arc::new(MockGateway::default());
    let notifier = Arc::new(ChangeNotifier::new(256));
    let engine = Arc::new(ReservationEngine::new(
        slots.clone(),
        bookings.clone(),
        gateway.clone(),
        notifier.clone(),
        EngineSettings {
            rate_per_minute: dec!(10),
            default_hold_minutes: 15,
            currency: "NPR".to_string(),
        },
    ));
    Harness {
        engine,
        slots,
        bookings,
        gateway,
        notifier,
    }
}

fn customer() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Customer)
}

fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin)
}

fn draft_for(slot_id: Uuid, holder: Holder, channel: BookingChannel) -> BookingDraft {
    let start = Utc::now() + Duration::minutes(5);
    BookingDraft {
        slot_id,
        facility_id: Uuid::nil(), // filled in from the slot by the engine
        holder,
        start_time: start,
        end_time: start + Duration::minutes(30),
        duration_minutes: 30,
        vehicle_number: "BA-2-CHA-1234".to_string(),
        vehicle_type: "car".to_string(),
        channel,
    }
}

async fn seed_slot(h: &Harness, number: &str) -> parkhub_core::models::Slot {
    let created = h
        .engine
        .create_slots(
            Uuid::new_v4(),
            vec![(number.to_string(), SlotLayout::default())],
        )
        .await
        .unwrap();
    created.into_iter().next().unwrap()
}

#[tokio::test]
async fn concurrent_holds_admit_exactly_one_winner() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = h.engine.clone();
        let slot_id = slot.id;
        tasks.push(tokio::spawn(async move {
            let actor = customer();
            engine.hold_slot(&actor, slot_id, None).await
        }));
    }

    let mut wins = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);

    let slot = h.engine.get_slot(slot.id).await.unwrap();
    assert!(slot.state.is_held());
}

#[tokio::test]
async fn concurrent_online_bookings_admit_exactly_one() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = h.engine.clone();
        let slot_id = slot.id;
        tasks.push(tokio::spawn(async move {
            let actor = customer();
            engine
                .create_online_booking(
                    &actor,
                    draft_for(slot_id, Holder::User(actor.id), BookingChannel::Online),
                )
                .await
        }));
    }

    let mut wins = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);

    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_held());
    let pending: Vec<_> = h
        .bookings
        .list_by_facility(slot.facility_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.payment_status == PaymentStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn online_booking_confirms_and_occupies() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let actor = customer();

    let (booking, session) = h
        .engine
        .create_online_booking(&actor, draft_for(slot.id, Holder::User(actor.id), BookingChannel::Online))
        .await
        .unwrap();

    // 30 minutes at rate 10
    assert_eq!(booking.amount, dec!(300));
    assert_eq!(booking.payment_status, PaymentStatus::Pending);
    assert!(session.redirect_url.contains(&session.session_id));
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_held_by(actor.id));

    h.gateway.script(
        &session.session_id,
        PaymentOutcome::Paid {
            payment_ref: "txn_1".to_string(),
        },
    );
    let confirmed = h
        .engine
        .resolve_payment(booking.id, &session.session_id)
        .await
        .unwrap();

    assert_eq!(confirmed.payment_status, PaymentStatus::Success);
    assert_eq!(confirmed.payment_ref.as_deref(), Some("txn_1"));
    assert_eq!(
        confirmed.qr_payload.as_deref(),
        Some(format!("booking:{}", booking.id).as_str())
    );
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_occupied());
}

#[tokio::test]
async fn duplicate_confirmation_is_idempotent() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let actor = customer();

    let (booking, session) = h
        .engine
        .create_online_booking(&actor, draft_for(slot.id, Holder::User(actor.id), BookingChannel::Online))
        .await
        .unwrap();
    h.gateway.script(
        &session.session_id,
        PaymentOutcome::Paid {
            payment_ref: "txn_1".to_string(),
        },
    );

    // Webhook and redirect legs both land
    let first = h
        .engine
        .resolve_payment(booking.id, &session.session_id)
        .await
        .unwrap();
    let second = h
        .engine
        .resolve_payment(booking.id, &session.session_id)
        .await
        .unwrap();

    assert_eq!(first.payment_status, PaymentStatus::Success);
    assert_eq!(second.payment_ref, first.payment_ref);
    assert_eq!(second.updated_at, first.updated_at);
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_occupied());
}

#[tokio::test]
async fn unpaid_resolution_frees_the_slot() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let actor = customer();

    let (booking, session) = h
        .engine
        .create_online_booking(&actor, draft_for(slot.id, Holder::User(actor.id), BookingChannel::Online))
        .await
        .unwrap();
    // No script: the gateway reports the session unpaid

    let failed = h
        .engine
        .resolve_payment(booking.id, &session.session_id)
        .await
        .unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_free());

    // Capacity is usable again
    assert!(h.engine.hold_slot(&customer(), slot.id, None).await.is_ok());
}

#[tokio::test]
async fn gateway_failure_rolls_back_hold_and_booking() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let actor = customer();
    h.gateway.fail_next_create();

    let result = h
        .engine
        .create_online_booking(&actor, draft_for(slot.id, Holder::User(actor.id), BookingChannel::Online))
        .await;
    assert!(matches!(result, Err(AppError::Gateway(_))));
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_free());
    assert!(h
        .bookings
        .find_pending_by_slot(slot.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn late_payment_for_a_lost_slot_fails_the_booking() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;

    let first = customer();
    let (b1, s1) = h
        .engine
        .create_online_booking(&first, draft_for(slot.id, Holder::User(first.id), BookingChannel::Online))
        .await
        .unwrap();

    // The hold is unlocked while the first payment is still in flight, and
    // another customer books and pays the slot
    h.engine.release_slot(&admin(), slot.id).await.unwrap();
    let second = customer();
    let (b2, s2) = h
        .engine
        .create_online_booking(&second, draft_for(slot.id, Holder::User(second.id), BookingChannel::Online))
        .await
        .unwrap();
    h.gateway.script(
        &s2.session_id,
        PaymentOutcome::Paid {
            payment_ref: "txn_2".to_string(),
        },
    );
    h.engine
        .resolve_payment(b2.id, &s2.session_id)
        .await
        .unwrap();

    // The first payment lands late; the slot has moved on, so the first
    // booking must fail rather than go paid without a slot
    h.gateway.script(
        &s1.session_id,
        PaymentOutcome::Paid {
            payment_ref: "txn_1".to_string(),
        },
    );
    assert!(matches!(
        h.engine.resolve_payment(b1.id, &s1.session_id).await,
        Err(AppError::SlotUnavailable(_))
    ));

    assert_eq!(
        h.engine.get_booking(b1.id).await.unwrap().payment_status,
        PaymentStatus::Failed
    );
    assert!(matches!(
        h.engine.get_slot(slot.id).await.unwrap().state,
        SlotState::Occupied { booking_id } if booking_id == b2.id
    ));
}

#[tokio::test]
async fn abandon_does_not_release_a_foreign_hold() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;

    let first = customer();
    let (b1, _s1) = h
        .engine
        .create_online_booking(&first, draft_for(slot.id, Holder::User(first.id), BookingChannel::Online))
        .await
        .unwrap();

    // The hold is unlocked and re-taken before the first customer backs out
    h.engine.release_slot(&admin(), slot.id).await.unwrap();
    let second = customer();
    h.engine.hold_slot(&second, slot.id, None).await.unwrap();

    let abandoned = h.engine.abandon_payment(b1.id).await.unwrap();
    assert_eq!(abandoned.payment_status, PaymentStatus::Failed);
    assert!(h
        .engine
        .get_slot(slot.id)
        .await
        .unwrap()
        .state
        .is_held_by(second.id));
}

#[tokio::test]
async fn sweep_reclaims_lapsed_holds_and_fails_pending_bookings() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let actor = customer();

    // Fabricate a hold taken long ago, with its pending booking
    let past = Utc::now() - Duration::minutes(45);
    h.slots
        .hold_for_checkout(slot.id, &actor, 15, past)
        .await
        .unwrap();
    let mut draft = draft_for(slot.id, Holder::User(actor.id), BookingChannel::Online);
    draft.facility_id = slot.facility_id;
    let booking = h
        .bookings
        .create_pending(draft, dec!(300), past)
        .await
        .unwrap();

    let report = h.engine.sweep_expired().await.unwrap();
    assert_eq!(report.freed_slots, 1);
    assert_eq!(report.failed_bookings, 1);

    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_free());
    assert_eq!(
        h.engine.get_booking(booking.id).await.unwrap().payment_status,
        PaymentStatus::Failed
    );

    // A second pass finds nothing
    let report = h.engine.sweep_expired().await.unwrap();
    assert_eq!(report.freed_slots, 0);
}

#[tokio::test]
async fn live_holds_survive_the_sweep() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let actor = customer();
    h.engine.hold_slot(&actor, slot.id, None).await.unwrap();

    let report = h.engine.sweep_expired().await.unwrap();
    assert_eq!(report.freed_slots, 0);
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_held());
}

#[tokio::test]
async fn offline_booking_occupies_immediately() {
    let h = harness();
    let slot = seed_slot(&h, "S102").await;

    let booking = h
        .engine
        .create_offline_booking(&admin(), draft_for(
            slot.id,
            Holder::Guest("Ram Thapa".to_string()),
            BookingChannel::Offline,
        ))
        .await
        .unwrap();

    assert_eq!(booking.payment_status, PaymentStatus::Success);
    assert_eq!(booking.channel, BookingChannel::Offline);
    assert_eq!(
        booking.qr_payload.as_deref(),
        Some(format!("booking:{}", booking.id).as_str())
    );
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_occupied());

    // The slot is gone from the pool
    assert!(matches!(
        h.engine
            .create_offline_booking(&admin(), draft_for(
                slot.id,
                Holder::Guest("Sita Rai".to_string()),
                BookingChannel::Offline,
            ))
            .await,
        Err(AppError::SlotUnavailable(_))
    ));
}

#[tokio::test]
async fn cancellation_frees_capacity() {
    let h = harness();
    let slot = seed_slot(&h, "S102").await;
    let booking = h
        .engine
        .create_offline_booking(&admin(), draft_for(
            slot.id,
            Holder::Guest("Ram Thapa".to_string()),
            BookingChannel::Offline,
        ))
        .await
        .unwrap();

    let cancelled = h.engine.cancel_booking(&admin(), booking.id).await.unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_free());

    // The freed slot is immediately bookable again
    assert!(h
        .engine
        .create_offline_booking(&admin(), draft_for(
            slot.id,
            Holder::Guest("Sita Rai".to_string()),
            BookingChannel::Offline,
        ))
        .await
        .is_ok());
}

#[tokio::test]
async fn delete_booking_frees_its_slot() {
    let h = harness();
    let slot = seed_slot(&h, "S102").await;
    let booking = h
        .engine
        .create_offline_booking(&admin(), draft_for(
            slot.id,
            Holder::Guest("Ram Thapa".to_string()),
            BookingChannel::Offline,
        ))
        .await
        .unwrap();

    h.engine.delete_booking(booking.id).await.unwrap();
    assert!(matches!(
        h.engine.get_booking(booking.id).await,
        Err(AppError::BookingNotFound(_))
    ));
    assert!(h.engine.get_slot(slot.id).await.unwrap().state.is_free());
}

#[tokio::test]
async fn scan_ticket_validates_paid_bookings() {
    let h = harness();
    let slot = seed_slot(&h, "S102").await;
    let booking = h
        .engine
        .create_offline_booking(&admin(), draft_for(
            slot.id,
            Holder::Guest("Ram Thapa".to_string()),
            BookingChannel::Offline,
        ))
        .await
        .unwrap();

    let payload = booking.qr_payload.clone().unwrap();
    let (scanned, valid) = h.engine.scan_ticket(&payload).await.unwrap();
    assert_eq!(scanned.id, booking.id);
    assert!(valid);

    // Cancelled tickets scan but are invalid
    h.engine.cancel_booking(&admin(), booking.id).await.unwrap();
    let (_, valid) = h.engine.scan_ticket(&payload).await.unwrap();
    assert!(!valid);

    assert!(h.engine.scan_ticket("garbage").await.is_err());
}

#[tokio::test]
async fn mutations_publish_change_events() {
    let h = harness();
    let mut rx = h.notifier.subscribe();
    let slot = seed_slot(&h, "S101").await;

    assert_eq!(
        rx.recv().await.unwrap(),
        ChangeEvent::SlotsChanged {
            facility_id: slot.facility_id
        }
    );

    let actor = customer();
    h.engine.hold_slot(&actor, slot.id, None).await.unwrap();
    assert_eq!(
        rx.recv().await.unwrap(),
        ChangeEvent::SlotsChanged {
            facility_id: slot.facility_id
        }
    );
}

#[tokio::test]
async fn customers_cannot_release_foreign_holds() {
    let h = harness();
    let slot = seed_slot(&h, "S101").await;
    let owner = customer();
    h.engine.hold_slot(&owner, slot.id, None).await.unwrap();

    assert!(matches!(
        h.engine.release_slot(&customer(), slot.id).await,
        Err(AppError::OwnershipMismatch)
    ));

    // An admin unlock clears any hold
    let released = h.engine.release_slot(&admin(), slot.id).await.unwrap();
    assert!(released.state.is_free());
}

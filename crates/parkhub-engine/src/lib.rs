//! Parkhub Reservation Engine
//!
//! The engine owns every reservation lifecycle transition:
//!
//! - Checkout holds and releases on slots
//! - Online bookings through the hosted payment gateway
//! - Offline bookings confirmed at the counter
//! - The idempotent payment confirmation funnel (webhook and redirect)
//! - Cancellation, deletion, and the expiry sweep
//!
//! Mutations publish change events through the notifier; failures to notify
//! never fail the mutation.

pub mod engine;
pub mod gateway;
pub mod notifier;
pub mod sweeper;

pub use engine::{EngineSettings, ReservationEngine};
pub use gateway::{verify_signature, RestCheckoutGateway, WebhookEvent};
pub use notifier::{ChangeEvent, ChangeNotifier};
pub use sweeper::spawn_sweeper;

// Re-export commonly used types
pub use parkhub_core::{AppError, AppResult};

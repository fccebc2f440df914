//! API layer for Parkhub
//!
//! HTTP handlers for slot administration, holds, bookings, the payment
//! funnel, and the live-update WebSocket.

#![forbid(unsafe_code)]

pub mod actor;
pub mod dto;
pub mod handlers;

pub use actor::{AuthenticatedActor, PrivilegedActor};
pub use dto::ApiResponse;
pub use handlers::{configure_bookings, configure_slots, ws_handler};

//! HTTP request handlers

pub mod bookings;
pub mod slots;
pub mod ws;

pub use bookings::configure as configure_bookings;
pub use slots::configure as configure_slots;
pub use ws::ws_handler;

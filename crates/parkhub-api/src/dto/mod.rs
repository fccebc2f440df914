//! Request and response DTOs

pub mod bookings;
pub mod common;
pub mod slots;

pub use common::ApiResponse;

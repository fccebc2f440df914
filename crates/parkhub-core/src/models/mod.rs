//! Domain models for the Parkhub reservation system

pub mod actor;
pub mod booking;
pub mod slot;

pub use actor::{Actor, Role};
pub use booking::{
    parse_qr_payload, qr_payload_for, Booking, BookingChannel, BookingDraft, BookingOutcome,
    Holder, PaymentStatus,
};
pub use slot::{Slot, SlotLayout, SlotSnapshot, SlotState};

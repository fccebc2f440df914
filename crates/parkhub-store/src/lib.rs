//! Parkhub Store Layer
//!
//! In-memory implementations of the slot and booking stores, backed by
//! sharded concurrent maps. Every conditional transition checks and writes
//! while holding the map entry guard, which gives per-entity linearizable
//! semantics without an external database.
//!
//! No await point ever runs while an entry guard is held.

pub mod booking_store;
pub mod slot_store;

pub use booking_store::MemoryBookingStore;
pub use slot_store::MemorySlotStore;

// Re-export commonly used types
pub use parkhub_core::{AppError, AppResult};

//! Slot entity and reservation state machine
//!
//! A slot is in exactly one of three states: Free, Held (soft-locked during
//! checkout, with a deadline), or Occupied (backed by one active booking).
//! The tagged enum makes invalid flag combinations unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservation state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotState {
    /// Slot is open for holding
    #[default]
    Free,
    /// Slot is soft-locked by an actor during checkout
    Held {
        /// Actor holding the slot
        by: Uuid,
        /// When the hold was taken
        locked_at: DateTime<Utc>,
        /// When the hold lapses
        expires_at: DateTime<Utc>,
    },
    /// Slot is backed by an active booking
    Occupied {
        /// The booking occupying this slot
        booking_id: Uuid,
    },
}

impl SlotState {
    /// Check whether the state is Free
    pub fn is_free(&self) -> bool {
        matches!(self, SlotState::Free)
    }

    /// Check whether the state is Held, regardless of holder
    pub fn is_held(&self) -> bool {
        matches!(self, SlotState::Held { .. })
    }

    /// Check whether the state is Held by the given actor
    pub fn is_held_by(&self, actor_id: Uuid) -> bool {
        matches!(self, SlotState::Held { by, .. } if *by == actor_id)
    }

    /// Check whether the state is Occupied
    pub fn is_occupied(&self) -> bool {
        matches!(self, SlotState::Occupied { .. })
    }
}

/// A physical parking slot within a facility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    /// Unique identifier
    pub id: Uuid,

    /// Facility this slot belongs to
    pub facility_id: Uuid,

    /// Slot number, unique within the facility
    pub slot_number: String,

    /// Current reservation state
    pub state: SlotState,

    /// Whether only privileged actors may reserve this slot
    pub admin_only: bool,

    /// Cosmetic layout coordinate
    pub x: i32,

    /// Cosmetic layout coordinate
    pub y: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Slot {
    /// Create a new free slot
    pub fn new(facility_id: Uuid, slot_number: impl Into<String>, layout: SlotLayout) -> Self {
        Self {
            id: Uuid::new_v4(),
            facility_id,
            slot_number: slot_number.into(),
            state: SlotState::Free,
            admin_only: layout.admin_only,
            x: layout.x,
            y: layout.y,
            created_at: Utc::now(),
        }
    }

    /// Wire snapshot of this slot
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            id: self.id,
            facility_id: self.facility_id,
            slot_number: self.slot_number.clone(),
            state: self.state,
            is_available: self.state.is_free(),
            is_locked: self.state.is_held(),
            admin_only: self.admin_only,
            x: self.x,
            y: self.y,
        }
    }
}

/// Layout attributes supplied at slot creation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SlotLayout {
    /// Layout coordinate
    #[serde(default)]
    pub x: i32,
    /// Layout coordinate
    #[serde(default)]
    pub y: i32,
    /// Reserve this slot for privileged actors
    #[serde(default)]
    pub admin_only: bool,
}

/// Published view of a slot
///
/// Carries the tagged state plus the derived availability booleans older
/// observers key off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub slot_number: String,
    #[serde(flatten)]
    pub state: SlotState,
    pub is_available: bool,
    pub is_locked: bool,
    pub admin_only: bool,
    pub x: i32,
    pub y: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        let actor = Uuid::new_v4();
        let now = Utc::now();

        assert!(SlotState::Free.is_free());

        let held = SlotState::Held {
            by: actor,
            locked_at: now,
            expires_at: now + chrono::Duration::minutes(15),
        };
        assert!(held.is_held());
        assert!(held.is_held_by(actor));
        assert!(!held.is_held_by(Uuid::new_v4()));

        let occupied = SlotState::Occupied {
            booking_id: Uuid::new_v4(),
        };
        assert!(occupied.is_occupied());
        assert!(!occupied.is_free());
    }

    #[test]
    fn test_snapshot_derives_flags() {
        let mut slot = Slot::new(Uuid::new_v4(), "S101", SlotLayout::default());

        let snap = slot.snapshot();
        assert!(snap.is_available);
        assert!(!snap.is_locked);

        slot.state = SlotState::Held {
            by: Uuid::new_v4(),
            locked_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        };
        let snap = slot.snapshot();
        assert!(!snap.is_available);
        assert!(snap.is_locked);

        slot.state = SlotState::Occupied {
            booking_id: Uuid::new_v4(),
        };
        let snap = slot.snapshot();
        assert!(!snap.is_available);
        assert!(!snap.is_locked);
    }

    #[test]
    fn test_state_serialization_tag() {
        let json = serde_json::to_string(&SlotState::Free).unwrap();
        assert!(json.contains("\"status\":\"free\""));

        let json = serde_json::to_string(&SlotState::Occupied {
            booking_id: Uuid::new_v4(),
        })
        .unwrap();
        assert!(json.contains("\"status\":\"occupied\""));
    }
}

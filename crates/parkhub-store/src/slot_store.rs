//! In-memory slot store
//!
//! Slot transitions are guarded by the dashmap entry lock: the state check
//! and the write happen under the same guard, so two concurrent holds on the
//! same slot serialize and exactly one wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parkhub_core::models::{Actor, Slot, SlotState};
use parkhub_core::traits::SlotStore;
use parkhub_core::{expiry, AppError};
use tracing::debug;
use uuid::Uuid;

/// Slot store backed by a sharded concurrent map
#[derive(Default)]
pub struct MemorySlotStore {
    slots: DashMap<Uuid, Slot>,
    /// (facility, slot number) -> slot id, for the uniqueness constraint
    numbers: DashMap<(Uuid, String), Uuid>,
}

impl MemorySlotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn insert(&self, slot: Slot) -> Result<Slot, AppError> {
        let key = (slot.facility_id, slot.slot_number.clone());
        match self.numbers.entry(key) {
            Entry::Occupied(_) => Err(AppError::AlreadyExists(format!(
                "slot {} already exists in facility",
                slot.slot_number
            ))),
            Entry::Vacant(e) => {
                e.insert(slot.id);
                self.slots.insert(slot.id, slot.clone());
                debug!(slot_id = %slot.id, slot_number = %slot.slot_number, "slot created");
                Ok(slot)
            }
        }
    }

    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>, AppError> {
        Ok(self.slots.get(&slot_id).map(|s| s.clone()))
    }

    async fn list_by_facility(&self, facility_id: Uuid) -> Result<Vec<Slot>, AppError> {
        let mut slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|s| s.facility_id == facility_id)
            .map(|s| s.clone())
            .collect();
        slots.sort_by(|a, b| a.slot_number.cmp(&b.slot_number));
        Ok(slots)
    }

    async fn try_hold(
        &self,
        slot_id: Uuid,
        actor: &Actor,
        hold_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Slot, AppError> {
        let minutes = expiry::validate_hold_minutes(hold_minutes)?;
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(AppError::SlotNotFound(slot_id))?;
        if slot.admin_only && !actor.is_privileged() {
            return Err(AppError::Forbidden(
                "slot is reserved for admin use".to_string(),
            ));
        }
        let takeable = match slot.state {
            SlotState::Free => true,
            // A lapsed hold is reclaimed lazily here, ahead of the sweeper
            SlotState::Held { expires_at, .. } => expiry::is_expired(expires_at, now),
            SlotState::Occupied { .. } => false,
        };
        if !takeable {
            return Err(AppError::SlotUnavailable(slot_id));
        }
        slot.state = SlotState::Held {
            by: actor.id,
            locked_at: now,
            expires_at: expiry::hold_deadline(now, minutes),
        };
        debug!(slot_id = %slot_id, actor_id = %actor.id, "slot held");
        Ok(slot.clone())
    }

    async fn hold_for_checkout(
        &self,
        slot_id: Uuid,
        actor: &Actor,
        hold_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Slot, AppError> {
        let minutes = expiry::validate_hold_minutes(hold_minutes)?;
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(AppError::SlotNotFound(slot_id))?;
        if slot.admin_only && !actor.is_privileged() {
            return Err(AppError::Forbidden(
                "slot is reserved for admin use".to_string(),
            ));
        }
        let takeable = match slot.state {
            SlotState::Free => true,
            SlotState::Held { by, expires_at, .. } => {
                by == actor.id || expiry::is_expired(expires_at, now)
            }
            SlotState::Occupied { .. } => false,
        };
        if !takeable {
            return Err(AppError::SlotUnavailable(slot_id));
        }
        slot.state = SlotState::Held {
            by: actor.id,
            locked_at: now,
            expires_at: expiry::hold_deadline(now, minutes),
        };
        Ok(slot.clone())
    }

    async fn release(
        &self,
        slot_id: Uuid,
        expected_holder: Option<Uuid>,
    ) -> Result<Slot, AppError> {
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(AppError::SlotNotFound(slot_id))?;
        match slot.state {
            SlotState::Held { by, .. } => {
                if let Some(holder) = expected_holder {
                    if holder != by {
                        return Err(AppError::OwnershipMismatch);
                    }
                }
                slot.state = SlotState::Free;
                debug!(slot_id = %slot_id, "hold released");
                Ok(slot.clone())
            }
            _ => Err(AppError::NotLocked(slot_id)),
        }
    }

    async fn occupy(
        &self,
        slot_id: Uuid,
        booking_id: Uuid,
        expected_holder: Option<Uuid>,
    ) -> Result<Slot, AppError> {
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(AppError::SlotNotFound(slot_id))?;
        let claimable = match slot.state {
            // Free is accepted so a payment that lands after the hold was
            // swept still claims the slot if nobody else took it.
            SlotState::Free => true,
            SlotState::Held { by, .. } => expected_holder == Some(by),
            SlotState::Occupied { booking_id: current } => {
                return if current == booking_id {
                    Ok(slot.clone())
                } else {
                    Err(AppError::SlotUnavailable(slot_id))
                };
            }
        };
        if !claimable {
            return Err(AppError::SlotUnavailable(slot_id));
        }
        slot.state = SlotState::Occupied { booking_id };
        debug!(slot_id = %slot_id, booking_id = %booking_id, "slot occupied");
        Ok(slot.clone())
    }

    async fn free(&self, slot_id: Uuid) -> Result<Slot, AppError> {
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(AppError::SlotNotFound(slot_id))?;
        slot.state = SlotState::Free;
        Ok(slot.clone())
    }

    async fn free_if_owned(
        &self,
        slot_id: Uuid,
        booking_id: Uuid,
        holder: Option<Uuid>,
    ) -> Result<Option<Slot>, AppError> {
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(AppError::SlotNotFound(slot_id))?;
        let ours = match slot.state {
            SlotState::Occupied { booking_id: current } => current == booking_id,
            SlotState::Held { by, .. } => holder == Some(by),
            SlotState::Free => false,
        };
        if !ours {
            return Ok(None);
        }
        slot.state = SlotState::Free;
        debug!(slot_id = %slot_id, booking_id = %booking_id, "slot reclaimed");
        Ok(Some(slot.clone()))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Slot>, AppError> {
        let mut freed = Vec::new();
        for mut slot in self.slots.iter_mut() {
            if let SlotState::Held { expires_at, .. } = slot.state {
                if expiry::is_expired(expires_at, now) {
                    slot.state = SlotState::Free;
                    freed.push(slot.clone());
                }
            }
        }
        if !freed.is_empty() {
            debug!(count = freed.len(), "expired holds swept");
        }
        Ok(freed)
    }

    async fn delete(&self, slot_id: Uuid) -> Result<Slot, AppError> {
        match self.slots.entry(slot_id) {
            Entry::Occupied(e) => {
                if !e.get().state.is_free() {
                    return Err(AppError::Conflict(
                        "cannot delete a held or occupied slot".to_string(),
                    ));
                }
                let slot = e.remove();
                self.numbers
                    .remove(&(slot.facility_id, slot.slot_number.clone()));
                Ok(slot)
            }
            Entry::Vacant(_) => Err(AppError::SlotNotFound(slot_id)),
        }
    }

    async fn delete_bulk(&self, slot_ids: &[Uuid]) -> Result<usize, AppError> {
        // Reject the whole batch up front if any slot is in use; each removal
        // below still re-checks under its own entry guard.
        for id in slot_ids {
            let slot = self.slots.get(id).ok_or(AppError::SlotNotFound(*id))?;
            if !slot.state.is_free() {
                return Err(AppError::Conflict(
                    "cannot delete held or occupied slots".to_string(),
                ));
            }
        }
        let mut deleted = 0;
        for id in slot_ids {
            if self.delete(*id).await.is_ok() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

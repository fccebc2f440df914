//! Slot DTOs

use parkhub_core::models::SlotLayout;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One slot to create
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSlotRequest {
    /// Display number, unique within the facility
    #[validate(length(min = 1, max = 16))]
    pub slot_number: String,
    /// Layout coordinate
    #[serde(default)]
    pub x: i32,
    /// Layout coordinate
    #[serde(default)]
    pub y: i32,
    /// Reserve for privileged actors
    #[serde(default)]
    pub admin_only: bool,
}

impl NewSlotRequest {
    /// The layout attributes of this request
    pub fn layout(&self) -> SlotLayout {
        SlotLayout {
            x: self.x,
            y: self.y,
            admin_only: self.admin_only,
        }
    }
}

/// Bulk slot creation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSlotsRequest {
    /// Slots to create
    #[validate(length(min = 1, max = 500), nested)]
    pub slots: Vec<NewSlotRequest>,
}

/// Bulk slot deletion
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeleteSlotsRequest {
    /// Slots to delete; the batch is rejected if any is in use
    #[validate(length(min = 1))]
    pub slot_ids: Vec<Uuid>,
}

/// Optional hold parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HoldRequest {
    /// Hold duration in minutes; server default when omitted
    pub hold_minutes: Option<i64>,
}

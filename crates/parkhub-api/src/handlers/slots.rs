//! Slot handlers
//!
//! Facility slot administration plus the hold/release surface customers use
//! during checkout.

use crate::actor::{AuthenticatedActor, PrivilegedActor};
use crate::dto::slots::{CreateSlotsRequest, DeleteSlotsRequest, HoldRequest};
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use parkhub_core::models::SlotSnapshot;
use parkhub_core::AppError;
use parkhub_engine::ReservationEngine;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// List all slots of a facility
///
/// GET /api/v1/facilities/{facility_id}/slots
#[instrument(skip(engine))]
pub async fn list_slots(
    engine: web::Data<ReservationEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let facility_id = path.into_inner();
    let slots = engine.list_slots(facility_id).await?;
    let snapshots: Vec<SlotSnapshot> = slots.iter().map(|s| s.snapshot()).collect();
    debug!(facility_id = %facility_id, count = snapshots.len(), "slots listed");
    Ok(HttpResponse::Ok().json(ApiResponse::success(snapshots)))
}

/// Create slots in a facility
///
/// POST /api/v1/facilities/{facility_id}/slots
#[instrument(skip(engine, _admin, req))]
pub async fn create_slots(
    engine: web::Data<ReservationEngine>,
    path: web::Path<Uuid>,
    _admin: PrivilegedActor,
    req: web::Json<CreateSlotsRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("slot creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let facility_id = path.into_inner();
    let specs = req
        .into_inner()
        .slots
        .into_iter()
        .map(|s| (s.slot_number.clone(), s.layout()))
        .collect();
    let created = engine.create_slots(facility_id, specs).await?;
    let snapshots: Vec<SlotSnapshot> = created.iter().map(|s| s.snapshot()).collect();
    Ok(HttpResponse::Created().json(ApiResponse::success(snapshots)))
}

/// Fetch a single slot
///
/// GET /api/v1/slots/{id}
#[instrument(skip(engine))]
pub async fn get_slot(
    engine: web::Data<ReservationEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let slot = engine.get_slot(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(slot.snapshot())))
}

/// Delete free slots in bulk
///
/// DELETE /api/v1/slots
#[instrument(skip(engine, _admin, req))]
pub async fn delete_slots(
    engine: web::Data<ReservationEngine>,
    _admin: PrivilegedActor,
    req: web::Json<DeleteSlotsRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let deleted = engine.delete_slots(&req.slot_ids).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        serde_json::json!({ "deleted": deleted }),
        "slots deleted",
    )))
}

/// Take a checkout hold on a slot
///
/// POST /api/v1/slots/{id}/hold
#[instrument(skip(engine, actor, req), fields(actor_id = %actor.0.id))]
pub async fn hold_slot(
    engine: web::Data<ReservationEngine>,
    actor: AuthenticatedActor,
    path: web::Path<Uuid>,
    req: Option<web::Json<HoldRequest>>,
) -> Result<HttpResponse, AppError> {
    let minutes = req.and_then(|r| r.hold_minutes);
    let slot = engine
        .hold_slot(&actor.0, path.into_inner(), minutes)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(slot.snapshot())))
}

/// Release a checkout hold
///
/// POST /api/v1/slots/{id}/release
#[instrument(skip(engine, actor), fields(actor_id = %actor.0.id))]
pub async fn release_slot(
    engine: web::Data<ReservationEngine>,
    actor: AuthenticatedActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let slot = engine.release_slot(&actor.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(slot.snapshot())))
}

/// Register slot routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/facilities/{facility_id}/slots")
            .route("", web::get().to(list_slots))
            .route("", web::post().to(create_slots)),
    );
    cfg.service(
        web::scope("/slots")
            .route("", web::delete().to(delete_slots))
            .route("/{id}", web::get().to(get_slot))
            .route("/{id}/hold", web::post().to(hold_slot))
            .route("/{id}/release", web::post().to(release_slot)),
    );
}

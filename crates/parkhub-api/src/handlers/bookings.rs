//! Booking handlers
//!
//! Booking creation, the payment funnel (webhook plus redirect legs),
//! cancellation, and the admin surface.

use crate::actor::{AuthenticatedActor, PrivilegedActor};
use crate::dto::bookings::{
    BookingResponse, CheckoutResponse, CreateBookingRequest, FineRequest, OfflineBookingRequest,
    PaymentFailedQuery, ScanRequest, ScanResponse, VerifyPaymentQuery,
};
use crate::dto::ApiResponse;
use actix_web::{web, HttpRequest, HttpResponse};
use parkhub_core::models::PaymentStatus;
use parkhub_core::{AppConfig, AppError};
use parkhub_engine::{verify_signature, ReservationEngine, WebhookEvent};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Signature header on gateway webhooks
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Start an online booking and open a checkout session
///
/// POST /api/v1/bookings
#[instrument(skip(engine, actor, req), fields(actor_id = %actor.0.id))]
pub async fn create_booking(
    engine: web::Data<ReservationEngine>,
    actor: AuthenticatedActor,
    req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("booking validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let draft = req.into_inner().into_draft(actor.0.id);
    let (booking, session) = engine.create_online_booking(&actor.0, draft).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(CheckoutResponse {
        booking: booking.into(),
        session_id: session.session_id,
        redirect_url: session.redirect_url,
    })))
}

/// Record an offline booking confirmed at the counter
///
/// POST /api/v1/bookings/offline
#[instrument(skip(engine, admin, req))]
pub async fn create_offline_booking(
    engine: web::Data<ReservationEngine>,
    admin: PrivilegedActor,
    req: web::Json<OfflineBookingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let booking = engine
        .create_offline_booking(&admin.0, req.into_inner().into_draft())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(BookingResponse::from(booking))))
}

fn redirect_to(url: &str, booking_id: Uuid) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", format!("{}?booking_id={}", url, booking_id)))
        .finish()
}

/// Success redirect leg of the payment funnel. The customer lands here from
/// the gateway; the session state is re-checked rather than trusted, then
/// the browser is sent to the frontend result page.
///
/// GET /api/v1/bookings/verify-payment
#[instrument(skip(engine, config, query))]
pub async fn verify_payment(
    engine: web::Data<ReservationEngine>,
    config: web::Data<AppConfig>,
    query: web::Query<VerifyPaymentQuery>,
) -> Result<HttpResponse, AppError> {
    let q = query.into_inner();
    match engine.resolve_payment(q.booking_id, &q.session_id).await {
        Ok(booking) if booking.payment_status == PaymentStatus::Success => {
            Ok(redirect_to(&config.gateway.success_redirect, q.booking_id))
        }
        Ok(_) => Ok(redirect_to(&config.gateway.failure_redirect, q.booking_id)),
        Err(e) => {
            warn!(booking_id = %q.booking_id, error = %e, "verify leg failed");
            Ok(redirect_to(&config.gateway.failure_redirect, q.booking_id))
        }
    }
}

/// Failure redirect leg: the customer backed out at the gateway
///
/// GET /api/v1/bookings/payment-failed
#[instrument(skip(engine, config, query))]
pub async fn payment_failed(
    engine: web::Data<ReservationEngine>,
    config: web::Data<AppConfig>,
    query: web::Query<PaymentFailedQuery>,
) -> Result<HttpResponse, AppError> {
    let q = query.into_inner();
    if let Err(e) = engine.abandon_payment(q.booking_id).await {
        warn!(booking_id = %q.booking_id, error = %e, "abandon leg failed");
    }
    Ok(redirect_to(&config.gateway.failure_redirect, q.booking_id))
}

/// Gateway webhook. The signature is verified over the raw body before
/// anything is parsed; once it checks out the response is always
/// `{"received": true}` so the gateway stops retrying, even if the event
/// could not be applied.
///
/// POST /api/v1/bookings/webhook
#[instrument(skip_all)]
pub async fn webhook(
    engine: web::Data<ReservationEngine>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::SignatureInvalid("missing signature header".to_string()))?;
    verify_signature(&config.gateway.webhook_secret, &body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook body: {}", e)))?;
    debug!(event_type = %event.event_type, booking_id = %event.booking_id, "webhook received");

    // Only explicitly terminal kinds fail a booking; anything else the
    // gateway may add later is acknowledged and ignored.
    let result = if event.is_completed() {
        Some(
            engine
                .resolve_payment(event.booking_id, &event.session_id)
                .await,
        )
    } else if event.is_terminated() {
        Some(engine.abandon_payment(event.booking_id).await)
    } else {
        debug!(event_type = %event.event_type, "unhandled webhook event kind");
        None
    };
    if let Some(Err(e)) = result {
        // Acknowledge anyway; the redirect leg or the sweeper settles it
        warn!(booking_id = %event.booking_id, error = %e, "webhook event not applied");
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}

/// Fetch a booking
///
/// GET /api/v1/bookings/{id}
#[instrument(skip(engine))]
pub async fn get_booking(
    engine: web::Data<ReservationEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let booking = engine.get_booking(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// Cancel a booking; holder or admin only
///
/// POST /api/v1/bookings/{id}/cancel
#[instrument(skip(engine, actor), fields(actor_id = %actor.0.id))]
pub async fn cancel_booking(
    engine: web::Data<ReservationEngine>,
    actor: AuthenticatedActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let booking = engine.cancel_booking(&actor.0, path.into_inner()).await?;
    info!(booking_id = %booking.id, "booking cancelled via api");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        "booking cancelled",
    )))
}

/// Remove a booking record, freeing its slot
///
/// DELETE /api/v1/bookings/{id}
#[instrument(skip(engine, _admin))]
pub async fn delete_booking(
    engine: web::Data<ReservationEngine>,
    _admin: PrivilegedActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    engine.delete_booking(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Record a fine on a booking
///
/// PATCH /api/v1/bookings/{id}/fine
#[instrument(skip(engine, _admin, req))]
pub async fn set_fine(
    engine: web::Data<ReservationEngine>,
    _admin: PrivilegedActor,
    path: web::Path<Uuid>,
    req: web::Json<FineRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let amount = Decimal::from_f64_retain(req.amount)
        .ok_or_else(|| AppError::Validation(format!("invalid fine amount: {}", req.amount)))?;
    let booking = engine.set_fine(path.into_inner(), amount).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// Run the expiry sweep on demand
///
/// POST /api/v1/bookings/sweep
#[instrument(skip(engine, _admin))]
pub async fn sweep(
    engine: web::Data<ReservationEngine>,
    _admin: PrivilegedActor,
) -> Result<HttpResponse, AppError> {
    let report = engine.sweep_expired().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

/// The acting user's bookings
///
/// GET /api/v1/bookings/mine
#[instrument(skip(engine, actor), fields(actor_id = %actor.0.id))]
pub async fn my_bookings(
    engine: web::Data<ReservationEngine>,
    actor: AuthenticatedActor,
) -> Result<HttpResponse, AppError> {
    let bookings = engine.user_bookings(actor.0.id).await?;
    let responses: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(responses)))
}

/// Validate a scanned ticket at the gate
///
/// POST /api/v1/bookings/scan
#[instrument(skip(engine, _admin, req))]
pub async fn scan_ticket(
    engine: web::Data<ReservationEngine>,
    _admin: PrivilegedActor,
    req: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let (booking, valid) = engine.scan_ticket(&req.payload).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ScanResponse {
        booking: booking.into(),
        valid,
    })))
}

/// Full booking history of a facility
///
/// GET /api/v1/facilities/{facility_id}/bookings
#[instrument(skip(engine, _admin))]
pub async fn booking_history(
    engine: web::Data<ReservationEngine>,
    _admin: PrivilegedActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let bookings = engine.booking_history(path.into_inner()).await?;
    let responses: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(responses)))
}

/// Confirmed bookings of a facility whose window is still open
///
/// GET /api/v1/facilities/{facility_id}/bookings/active
#[instrument(skip(engine))]
pub async fn active_bookings(
    engine: web::Data<ReservationEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let bookings = engine.active_bookings(path.into_inner()).await?;
    let responses: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(responses)))
}

/// Register booking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::post().to(create_booking))
            .route("/offline", web::post().to(create_offline_booking))
            .route("/verify-payment", web::get().to(verify_payment))
            .route("/payment-failed", web::get().to(payment_failed))
            .route("/webhook", web::post().to(webhook))
            .route("/sweep", web::post().to(sweep))
            .route("/mine", web::get().to(my_bookings))
            .route("/scan", web::post().to(scan_ticket))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}", web::delete().to(delete_booking))
            .route("/{id}/cancel", web::post().to(cancel_booking))
            .route("/{id}/fine", web::patch().to(set_fine)),
    );
    cfg.service(
        web::scope("/facilities/{facility_id}/bookings")
            .route("", web::get().to(booking_history))
            .route("/active", web::get().to(active_bookings)),
    );
}

//! Actor extractors
//!
//! Authentication is terminated upstream (gateway or reverse proxy); the
//! verified identity arrives on trusted headers. `X-Actor-Id` carries the
//! actor's UUID and `X-Actor-Role` its role, defaulting to customer.

use actix_web::dev::Payload;
use actix_web::error::ErrorUnauthorized;
use actix_web::{FromRequest, HttpRequest};
use parkhub_core::models::{Actor, Role};
use parkhub_core::AppError;
use std::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

/// Header carrying the verified actor id
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
/// Header carrying the verified actor role
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// Any authenticated actor
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

/// An actor with admin or superadmin role
#[derive(Debug, Clone, Copy)]
pub struct PrivilegedActor(pub Actor);

fn actor_from_headers(req: &HttpRequest) -> Result<Actor, AppError> {
    let id = req
        .headers()
        .get(ACTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("no actor identity provided".to_string()))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::Unauthorized("malformed actor id".to_string()))?;

    let role = match req
        .headers()
        .get(ACTOR_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(raw) => Role::from_str(raw)
            .ok_or_else(|| AppError::Unauthorized(format!("unknown role: {}", raw)))?,
        None => Role::Customer,
    };

    Ok(Actor::new(id, role))
}

impl FromRequest for AuthenticatedActor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            actor_from_headers(req)
                .map(AuthenticatedActor)
                .map_err(ErrorUnauthorized),
        )
    }
}

impl FromRequest for PrivilegedActor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let actor = match AuthenticatedActor::from_request(req, payload).into_inner() {
            Ok(AuthenticatedActor(actor)) => actor,
            Err(e) => return ready(Err(e)),
        };
        if !actor.is_privileged() {
            warn!(actor_id = %actor.id, role = %actor.role, "admin access denied");
            return ready(Err(ErrorUnauthorized(AppError::Forbidden(
                "admin access required".to_string(),
            ))));
        }
        ready(Ok(PrivilegedActor(actor)))
    }
}

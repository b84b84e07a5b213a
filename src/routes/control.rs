use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::Scheduler;
use crate::models::{ErrorResponse, HealthResponse, StatusResponse, TickRequest};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

/// Configure scheduler control routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/status", web::get().to(status))
        .route("/tick", web::post().to(trigger_tick));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = match state.scheduler.health().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Scheduler state, session memory window and last tick
async fn status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(StatusResponse {
        state: state.scheduler.state(),
        recent_selections: state.scheduler.recent_selections(),
        last_tick: state.scheduler.last_report(),
    })
}

/// Run one tick now
///
/// POST /api/v1/tick
///
/// Request body (optional):
/// ```json
/// { "lookaheadHours": 24 }
/// ```
///
/// Waits for any tick already in progress, then returns this tick's report.
async fn trigger_tick(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: TickRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TickRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                return HttpResponse::BadRequest().json(ErrorResponse {
                    error: "invalid_json".to_string(),
                    message: format!("Invalid JSON: {}", e),
                    status_code: 400,
                });
            }
        }
    };

    if let Err(errors) = request.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let lookahead = request
        .lookahead_hours
        .map(|hours| chrono::Duration::hours(i64::from(hours)));

    tracing::info!("Tick requested via control surface (lookahead: {:?})", lookahead);

    let report = state.scheduler.tick(lookahead, None).await;
    HttpResponse::Ok().json(report)
}

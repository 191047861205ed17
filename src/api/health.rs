//! Health check endpoints

use actix_web::{get, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::rest::ApiState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub instance_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubs: Option<usize>,
}

impl HealthResponse {
    pub fn healthy(instance_id: &str, version: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            version: version.to_string(),
            instance_id: instance_id.to_string(),
            timestamp: Utc::now(),
            uptime_seconds: None,
            hubs: None,
        }
    }

    pub fn with_uptime(mut self, uptime: f64) -> Self {
        self.uptime_seconds = Some(uptime);
        self
    }

    pub fn with_hubs(mut self, hubs: usize) -> Self {
        self.hubs = Some(hubs);
        self
    }
}

/// Process identity shared by the health endpoints
#[derive(Clone)]
pub struct AppState {
    pub instance_id: String,
    pub version: String,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        let duration = Utc::now().signed_duration_since(self.start_time);
        duration.num_milliseconds() as f64 / 1000.0
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check endpoint
#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse::healthy(&state.instance_id, &state.version)
        .with_uptime(state.uptime_seconds());

    HttpResponse::Ok().json(response)
}

/// Readiness check endpoint; also reports how many hubs are live
#[get("/ready")]
pub async fn readiness_check(state: web::Data<AppState>, api: web::Data<ApiState>) -> HttpResponse {
    let hubs = api.service.hub_count().await;
    let response = HealthResponse::healthy(&state.instance_id, &state.version).with_hubs(hubs);
    HttpResponse::Ok().json(response)
}

/// Liveness check endpoint
#[get("/live")]
pub async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "alive"
    }))
}

/// Configure health routes
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}

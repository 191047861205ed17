//! REST API endpoints using Actix-Web

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::api::responses::{api_error, ApiResponse};
use crate::models::{HubId, TranslatorSetup};
use crate::services::TranslatorService;

use super::health::configure_health_routes;

/// Shared application state
#[derive(Clone)]
pub struct ApiState {
    pub service: TranslatorService,
    /// Address reported to callers in every hub access record
    pub outgoing_ip: String,
}

impl ApiState {
    pub fn new(service: TranslatorService, outgoing_ip: impl Into<String>) -> Self {
        Self {
            service,
            outgoing_ip: outgoing_ip.into(),
        }
    }
}

/// Configure all REST API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Health endpoints at root
    configure_health_routes(cfg);

    cfg.service(web::scope("/translator").configure(configure_translator_routes));
}

/// Configure translator routes; fixed segments go before `{id}`
fn configure_translator_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create_hub))
        .route("/echo", web::get().to(echo))
        .route("/all", web::get().to(list_hubs))
        .route("/all", web::delete().to(remove_all_hubs))
        .route("/{id}/info", web::get().to(hub_info))
        .route("/{id}", web::get().to(get_hub))
        .route("/{id}", web::delete().to(remove_hub));
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

fn parse_id(raw: &str) -> Result<HubId, actix_web::Error> {
    raw.parse::<HubId>().map_err(api_error)
}

async fn echo() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("Got it!")
}

async fn create_hub(
    state: web::Data<ApiState>,
    body: web::Json<TranslatorSetup>,
) -> Result<HttpResponse, actix_web::Error> {
    let access = state
        .service
        .create_translation_hub(body.into_inner(), &state.outgoing_ip)
        .await
        .map_err(api_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(access)))
}

async fn list_hubs(state: web::Data<ApiState>) -> HttpResponse {
    let hubs = state.service.list_hubs(&state.outgoing_ip).await;
    HttpResponse::Ok().json(ApiResponse::success(hubs))
}

async fn get_hub(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = parse_id(&path)?;
    let access = state
        .service
        .get_hub(id, &state.outgoing_ip)
        .await
        .map_err(api_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(access)))
}

async fn hub_info(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = parse_id(&path)?;
    let info = state.service.hub_info(id).await.map_err(api_error)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(info)))
}

async fn remove_hub(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = parse_id(&path)?;
    let removed = state.service.remove_hub(id).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(RemovedResponse {
        removed: usize::from(removed),
    })))
}

async fn remove_all_hubs(state: web::Data<ApiState>) -> HttpResponse {
    let removed = state.service.remove_all_hubs().await;
    HttpResponse::Ok().json(ApiResponse::success(RemovedResponse { removed }))
}

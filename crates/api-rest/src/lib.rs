//! # API REST
//!
//! REST API implementation for Meditache.
//!
//! Handles:
//! - HTTP endpoints with axum, under `/api/v1` (health is unprefixed)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, multipart uploads, static uploads)
//!
//! Uses `api-shared` for the access gate and health reporting, and `meditache-core` for all
//! business rules.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
mod handlers;

pub use config::RestConfig;
pub use error::ApiError;

use api_shared::auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, API_KEY_HEADER};
use api_shared::{HealthRes, HealthService, Role};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use meditache_core::{InterventionService, InterventionTypeService, Store};
use meditache_files::FilesService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub interventions: InterventionService<dyn Store>,
    pub intervention_types: InterventionTypeService<dyn Store>,
    pub files: Arc<FilesService>,
    pub health: HealthService,
    pub config: Arc<RestConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, files: FilesService, config: RestConfig) -> Self {
        Self {
            interventions: InterventionService::new(Arc::clone(&store)),
            intervention_types: InterventionTypeService::new(Arc::clone(&store)),
            store,
            files: Arc::new(files),
            health: HealthService::new(),
            config: Arc::new(config),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Meditache API",
        description = "Scheduling of medical interventions and the intervention-type nomenclature",
        version = "1.0"
    ),
    paths(
        handlers::health,
        handlers::list_intervention_types,
        handlers::create_intervention_type,
        handlers::create_intervention,
        handlers::list_interventions,
        handlers::upcoming_interventions,
        handlers::get_intervention,
        handlers::update_intervention,
        handlers::delete_intervention,
        handlers::upload_report_attachments,
    ),
    components(schemas(
        HealthRes,
        Role,
        dto::ErrorRes,
        dto::InterventionTypeRes,
        dto::CreateInterventionTypeReq,
        dto::InterventionRes,
        dto::CreateInterventionReq,
        dto::UpdateInterventionReq,
        dto::UploadReportAttachmentsReq,
    )),
    modifiers(&SecurityAddon),
    security(("actor_id" = [], "actor_role" = []))
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        for (name, header) in [
            ("api_key", API_KEY_HEADER),
            ("actor_id", ACTOR_ID_HEADER),
            ("actor_role", ACTOR_ROLE_HEADER),
        ] {
            components.add_security_scheme(
                name,
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(header))),
            );
        }
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/intervention-types",
            get(handlers::list_intervention_types).post(handlers::create_intervention_type),
        )
        .route(
            "/interventions",
            get(handlers::list_interventions).post(handlers::create_intervention),
        )
        .route(
            "/interventions/upcoming",
            get(handlers::upcoming_interventions),
        )
        .route(
            "/interventions/:id",
            get(handlers::get_intervention)
                .patch(handlers::update_intervention)
                .delete(handlers::delete_intervention),
        )
        .route(
            "/interventions/:id/report-attachments",
            post(handlers::upload_report_attachments)
                .layer(DefaultBodyLimit::max(state.config.upload_body_limit())),
        );

    let cors = cors_layer(&state.config);
    let uploads = ServeDir::new(state.files.root_directory());

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .nest_service("/uploads", uploads)
        .merge(SwaggerUi::new("/api/docs").url("/api/docs-json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &RestConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(ACTOR_ID_HEADER),
            HeaderName::from_static(ACTOR_ROLE_HEADER),
        ])
        .allow_credentials(true)
}

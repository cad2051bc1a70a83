//! Route handlers.
//!
//! Handlers translate HTTP into engine calls and back; they hold no business rules of their own.

use crate::dto::{
    optional_actor, CreateInterventionReq, CreateInterventionTypeReq, ErrorRes, InterventionQuery,
    InterventionRes, InterventionTypeQuery, InterventionTypeRes, UpcomingQuery,
    UpdateInterventionReq, UploadReportAttachmentsReq,
};
use crate::error::ApiError;
use crate::extract::AuthenticatedActor;
use crate::AppState;
use api_shared::{HealthRes, Role};
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use meditache_core::ShardableUuid;

/// Roles allowed to change records.
const WRITE_ROLES: [Role; 2] = [Role::Doctor, Role::Admin];

/// Multipart field carrying attachment files.
pub const UPLOAD_FIELD_NAME: &str = "files";

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type QueryParams<T> = Result<Query<T>, QueryRejection>;

/// An id that cannot be parsed cannot name a stored record.
fn parse_intervention_id(raw: &str) -> Result<ShardableUuid, ApiError> {
    ShardableUuid::parse(raw).map_err(|_| ApiError::not_found("intervention", raw))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service and store are healthy", body = HealthRes),
        (status = 503, description = "Store is unreachable", body = HealthRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthRes>) {
    let res = state.health.check(state.store.ping());
    if res.is_ok() {
        (StatusCode::OK, Json(res))
    } else {
        tracing::warn!("health check failed: {}", res.error.as_deref().unwrap_or(""));
        (StatusCode::SERVICE_UNAVAILABLE, Json(res))
    }
}

// ============================================================================
// INTERVENTION TYPES
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/intervention-types",
    tag = "Intervention Types",
    params(InterventionTypeQuery),
    responses(
        (status = 200, description = "Active entries, global first", body = [InterventionTypeRes]),
        (status = 401, description = "Unauthenticated", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_intervention_types(
    State(state): State<AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    query: QueryParams<InterventionTypeQuery>,
) -> Result<Json<Vec<InterventionTypeRes>>, ApiError> {
    let Query(query) = query?;
    let doctor_id = optional_actor(query.doctor_id.as_deref());

    let entries = state
        .intervention_types
        .list(query.search.as_deref(), doctor_id.as_ref())?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/intervention-types",
    tag = "Intervention Types",
    request_body = CreateInterventionTypeReq,
    responses(
        (status = 201, description = "Entry created, or the existing visible entry", body = InterventionTypeRes),
        (status = 400, description = "Blank name", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Role not allowed", body = ErrorRes),
        (status = 409, description = "Conflicting entry could not be resolved", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn create_intervention_type(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    body: JsonBody<CreateInterventionTypeReq>,
) -> Result<(StatusCode, Json<InterventionTypeRes>), ApiError> {
    actor.require_any(&WRITE_ROLES)?;
    let Json(req) = body?;

    let entry = state
        .intervention_types
        .create(&req.name, optional_actor(req.doctor_id.as_deref()))?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

// ============================================================================
// INTERVENTIONS
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/v1/interventions",
    tag = "Interventions",
    request_body = CreateInterventionReq,
    responses(
        (status = 201, description = "Intervention created", body = InterventionRes),
        (status = 400, description = "Invalid input", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Role not allowed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn create_intervention(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    body: JsonBody<CreateInterventionReq>,
) -> Result<(StatusCode, Json<InterventionRes>), ApiError> {
    actor.require_any(&WRITE_ROLES)?;
    let Json(req) = body?;

    let created = state.interventions.create(req.into_new()?, actor.id)?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/interventions",
    tag = "Interventions",
    params(InterventionQuery),
    responses(
        (status = 200, description = "Matching interventions by scheduled start", body = [InterventionRes]),
        (status = 400, description = "Invalid filter", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_interventions(
    State(state): State<AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    query: QueryParams<InterventionQuery>,
) -> Result<Json<Vec<InterventionRes>>, ApiError> {
    let Query(query) = query?;

    let found = state.interventions.find_all(&query.into_filter()?)?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/interventions/upcoming",
    tag = "Interventions",
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Interventions starting within the window, any status", body = [InterventionRes]),
        (status = 400, description = "Invalid day count", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn upcoming_interventions(
    State(state): State<AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    query: QueryParams<UpcomingQuery>,
) -> Result<Json<Vec<InterventionRes>>, ApiError> {
    let Query(query) = query?;

    let found = state.interventions.upcoming(query.days)?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/interventions/{id}",
    tag = "Interventions",
    params(("id" = String, Path, description = "Intervention id")),
    responses(
        (status = 200, description = "Intervention found", body = InterventionRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 404, description = "No such intervention", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn get_intervention(
    State(state): State<AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<InterventionRes>, ApiError> {
    let id = parse_intervention_id(&id)?;
    Ok(Json(state.interventions.find_one(&id)?.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/interventions/{id}",
    tag = "Interventions",
    params(("id" = String, Path, description = "Intervention id")),
    request_body = UpdateInterventionReq,
    responses(
        (status = 200, description = "Intervention updated", body = InterventionRes),
        (status = 400, description = "Invalid input", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Role not allowed", body = ErrorRes),
        (status = 404, description = "No such intervention", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn update_intervention(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    AxumPath(id): AxumPath<String>,
    body: JsonBody<UpdateInterventionReq>,
) -> Result<Json<InterventionRes>, ApiError> {
    actor.require_any(&WRITE_ROLES)?;
    let id = parse_intervention_id(&id)?;
    let Json(req) = body?;

    let updated = state.interventions.update(&id, &req.into_patch()?)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/interventions/{id}",
    tag = "Interventions",
    params(("id" = String, Path, description = "Intervention id")),
    responses(
        (status = 200, description = "The removed intervention", body = InterventionRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Role not allowed", body = ErrorRes),
        (status = 404, description = "No such intervention", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn delete_intervention(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<InterventionRes>, ApiError> {
    actor.require_any(&WRITE_ROLES)?;
    let id = parse_intervention_id(&id)?;

    Ok(Json(state.interventions.remove(&id)?.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/interventions/{id}/report-attachments",
    tag = "Interventions",
    params(("id" = String, Path, description = "Intervention id")),
    request_body(content = UploadReportAttachmentsReq, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Attachments appended", body = InterventionRes),
        (status = 400, description = "Too many, empty or unexpected files", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Role not allowed", body = ErrorRes),
        (status = 404, description = "No such intervention", body = ErrorRes),
        (status = 413, description = "A file exceeds the size limit", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn upload_report_attachments(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    AxumPath(id): AxumPath<String>,
    mut multipart: Multipart,
) -> Result<Json<InterventionRes>, ApiError> {
    actor.require_any(&WRITE_ROLES)?;
    let id = parse_intervention_id(&id)?;
    // Nothing is written for an intervention that does not exist.
    state.interventions.find_one(&id)?;

    let max_files = state.config.max_upload_files;
    let max_bytes = state.config.max_upload_bytes;

    let mut uploads: Vec<(String, Bytes)> = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            return Err(ApiError::bad_request(format!(
                "unexpected multipart field '{}'",
                field.name().unwrap_or_default()
            )));
        }
        if uploads.len() == max_files {
            return Err(ApiError::bad_request(format!(
                "at most {} files may be uploaded at once",
                max_files
            )));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        if bytes.len() > max_bytes {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file '{}' exceeds {} bytes", filename, max_bytes),
            ));
        }
        uploads.push((filename, bytes));
    }

    let mut references = Vec::with_capacity(uploads.len());
    for (filename, bytes) in &uploads {
        references.push(state.files.store(filename, bytes)?.reference);
    }

    let updated = state
        .interventions
        .append_report_attachments(&id, references)?;
    Ok(Json(updated.into()))
}

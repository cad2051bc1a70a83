use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, API_KEY_HEADER};
use api_shared::{validate_api_key, Actor};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// The calling actor, taken from the access-gate headers.
///
/// Rejects with 401 when the API key (if configured), the actor id or the role is missing or
/// invalid.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(expected) = state.config.api_key.as_deref() {
            validate_api_key(header(API_KEY_HEADER), expected)?;
        }

        let actor = Actor::from_headers(header(ACTOR_ID_HEADER), header(ACTOR_ROLE_HEADER))?;
        Ok(Self(actor))
    }
}

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::{AppResult, auth::Principal};

pub const PRINCIPAL: &str = "principal";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const GATE_STATUS: &str = "gate_status";
pub const DASHBOARD: &str = "dashboard";

pub async fn principal(session: &Session) -> AppResult<Option<Principal>> {
    Ok(session.get::<Principal>(PRINCIPAL).await?)
}

/// Extracts the signed-in principal, or sends the request back to the gate.
pub struct SignedIn(pub Principal);

impl<S> FromRequestParts<S> for SignedIn
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match principal(&session).await {
            Ok(Some(principal)) => Ok(SignedIn(principal)),
            Ok(None) => Err(Redirect::to("/").into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}

use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::Redirect,
};
use oauth2::{AuthorizationCode, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    session::{CSRF_STATE, PKCE_VERIFIER},
    store::DocumentStore,
};

use super::{AuthError, ClientProvider, Clients, Identity, admit, turn_away};

const GATE: &str = "/login";

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// OAuth redirect target: finishes the code exchange and signs the user in.
#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code, error }): Query<LockinQuery>,
    State(clients): State<Clients>,
    State(identity): State<Arc<dyn Identity>>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(error) = error {
        tracing::debug!(%provider, %error, "provider returned an error");
        return turn_away(&session, "Error logging in", AuthError::Cancelled, GATE).await;
    }

    // one callback per stored state
    let stored_state = session.remove::<String>(CSRF_STATE).await?;
    let pkce_verifier = session.remove::<String>(PKCE_VERIFIER).await?;

    let (code, pkce_verifier) = match (state, code, stored_state, pkce_verifier) {
        (Some(state), Some(code), Some(stored_state), Some(pkce_verifier)) if state == stored_state => {
            (AuthorizationCode::new(code), PkceCodeVerifier::new(pkce_verifier))
        }
        _ => return turn_away(&session, "Error logging in", AuthError::StaleRequest, GATE).await,
    };

    let Some(client) = clients.get_client(provider) else {
        let err = AuthError::Provider(format!("{provider} sign-in is not configured"));
        return turn_away(&session, "Error logging in", err, GATE).await;
    };

    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let token_result = match client
        .exchange_code(code)
        .set_pkce_verifier(pkce_verifier)
        .request_async(&http_client)
        .await
    {
        Ok(token_result) => token_result,
        Err(e) => {
            return turn_away(&session, "Error logging in", AuthError::Provider(e.to_string()), GATE).await;
        }
    };

    let access_token = token_result.access_token().secret();
    match identity.authenticate_federated(provider, access_token).await {
        Ok(principal) => admit(&session, &*store, principal).await,
        Err(e) => turn_away(&session, "Error logging in", e, GATE).await,
    }
}

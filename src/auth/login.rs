use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppResult, AppState, include_res, res,
    session::{self, CSRF_STATE, GATE_STATUS, PKCE_VERIFIER},
    store::DocumentStore,
};

use super::{AuthError, ClientProvider, Clients, DASHBOARD_PATH, Identity, admit, turn_away};

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GateMode {
    #[default]
    SignIn,
    SignUp,
}

impl GateMode {
    fn path(self) -> &'static str {
        match self {
            GateMode::SignIn => "/login",
            GateMode::SignUp => "/login?mode=signup",
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct GateQuery {
    mode: Option<GateMode>,
}

#[derive(Deserialize)]
pub(crate) struct Credentials {
    email: String,
    password: String,
}

pub(crate) fn render_gate(mode: GateMode, status: Option<&str>, providers: &[ClientProvider]) -> String {
    let (title, action, submit, toggle_href, toggle_text) = match mode {
        GateMode::SignIn => (
            "Login to Boards App",
            "/login",
            "Login",
            GateMode::SignUp.path(),
            "Don't have an account? Sign Up",
        ),
        GateMode::SignUp => (
            "Sign Up for Boards App",
            "/signup",
            "Sign Up",
            GateMode::SignIn.path(),
            "Already have an account? Login",
        ),
    };

    let message = status
        .map(|status| format!(r#"<p class="message">{}</p>"#, res::escape(status)))
        .unwrap_or_default();

    let mut buttons = String::new();
    for provider in providers {
        buttons += &res::fill(
            include_res!(str, "/pages/provider_button.html"),
            &[("slug", provider.slug()), ("label", provider.to_string().as_str())],
        );
    }

    res::fill(
        include_res!(str, "/pages/login.html"),
        &[
            ("title", title),
            ("message", message.as_str()),
            ("action", action),
            ("submit", submit),
            ("providers", buttons.as_str()),
            ("toggle_href", toggle_href),
            ("toggle_text", toggle_text),
        ],
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn gate_page(
    Query(GateQuery { mode }): Query<GateQuery>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Response> {
    if session::principal(&session).await?.is_some() {
        return Ok(Redirect::to(DASHBOARD_PATH).into_response());
    }

    let status = session.remove::<String>(GATE_STATUS).await?;
    Ok(Html(render_gate(mode.unwrap_or_default(), status.as_deref(), &clients.configured())).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn sign_in(
    State(identity): State<Arc<dyn Identity>>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Form(Credentials { email, password }): Form<Credentials>,
) -> AppResult<Redirect> {
    match identity.authenticate(email.trim(), &password).await {
        Ok(principal) => admit(&session, &*store, principal).await,
        Err(e) => turn_away(&session, "Error logging in", e, GateMode::SignIn.path()).await,
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn sign_up(
    State(identity): State<Arc<dyn Identity>>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Form(Credentials { email, password }): Form<Credentials>,
) -> AppResult<Redirect> {
    match identity.create_account(email.trim(), &password).await {
        Ok(principal) => admit(&session, &*store, principal).await,
        Err(e) => turn_away(&session, "Error creating user", e, GateMode::SignUp.path()).await,
    }
}

/// Starts the authorization code flow with the provider.
#[debug_handler(state = AppState)]
pub(crate) async fn federated(
    Path(provider): Path<ClientProvider>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Redirect> {
    let Some(client) = clients.get_client(provider) else {
        let err = AuthError::Provider(format!("{provider} sign-in is not configured"));
        return turn_away(&session, "Error logging in", err, GateMode::SignIn.path()).await;
    };

    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(provider.scopes().iter().map(|scope| Scope::new(scope.to_string())))
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;

    Ok(Redirect::to(authorize_url.as_str()))
}

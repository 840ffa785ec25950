use async_trait::async_trait;
use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{error, info, warn};

mod clients;
mod firebase;
mod lockin;
mod login;
mod logout;

pub use clients::{ClientProvider, Clients};
pub use firebase::{DEFAULT_AUTH_URL, FirebaseIdentity};

use crate::{
    AppResult, AppState,
    models::{CREATED, USERS},
    session::{DASHBOARD, GATE_STATUS, PRINCIPAL},
    store::{DocRef, DocumentStore, StoreResult, Write, fields, server_timestamp},
};

pub const DASHBOARD_PATH: &str = "/dashboard";

/// The signed-in user, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Principal {
    pub fn user_ref(&self) -> DocRef {
        DocRef::new(USERS, &self.uid)
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailExists,

    #[error("password is too weak")]
    WeakPassword,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("this account has been disabled")]
    UserDisabled,

    #[error("too many attempts, try again later")]
    TooManyAttempts,

    #[error("sign-in was cancelled")]
    Cancelled,

    #[error("the sign-in request expired or was already used")]
    StaleRequest,

    #[error("{0}")]
    Provider(String),

    #[error("could not reach the identity provider")]
    Http(#[from] reqwest::Error),

    #[error("unexpected identity provider response: {0}")]
    Malformed(String),
}

impl AuthError {
    /// Maps an Identity Toolkit error message such as
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    pub fn from_provider_message(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        match code {
            "EMAIL_EXISTS" => AuthError::EmailExists,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "MISSING_PASSWORD" => {
                AuthError::InvalidCredentials
            }
            "WEAK_PASSWORD" => AuthError::WeakPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
            "USER_DISABLED" => AuthError::UserDisabled,
            code if code.starts_with("TOO_MANY_ATTEMPTS_TRY_LATER") => AuthError::TooManyAttempts,
            _ => AuthError::Provider(message.to_owned()),
        }
    }
}

#[async_trait]
pub trait Identity: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Trades a provider access token obtained through OAuth for a principal.
    async fn authenticate_federated(
        &self,
        provider: ClientProvider,
        access_token: &str,
    ) -> Result<Principal, AuthError>;
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::gate_page).post(login::sign_in))
        .route("/signup", post(login::sign_up))
        .route("/login/{provider}", get(login::federated))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}

/// Creates the user's profile document on first sign-in.
pub(crate) async fn ensure_profile(store: &dyn DocumentStore, principal: &Principal) -> StoreResult<()> {
    let user = principal.user_ref();
    if store.fetch_one(&user).await?.is_some() {
        return Ok(());
    }

    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Lucky",
    ];
    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Panda", "Kitten", "Phoenix", "Griffin", "Turtle", "Whale",
    ];

    let alias = match &principal.display_name {
        Some(name) => name.clone(),
        None => {
            let mut rng = rand::rng();
            format!(
                "{} {}",
                adjectives.choose(&mut rng).unwrap_or(&"Nameless"),
                nouns.choose(&mut rng).unwrap_or(&"User"),
            )
        }
    };

    info!(user = %user, %alias, "adding profile");
    store
        .commit(vec![Write::Set {
            doc: user,
            fields: fields(json!({
                "alias": alias,
                "email": principal.email,
                CREATED: server_timestamp(),
            })),
        }])
        .await
}

/// Establishes the session for `principal` and sends it to the dashboard.
pub(crate) async fn admit(session: &Session, store: &dyn DocumentStore, principal: Principal) -> AppResult<Redirect> {
    if let Err(e) = ensure_profile(store, &principal).await {
        error!(error = %e, uid = %principal.uid, "Error creating profile");
    }

    session.cycle_id().await?;
    session.remove_value(DASHBOARD).await?;
    session.remove_value(GATE_STATUS).await?;
    session.insert(PRINCIPAL, &principal).await?;

    info!(uid = %principal.uid, "welcome");
    Ok(Redirect::to(DASHBOARD_PATH))
}

/// Leaves the user on the gate with a one-line status.
pub(crate) async fn turn_away(session: &Session, context: &str, err: AuthError, back: &str) -> AppResult<Redirect> {
    warn!(error = %err, "{context}");
    session.insert(GATE_STATUS, format!("{context}: {err}.")).await?;
    Ok(Redirect::to(back))
}

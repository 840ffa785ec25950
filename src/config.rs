//! Settings read from the environment (a `.env` file is honoured).

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, bail};

use crate::auth::FirebaseIdentity;

/// One year.
const MAX_SESSION_INACTIVITY_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `BIND_ADDR`, default `0.0.0.0:8080`.
    pub bind_addr: SocketAddr,

    /// Origin the browser reaches us at; OAuth redirect URLs are built from it.
    /// Env: `PUBLIC_URL`, default `http://localhost:8080`.
    pub public_url: String,

    /// Env: `DATABASE_URL`, default `sqlite://chatlists.db`.
    pub database_url: String,

    /// Env: `DATABASE_MAX_CONNECTIONS`, default `16`.
    pub max_connections: u32,

    /// Env: `FIREBASE_API_KEY`, required.
    pub firebase_api_key: String,

    /// Env: `FIREBASE_AUTH_URL`, default the hosted Identity Toolkit.
    /// Point it at the auth emulator for local work.
    pub firebase_auth_url: String,

    /// JSON file with `google` / `github` OAuth credentials.
    /// Env: `OAUTH_CLIENTS`, default none (federated sign-in disabled).
    pub oauth_clients: Option<PathBuf>,

    /// Env: `SESSION_INACTIVITY_MINUTES`, default `30`, at most one year.
    pub session_inactivity_minutes: i64,

    /// Env: `SECURE_COOKIES`, default `false`.
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_addr = match var("BIND_ADDR") {
            Some(addr) => addr.parse::<SocketAddr>().with_context(|| format!("invalid BIND_ADDR {addr:?}"))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(n) => n.parse::<u32>().with_context(|| format!("invalid DATABASE_MAX_CONNECTIONS {n:?}"))?,
            None => 16,
        };
        if max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let session_inactivity_minutes = match var("SESSION_INACTIVITY_MINUTES") {
            Some(n) => n.parse::<i64>().with_context(|| format!("invalid SESSION_INACTIVITY_MINUTES {n:?}"))?,
            None => 30,
        };
        if !(1..=MAX_SESSION_INACTIVITY_MINUTES).contains(&session_inactivity_minutes) {
            bail!("SESSION_INACTIVITY_MINUTES must be between 1 and {MAX_SESSION_INACTIVITY_MINUTES}");
        }

        Ok(Config {
            bind_addr,
            public_url: var("PUBLIC_URL").unwrap_or_else(|| "http://localhost:8080".to_owned()),
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://chatlists.db".to_owned()),
            max_connections,
            firebase_api_key: var("FIREBASE_API_KEY").context("FIREBASE_API_KEY must be set")?,
            firebase_auth_url: var("FIREBASE_AUTH_URL")
                .unwrap_or_else(|| crate::auth::DEFAULT_AUTH_URL.to_owned()),
            oauth_clients: var("OAUTH_CLIENTS").map(PathBuf::from),
            session_inactivity_minutes,
            secure_cookies: var("SECURE_COOKIES").is_some_and(|v| v != "false" && v != "0"),
        })
    }

    pub fn identity(&self, http: reqwest::Client) -> FirebaseIdentity {
        FirebaseIdentity::new(http, &self.firebase_auth_url, &self.firebase_api_key)
    }
}

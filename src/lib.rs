pub mod appresult;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod index;
pub mod models;
pub mod res;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::{Router, extract::FromRef, routing::get};
use serde_json::Value;
use tower_http::trace::TraceLayer;

pub use appresult::{AppError, AppResult};

use crate::{auth::Identity, store::DocumentStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn Identity>,
    pub clients: auth::Clients,
}

/// Every route of the app. The caller adds the session layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index::index))
        .route("/style.css", get(res::stylesheet))
        .merge(auth::router())
        .merge(dashboard::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(self
            .get_obj_field(field)?
            .as_str()
            .ok_or(anyhow::anyhow!("expected {field} to be a string"))?
            .to_owned())
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
            .ok_or(anyhow::anyhow!("expected a {field} field").into())
    }
}

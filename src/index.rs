use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{AppResult, auth::DASHBOARD_PATH, session};

#[debug_handler]
pub async fn index(session: Session) -> AppResult<Redirect> {
    if session::principal(&session).await?.is_some() {
        Ok(Redirect::to(DASHBOARD_PATH))
    } else {
        Ok(Redirect::to("/login"))
    }
}

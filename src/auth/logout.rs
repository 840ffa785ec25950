use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{AppResult, session};

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<Redirect> {
    if let Some(principal) = session::principal(&session).await? {
        tracing::info!(uid = %principal.uid, "goodbye");
    }
    session.flush().await?;
    Ok(Redirect::to("/"))
}

//! The list/message dashboard.
//!
//! [`Dashboard`] is the per-session mirror of what the user sees: their lists,
//! the selected list's messages and the edit in progress. Every operation
//! takes the store and the acting [`Principal`] explicitly, performs its store
//! calls, and then patches the mirror. Multi-document changes go through
//! [`DocumentStore::commit`] so they apply all at once.

mod editing;
mod handlers;
mod lists;
mod messages;
mod page;

use axum::{
    Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::error;

pub use editing::Editing;

use crate::{
    AppResult, AppState,
    auth::Principal,
    models::{CHAT_LISTS, ChatList, ChatMessage},
    session::DASHBOARD,
    store::{DocRef, DocumentStore, StoreError},
};

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} does not exist")]
    Missing(DocRef),

    #[error("{0} belongs to another user")]
    Forbidden(DocRef),

    #[error("no list is selected")]
    NoSelection,

    #[error("nothing is being edited")]
    NothingToSave,

    #[error("message {message} is not in list {list}")]
    NotInList { message: String, list: String },
}

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub lists: Vec<ChatList>,
    pub selected: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub editing: Editing,
}

impl Dashboard {
    pub fn selected_list(&self) -> Option<&ChatList> {
        let selected = self.selected.as_deref()?;
        self.lists.iter().find(|list| list.id == selected)
    }

    fn list_mut(&mut self, id: &str) -> Option<&mut ChatList> {
        self.lists.iter_mut().find(|list| list.id == id)
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.messages.clear();
        if matches!(self.editing, Editing::Message { .. }) {
            self.editing = Editing::None;
        }
    }
}

/// Fetches a list and checks that `principal` owns it.
pub(crate) async fn owned_list(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: &str,
) -> DashboardResult<ChatList> {
    let reference = DocRef::new(CHAT_LISTS, id);
    let Some(doc) = store.fetch_one(&reference).await? else {
        return Err(DashboardError::Missing(reference));
    };

    let list = ChatList::try_from(doc)?;
    if !list.is_owned_by(&principal.user_ref()) {
        return Err(DashboardError::Forbidden(reference));
    }
    Ok(list)
}

/// The session's mirror, loading the user's lists on first use.
pub(crate) async fn load(session: &Session, store: &dyn DocumentStore, principal: &Principal) -> AppResult<Dashboard> {
    if let Some(dashboard) = session.get::<Dashboard>(DASHBOARD).await? {
        return Ok(dashboard);
    }

    let mut dashboard = Dashboard::default();
    if let Err(e) = dashboard.load_lists(store, principal).await {
        error!(error = %e, uid = %principal.uid, "Error fetching chat lists");
    }
    Ok(dashboard)
}

pub(crate) async fn save(session: &Session, dashboard: &Dashboard) -> AppResult<()> {
    session.insert(DASHBOARD, dashboard).await?;
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::show))
        .route("/dashboard/refresh", post(handlers::refresh))
        .route("/lists", post(handlers::create_list))
        .route("/lists/{id}/select", post(handlers::select_list))
        .route("/lists/{id}/edit", post(handlers::edit_list))
        .route(
            "/lists/{id}/delete",
            get(handlers::confirm_delete_list).post(handlers::delete_list),
        )
        .route("/messages", post(handlers::add_message))
        .route("/messages/{id}/edit", post(handlers::edit_message))
        .route(
            "/messages/{id}/delete",
            get(handlers::confirm_delete_message).post(handlers::delete_message),
        )
        .route("/edit/save", post(handlers::save_edit))
        .route("/edit/cancel", post(handlers::cancel_edit))
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{auth::Principal, store::SqliteStore};

    pub(crate) fn principal(uid: &str) -> Principal {
        Principal {
            uid: uid.to_owned(),
            email: Some(format!("{uid}@example.com")),
            display_name: None,
        }
    }

    pub(crate) async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }
}

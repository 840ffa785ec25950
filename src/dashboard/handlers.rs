use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, warn};

use super::{Dashboard, DashboardResult, load, page, save};
use crate::{
    AppResult, AppState,
    auth::{DASHBOARD_PATH, Principal},
    session::SignedIn,
    store::DocumentStore,
};

#[derive(Deserialize)]
pub(crate) struct NameForm {
    name: String,
}

#[derive(Deserialize)]
pub(crate) struct ContentForm {
    content: String,
}

#[derive(Deserialize)]
pub(crate) struct DraftForm {
    draft: String,
}

#[derive(Deserialize)]
pub(crate) struct ConfirmForm {
    confirm: Option<String>,
}

impl ConfirmForm {
    fn confirmed(&self) -> bool {
        self.confirm.as_deref() == Some("yes")
    }
}

/// Logs a failed dashboard action. The page is shown again either way.
fn settle<T>(principal: &Principal, action: &str, result: DashboardResult<T>) {
    if let Err(e) = result {
        error!(uid = %principal.uid, error = %e, "Error {action}");
    }
}

async fn back(session: &Session, dashboard: &Dashboard) -> AppResult<Redirect> {
    save(session, dashboard).await?;
    Ok(Redirect::to(DASHBOARD_PATH))
}

#[debug_handler(state = AppState)]
pub(crate) async fn show(
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Html<String>> {
    let dashboard = load(&session, &*store, &principal).await?;
    save(&session, &dashboard).await?;
    Ok(Html(page::render_dashboard(&principal, &dashboard)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn refresh(
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    settle(&principal, "fetching chat lists", dashboard.load_lists(&*store, &principal).await);
    if let Some(selected) = dashboard.selected.clone() {
        settle(&principal, "fetching messages", dashboard.select_list(&*store, &principal, &selected).await);
    }
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_list(
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
    Form(NameForm { name }): Form<NameForm>,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    settle(&principal, "creating chat list", dashboard.create_list(&*store, &principal, &name).await);
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn select_list(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    settle(&principal, "fetching messages", dashboard.select_list(&*store, &principal, &id).await);
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_list(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    if !dashboard.begin_list_edit(&id) {
        warn!(uid = %principal.uid, list = %id, "cannot edit a list that is not shown");
    }
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn confirm_delete_list(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Response> {
    let dashboard = load(&session, &*store, &principal).await?;
    let Some(list) = dashboard.lists.iter().find(|list| list.id == id) else {
        return Ok(Redirect::to(DASHBOARD_PATH).into_response());
    };

    let prompt = format!("Delete the list \"{}\" and all of its messages?", list.name);
    let action = format!("/lists/{}/delete", list.id);
    Ok(Html(page::render_confirm(&prompt, &action)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_list(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
    Form(form): Form<ConfirmForm>,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    if form.confirmed() {
        settle(&principal, "deleting chat list", dashboard.delete_list(&*store, &principal, &id).await);
    } else {
        warn!(uid = %principal.uid, list = %id, "unconfirmed list delete ignored");
    }
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_message(
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
    Form(ContentForm { content }): Form<ContentForm>,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    settle(&principal, "adding message", dashboard.add_message(&*store, &principal, &content).await);
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_message(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    if !dashboard.begin_message_edit(&id) {
        warn!(uid = %principal.uid, message = %id, "cannot edit a message that is not shown");
    }
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn confirm_delete_message(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Response> {
    let dashboard = load(&session, &*store, &principal).await?;
    let Some(message) = dashboard.messages.iter().find(|message| message.id == id) else {
        return Ok(Redirect::to(DASHBOARD_PATH).into_response());
    };

    let action = format!("/messages/{}/delete", message.id);
    Ok(Html(page::render_confirm("Delete this message?", &action)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_message(
    Path(id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
    Form(form): Form<ConfirmForm>,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    if form.confirmed() {
        settle(&principal, "deleting message", dashboard.delete_message(&*store, &principal, &id).await);
    } else {
        warn!(uid = %principal.uid, message = %id, "unconfirmed message delete ignored");
    }
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn save_edit(
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
    Form(DraftForm { draft }): Form<DraftForm>,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    settle(&principal, "saving edit", dashboard.save_edit(&*store, &principal, &draft).await);
    back(&session, &dashboard).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_edit(
    State(store): State<Arc<dyn DocumentStore>>,
    SignedIn(principal): SignedIn,
    session: Session,
) -> AppResult<Redirect> {
    let mut dashboard = load(&session, &*store, &principal).await?;
    dashboard.cancel_edit();
    back(&session, &dashboard).await
}

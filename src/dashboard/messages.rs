use futures_util::future::try_join_all;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{Dashboard, DashboardError, DashboardResult, Editing, owned_list};
use crate::{
    auth::Principal,
    models::{CHAT_MESSAGES, CONTENT, CREATED, ChatList, ChatMessage, LAST_MODIFIED, MESSAGE_REFS},
    store::{DocRef, DocumentStore, Write, fields, server_timestamp},
};

impl Dashboard {
    /// Makes `id` the selected list and loads its messages in reference order.
    ///
    /// References to messages that no longer exist are skipped.
    pub async fn select_list(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        id: &str,
    ) -> DashboardResult<()> {
        self.clear_selection();

        let list = owned_list(store, principal, id).await?;
        let docs = try_join_all(list.message_docs().map(|doc| store.fetch_one(doc))).await?;

        let mut messages = Vec::with_capacity(docs.len());
        for (reference, doc) in list.message_docs().zip(docs) {
            let Some(doc) = doc else {
                warn!(list = %list.reference(), message = %reference, "skipping dangling message reference");
                continue;
            };
            match ChatMessage::try_from(doc) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(message = %reference, error = %e, "skipping unreadable message"),
            }
        }

        self.selected = Some(list.id.clone());
        self.messages = messages;
        match self.list_mut(id) {
            Some(entry) => *entry = list,
            None => self.lists.push(list),
        }
        Ok(())
    }

    /// Appends a message to the selected list. Returns the new message's id,
    /// or `None` when nothing is selected or the content is blank.
    pub async fn add_message(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        content: &str,
    ) -> DashboardResult<Option<String>> {
        let content = content.trim();
        let Some(selected) = self.selected.clone() else {
            return Ok(None);
        };
        if content.is_empty() {
            return Ok(None);
        }

        let list_ref = owned_list(store, principal, &selected).await?.reference();
        let message = DocRef::generate(CHAT_MESSAGES);

        store
            .commit(vec![
                Write::Set {
                    doc: message.clone(),
                    fields: fields(json!({
                        CONTENT: content,
                        CREATED: server_timestamp(),
                        LAST_MODIFIED: server_timestamp(),
                    })),
                },
                Write::ArrayUnion {
                    doc: list_ref.clone(),
                    field: MESSAGE_REFS.to_owned(),
                    values: vec![Value::String(message.to_string())],
                },
                Write::Update {
                    doc: list_ref,
                    fields: fields(json!({ LAST_MODIFIED: server_timestamp() })),
                },
            ])
            .await?;
        info!(list = %selected, message = %message, "added chat message");

        self.messages.push(ChatMessage {
            id: message.id.clone(),
            content: content.to_owned(),
            created: None,
            last_modified: None,
        });
        let id = message.id.clone();
        if let Some(entry) = self.list_mut(&selected) {
            entry.message_refs.push(message);
        }
        Ok(Some(id))
    }

    /// Rewrites a message's content. The parent list is not touched.
    pub async fn edit_message(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        id: &str,
        content: &str,
    ) -> DashboardResult<bool> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(false);
        }

        let list = self.fetch_selected(store, principal).await?;
        ensure_held(&list, id)?;

        store
            .update(
                &DocRef::new(CHAT_MESSAGES, id),
                fields(json!({
                    CONTENT: content,
                    LAST_MODIFIED: server_timestamp(),
                })),
            )
            .await?;

        if let Some(message) = self.messages.iter_mut().find(|message| message.id == id) {
            message.content = content.to_owned();
        }
        Ok(true)
    }

    /// Deletes a message of the selected list and drops its reference in one batch.
    pub async fn delete_message(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        id: &str,
    ) -> DashboardResult<()> {
        let list = self.fetch_selected(store, principal).await?;
        ensure_held(&list, id)?;

        let list_ref = list.reference();
        let message = DocRef::new(CHAT_MESSAGES, id);

        store
            .commit(vec![
                Write::Delete { doc: message.clone() },
                Write::ArrayRemove {
                    doc: list_ref.clone(),
                    field: MESSAGE_REFS.to_owned(),
                    values: vec![Value::String(message.to_string())],
                },
                Write::Update {
                    doc: list_ref.clone(),
                    fields: fields(json!({ LAST_MODIFIED: server_timestamp() })),
                },
            ])
            .await?;
        info!(list = %list_ref, message = %id, "deleted chat message");

        self.messages.retain(|message| message.id != id);
        if let Some(entry) = self.list_mut(&list_ref.id) {
            entry.message_refs.retain(|reference| *reference != message);
        }
        if matches!(&self.editing, Editing::Message { id: editing, .. } if editing == id) {
            self.editing = Editing::None;
        }
        Ok(())
    }

    async fn fetch_selected(&self, store: &dyn DocumentStore, principal: &Principal) -> DashboardResult<ChatList> {
        let Some(selected) = self.selected.as_deref() else {
            return Err(DashboardError::NoSelection);
        };
        owned_list(store, principal, selected).await
    }
}

fn ensure_held(list: &ChatList, message_id: &str) -> DashboardResult<()> {
    if list.holds(message_id) {
        Ok(())
    } else {
        Err(DashboardError::NotInList {
            message: message_id.to_owned(),
            list: list.id.clone(),
        })
    }
}

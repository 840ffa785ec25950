use serde_json::json;
use tracing::{info, warn};

use super::{Dashboard, DashboardResult, Editing, owned_list};
use crate::{
    auth::Principal,
    models::{CHAT_LISTS, CHAT_MESSAGES, CREATED, ChatList, LAST_MODIFIED, MESSAGE_REFS, NAME, OWNER},
    store::{DocumentStore, Write, fields, server_timestamp},
};

impl Dashboard {
    /// Replaces the visible lists with the principal's stored lists.
    pub async fn load_lists(&mut self, store: &dyn DocumentStore, principal: &Principal) -> DashboardResult<()> {
        let owner = principal.user_ref().to_string();
        let docs = store.fetch_where(CHAT_LISTS, OWNER, &owner).await?;

        let mut lists = Vec::with_capacity(docs.len());
        for doc in docs {
            let reference = doc.reference.clone();
            match ChatList::try_from(doc) {
                Ok(list) => lists.push(list),
                Err(e) => warn!(list = %reference, error = %e, "skipping unreadable chat list"),
            }
        }
        self.lists = lists;

        let selection_gone = self
            .selected
            .as_deref()
            .is_some_and(|selected| !self.lists.iter().any(|list| list.id == selected));
        if selection_gone {
            self.clear_selection();
        }
        if let Editing::List { id, .. } = &self.editing {
            if !self.lists.iter().any(|list| &list.id == id) {
                self.editing = Editing::None;
            }
        }
        Ok(())
    }

    /// Returns the new list's id, or `None` when the name is blank.
    pub async fn create_list(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        name: &str,
    ) -> DashboardResult<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let owner = principal.user_ref();
        let doc = store
            .create(
                CHAT_LISTS,
                fields(json!({
                    NAME: name,
                    OWNER: owner.to_string(),
                    CREATED: server_timestamp(),
                    LAST_MODIFIED: server_timestamp(),
                    MESSAGE_REFS: [],
                })),
            )
            .await?;
        info!(list = %doc, uid = %principal.uid, "created chat list");

        self.lists.push(ChatList {
            id: doc.id.clone(),
            name: name.to_owned(),
            owner: Some(owner),
            created: None,
            last_modified: None,
            message_refs: Vec::new(),
        });
        Ok(Some(doc.id))
    }

    /// Returns `false` without touching the store when the name is blank.
    pub async fn rename_list(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        id: &str,
        name: &str,
    ) -> DashboardResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }

        let list = owned_list(store, principal, id).await?;
        store
            .update(
                &list.reference(),
                fields(json!({
                    NAME: name,
                    LAST_MODIFIED: server_timestamp(),
                })),
            )
            .await?;

        if let Some(entry) = self.list_mut(id) {
            entry.name = name.to_owned();
        }
        Ok(true)
    }

    /// Deletes the list and every message it references in one batch.
    pub async fn delete_list(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        id: &str,
    ) -> DashboardResult<()> {
        let list = owned_list(store, principal, id).await?;

        for foreign in list.message_refs.iter().filter(|doc| doc.collection != CHAT_MESSAGES) {
            warn!(list = %list.reference(), reference = %foreign, "not cascading to a non-message reference");
        }
        let mut writes: Vec<Write> = list
            .message_docs()
            .map(|doc| Write::Delete { doc: doc.clone() })
            .collect();
        let messages = writes.len();
        writes.push(Write::Delete { doc: list.reference() });
        store.commit(writes).await?;
        info!(list = %list.reference(), messages, "deleted chat list");

        self.lists.retain(|entry| entry.id != id);
        if self.selected.as_deref() == Some(id) {
            self.clear_selection();
        }
        let stale_edit = match &self.editing {
            Editing::List { id: editing, .. } => editing == id,
            Editing::Message { id: editing, .. } => list.holds(editing),
            Editing::None => false,
        };
        if stale_edit {
            self.editing = Editing::None;
        }
        Ok(())
    }
}

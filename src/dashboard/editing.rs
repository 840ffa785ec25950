use serde::{Deserialize, Serialize};

use super::{Dashboard, DashboardError, DashboardResult};
use crate::{auth::Principal, store::DocumentStore};

/// The single in-place edit a dashboard can have open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Editing {
    #[default]
    None,
    List {
        id: String,
        draft: String,
    },
    Message {
        id: String,
        draft: String,
    },
}

impl Editing {
    pub fn draft_for_list(&self, list_id: &str) -> Option<&str> {
        match self {
            Editing::List { id, draft } if id == list_id => Some(draft),
            _ => None,
        }
    }

    pub fn draft_for_message(&self, message_id: &str) -> Option<&str> {
        match self {
            Editing::Message { id, draft } if id == message_id => Some(draft),
            _ => None,
        }
    }
}

impl Dashboard {
    /// Opens the rename editor for a visible list, replacing any other edit.
    pub fn begin_list_edit(&mut self, id: &str) -> bool {
        let Some(list) = self.lists.iter().find(|list| list.id == id) else {
            return false;
        };
        self.editing = Editing::List {
            id: list.id.clone(),
            draft: list.name.clone(),
        };
        true
    }

    /// Opens the content editor for a message of the selected list.
    pub fn begin_message_edit(&mut self, id: &str) -> bool {
        let Some(message) = self.messages.iter().find(|message| message.id == id) else {
            return false;
        };
        self.editing = Editing::Message {
            id: message.id.clone(),
            draft: message.content.clone(),
        };
        true
    }

    pub fn cancel_edit(&mut self) {
        self.editing = Editing::None;
    }

    /// Stores `draft` for the open edit.
    ///
    /// The editor closes only when the change was written. A blank draft or a
    /// failed write leaves it open with the draft kept.
    pub async fn save_edit(
        &mut self,
        store: &dyn DocumentStore,
        principal: &Principal,
        draft: &str,
    ) -> DashboardResult<bool> {
        let (is_list, id) = match &mut self.editing {
            Editing::None => return Err(DashboardError::NothingToSave),
            Editing::List { id, draft: kept } => {
                draft.clone_into(kept);
                (true, id.clone())
            }
            Editing::Message { id, draft: kept } => {
                draft.clone_into(kept);
                (false, id.clone())
            }
        };

        let written = if is_list {
            self.rename_list(store, principal, &id, draft).await?
        } else {
            self.edit_message(store, principal, &id, draft).await?
        };
        if written {
            self.editing = Editing::None;
        }
        Ok(written)
    }
}

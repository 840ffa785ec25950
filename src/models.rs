use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::{DocRef, Document, StoreError, StoreResult};

pub const USERS: &str = "Users";
pub const CHAT_LISTS: &str = "ChatList";
pub const CHAT_MESSAGES: &str = "ChatMessage";

// stored field names
pub const NAME: &str = "name";
pub const OWNER: &str = "owner";
pub const CONTENT: &str = "content";
pub const CREATED: &str = "created";
pub const LAST_MODIFIED: &str = "lastModified";
pub const MESSAGE_REFS: &str = "messageRefs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatList {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub owner: Option<DocRef>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
    #[serde(default)]
    pub message_refs: Vec<DocRef>,
}

impl ChatList {
    pub fn reference(&self) -> DocRef {
        DocRef::new(CHAT_LISTS, &self.id)
    }

    pub fn is_owned_by(&self, user: &DocRef) -> bool {
        self.owner.as_ref() == Some(user)
    }

    /// The references that point at chat messages. Anything else stored in
    /// `messageRefs` is never read or deleted through the list.
    pub fn message_docs(&self) -> impl Iterator<Item = &DocRef> {
        self.message_refs.iter().filter(|r| r.collection == CHAT_MESSAGES)
    }

    pub fn holds(&self, message_id: &str) -> bool {
        self.message_docs().any(|r| r.id == message_id)
    }
}

impl TryFrom<Document> for ChatList {
    type Error = StoreError;

    fn try_from(doc: Document) -> StoreResult<Self> {
        let id = doc.reference.id.clone();
        let mut list: ChatList = doc.decode()?;
        list.id = id;
        Ok(list)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
}

impl ChatMessage {
    pub fn reference(&self) -> DocRef {
        DocRef::new(CHAT_MESSAGES, &self.id)
    }
}

impl TryFrom<Document> for ChatMessage {
    type Error = StoreError;

    fn try_from(doc: Document) -> StoreResult<Self> {
        let id = doc.reference.id.clone();
        let mut message: ChatMessage = doc.decode()?;
        message.id = id;
        Ok(message)
    }
}

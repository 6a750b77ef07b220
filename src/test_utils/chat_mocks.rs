//! In-memory chat collaborators.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::chat::{ChatTransport, KnownUser, KnownUserRepoTrait},
};

#[derive(Default)]
pub struct InMemoryKnownUserRepo {
    pub users: Mutex<BTreeMap<i64, (KnownUser, i64)>>,
}

impl InMemoryKnownUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnownUserRepoTrait for InMemoryKnownUserRepo {
    async fn remember(&self, user: &KnownUser, joined_at: i64) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let joined_at = users.get(&user.user_id).map_or(joined_at, |(_, at)| *at);
        users.insert(user.user_id, (user.clone(), joined_at));
        Ok(())
    }

    async fn list_ids(&self) -> AppResult<Vec<i64>> {
        Ok(self.users.lock().unwrap().keys().copied().collect())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.users.lock().unwrap().len() as i64)
    }
}

/// Records every delivered message. Chats marked with `fail_for` reject delivery.
#[derive(Default)]
pub struct RecordingChatTransport {
    sent: Mutex<Vec<(i64, String)>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn messages_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_to(&self, chat_id: i64) -> Option<String> {
        self.messages_to(chat_id).pop()
    }
}

#[async_trait]
impl ChatTransport for RecordingChatTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(AppError::Upstream("Bad Request: chat not found".into()));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

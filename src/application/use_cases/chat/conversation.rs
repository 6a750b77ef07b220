use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// What the front-end expects as the next plain-text message from a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingSupportMessage,
    AwaitingPurchaseDate,
    AwaitingAdminPrice {
        target_user_id: i64,
        duration_secs: i64,
    },
    AwaitingAdminReply {
        target_user_id: i64,
    },
    AwaitingAdminDate,
    AwaitingAdminDeleteTarget,
    AwaitingBroadcastText,
    AwaitingBroadcastConfirm {
        text: String,
    },
}

struct Entry {
    state: ConversationState,
    touched: Instant,
}

/// Per-user conversation states, in memory only. Entries older than the idle
/// timeout read as `Idle`.
pub struct ConversationTable {
    entries: Mutex<HashMap<i64, Entry>>,
    idle_timeout: Duration,
}

impl ConversationTable {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn current(&self, user_id: i64) -> ConversationState {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&user_id) {
            Some(entry) if entry.touched.elapsed() < self.idle_timeout => entry.state.clone(),
            Some(_) => {
                entries.remove(&user_id);
                ConversationState::Idle
            }
            None => ConversationState::Idle,
        }
    }

    /// Stale entries of every user are dropped here.
    pub fn set(&self, user_id: i64, state: ConversationState) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.touched.elapsed() < self.idle_timeout);
        if state == ConversationState::Idle {
            entries.remove(&user_id);
        } else {
            entries.insert(
                user_id,
                Entry {
                    state,
                    touched: Instant::now(),
                },
            );
        }
    }

    /// Removes and returns the user's state.
    pub fn take(&self, user_id: i64) -> ConversationState {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.remove(&user_id) {
            Some(entry) if entry.touched.elapsed() < self.idle_timeout => entry.state,
            _ => ConversationState::Idle,
        }
    }

    pub fn reset(&self, user_id: i64) {
        self.set(user_id, ConversationState::Idle);
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

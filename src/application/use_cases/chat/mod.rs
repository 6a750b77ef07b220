//! Text-command front-end over the license engine.
//!
//! Users request free keys, ask for paid ones and write to support. The owner prices
//! and issues paid keys, revokes keys, reads stats and broadcasts. Multi-step flows keep
//! their progress in a [`ConversationTable`].

pub mod command;
pub mod conversation;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::license::{FreeKeyOutcome, LicenseUseCases},
    domain::entities::key_duration::{KeyDuration, format_duration},
    infra::clock::Clock,
};

use self::{
    command::{ChatCommand, split_target},
    conversation::{ConversationState, ConversationTable},
};

const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";
const DURATION_PROMPT: &str =
    "Send a duration (1h, 6h, 12h, 1d, 2d, 7d, 30d), a number of seconds, or a date DD.MM.YYYY.";
const MAX_LISTED_KEYS: usize = 50;
const DEFAULT_BROADCAST_PAUSE: Duration = Duration::from_millis(50);

// ============================================================================
// Ports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[async_trait]
pub trait KnownUserRepoTrait: Send + Sync {
    /// Upserts the user; `joined_at` is kept from the first call.
    async fn remember(&self, user: &KnownUser, joined_at: i64) -> AppResult<()>;
    async fn list_ids(&self) -> AppResult<Vec<i64>>;
    async fn count(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: String,
}

impl IncomingMessage {
    fn display_name(&self) -> String {
        match (&self.username, &self.first_name) {
            (Some(username), _) => format!("@{username}"),
            (None, Some(first_name)) => first_name.clone(),
            (None, None) => format!("user {}", self.user_id),
        }
    }
}

// ============================================================================
// Use Cases
// ============================================================================

pub struct ChatUseCases {
    license: Arc<LicenseUseCases>,
    users: Arc<dyn KnownUserRepoTrait>,
    transport: Arc<dyn ChatTransport>,
    conversations: ConversationTable,
    owner_id: i64,
    broadcast_pause: Duration,
}

impl ChatUseCases {
    pub fn new(
        license: Arc<LicenseUseCases>,
        users: Arc<dyn KnownUserRepoTrait>,
        transport: Arc<dyn ChatTransport>,
        owner_id: i64,
        conversation_timeout: Duration,
    ) -> Self {
        Self {
            license,
            users,
            transport,
            conversations: ConversationTable::new(conversation_timeout),
            owner_id,
            broadcast_pause: DEFAULT_BROADCAST_PAUSE,
        }
    }

    pub fn with_broadcast_pause(mut self, pause: Duration) -> Self {
        self.broadcast_pause = pause;
        self
    }

    /// Handles one message. Failures are logged and answered with a notice.
    #[instrument(skip(self, message), fields(user_id = message.user_id))]
    pub async fn handle_message(&self, message: IncomingMessage) {
        let Err(err) = self.dispatch(&message).await else {
            return;
        };
        let notice = match &err {
            AppError::InvalidInput(msg) => msg.clone(),
            _ => {
                error!(error = ?err, "Chat message handling failed");
                GENERIC_FAILURE.to_string()
            }
        };
        if let Err(send_err) = self.reply(&message, &notice).await {
            warn!(error = ?send_err, "Failed to deliver failure notice");
        }
    }

    fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id != 0 && user_id == self.owner_id
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> AppResult<()> {
        self.transport.send_message(message.chat_id, text).await
    }

    async fn dispatch(&self, message: &IncomingMessage) -> AppResult<()> {
        let text = message.text.trim();
        match ChatCommand::parse(text) {
            Some(command) => self.handle_command(message, command).await,
            None => {
                let state = self.conversations.take(message.user_id);
                self.handle_text(message, state, text).await
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&self, message: &IncomingMessage, command: ChatCommand) -> AppResult<()> {
        let user_id = message.user_id;
        if command.owner_only() && !self.is_owner(user_id) {
            return self.reply(message, "Unknown command. Send /help.").await;
        }
        if command != ChatCommand::Confirm {
            self.conversations.reset(user_id);
        }
        debug!(?command, "Chat command");

        match command {
            ChatCommand::Start => {
                let user = KnownUser {
                    user_id,
                    username: message.username.clone(),
                    first_name: message.first_name.clone(),
                };
                self.users
                    .remember(&user, self.license.clock().unix_now())
                    .await?;
                let greeting = format!("Welcome, {}!\n\n{}", message.display_name(), self.help_text(user_id));
                self.reply(message, &greeting).await
            }
            ChatCommand::Help => self.reply(message, &self.help_text(user_id)).await,
            ChatCommand::Cancel => self.reply(message, "Cancelled.").await,
            ChatCommand::Unknown(_) => self.reply(message, "Unknown command. Send /help.").await,
            ChatCommand::Key => self.free_key(message).await,
            ChatCommand::Buy(None) => {
                if self.is_owner(user_id) {
                    return self.reply(message, "You are the owner. Use /genkey.").await;
                }
                self.conversations
                    .set(user_id, ConversationState::AwaitingPurchaseDate);
                self.reply(message, &format!("How long should the key last? {DURATION_PROMPT}"))
                    .await
            }
            ChatCommand::Buy(Some(arg)) => {
                if self.is_owner(user_id) {
                    return self.reply(message, "You are the owner. Use /genkey.").await;
                }
                let duration: KeyDuration = arg.parse()?;
                self.submit_purchase(message, duration).await
            }
            ChatCommand::Support => {
                if self.is_owner(user_id) {
                    return self.reply(message, "You are the owner.").await;
                }
                self.conversations
                    .set(user_id, ConversationState::AwaitingSupportMessage);
                self.reply(message, "Write your message for the owner.").await
            }
            ChatCommand::Price(args) => {
                let target = args.as_deref().and_then(split_target);
                let Some((target_user_id, secs)) = target else {
                    return self.reply(message, "Usage: /price <user_id> <seconds>").await;
                };
                let duration_secs = match secs.parse::<KeyDuration>()? {
                    KeyDuration::Seconds(secs) => secs,
                    KeyDuration::Preset(preset) => preset.secs(),
                    KeyDuration::Until(_) => {
                        return self.reply(message, "Usage: /price <user_id> <seconds>").await;
                    }
                };
                self.conversations.set(
                    user_id,
                    ConversationState::AwaitingAdminPrice {
                        target_user_id,
                        duration_secs,
                    },
                );
                self.reply(
                    message,
                    &format!(
                        "Send the price for user {target_user_id} ({}).",
                        format_duration(duration_secs)
                    ),
                )
                .await
            }
            ChatCommand::Give(args) => {
                let target = args.as_deref().and_then(split_target);
                let Some((target_user_id, duration)) = target.filter(|(_, d)| !d.is_empty()) else {
                    return self.reply(message, "Usage: /give <user_id> <duration>").await;
                };
                let duration: KeyDuration = duration.parse()?;
                self.give_key(message, target_user_id, duration).await
            }
            ChatCommand::GenKey(None) => {
                self.conversations.set(user_id, ConversationState::AwaitingAdminDate);
                self.reply(message, DURATION_PROMPT).await
            }
            ChatCommand::GenKey(Some(arg)) => {
                let duration: KeyDuration = arg.parse()?;
                self.generate_owner_key(message, duration).await
            }
            ChatCommand::Revoke(None) => {
                self.conversations
                    .set(user_id, ConversationState::AwaitingAdminDeleteTarget);
                self.reply(message, "Send the key to delete.").await
            }
            ChatCommand::Revoke(Some(key)) => self.revoke(message, &key).await,
            ChatCommand::Reply(args) => {
                let target = args.as_deref().and_then(split_target);
                let Some((target_user_id, text)) = target else {
                    return self.reply(message, "Usage: /reply <user_id> [text]").await;
                };
                if text.is_empty() {
                    self.conversations
                        .set(user_id, ConversationState::AwaitingAdminReply { target_user_id });
                    return self
                        .reply(message, &format!("Write your answer for user {target_user_id}."))
                        .await;
                }
                let text = format!("Reply from the owner:\n\n{text}");
                self.deliver_for_owner(message, target_user_id, &text, "Answer sent.")
                    .await
            }
            ChatCommand::Keys => self.list_keys(message).await,
            ChatCommand::Stats => {
                let users = self.users.count().await?;
                let stats = self.license.stats().await?;
                let text = format!(
                    "Users: {users}\nActive keys: {} (free {}, paid {})",
                    stats.free_keys + stats.paid_keys,
                    stats.free_keys,
                    stats.paid_keys
                );
                self.reply(message, &text).await
            }
            ChatCommand::Broadcast => {
                self.conversations
                    .set(user_id, ConversationState::AwaitingBroadcastText);
                self.reply(message, "Send the broadcast text.").await
            }
            ChatCommand::Confirm => match self.conversations.take(user_id) {
                ConversationState::AwaitingBroadcastConfirm { text } => {
                    self.broadcast(message, &text).await
                }
                _ => self.reply(message, "Nothing to confirm.").await,
            },
        }
    }

    fn help_text(&self, user_id: i64) -> String {
        let mut text = String::from(
            "/key - get a free 1 hour key\n\
             /buy [duration] - request a paid key\n\
             /support - write to the owner\n\
             /cancel - abort the current step",
        );
        if self.is_owner(user_id) {
            text.push_str(
                "\n\nOwner:\n\
                 /price <user> <seconds> - quote a price\n\
                 /give <user> <duration> - issue a paid key\n\
                 /genkey [duration] - create a key for yourself\n\
                 /revoke [key] - delete a key\n\
                 /reply <user> [text] - answer a support message\n\
                 /keys - list active keys\n\
                 /stats - usage numbers\n\
                 /broadcast - message every user",
            );
        }
        text
    }

    // ========================================================================
    // Plain text inside a flow
    // ========================================================================

    async fn handle_text(
        &self,
        message: &IncomingMessage,
        state: ConversationState,
        text: &str,
    ) -> AppResult<()> {
        let user_id = message.user_id;
        match state {
            ConversationState::Idle => self.reply(message, "Send /help to see what I can do.").await,
            ConversationState::AwaitingSupportMessage => {
                let forwarded = format!(
                    "Support message\nFrom: {} (id {user_id})\n\n{text}\n\nAnswer with /reply {user_id}",
                    message.display_name()
                );
                self.transport.send_message(self.owner_id, &forwarded).await?;
                self.reply(message, "Message sent. Please wait for an answer.").await
            }
            ConversationState::AwaitingPurchaseDate => {
                let submitted = match text.parse::<KeyDuration>() {
                    Ok(duration) => self.submit_purchase(message, duration).await,
                    Err(err) => Err(err.into()),
                };
                self.retry_on_bad_input(message, ConversationState::AwaitingPurchaseDate, submitted)
                    .await
            }
            ConversationState::AwaitingAdminPrice {
                target_user_id,
                duration_secs,
            } => {
                let quote = format!(
                    "Your request for a {} key was reviewed.\nPrice: {text}\nAfter payment, contact the owner.",
                    format_duration(duration_secs)
                );
                let done = format!(
                    "Price sent. After payment issue the key with /give {target_user_id} {duration_secs}"
                );
                self.deliver_for_owner(message, target_user_id, &quote, &done)
                    .await
            }
            ConversationState::AwaitingAdminReply { target_user_id } => {
                let answer = format!("Reply from the owner:\n\n{text}");
                self.deliver_for_owner(message, target_user_id, &answer, "Answer sent.")
                    .await
            }
            ConversationState::AwaitingAdminDate => {
                let generated = match text.parse::<KeyDuration>() {
                    Ok(duration) => self.generate_owner_key(message, duration).await,
                    Err(err) => Err(err.into()),
                };
                self.retry_on_bad_input(message, ConversationState::AwaitingAdminDate, generated)
                    .await
            }
            ConversationState::AwaitingAdminDeleteTarget => self.revoke(message, text).await,
            ConversationState::AwaitingBroadcastText => {
                let recipients = self.recipients().await?.len();
                let preview = format!(
                    "Broadcast preview:\n\n{text}\n\nRecipients: {recipients}. Send /confirm to deliver or /cancel to drop it."
                );
                self.conversations.set(
                    user_id,
                    ConversationState::AwaitingBroadcastConfirm {
                        text: text.to_string(),
                    },
                );
                self.reply(message, &preview).await
            }
            state @ ConversationState::AwaitingBroadcastConfirm { .. } => {
                self.conversations.set(user_id, state);
                self.reply(message, "Send /confirm or /cancel.").await
            }
        }
    }

    /// Keeps the user in `state` when the outcome was a correctable input error.
    async fn retry_on_bad_input(
        &self,
        message: &IncomingMessage,
        state: ConversationState,
        outcome: AppResult<()>,
    ) -> AppResult<()> {
        match outcome {
            Err(AppError::InvalidInput(msg)) => {
                self.conversations.set(message.user_id, state);
                self.reply(message, &format!("{msg}\nTry again or send /cancel."))
                    .await
            }
            other => other,
        }
    }

    // ========================================================================
    // Flows
    // ========================================================================

    async fn free_key(&self, message: &IncomingMessage) -> AppResult<()> {
        let text = match self.license.request_free_key(message.user_id).await? {
            FreeKeyOutcome::Active {
                key,
                remaining_secs,
            } => format!(
                "You already have an active key: {key}\nTime left: {}",
                format_duration(remaining_secs)
            ),
            FreeKeyOutcome::Issued {
                key,
                valid_for_secs,
            } => format!(
                "Your free key: {key}\nValid for: {}",
                format_duration(valid_for_secs)
            ),
            FreeKeyOutcome::CooldownActive { retry_after_secs } => format!(
                "The next free key is available in {}.",
                format_duration(retry_after_secs)
            ),
        };
        self.reply(message, &text).await
    }

    async fn submit_purchase(&self, message: &IncomingMessage, duration: KeyDuration) -> AppResult<()> {
        let request = self
            .license
            .request_paid_key(message.user_id, duration)
            .await?;
        let notice = format!(
            "Purchase request\nFrom: {} (id {})\nDuration: {} ({} s)\n\nQuote a price with /price {} {}",
            message.display_name(),
            request.user_id,
            request.label,
            request.duration_secs,
            request.user_id,
            request.duration_secs
        );
        self.transport.send_message(self.owner_id, &notice).await?;
        info!(user_id = request.user_id, duration_secs = request.duration_secs, "Purchase requested");
        self.reply(message, "Request sent. The owner will reply with a price.")
            .await
    }

    async fn give_key(
        &self,
        message: &IncomingMessage,
        target_user_id: i64,
        duration: KeyDuration,
    ) -> AppResult<()> {
        let issued = self.license.admin_issue_key(target_user_id, duration).await?;
        let delivery = format!(
            "Your key: {}\nValid for: {}",
            issued.key,
            format_duration(issued.valid_for_secs)
        );
        let done = format!("Key {} issued to user {target_user_id}.", issued.key);
        self.deliver_for_owner(message, target_user_id, &delivery, &done)
            .await
    }

    async fn generate_owner_key(&self, message: &IncomingMessage, duration: KeyDuration) -> AppResult<()> {
        let issued = self
            .license
            .admin_issue_key(message.user_id, duration)
            .await?;
        let text = format!(
            "Key created: {}\nValid for: {}",
            issued.key,
            format_duration(issued.valid_for_secs)
        );
        self.reply(message, &text).await
    }

    async fn revoke(&self, message: &IncomingMessage, key: &str) -> AppResult<()> {
        let key = key.trim();
        let text = if self.license.admin_revoke_key(key).await? {
            format!("Key {key} deleted.")
        } else {
            "Key not found.".to_string()
        };
        self.reply(message, &text).await
    }

    async fn list_keys(&self, message: &IncomingMessage) -> AppResult<()> {
        let keys = self.license.list_active_keys().await?;
        if keys.is_empty() {
            return self.reply(message, "No active keys.").await;
        }
        let now = self.license.clock().unix_now();
        let mut text = format!("Active keys: {}\n", keys.len());
        for record in keys.iter().take(MAX_LISTED_KEYS) {
            let owner = record
                .user_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            text.push_str(&format!(
                "\n{}  {}  {}  user {owner}",
                record.key,
                record.tier,
                format_duration(record.remaining_secs(now))
            ));
        }
        if keys.len() > MAX_LISTED_KEYS {
            text.push_str(&format!("\n... and {} more", keys.len() - MAX_LISTED_KEYS));
        }
        self.reply(message, &text).await
    }

    /// Sends `text` to a user on the owner's behalf and reports the result to the owner.
    async fn deliver_for_owner(
        &self,
        message: &IncomingMessage,
        target_user_id: i64,
        text: &str,
        done: &str,
    ) -> AppResult<()> {
        match self.transport.send_message(target_user_id, text).await {
            Ok(()) => self.reply(message, done).await,
            Err(err) => {
                warn!(target_user_id, error = ?err, "Delivery to user failed");
                self.reply(
                    message,
                    &format!("Could not deliver to user {target_user_id}: {err}"),
                )
                .await
            }
        }
    }

    async fn recipients(&self) -> AppResult<Vec<i64>> {
        let mut ids = self.users.list_ids().await?;
        ids.retain(|id| *id != self.owner_id);
        Ok(ids)
    }

    /// Delivery runs in its own task so other users are served meanwhile. The owner
    /// gets a summary when it ends.
    async fn broadcast(&self, message: &IncomingMessage, text: &str) -> AppResult<()> {
        let recipients = self.recipients().await?;
        self.reply(message, "Broadcast started.").await?;

        let transport = self.transport.clone();
        let pause = self.broadcast_pause;
        let owner_chat_id = message.chat_id;
        let text = text.to_string();
        tokio::spawn(async move {
            let (mut sent, mut failed) = (0usize, 0usize);
            for chat_id in &recipients {
                match transport.send_message(*chat_id, &text).await {
                    Ok(()) => sent += 1,
                    Err(err) => {
                        debug!(chat_id, error = %err, "Broadcast delivery failed");
                        failed += 1;
                    }
                }
                tokio::time::sleep(pause).await;
            }

            info!(sent, failed, "Broadcast finished");
            let summary = format!(
                "Broadcast finished.\nSent: {sent}\nFailed: {failed}\nTotal: {}",
                recipients.len()
            );
            if let Err(err) = transport.send_message(owner_chat_id, &summary).await {
                warn!(error = %err, "Broadcast summary not delivered");
            }
        });
        Ok(())
    }
}

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{adapters::telegram::TelegramClient, application::use_cases::chat::ChatUseCases};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polls for updates and feeds them to the front-end one at a time.
pub async fn run_chat_polling_loop(
    client: Arc<TelegramClient>,
    chat: Arc<ChatUseCases>,
    long_poll_secs: u64,
) {
    info!("Chat front-end started (long poll {}s)", long_poll_secs);

    let mut offset: Option<i64> = None;
    loop {
        let updates = match client.get_updates(offset, long_poll_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Fetching chat updates failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(message) = update.into_incoming() {
                chat.handle_message(message).await;
            }
        }
    }
}

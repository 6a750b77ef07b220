use std::{fs::File, sync::Arc};

use secrecy::ExposeSecret;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, telegram::TelegramClient},
    application::use_cases::{
        chat::{ChatUseCases, KnownUserRepoTrait},
        license::{LicenseStore, LicenseUseCases},
        verification::VerificationUseCases,
    },
    infra::{
        clock::SystemClock, config::AppConfig, crypto::ResponseCipher, db::ensure_schema,
        error::InfraError, postgres_persistence,
    },
};

/// Long-poll front-end, present when a bot token is configured.
pub struct ChatRuntime {
    pub client: Arc<TelegramClient>,
    pub chat_use_cases: Arc<ChatUseCases>,
    pub long_poll_secs: u64,
}

pub struct Services {
    pub app_state: AppState,
    pub license_use_cases: Arc<LicenseUseCases>,
    pub chat: Option<ChatRuntime>,
}

pub async fn init_services(config: AppConfig) -> Result<Services, InfraError> {
    let cipher = Arc::new(
        ResponseCipher::new_from_base64(config.aes_key_b64.expose_secret())
            .map_err(InfraError::CipherInit)?,
    );

    let postgres_arc = Arc::new(
        postgres_persistence(
            &config.database_url,
            config.db_max_connections,
            config.db_connect_timeout,
        )
        .await?,
    );
    ensure_schema(postgres_arc.pool()).await?;

    let license_store_arc = postgres_arc.clone() as Arc<dyn LicenseStore>;
    let known_user_repo_arc = postgres_arc.clone() as Arc<dyn KnownUserRepoTrait>;

    let license_use_cases = Arc::new(LicenseUseCases::new(
        license_store_arc,
        Arc::new(SystemClock),
    ));
    let verification_use_cases = Arc::new(VerificationUseCases::new(
        license_use_cases.clone(),
        cipher,
    ));

    let chat = match &config.chat {
        Some(chat_config) => {
            let client = Arc::new(
                TelegramClient::new(
                    &chat_config.api_url,
                    &chat_config.bot_token,
                    chat_config.connect_timeout,
                    chat_config.long_poll_secs,
                )
                .map_err(InfraError::ChatClient)?,
            );
            let chat_use_cases = ChatUseCases::new(
                license_use_cases.clone(),
                known_user_repo_arc,
                client.clone(),
                chat_config.owner_id,
                chat_config.conversation_timeout,
            );
            Some(ChatRuntime {
                client,
                chat_use_cases: Arc::new(chat_use_cases),
                long_poll_secs: chat_config.long_poll_secs,
            })
        }
        None => None,
    };

    Ok(Services {
        app_state: AppState {
            config: Arc::new(config),
            verification_use_cases,
        },
        license_use_cases,
        chat,
    })
}

pub fn init_tracing(log_file: Option<&std::path::Path>) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keyward=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs)
    let json_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(InfraError::LogFile)?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(true)
                    .with_span_list(true)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
    Ok(())
}

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

pub struct AppConfig {
    pub database_url: String,
    /// base64 of the 32-byte AES-256-GCM response key.
    pub aes_key_b64: SecretString,
    /// `None` disables the `X-Api-Key` check.
    pub api_secret: Option<SecretString>,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub db_connect_timeout: Duration,
    pub http_request_timeout: Duration,
    /// `None` runs the HTTP service without the chat front-end.
    pub chat: Option<ChatConfig>,
    pub expired_key_sweep_interval: Option<Duration>,
    /// Where the JSON log layer writes. No file logging when unset.
    pub log_file: Option<PathBuf>,
}

pub struct ChatConfig {
    pub bot_token: SecretString,
    pub owner_id: i64,
    pub api_url: Url,
    pub connect_timeout: Duration,
    pub long_poll_secs: u64,
    pub conversation_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let aes_key_b64 = SecretString::new(get_env::<String>("AES_KEY_B64").into());
        let api_secret = non_empty_var("API_SECRET").map(|s| SecretString::new(s.into()));

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)));
        let db_max_connections: u32 = get_env_default("DB_MAX_CONNECTIONS", 10);
        let db_connect_timeout_secs: u64 = get_env_default("DB_CONNECT_TIMEOUT_SECS", 5);
        let http_request_timeout_secs: u64 = get_env_default("HTTP_REQUEST_TIMEOUT_SECS", 10);
        // 0 keeps expiry purely lazy
        let sweep_secs: u64 = get_env_default("EXPIRED_KEY_SWEEP_SECS", 0);
        let log_file = non_empty_var("LOG_FILE").map(PathBuf::from);

        Self {
            database_url,
            aes_key_b64,
            api_secret,
            bind_addr,
            db_max_connections,
            db_connect_timeout: Duration::from_secs(db_connect_timeout_secs),
            http_request_timeout: Duration::from_secs(http_request_timeout_secs),
            chat: ChatConfig::from_env(),
            expired_key_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            log_file,
        }
    }
}

impl ChatConfig {
    fn from_env() -> Option<Self> {
        let bot_token = SecretString::new(non_empty_var("BOT_TOKEN")?.into());
        let owner_id: i64 = get_env_default("OWNER_ID", 0);
        let api_url: Url = get_env_default(
            "TELEGRAM_API_URL",
            Url::parse("https://api.telegram.org").expect("static url"),
        );
        let connect_timeout_secs: u64 = get_env_default("CHAT_CONNECT_TIMEOUT_SECS", 5);
        let long_poll_secs: u64 = get_env_default("CHAT_LONG_POLL_SECS", 20);
        let conversation_timeout_secs: u64 = get_env_default("CONVERSATION_TIMEOUT_SECS", 600);

        Some(Self {
            bot_token,
            owner_id,
            api_url,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            long_poll_secs,
            conversation_timeout: Duration::from_secs(conversation_timeout_secs),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

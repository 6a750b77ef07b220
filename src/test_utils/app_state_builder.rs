//! Builds an `AppState` backed by the in-memory store and a manual clock.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{license::LicenseUseCases, verification::VerificationUseCases},
    infra::{clock::ManualClock, config::AppConfig, crypto::ResponseCipher},
    test_utils::{InMemoryLicenseStore, test_aes_key_b64},
};

/// Clock reading used by states from [`TestAppStateBuilder`].
pub const TEST_NOW: i64 = 1_700_000_000;

pub struct TestAppStateBuilder {
    store: Arc<InMemoryLicenseStore>,
    clock: Arc<ManualClock>,
    api_secret: Option<String>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryLicenseStore::new()),
            clock: Arc::new(ManualClock::at_unix(TEST_NOW)),
            api_secret: None,
        }
    }

    pub fn with_store(mut self, store: Arc<InMemoryLicenseStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_api_secret(mut self, secret: &str) -> Self {
        self.api_secret = Some(secret.to_string());
        self
    }

    pub fn build(self) -> AppState {
        let aes_key_b64 = test_aes_key_b64();
        let cipher = Arc::new(ResponseCipher::new_from_base64(&aes_key_b64).unwrap());
        let license = Arc::new(LicenseUseCases::new(self.store, self.clock));

        let config = AppConfig {
            database_url: "postgres://unused".into(),
            aes_key_b64: SecretString::new(aes_key_b64.into()),
            api_secret: self.api_secret.map(|s| SecretString::new(s.into())),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_max_connections: 1,
            db_connect_timeout: Duration::from_secs(1),
            http_request_timeout: Duration::from_secs(5),
            chat: None,
            expired_key_sweep_interval: None,
            log_file: None,
        };

        AppState {
            config: Arc::new(config),
            verification_use_cases: Arc::new(VerificationUseCases::new(license, cipher)),
        }
    }
}

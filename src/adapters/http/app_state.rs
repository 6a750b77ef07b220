use std::sync::Arc;

use crate::{
    application::use_cases::verification::VerificationUseCases, infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verification_use_cases: Arc<VerificationUseCases>,
}

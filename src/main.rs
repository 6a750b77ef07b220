use dotenvy::dotenv;
use tracing::info;

use keyward::infra::{
    InfraError, app::create_app, chat_poller::run_chat_polling_loop, config::AppConfig,
    setup::{init_services, init_tracing}, sweeper::run_expired_key_sweep_loop,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env();
    init_tracing(config.log_file.as_deref())?;

    let bind_addr = config.bind_addr;
    let sweep_interval = config.expired_key_sweep_interval;
    let services = init_services(config).await?;

    if let Some(period) = sweep_interval {
        let license_use_cases = services.license_use_cases.clone();
        tokio::spawn(async move {
            run_expired_key_sweep_loop(license_use_cases, period).await;
        });
    }

    match services.chat {
        Some(runtime) => {
            tokio::spawn(async move {
                run_chat_polling_loop(runtime.client, runtime.chat_use_cases, runtime.long_poll_secs)
                    .await;
            });
        }
        None => info!("BOT_TOKEN not set, chat front-end disabled"),
    }

    let app = create_app(services.app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .map_err(InfraError::Server)?;

    Ok(())
}

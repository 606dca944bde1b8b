mod service;

use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use user_event_core::{BrokerConfig, CatchUpConfig, DispatcherConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(long, global = true)]
    pub log_level: Option<Level>,
    /// Queue the dispatcher consumes the store feed from.
    #[clap(long, env = "USER_SYNC_QUEUE", default_value = "user-sync")]
    pub queue: String,
    #[clap(long, env = "USER_SYNC_CONSUMER", default_value = "user-service")]
    pub consumer: String,
    #[clap(long, env = "USER_SYNC_MAX_CONCURRENCY", default_value = "100")]
    pub max_concurrency: usize,
    /// Deadline of a single read-model write, in milliseconds.
    #[clap(long, env = "USER_SYNC_CATCH_UP_TIMEOUT_MS", default_value = "5000")]
    pub catch_up_timeout_ms: u64,
    #[clap(long, default_value = "10")]
    pub users: usize,
    #[clap(long, default_value = "200")]
    pub write_interval_ms: u64,
}

impl Cli {
    pub async fn execute(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        let config = service::ServiceConfig {
            queue: self.queue.clone(),
            broker: BrokerConfig {
                consumer: self.consumer.clone(),
                ..Default::default()
            },
            dispatcher: DispatcherConfig {
                max_concurrency: self.max_concurrency,
            },
            catch_up: CatchUpConfig {
                timeout: Duration::from_millis(self.catch_up_timeout_ms),
            },
            users: self.users,
            write_interval: Duration::from_millis(self.write_interval_ms),
        };

        let token = CancellationToken::new();
        let on_signal = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
            on_signal.cancel();
        });

        service::start(config, token).await?;
        Ok(())
    }
}

fn init_tracing(log_level: Level) {
    let crate_name = env!("CARGO_CRATE_NAME");
    let filter = EnvFilter::from_default_env()
        .add_directive("info".parse().unwrap())
        .add_directive(std::format!("{crate_name}={}", log_level).parse().unwrap())
        .add_directive(std::format!("user_event_core={}", log_level).parse().unwrap());
    let l = layer::<Registry>();
    let registry = tracing_subscriber::registry();

    registry
        .with(
            l.with_file(true)
                .with_line_number(true)
                .with_target(false)
                .compact(),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.unwrap_or(Level::INFO));

    cli.execute().await?;
    Ok(())
}

//! Tally: a headless recording daemon for V4L2 capture devices.

mod api;
mod app;
mod battery;
mod capture;
mod config;
mod error;
mod inhibitor;
mod library;
mod presenter;
mod signal_handler;

pub(crate) use {
    app::App,
    capture::FfmpegBackend,
    error::{AppError, Result as AppResult},
    inhibitor::{NoopWakeSource, SleepInhibitor},
    presenter::DesktopPresenter,
    signal_handler::SignalHandler,
};

use crate::config::Config;

use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt::writer::MakeWriterExt};

/// Application entry point.
#[tokio::main]
async fn main() {
    let _log_guard = init_logging();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = App::new(config).run().await {
        error!("App error: {:?}", e);
        std::process::exit(1);
    }
}

/// Log to stderr, and to a daily file when the data directory resolves.
///
/// The returned guard must stay alive for the file writer to flush.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tally=info,tally_core=info"));

    match Config::log_dir() {
        Ok(log_dir) => {
            let appender = tracing_appender::rolling::daily(log_dir, "tally.log");
            let (file_writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr.and(file_writer))
                .init();

            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

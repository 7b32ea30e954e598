// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hearthd: the hearth container pool daemon.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hearth_daemon::{Daemon, DaemonEnv};

fn init_tracing(data_dir: &std::path::Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,bollard=warn"));

    if std::env::var_os("HEARTH_LOG_TO_FILE").is_some() {
        let appender = tracing_appender::rolling::daily(data_dir.join("logs"), "hearthd.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

#[tokio::main]
async fn main() {
    let env = DaemonEnv::load();
    let _log_guard = init_tracing(&env.data_dir);

    let daemon = match Daemon::start(env).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "hearthd failed to start");
            std::process::exit(1);
        }
    };

    wait_for_signal().await;
    // Preserve containers across restarts; drain is an operator action
    // through the API surface, not a signal.
    daemon.shutdown(false).await;
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!(error = %e, "signal handler install failed");
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = term.recv() => info!("SIGTERM received"),
    }
}

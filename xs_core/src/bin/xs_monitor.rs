use std::process::ExitCode;
use std::thread;

use tracing::{error, info, warn};

use xs_core::{
    load_client_config_from_env, ClientConfig, SessionError, SessionMetrics, SyncSession,
    TracingRenderer,
};

const METRICS_EVERY_TICKS: u64 = 100;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, metadata) = load_client_config_from_env();
    info!(
        target: "xs::session",
        host = %config.host,
        truth_port = config.truth_port,
        environment_port = config.environment_port,
        config_path = ?metadata.path(),
        "xs_monitor starting"
    );

    let mut totals = SessionMetrics::default();
    loop {
        match SyncSession::start(&config) {
            Ok(mut session) => {
                let result = run_session(&mut session, &config);
                session.shutdown();
                totals.absorb(&session.metrics());
                match result {
                    Err(err) if err.is_recoverable() => {
                        warn!(target: "xs::session", error = %err, "session.connection_lost");
                    }
                    Err(err) => {
                        error!(target: "xs::session", error = %err, "session.failed");
                        return ExitCode::FAILURE;
                    }
                    Ok(()) => return ExitCode::SUCCESS,
                }
            }
            Err(err) if err.is_recoverable() => {
                warn!(target: "xs::session", error = %err, "session.connect_failed");
            }
            Err(err) => {
                error!(target: "xs::session", error = %err, "session.start_failed");
                return ExitCode::FAILURE;
            }
        }
        info!(
            target: "xs::session",
            delay_ms = config.reconnect_delay_ms,
            applied = totals.applied,
            "session.reconnecting"
        );
        thread::sleep(config.reconnect_delay());
    }
}

fn run_session(session: &mut SyncSession, config: &ClientConfig) -> Result<(), SessionError> {
    let mut renderer = TracingRenderer;
    session.log_device_list();
    loop {
        session.tick(&mut renderer)?;
        let metrics = session.metrics();
        if metrics.ticks % METRICS_EVERY_TICKS == 0 {
            info!(
                target: "xs::session",
                ticks = metrics.ticks,
                entities = session.store().len(),
                applied = metrics.applied,
                created = metrics.created,
                echoes = metrics.echoes,
                pruned = metrics.pruned,
                sent = metrics.sent,
                dropped = metrics.dropped,
                "session.metrics"
            );
        }
        if metrics.ticks % (METRICS_EVERY_TICKS * 10) == 0 {
            session.log_device_list_verbose();
        }
        thread::sleep(config.tick_interval());
    }
}

//! One connected client: environment, truth stream, store and tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::environment::{download_environment, Environment, EnvironmentError};
use crate::interaction::{InteractionController, InteractionEvent, InteractionOutcome};
use crate::metrics::SessionMetrics;
use crate::queue::{QueueClosed, TruthQueue};
use crate::render::Renderer;
use crate::store::TruthStore;
use crate::tasks::{spawn_reader, spawn_writer, SessionEvent, TaskKind};
use crate::transport::{Connection, TransportError};
use crate::view::{PanDirection, Viewport};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load environment: {0}")]
    Environment(#[from] EnvironmentError),
    #[error("truth connection failed: {0}")]
    Transport(#[from] TransportError),
    #[error("truth connection lost in {task} task: {source}")]
    ConnectionLost {
        task: TaskKind,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Queue(#[from] QueueClosed),
}

impl SessionError {
    /// Whether a supervisor can reasonably start a fresh session.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::ConnectionLost { .. } => true,
            SessionError::Transport(err) => err.is_connect(),
            SessionError::Environment(EnvironmentError::Transport(err)) => err.is_connect(),
            _ => false,
        }
    }
}

/// Owns every piece of client state. The truth store is only mutated from
/// `tick`, on the thread that owns the session; the queues are the only
/// state shared with the network tasks.
#[derive(Debug)]
pub struct SyncSession {
    environment: Environment,
    viewport: Viewport,
    store: TruthStore,
    dispatcher: Dispatcher,
    interaction: InteractionController,
    inbound: Arc<TruthQueue>,
    outbound: Arc<TruthQueue>,
    connection: Connection,
    stop: Arc<AtomicBool>,
    events: Receiver<SessionEvent>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    lost: Option<TaskKind>,
    metrics: SessionMetrics,
}

impl SyncSession {
    /// Download the environment, then open the truth stream. Connect failures
    /// are returned to the caller; nothing is retried here.
    pub fn start(config: &ClientConfig) -> Result<Self, SessionError> {
        let environment = download_environment(
            &config.host,
            config.environment_port,
            config.connect_timeout(),
        )?;
        let connection =
            Connection::connect(&config.host, config.truth_port, config.connect_timeout())?;
        Self::with_connection(config, environment, connection)
    }

    /// Start the reader and writer on an already open truth connection.
    pub fn with_connection(
        config: &ClientConfig,
        mut environment: Environment,
        connection: Connection,
    ) -> Result<Self, SessionError> {
        connection.set_write_timeout(config.write_timeout())?;
        let inbound = Arc::new(config.inbound_queue());
        let outbound = Arc::new(config.outbound_queue());
        let stop = Arc::new(AtomicBool::new(false));
        let (event_tx, events) = unbounded();

        let writer = spawn_writer(
            connection.try_clone()?,
            Arc::clone(&outbound),
            config.writer_poll(),
            Arc::clone(&stop),
            event_tx.clone(),
        )
        .map_err(TransportError::Io)?;
        let reader = match connection.try_clone().and_then(|reader_conn| {
            spawn_reader(
                reader_conn,
                Arc::clone(&inbound),
                Arc::clone(&stop),
                event_tx,
            )
            .map_err(TransportError::Io)
        }) {
            Ok(reader) => reader,
            Err(err) => {
                stop.store(true, Ordering::Release);
                outbound.close();
                let _ = writer.join();
                connection.shutdown();
                return Err(err.into());
            }
        };

        let viewport = Viewport::new(&environment.header(), &config.view);
        environment.rescale(&viewport);

        info!(
            target: "xs::session",
            peer = %connection.peer(),
            outbound_capacity = ?outbound.capacity(),
            cells = environment.len(),
            "session.started"
        );

        Ok(Self {
            interaction: InteractionController::new(&environment),
            environment,
            viewport,
            store: TruthStore::new(),
            dispatcher: Dispatcher::new(config.stale_after_ticks),
            inbound,
            outbound,
            connection,
            stop,
            events,
            reader: Some(reader),
            writer: Some(writer),
            lost: None,
            metrics: SessionMetrics::default(),
        })
    }

    /// Apply everything received since the last tick, then report a lost
    /// connection if either task has ended on an error.
    pub fn tick<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
    ) -> Result<DispatchReport, SessionError> {
        let report = self
            .dispatcher
            .tick(&mut self.store, &self.inbound, renderer);
        self.metrics.record_tick(&report);

        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::ConnectionLost { task, error }) => {
                    self.lost = Some(task);
                    return Err(SessionError::ConnectionLost {
                        task,
                        source: error,
                    });
                }
                Ok(SessionEvent::TaskStopped { task, records }) => {
                    debug!(target: "xs::session", %task, records, "session.task_stopped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(report)
    }

    pub fn handle_interaction<R: Renderer + ?Sized>(
        &mut self,
        event: InteractionEvent,
        renderer: &mut R,
    ) -> Result<InteractionOutcome, SessionError> {
        let outcome = self
            .interaction
            .handle(event, &self.store, &self.outbound, renderer)?;
        self.metrics.record_interaction(&outcome);
        Ok(outcome)
    }

    pub fn zoom(&mut self, ratio: f64) {
        self.viewport.zoom(ratio);
        self.environment.rescale(&self.viewport);
    }

    pub fn pan(&mut self, direction: PanDirection) -> bool {
        let moved = self.viewport.pan(direction);
        if moved {
            self.environment.rescale(&self.viewport);
        }
        moved
    }

    pub fn resize(&mut self, window_width: i32, window_height: i32) {
        self.viewport.resize(window_width, window_height);
        self.environment.rescale(&self.viewport);
    }

    pub fn log_device_list(&self) {
        self.dispatcher.log_device_list(&self.store);
    }

    pub fn log_device_list_verbose(&self) {
        self.dispatcher.log_device_list_verbose(&self.store);
    }

    pub fn store(&self) -> &TruthStore {
        &self.store
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    /// Task that lost the connection, if any.
    pub fn lost(&self) -> Option<TaskKind> {
        self.lost
    }

    pub fn is_running(&self) -> bool {
        self.reader.is_some() || self.writer.is_some()
    }

    /// Stop both tasks and wait for them. Queued outbound records are written
    /// before the socket closes, bounded by the write timeout. Safe to call
    /// more than once.
    pub fn shutdown(&mut self) {
        if !self.is_running() {
            return;
        }
        self.stop.store(true, Ordering::Release);
        self.outbound.close();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!(target: "xs::session", "session.writer_panicked");
            }
        }
        self.connection.shutdown();
        self.inbound.close();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!(target: "xs::session", "session.reader_panicked");
            }
        }
        info!(
            target: "xs::session",
            peer = %self.connection.peer(),
            ticks = self.metrics.ticks,
            applied = self.metrics.applied,
            sent = self.metrics.sent,
            "session.shutdown"
        );
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

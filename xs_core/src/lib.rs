//! Live visualization sync client for a remote multi-entity simulation.
//!
//! A [`SyncSession`] downloads the static environment once, then keeps a
//! local [`TruthStore`] in step with the server's truth stream. Two
//! background threads move records between the socket and a pair of
//! [`TruthQueue`]s; everything else runs on the thread that calls
//! [`SyncSession::tick`]. Drawing is delegated to a [`Renderer`].

pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod interaction;
pub mod metrics;
pub mod queue;
pub mod render;
pub mod session;
pub mod store;
pub mod tasks;
pub mod transport;
pub mod view;

pub use config::{
    load_client_config, load_client_config_from_env, ClientConfig, ClientConfigMetadata,
    ConfigError,
};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use environment::{download_environment, read_environment, Cell, Environment, EnvironmentError};
pub use interaction::{
    save_world_command, InteractionController, InteractionEvent, InteractionOutcome,
    InteractionState, ROTATE_STEP, SAVE_WORLD_ID,
};
pub use metrics::SessionMetrics;
pub use queue::{OverflowPolicy, PushOutcome, QueueClosed, TruthQueue};
pub use render::{NullRenderer, Renderer, TracingRenderer};
pub use session::{SessionError, SyncSession};
pub use store::TruthStore;
pub use tasks::{SessionEvent, TaskKind};
pub use transport::{Connection, TransportError};
pub use view::{PanDirection, ViewConfig, Viewport};

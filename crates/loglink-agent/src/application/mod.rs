//! Application layer: the connection state machine, the debounced toggle,
//! and the RemoteLogger orchestrator that binds them to discovery and
//! persistence.

pub mod connection;
pub mod debounce;
pub mod remote_logger;

pub use connection::{ConnectError, ConnectionEvent, ConnectionManager, ConnectionState, PairingTransport};
pub use remote_logger::{LoggerEvent, RemoteLogger, ServerView, StateSnapshot};

//! Outbound adapters: the SQLite document stores, the session registry
//! shared by both transports, the telnet and WebSocket transports
//! themselves, the world-file loader, and environment-driven configuration.
//! Wired together in `gaia-composition`.

pub mod config;
pub mod session_registry;
pub mod sqlite_store;
pub mod telnet;
pub mod websocket;
pub mod world_loader;

pub use config::AppConfig;
pub use session_registry::{SessionRegistry, SharedSessionRegistry, CONNECTION_CHANNEL_BUFFER};
pub use sqlite_store::{connect, SqliteAccountStore, SqliteWorldStore};
pub use websocket::{ws_handler, WebSocketState};
pub use world_loader::{load_directory, WorldLoadError};

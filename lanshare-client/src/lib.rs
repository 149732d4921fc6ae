pub mod config;
pub mod console;
pub mod logging;
pub mod service;
pub mod session;

pub use config::{ClientConfig, ConfigError, ConfigOverrides, PollIntervals, resolve_config};
pub use service::{ClientError, HttpPeerService, PeerService};
pub use session::{Command, Observer, Session, SessionSettings, SessionState, UiEvent};

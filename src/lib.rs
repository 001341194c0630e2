pub mod config;
pub mod errors;
pub mod playback;
pub mod server;
pub mod types;

pub use config::{ServerArgs, ServerConfig};
pub use errors::PlaybackError;
pub use playback::commands::ControlCommand;
pub use playback::state::StateStore;
pub use server::{AppState, build_router, run};
pub use types::{PlaybackState, SessionId};

//! mailproof common library
//!
//! Model types, placeholder extraction, locale fallback, rendering and the
//! persistence boundary shared by the engine and the CLI.

pub mod artifacts;
pub mod config;
pub mod db;
pub mod error;
pub mod locale;
pub mod placeholder;
pub mod render;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use artifacts::{ArtifactSlot, ArtifactStore};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use locale::{Resolution, ResolvedCopy};
pub use render::Rendered;
pub use sink::{ArtifactSink, MemorySink};
pub use types::*;

/// mailproof version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".mailproof")
}

//! Configuration resolver trait for layered overrides.
//!
//! # Architecture
//!
//! ```text
//! ConfigLoader.load()  →  TermConsoleConfig (file + env)
//!                              │
//!                              ▼
//!                   ConfigResolver.resolve()   (CLI flags, programmatic)
//!                              │
//!                              ▼
//!                     TermConsoleConfig (final)
//! ```

use super::{ConfigError, TermConsoleConfig};

/// Produces the final configuration for a console session.
///
/// Frontends implement this to put their own overrides (CLI flags,
/// embedder settings) on top of [`ConfigLoader`](super::ConfigLoader).
pub trait ConfigResolver {
    /// Resolves the configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any layer fails to load.
    fn resolve(&self) -> Result<TermConsoleConfig, ConfigError>;
}

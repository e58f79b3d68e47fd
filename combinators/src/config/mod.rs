//! Configuration for the retry engine
//!
//! [`RetryPolicy`] enumerates every retry option with its default and is
//! what `retry_with_backoff` consumes. [`ConfigLoader`] builds the
//! serializable [`RetrySettings`] with layered merging:
//! 1. Defaults (from code)
//! 2. Config file (cadence.toml)
//! 3. Environment variables (CADENCE_* prefix)
//!
//! # Example
//!
//! ```no_run
//! use cadence_combinators::config::ConfigLoader;
//!
//! let settings = ConfigLoader::new()
//!     .with_file("./cadence.toml")
//!     .load()
//!     .expect("Failed to load config");
//! let policy = settings.retry.into_policy().expect("invalid retry settings");
//! ```

pub mod error;
pub mod loader;
pub mod policy;

pub use error::{ConfigError, Result};
pub use loader::{CadenceConfig, ConfigLoader, RetrySettings};
pub use policy::RetryPolicy;

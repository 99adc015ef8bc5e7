//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env password override)
//!     → validation.rs (semantic checks)
//!     → PoolConfig (validated, immutable)
//!     → consumed by Pool / FailoverController / BackupExporter at init
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields except the descriptor list have defaults
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackupSettings, DescriptorConfig, HealthSettings, PoolConfig, PoolSettings, TableConfig,
};
pub use validation::{validate_config, ValidationError};

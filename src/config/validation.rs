//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the descriptor list is a usable failover priority list
//! - Validate value ranges (timeouts > 0, sizes consistent)
//! - Detect duplicate export tables
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PoolConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::PoolConfig;
use crate::pool::Role;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Config section the problem was found in (e.g. `pool`, `descriptors`).
    pub section: String,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.section, self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, section: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        section: section.to_string(),
        message: message.into(),
    });
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &PoolConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.descriptors.is_empty() {
        err(&mut errors, "descriptors", "at least one database target is required");
    } else {
        if config.descriptors[0].role != Role::Primary {
            err(
                &mut errors,
                "descriptors",
                "the first descriptor defines the highest failover priority and must be the primary",
            );
        }
        let primaries = config
            .descriptors
            .iter()
            .filter(|d| d.role == Role::Primary)
            .count();
        if primaries > 1 {
            err(
                &mut errors,
                "descriptors",
                format!("expected exactly one primary, found {}", primaries),
            );
        }
        for (i, d) in config.descriptors.iter().enumerate() {
            if d.host.is_empty() {
                err(&mut errors, "descriptors", format!("descriptor {} has an empty host", i));
            }
            if d.database.is_empty() {
                err(&mut errors, "descriptors", format!("descriptor {} has an empty database", i));
            }
            if d.user.is_empty() {
                err(&mut errors, "descriptors", format!("descriptor {} has an empty user", i));
            }
        }
    }

    if config.pool.max_size == 0 {
        err(&mut errors, "pool", "max_size must be at least 1");
    }
    if config.pool.min_idle > config.pool.max_size {
        err(
            &mut errors,
            "pool",
            format!(
                "min_idle ({}) cannot exceed max_size ({})",
                config.pool.min_idle, config.pool.max_size
            ),
        );
    }
    if config.pool.acquire_timeout_secs == 0 {
        err(&mut errors, "pool", "acquire_timeout_secs must be nonzero");
    }
    if config.pool.connect_timeout_secs == 0 {
        err(&mut errors, "pool", "connect_timeout_secs must be nonzero");
    }

    if config.health.interval_secs == 0 {
        err(&mut errors, "health", "interval_secs must be nonzero");
    }
    if config.health.probe_timeout_secs == 0 {
        err(&mut errors, "health", "probe_timeout_secs must be nonzero");
    }
    if config.health.suspect_threshold == 0 {
        err(&mut errors, "health", "suspect_threshold must be nonzero");
    }
    if config.health.backoff_base_ms == 0 {
        err(&mut errors, "health", "backoff_base_ms must be nonzero");
    }
    if config.health.backoff_max_ms < config.health.backoff_base_ms {
        err(&mut errors, "health", "backoff_max_ms must be >= backoff_base_ms");
    }

    if config.backup.export_timeout_secs == 0 {
        err(&mut errors, "backup", "export_timeout_secs must be nonzero");
    }
    let mut seen = HashSet::new();
    for table in &config.backup.tables {
        if table.name.is_empty() {
            err(&mut errors, "backup", "table name cannot be empty");
        }
        if !seen.insert(table.name.as_str()) {
            err(
                &mut errors,
                "backup",
                format!("duplicate table entry: {}", table.name),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DescriptorConfig, TableConfig};

    fn descriptor(role: Role, host: &str) -> DescriptorConfig {
        DescriptorConfig {
            role,
            host: host.to_string(),
            port: 5432,
            database: "app".to_string(),
            user: "app".to_string(),
            password: String::new(),
        }
    }

    fn valid_config() -> PoolConfig {
        let mut config = PoolConfig::default();
        config.descriptors = vec![
            descriptor(Role::Primary, "db-primary"),
            descriptor(Role::Standby, "db-standby"),
        ];
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_descriptor_list_rejected() {
        let mut config = valid_config();
        config.descriptors.clear();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.section == "descriptors"));
    }

    #[test]
    fn test_standby_first_rejected() {
        let mut config = valid_config();
        config.descriptors.swap(0, 1);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("must be the primary")));
    }

    #[test]
    fn test_all_errors_collected_not_just_first() {
        let mut config = valid_config();
        config.descriptors.clear();
        config.pool.max_size = 0;
        config.health.suspect_threshold = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn test_min_idle_above_max_size_rejected() {
        let mut config = valid_config();
        config.pool.max_size = 2;
        config.pool.min_idle = 5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("min_idle")));
    }

    #[test]
    fn test_duplicate_backup_table_rejected() {
        let mut config = valid_config();
        config.backup.tables = vec![
            TableConfig {
                name: "client_bot_signups".to_string(),
                order_by: "id".to_string(),
            },
            TableConfig {
                name: "client_bot_signups".to_string(),
                order_by: "id".to_string(),
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }
}

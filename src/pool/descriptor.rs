//! Database target descriptors.
//!
//! A descriptor is immutable once constructed. The ordered descriptor list
//! handed to the pool at init (primary first, then standbys) defines the
//! failover priority.

use serde::{Deserialize, Serialize};

use crate::config::DescriptorConfig;

/// Failover role of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Standby,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Standby => write!(f, "standby"),
        }
    }
}

/// Immutable record of one database target.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    pub role: Role,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectionDescriptor {
    /// `host:port` form, for logs and error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&DescriptorConfig> for ConnectionDescriptor {
    fn from(config: &DescriptorConfig) -> Self {
        Self {
            role: config.role,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

// Manual Debug so the password can never end up in logs.
impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("role", &self.role)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}/{}", self.role, self.addr(), self.database)
    }
}

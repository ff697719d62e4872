//! Domain primitive types used across the hull workspace.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Length of generated container identifiers.
const CONTAINER_ID_LEN: usize = 10;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(CONTAINER_ID_LEN);
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a container as persisted in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container process is alive.
    Running,
    /// Container was stopped by `hull stop`.
    Stopped,
    /// Container process exited on its own.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Resource limits requested for a container.
///
/// Values are passed through verbatim to the cgroup control files, so
/// `memory_limit` accepts kernel suffixes such as `100m`. `None` leaves the
/// corresponding subsystem untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Value for `memory.limit_in_bytes`.
    pub memory_limit: Option<String>,
    /// Value for `cpu.shares`.
    pub cpu_share: Option<String>,
    /// Value for `cpuset.cpus`.
    pub cpu_set: Option<String>,
}

/// Persistent record of a container, stored as `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container identifier.
    pub id: ContainerId,
    /// Human-readable name, unique per host.
    pub name: String,
    /// Host PID of the container init process, blank once stopped.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Space-joined user command.
    pub command: String,
    /// Creation timestamp.
    pub created_time: String,
    /// Current lifecycle status.
    pub status: ContainerStatus,
    /// Volume spec `hostPath:containerPath`, if one was requested.
    #[serde(default)]
    pub volume: Option<String>,
    /// Image the container root was built from.
    pub image: String,
    /// Network the container is attached to.
    #[serde(default)]
    pub network: Option<String>,
    /// Requested `hostPort:containerPort` mappings.
    #[serde(default)]
    pub port_mappings: Vec<String>,
    /// Address allocated on `network`.
    #[serde(default)]
    pub ip_address: Option<Ipv4Addr>,
}

//! System-wide constants and default paths.

/// Default runtime root directory.
pub const DEFAULT_ROOT_DIR: &str = "/var/lib/hull";

/// Default parent directory for per-container cgroups.
pub const DEFAULT_CGROUP_PARENT: &str = "hull";

/// Environment variable overriding the runtime root directory.
pub const ROOT_DIR_ENV: &str = "HULL_ROOT";

/// Name of the persisted container record file.
pub const CONFIG_NAME: &str = "config.json";

/// Name of the detached container's log file.
pub const CONTAINER_LOG_FILE: &str = "container.log";

/// Argument that re-enters the binary in container init mode.
pub const INIT_ARG: &str = "init";

/// File descriptor on which the init process receives its command.
pub const INIT_PIPE_FD: i32 = 3;

/// Linux limit on interface name length, excluding the terminator.
pub const MAX_IFNAME_LEN: usize = 15;

/// Network driver implemented by the runtime.
pub const BRIDGE_DRIVER: &str = "bridge";

/// Format used for `created_time` in container records.
pub const CREATED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Application name used in CLI output.
pub const APP_NAME: &str = "hull";

//! Namespace joining for executing commands in running containers.

use std::process::ExitStatus;

use hull_common::error::{HullError, Result};

/// Reads the environment of process `pid` as `KEY=VALUE` pairs.
///
/// # Errors
///
/// Returns an error if `/proc/<pid>/environ` cannot be read.
pub fn process_env(pid: u32) -> Result<Vec<(String, String)>> {
    let path = format!("/proc/{pid}/environ");
    let raw = std::fs::read(&path).map_err(|e| HullError::io(path, e))?;
    Ok(parse_environ(&raw))
}

fn parse_environ(raw: &[u8]) -> Vec<(String, String)> {
    raw.split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (key, value) = entry.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Runs `command` inside the namespaces of process `pid`.
///
/// Uses `nsenter` to enter the target's mount, UTS, IPC, network, and PID
/// namespaces, with the target's own environment. Standard streams are
/// inherited.
///
/// # Errors
///
/// Returns an error if the command is empty, the environment cannot be read,
/// or `nsenter` cannot be spawned.
#[cfg(target_os = "linux")]
pub fn exec_in_container(pid: u32, command: &[String]) -> Result<ExitStatus> {
    if command.is_empty() {
        return Err(HullError::Config {
            message: "exec command is empty".into(),
        });
    }
    let env = process_env(pid)?;
    tracing::info!(pid, cmd = ?command, "exec into container");

    std::process::Command::new("nsenter")
        .args([
            "--target",
            &pid.to_string(),
            "--mount",
            "--uts",
            "--ipc",
            "--net",
            "--pid",
            "--",
        ])
        .args(command)
        .env_clear()
        .envs(env)
        .status()
        .map_err(|e| HullError::Command {
            program: "nsenter".into(),
            message: e.to_string(),
        })
}

/// Runs `command` inside the namespaces of process `pid`.
///
/// # Errors
///
/// Always returns an error on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn exec_in_container(_pid: u32, _command: &[String]) -> Result<ExitStatus> {
    Err(HullError::Config {
        message: "exec requires Linux".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_is_split_on_nul() {
        let env = parse_environ(b"PATH=/bin:/usr/bin\0HOME=/root\0EMPTY=\0junk\0\0");
        assert_eq!(
            env,
            vec![
                ("PATH".into(), "/bin:/usr/bin".into()),
                ("HOME".into(), "/root".into()),
                ("EMPTY".into(), String::new()),
            ]
        );
    }

    #[test]
    fn own_environment_is_readable() {
        let env = process_env(std::process::id()).unwrap();
        assert!(!env.is_empty() || std::env::vars().next().is_none());
    }
}

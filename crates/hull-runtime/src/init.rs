//! In-container bootstrap.
//!
//! Runs as the first process of a new container: receives the user command
//! on the inherited pipe, switches the root to the merged workspace and
//! replaces itself with the command.

use std::io::Read;

use hull_common::error::{HullError, Result};

/// Reads the command handed over on `pipe` and splits it into argv.
///
/// # Errors
///
/// Returns an error if the pipe cannot be read or carries no command.
pub fn read_command(mut pipe: impl Read) -> Result<Vec<String>> {
    let mut raw = String::new();
    let _ = pipe
        .read_to_string(&mut raw)
        .map_err(|e| HullError::io("<command pipe>", e))?;
    let argv: Vec<String> = raw
        .split(' ')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    if argv.is_empty() {
        return Err(HullError::Config {
            message: "container command is empty".into(),
        });
    }
    Ok(argv)
}

/// Bootstraps the container and execs the user command.
///
/// Only returns on failure.
///
/// # Errors
///
/// Returns an error if the command cannot be read, the root cannot be set
/// up, or the executable cannot be found or executed.
#[cfg(target_os = "linux")]
pub fn run_init() -> Result<()> {
    use std::fs::File;
    use std::os::fd::FromRawFd;
    use std::os::unix::process::CommandExt;

    use hull_common::constants::INIT_PIPE_FD;

    // SAFETY: the launcher leaves the pipe read end at this descriptor and
    // nothing else in this process owns it.
    let pipe = unsafe { File::from_raw_fd(INIT_PIPE_FD) };
    let argv = read_command(pipe)?;
    tracing::debug!(command = ?argv, "init received command");

    hull_core::filesystem::mount::setup_container_root()?;

    let program = &argv[0];
    let path = which::which(program).map_err(|e| HullError::NotFound {
        kind: "executable",
        id: format!("{program}: {e}"),
    })?;
    tracing::debug!(path = %path.display(), "exec container command");

    let err = std::process::Command::new(&path)
        .arg0(program)
        .args(&argv[1..])
        .exec();
    Err(HullError::io(path, err))
}

/// Bootstraps the container and execs the user command.
///
/// # Errors
///
/// Always returns an error on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn run_init() -> Result<()> {
    Err(HullError::Config {
        message: "Linux required for native container operations".into(),
    })
}

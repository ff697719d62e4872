//! `hull init` — Bootstrap a new container.
//!
//! Executed by the runtime as the first process inside the container's
//! namespaces; never returns on success.

/// Executes the `init` command.
///
/// # Errors
///
/// Returns an error if the container root cannot be prepared or the user
/// command cannot be executed.
pub fn execute() -> anyhow::Result<()> {
    tracing::debug!("container init starting");
    hull_runtime::init::run_init()?;
    Ok(())
}

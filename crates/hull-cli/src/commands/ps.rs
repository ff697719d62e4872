//! `hull ps` — List containers.

use hull_common::config::HullConfig;
use hull_runtime::Engine;

use crate::output;

const HEADERS: [&str; 8] = ["ID", "NAME", "PID", "IMAGE", "STATUS", "COMMAND", "CREATED", "IP"];

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the container records cannot be listed.
pub fn execute(config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    let rows: Vec<Vec<String>> = engine
        .list()?
        .into_iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.name,
                output::or_blank(c.pid),
                c.image,
                c.status.to_string(),
                c.command,
                c.created_time,
                output::or_blank(c.ip_address),
            ]
        })
        .collect();

    print!("{}", output::table(&HEADERS, &rows));
    Ok(())
}

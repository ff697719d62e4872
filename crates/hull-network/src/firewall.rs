//! iptables NAT rules for bridge networks.
//!
//! Rules are built as argument vectors so the exact command lines can be
//! checked without touching the host firewall.

use std::net::Ipv4Addr;
use std::process::Command;

use hull_common::error::{HullError, Result};
use ipnetwork::Ipv4Network;

use crate::endpoint::PortMapping;

/// Whether a rule is appended or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// `-A`: append the rule.
    Append,
    /// `-D`: delete a matching rule.
    Delete,
}

impl RuleAction {
    const fn flag(self) -> &'static str {
        match self {
            Self::Append => "-A",
            Self::Delete => "-D",
        }
    }
}

/// Outbound NAT for traffic leaving `subnet` through anything but `bridge`.
#[must_use]
pub fn masquerade_args(action: RuleAction, subnet: Ipv4Network, bridge: &str) -> Vec<String> {
    [
        "-t",
        "nat",
        action.flag(),
        "POSTROUTING",
        "-s",
        subnet.to_string().as_str(),
        "!",
        "-o",
        bridge,
        "-j",
        "MASQUERADE",
    ]
    .map(str::to_string)
    .to_vec()
}

/// Forwards TCP `mapping.host` on the host to `ip:mapping.container`.
#[must_use]
pub fn dnat_args(action: RuleAction, mapping: PortMapping, ip: Ipv4Addr) -> Vec<String> {
    [
        "-t",
        "nat",
        action.flag(),
        "PREROUTING",
        "-p",
        "tcp",
        "-m",
        "tcp",
        "--dport",
        mapping.host.to_string().as_str(),
        "-j",
        "DNAT",
        "--to-destination",
        format!("{ip}:{}", mapping.container).as_str(),
    ]
    .map(str::to_string)
    .to_vec()
}

/// Runs `iptables` with `args`.
///
/// # Errors
///
/// Returns [`HullError::Command`] if `iptables` cannot be spawned or exits
/// unsuccessfully.
pub fn run_iptables(args: &[String]) -> Result<()> {
    let output = Command::new("iptables")
        .args(args)
        .output()
        .map_err(|e| HullError::Command {
            program: "iptables".into(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(HullError::Command {
            program: "iptables".into(),
            message: format!(
                "{}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    tracing::debug!(args = %args.join(" "), "iptables rule applied");
    Ok(())
}

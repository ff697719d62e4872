//! Runtime engine that orchestrates container lifecycle.
//!
//! The engine ties the launcher, cgroups, workspaces, networking and the
//! record store together. Every CLI invocation builds one engine; state
//! shared between invocations lives on disk under the runtime root.

use std::path::{Path, PathBuf};

use hull_common::config::HullConfig;
use hull_common::constants::CREATED_TIME_FORMAT;
use hull_common::error::{Failures, HullError, Result};
use hull_common::layout::Layout;
use hull_common::types::{ContainerId, ContainerRecord, ContainerStatus, ResourceConfig};
use hull_core::cgroup::{CgroupManager, Hierarchy};
use hull_core::filesystem::{KernelMounter, LayerManager, Mounter};
use hull_network::NetworkManager;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::process::{self, ContainerProcess};
use crate::state::RecordStore;

/// Parameters of a container launch.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Attach to the terminal and wait for the container to exit.
    pub tty: bool,
    /// Container name; the generated id is used when absent.
    pub name: Option<String>,
    /// Image layer the root is built from.
    pub image: String,
    /// Command and arguments run inside the container.
    pub command: Vec<String>,
    /// Volume spec `hostPath:containerPath`.
    pub volume: Option<String>,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Network to attach the container to.
    pub network: Option<String>,
    /// `hostPort:containerPort` mappings on `network`.
    pub port_mappings: Vec<String>,
    /// Cgroup limits.
    pub resources: ResourceConfig,
}

/// Result of [`Engine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Record of the launched container.
    pub record: ContainerRecord,
    /// Exit code, for containers run in the foreground.
    pub exit_code: Option<i32>,
}

/// The runtime engine that coordinates all container operations.
#[derive(Debug)]
pub struct Engine<M: Mounter = KernelMounter> {
    config: HullConfig,
    layout: Layout,
    store: RecordStore,
    layers: LayerManager<M>,
    hierarchy: Hierarchy,
}

impl Engine<KernelMounter> {
    /// Creates an engine issuing real mounts.
    #[must_use]
    pub fn new(config: HullConfig) -> Self {
        Self::with_mounter(config, KernelMounter)
    }
}

impl<M: Mounter> Engine<M> {
    /// Creates an engine using `mounter` for workspace mounts.
    #[must_use]
    pub fn with_mounter(config: HullConfig, mounter: M) -> Self {
        let layout = config.layout();
        Self {
            store: RecordStore::new(layout.clone()),
            layers: LayerManager::with_mounter(layout.clone(), mounter),
            hierarchy: Hierarchy::default(),
            layout,
            config,
        }
    }

    /// Uses `hierarchy` to locate cgroup mount points.
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Returns the path layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Returns the mounter used for workspaces.
    #[must_use]
    pub fn mounter(&self) -> &M {
        self.layers.mounter()
    }

    /// Returns the container record store.
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Loads the network registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the network records cannot be read.
    pub fn networks(&self) -> Result<NetworkManager> {
        NetworkManager::init(&self.layout)
    }

    /// Launches a container.
    ///
    /// Detached containers are left running with their record saved. A
    /// foreground (`tty`) container is waited for and then torn down.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, the name is invalid or
    /// taken, or any setup step fails. Once the child exists, a failure kills
    /// it and tears down everything set up so far.
    pub fn run(&self, opts: &RunOptions) -> Result<RunOutcome> {
        self.run_with(opts, |_| {})
    }

    /// Like [`Engine::run`], handing the started process to `on_start` once
    /// it has received its command.
    ///
    /// A foreground caller uses the handle to forward signals while the
    /// engine waits, so teardown still runs when the user interrupts.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::run`].
    pub fn run_with(
        &self,
        opts: &RunOptions,
        on_start: impl FnOnce(ContainerProcess),
    ) -> Result<RunOutcome> {
        if opts.command.is_empty() {
            return Err(HullError::Config {
                message: "missing container command".into(),
            });
        }
        let id = ContainerId::generate();
        let name = opts.name.clone().unwrap_or_else(|| id.to_string());
        validate_name(&name)?;
        if self.store.exists(&name) {
            return Err(HullError::InvalidState {
                message: format!("container name {name} is already in use"),
            });
        }

        let mut record = ContainerRecord {
            id,
            name,
            pid: None,
            command: opts.command.join(" "),
            created_time: chrono::Local::now().format(CREATED_TIME_FORMAT).to_string(),
            status: ContainerStatus::Running,
            volume: opts.volume.clone(),
            image: opts.image.clone(),
            network: opts.network.clone(),
            port_mappings: opts.port_mappings.clone(),
            ip_address: None,
        };

        let (isolated, pipe) = match process::new_isolated_process(
            &self.layers,
            &self.layout,
            opts.tty,
            opts.volume.as_deref(),
            &record.name,
            &opts.image,
            &opts.env,
        ) {
            Ok(prepared) => prepared,
            Err(e) => {
                let _ = self.store.delete(&record.name);
                return Err(e);
            }
        };
        let child = match isolated.start() {
            Ok(child) => child,
            Err(e) => {
                let _ = self.teardown(&record);
                return Err(e);
            }
        };
        record.pid = Some(child.pid());
        self.limit(&record, &opts.resources);

        if let Some(network) = &opts.network {
            match self.networks().and_then(|nets| nets.connect(network, &record)) {
                Ok(ip) => record.ip_address = Some(ip),
                Err(e) => return Err(self.abort(child, &record, e)),
            }
        }
        if let Err(e) = self.store.save(&record) {
            return Err(self.abort(child, &record, e));
        }
        if let Err(e) = pipe.send(&opts.command) {
            return Err(self.abort(child, &record, e));
        }
        tracing::info!(
            id = %record.id,
            name = %record.name,
            pid = child.pid(),
            ip = ?record.ip_address,
            "container running"
        );
        on_start(child);

        if !opts.tty {
            return Ok(RunOutcome {
                record,
                exit_code: None,
            });
        }
        let exit = child.wait();
        let failures = self.teardown(&record);
        if !failures.is_empty() {
            tracing::warn!(name = %record.name, failures = failures.len(), "teardown incomplete");
        }
        Ok(RunOutcome {
            record,
            exit_code: Some(exit?),
        })
    }

    /// Sends `SIGTERM` to container `name` and marks it stopped.
    ///
    /// A process that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing, the signal cannot be
    /// delivered, or the record cannot be rewritten.
    pub fn stop(&self, name: &str) -> Result<ContainerRecord> {
        validate_name(name)?;
        let mut record = self.store.load(name)?;
        if let Some(pid) = record.pid {
            match signal::kill(host_pid(pid)?, Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => return Err(HullError::kernel("kill", e)),
            }
        }
        record.status = ContainerStatus::Stopped;
        record.pid = None;
        self.store.save(&record)?;
        tracing::info!(name, "container stopped");
        Ok(record)
    }

    /// Removes stopped container `name` and everything it owns.
    ///
    /// Network attachment, cgroup, workspace and record are torn down in
    /// that order; each step is attempted and its failures returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing, or
    /// [`HullError::InvalidState`] if the container is not stopped, in which
    /// case nothing is removed.
    pub fn remove(&self, name: &str) -> Result<Failures> {
        validate_name(name)?;
        let record = self.store.load(name)?;
        if record.status != ContainerStatus::Stopped {
            return Err(HullError::InvalidState {
                message: format!("container {name} is {}, stop it before removing", record.status),
            });
        }
        let failures = self.teardown(&record);
        tracing::info!(name, failures = failures.len(), "container removed");
        Ok(failures)
    }

    /// Lists every container record.
    ///
    /// Running records whose process has died are marked exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be listed.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let mut records = self.store.list()?;
        for record in &mut records {
            if record.status != ContainerStatus::Running || record.pid.is_some_and(is_alive) {
                continue;
            }
            record.status = ContainerStatus::Exited;
            record.pid = None;
            if let Err(e) = self.store.save(record) {
                tracing::warn!(name = %record.name, error = %e, "failed to record exit");
            }
        }
        Ok(records)
    }

    /// Returns the captured output of container `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn logs(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        crate::logs::read_logs(&self.layout, name)
    }

    /// Runs `command` inside running container `name` and returns its exit
    /// code.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or not running, or the
    /// command cannot be started.
    pub fn exec(&self, name: &str, command: &[String]) -> Result<i32> {
        validate_name(name)?;
        let record = self.store.load(name)?;
        let pid = match (record.status, record.pid) {
            (ContainerStatus::Running, Some(pid)) => pid,
            _ => {
                return Err(HullError::InvalidState {
                    message: format!("container {name} is not running"),
                });
            }
        };
        let status = crate::exec::exec_in_container(pid, command)?;
        Ok(status.code().unwrap_or(1))
    }

    /// Exports the root of container `name` to `<package>.tar.gz` in
    /// `out_dir`, returning the archive path.
    ///
    /// # Errors
    ///
    /// Returns an error if the container root does not exist or the archive
    /// cannot be written.
    pub fn commit(&self, name: &str, package: &str, out_dir: &Path) -> Result<PathBuf> {
        validate_name(name)?;
        validate_name(package)?;
        let output = crate::commit::archive_path(out_dir, package);
        crate::commit::export_root(&self.layout.merged_dir(name), &output)?;
        Ok(output)
    }

    fn cgroup(&self, record: &ContainerRecord) -> CgroupManager {
        CgroupManager::new(self.config.cgroup_path(record.id.as_str()))
            .with_hierarchy(self.hierarchy.clone())
    }

    fn limit(&self, record: &ContainerRecord, resources: &ResourceConfig) {
        let Some(pid) = record.pid else {
            return;
        };
        let cgroup = self.cgroup(record);
        let failed = cgroup.set(resources).len() + cgroup.apply(pid, resources).len();
        if failed > 0 {
            tracing::warn!(name = %record.name, failed, "resource limits partially applied");
        }
    }

    fn abort(&self, child: ContainerProcess, record: &ContainerRecord, err: HullError) -> HullError {
        tracing::error!(name = %record.name, error = %err, "container launch failed");
        if let Err(e) = child.kill() {
            tracing::warn!(pid = child.pid(), error = %e, "failed to kill container process");
        }
        let _ = child.wait();
        let _ = self.teardown(record);
        err
    }

    fn teardown(&self, record: &ContainerRecord) -> Failures {
        let mut failures = Failures::new();
        if let (Some(network), Some(_)) = (&record.network, record.ip_address) {
            match self.networks() {
                Ok(nets) => failures.extend(nets.disconnect(network, record)),
                Err(e) => {
                    tracing::warn!(network, error = %e, "network registry unavailable");
                    failures.push(e);
                }
            }
        }
        failures.extend(self.cgroup(record).destroy());
        failures.extend(self.layers.delete_workspace(
            record.volume.as_deref(),
            &record.name,
            &record.image,
        ));
        if let Err(e) = self.store.delete(&record.name) {
            tracing::warn!(name = %record.name, error = %e, "record removal failed");
            failures.push(e);
        }
        failures
    }
}

/// Container names become directory names under the runtime root.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(HullError::Config {
            message: format!("container name {name:?} must be a single path component"),
        });
    }
    Ok(())
}

fn host_pid(pid: u32) -> Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| HullError::InvalidState {
            message: format!("recorded pid {pid} is out of range"),
        })
}

fn is_alive(pid: u32) -> bool {
    host_pid(pid).is_ok_and(|pid| !matches!(signal::kill(pid, None), Err(Errno::ESRCH)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn absent_pid_is_dead() {
        assert!(!is_alive(i32::MAX.unsigned_abs()));
        assert!(!is_alive(u32::MAX));
    }

    #[test]
    fn empty_command_is_rejected_before_any_setup() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(HullConfig::with_root(dir.path()));
        let err = engine
            .run(&RunOptions {
                image: "busybox".into(),
                ..RunOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, HullError::Config { .. }));
        assert!(!dir.path().join("containers").exists());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(HullConfig::with_root(dir.path()));
        let layout = engine.layout().clone();
        std::fs::create_dir_all(layout.container_dir("web")).unwrap();
        std::fs::write(layout.config_file("web"), "{}").unwrap();

        let err = engine
            .run(&RunOptions {
                name: Some("web".into()),
                image: "busybox".into(),
                command: vec!["sh".into()],
                ..RunOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, HullError::InvalidState { .. }));
    }

    #[test]
    fn name_outside_containers_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(HullConfig::with_root(dir.path()));
        let marker = dir.path().join("images/busybox/marker");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "keep").unwrap();

        for name in ["..", ".", "", "../images", "a/b"] {
            let err = engine
                .run(&RunOptions {
                    name: Some(name.into()),
                    image: "busybox".into(),
                    command: vec!["sh".into()],
                    ..RunOptions::default()
                })
                .unwrap_err();
            assert!(matches!(err, HullError::Config { .. }), "{name:?}: {err}");
        }
        assert!(marker.exists());
        assert!(!dir.path().join("containers").exists());
    }

    #[test]
    fn lifecycle_commands_reject_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(HullConfig::with_root(dir.path()));
        assert!(matches!(engine.remove(".."), Err(HullError::Config { .. })));
        assert!(matches!(engine.stop("a/b"), Err(HullError::Config { .. })));
        assert!(matches!(engine.logs("../x"), Err(HullError::Config { .. })));
        assert!(matches!(
            engine.commit("c1", "../../pkg", dir.path()),
            Err(HullError::Config { .. })
        ));
    }

    #[test]
    fn missing_image_leaves_no_container_dir() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(HullConfig::with_root(dir.path()));
        let err = engine
            .run(&RunOptions {
                name: Some("c1".into()),
                image: "absent".into(),
                command: vec!["sh".into()],
                ..RunOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, HullError::NotFound { kind: "image", .. }));
        assert!(!engine.layout().container_dir("c1").exists());
    }
}

//! Container lifecycle tests against a scratch runtime root.
//!
//! Mounts are recorded instead of issued and cgroup hierarchies live in a
//! temporary directory, so these run unprivileged. Containers are stood in
//! for by ordinary child processes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use hull_common::config::HullConfig;
use hull_common::error::{HullError, Result};
use hull_common::types::{ContainerId, ContainerRecord, ContainerStatus};
use hull_core::cgroup::Hierarchy;
use hull_core::filesystem::{Mounter, OverlayConfig};
use hull_runtime::Engine;

#[derive(Debug, Default)]
struct RecordingMounter {
    unmounted: RefCell<Vec<PathBuf>>,
}

impl Mounter for RecordingMounter {
    fn mount_overlay(&self, _config: &OverlayConfig) -> Result<()> {
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        self.unmounted.borrow_mut().push(target.to_path_buf());
        Ok(())
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    engine: Engine<RecordingMounter>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cgroups = dir.path().join("cgroup");
        let table: String = ["cpuset", "memory", "cpu"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mount = cgroups.join(name);
                std::fs::create_dir_all(&mount).unwrap();
                format!(
                    "{} 24 0:{} / {} rw shared:{} - cgroup cgroup rw,{}\n",
                    30 + i,
                    40 + i,
                    mount.display(),
                    10 + i,
                    name
                )
            })
            .collect();
        let mountinfo = dir.path().join("mountinfo");
        std::fs::write(&mountinfo, table).unwrap();

        let config = HullConfig::with_root(dir.path().join("root"));
        let engine = Engine::with_mounter(config, RecordingMounter::default())
            .with_hierarchy(Hierarchy::with_mountinfo(mountinfo));
        Self { dir, engine }
    }

    fn cgroup_dir(&self, subsystem: &str, id: &str) -> PathBuf {
        self.dir.path().join("cgroup").join(subsystem).join("hull").join(id)
    }

    fn save(&self, name: &str, pid: Option<u32>, status: ContainerStatus) -> ContainerRecord {
        let record = ContainerRecord {
            id: ContainerId::new(format!("{name}-id")),
            name: name.into(),
            pid,
            command: "sleep 30".into(),
            created_time: "2024-01-01 00:00:00".into(),
            status,
            volume: None,
            image: "busybox".into(),
            network: None,
            port_mappings: Vec::new(),
            ip_address: None,
        };
        self.engine.store().save(&record).unwrap();
        record
    }
}

fn sleeper() -> Child {
    Command::new("sleep").arg("30").spawn().unwrap()
}

// ── Stop ─────────────────────────────────────────────────────────────

#[test]
fn stop_sends_sigterm_and_blanks_pid() {
    let fx = Fixture::new();
    let mut child = sleeper();
    let _ = fx.save("c1", Some(child.id()), ContainerStatus::Running);

    let stopped = fx.engine.stop("c1").unwrap();
    assert_eq!(stopped.status, ContainerStatus::Stopped);
    assert_eq!(stopped.pid, None);

    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(15));

    let reloaded = fx.engine.store().load("c1").unwrap();
    assert_eq!(reloaded.status, ContainerStatus::Stopped);
    assert_eq!(reloaded.pid, None);
}

#[test]
fn stop_tolerates_vanished_process() {
    let fx = Fixture::new();
    let mut child = sleeper();
    let pid = child.id();
    child.kill().unwrap();
    let _ = child.wait().unwrap();
    let _ = fx.save("gone", Some(pid), ContainerStatus::Running);

    let stopped = fx.engine.stop("gone").unwrap();
    assert_eq!(stopped.status, ContainerStatus::Stopped);
}

#[test]
fn stop_unknown_container_is_not_found() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.engine.stop("ghost"),
        Err(HullError::NotFound { kind: "container", .. })
    ));
}

// ── Remove ───────────────────────────────────────────────────────────

#[test]
fn remove_refuses_running_container() {
    let fx = Fixture::new();
    let mut child = sleeper();
    let record = fx.save("busy", Some(child.id()), ContainerStatus::Running);
    let layers = fx.engine.layout().write_layer("busy");
    std::fs::create_dir_all(&layers).unwrap();
    let cgroup = fx.cgroup_dir("memory", record.id.as_str());
    std::fs::create_dir_all(&cgroup).unwrap();

    let err = fx.engine.remove("busy").unwrap_err();
    assert!(matches!(err, HullError::InvalidState { .. }));
    assert!(fx.engine.store().exists("busy"));
    assert!(layers.is_dir());
    assert!(cgroup.is_dir());
    assert!(fx.engine.mounter().unmounted.borrow().is_empty());

    child.kill().unwrap();
    let _ = child.wait().unwrap();
}

#[test]
fn remove_refuses_exited_container() {
    let fx = Fixture::new();
    let _ = fx.save("done", None, ContainerStatus::Exited);
    assert!(fx.engine.remove("done").is_err());
    assert!(fx.engine.store().exists("done"));
}

#[test]
fn remove_tears_down_stopped_container() {
    let fx = Fixture::new();
    let record = fx.save("c1", None, ContainerStatus::Stopped);
    let layout = fx.engine.layout().clone();
    let image = layout.image_layer("busybox");
    std::fs::create_dir_all(&image).unwrap();
    std::fs::write(image.join("marker"), "base").unwrap();
    std::fs::create_dir_all(layout.write_layer("c1")).unwrap();
    std::fs::create_dir_all(layout.merged_dir("c1")).unwrap();
    let cgroup = fx.cgroup_dir("cpuset", record.id.as_str());
    std::fs::create_dir_all(&cgroup).unwrap();

    let failures = fx.engine.remove("c1").unwrap();
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");

    assert!(!fx.engine.store().exists("c1"));
    assert!(!layout.container_dir("c1").exists());
    assert!(!layout.container_layers("c1").exists());
    assert!(!cgroup.exists());
    assert!(image.join("marker").is_file());
    assert_eq!(
        *fx.engine.mounter().unmounted.borrow(),
        vec![layout.merged_dir("c1")]
    );
}

// ── List / logs / commit ─────────────────────────────────────────────

#[test]
fn list_marks_dead_processes_exited() {
    let fx = Fixture::new();
    let mut alive = sleeper();
    let _ = fx.save("alive", Some(alive.id()), ContainerStatus::Running);
    let _ = fx.save("dead", Some(i32::MAX.unsigned_abs()), ContainerStatus::Running);
    let _ = fx.save("stopped", None, ContainerStatus::Stopped);

    let records = fx.engine.list().unwrap();
    let status = |name: &str| {
        records
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status("alive"), ContainerStatus::Running);
    assert_eq!(status("dead"), ContainerStatus::Exited);
    assert_eq!(status("stopped"), ContainerStatus::Stopped);
    assert_eq!(
        fx.engine.store().load("dead").unwrap().status,
        ContainerStatus::Exited
    );

    alive.kill().unwrap();
    let _ = alive.wait().unwrap();
}

#[test]
fn logs_read_detached_output() {
    let fx = Fixture::new();
    let _ = fx.save("c1", None, ContainerStatus::Stopped);
    std::fs::write(fx.engine.layout().log_file("c1"), "hello\n").unwrap();
    assert_eq!(fx.engine.logs("c1").unwrap(), "hello\n");
    assert!(fx.engine.logs("other").unwrap().is_empty());
}

#[test]
fn exec_requires_running_container() {
    let fx = Fixture::new();
    let _ = fx.save("c1", None, ContainerStatus::Stopped);
    let err = fx.engine.exec("c1", &["ls".into()]).unwrap_err();
    assert!(matches!(err, HullError::InvalidState { .. }));
}

#[test]
fn commit_archives_merged_root() {
    let fx = Fixture::new();
    let merged = fx.engine.layout().merged_dir("c1");
    std::fs::create_dir_all(merged.join("bin")).unwrap();
    std::fs::write(merged.join("bin/app"), "#!/bin/sh\n").unwrap();

    let out = fx.engine.commit("c1", "snapshot", fx.dir.path()).unwrap();
    assert_eq!(out, fx.dir.path().join("snapshot.tar.gz"));
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}

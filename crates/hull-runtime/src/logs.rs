//! Container log access.

use hull_common::error::{HullError, Result};
use hull_common::layout::Layout;

/// Reads the output captured for detached container `name`.
///
/// Returns an empty string if the log file does not exist yet.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(layout: &Layout, name: &str) -> Result<String> {
    let path = layout.log_file(name);
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read(&path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| HullError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());
        assert!(read_logs(&layout, "nonexistent").expect("read").is_empty());
    }

    #[test]
    fn reads_captured_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.container_dir("c1")).expect("mkdir");
        std::fs::write(layout.log_file("c1"), "line one\nline two\n").expect("write");

        let content = read_logs(&layout, "c1").expect("read");
        assert!(content.contains("line one"));
        assert!(content.contains("line two"));
    }

    #[test]
    fn containers_have_separate_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());
        for name in ["a", "b"] {
            std::fs::create_dir_all(layout.container_dir(name)).expect("mkdir");
            std::fs::write(layout.log_file(name), format!("from {name}")).expect("write");
        }
        let a = read_logs(&layout, "a").expect("read a");
        assert!(a.contains("from a"));
        assert!(!a.contains("from b"));
    }
}

//! Parsing of `hostPath:containerPath` volume specs.

use std::path::{Component, Path, PathBuf};

/// A validated bind volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Host directory that becomes the writable layer.
    pub host_path: PathBuf,
    /// Absolute path inside the container.
    pub container_path: PathBuf,
}

impl VolumeSpec {
    /// Parses `spec`, requiring exactly two non-empty colon-separated paths.
    ///
    /// A container path with `..` components is rejected, since its mount
    /// target could resolve outside the container root.
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split(':');
        let host = parts.next()?;
        let container = parts.next()?;
        if parts.next().is_some() || host.is_empty() || container.is_empty() {
            return None;
        }
        let container_path = PathBuf::from(container);
        if container_path
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return None;
        }
        Some(Self {
            host_path: PathBuf::from(host),
            container_path,
        })
    }

    /// Resolves the container path underneath the container root `merged`.
    #[must_use]
    pub fn target_in(&self, merged: &Path) -> PathBuf {
        let relative = self
            .container_path
            .strip_prefix("/")
            .unwrap_or(&self.container_path);
        merged.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_paths() {
        let spec = VolumeSpec::parse("/host/data:/data").unwrap();
        assert_eq!(spec.host_path, PathBuf::from("/host/data"));
        assert_eq!(spec.container_path, PathBuf::from("/data"));
    }

    #[test]
    fn rejects_malformed_specs() {
        for bad in ["onlyonepath", "", ":/data", "/host:", "/a:/b:/c"] {
            assert!(VolumeSpec::parse(bad).is_none(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_container_path_leaving_root() {
        for bad in ["/host:/../../../etc", "/host:/data/../../etc", "/host:.."] {
            assert!(VolumeSpec::parse(bad).is_none(), "{bad:?} should be rejected");
        }
        assert!(VolumeSpec::parse("/host:/data/./sub").is_some());
    }

    #[test]
    fn target_nests_under_merged() {
        let spec = VolumeSpec::parse("/host/data:/data").unwrap();
        assert_eq!(
            spec.target_in(Path::new("/r/overlay2/c1/merged")),
            PathBuf::from("/r/overlay2/c1/merged/data")
        );
    }
}

//! XDG-aware filesystem layout for a node's data root.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Resolves the default `data_root` when none is configured: the XDG data
/// directory for `meshlink`, or a `.meshlink` fallback if the platform
/// dirs crate can't resolve a home directory (e.g. a stripped-down
/// container).
pub fn default_data_root() -> PathBuf {
    ProjectDirs::from("rs", "meshlink", "meshlink")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".meshlink"))
}

pub fn project_toml(data_root: &Path) -> PathBuf {
    data_root.join("mesh.toml")
}

pub fn local_toml(data_root: &Path) -> PathBuf {
    data_root.join("mesh.local.toml")
}

pub fn state_path(data_root: &Path) -> PathBuf {
    data_root.join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_data_root_is_never_empty() {
        assert!(!default_data_root().as_os_str().is_empty());
    }

    #[test]
    fn derived_paths_nest_under_data_root() {
        let root = PathBuf::from("/tmp/example");
        assert_eq!(project_toml(&root), root.join("mesh.toml"));
        assert_eq!(local_toml(&root), root.join("mesh.local.toml"));
        assert_eq!(state_path(&root), root.join("state.json"));
    }
}

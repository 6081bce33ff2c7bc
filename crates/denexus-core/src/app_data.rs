//! Where DeNexus keeps its own files (config.toml).
//!
//! Source tables and the persisted index live wherever the config points;
//! only the config file is stored here.

use std::path::PathBuf;

/// Returns the directory holding `config.toml`.
/// On Linux: `~/.local/share/denexus/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("com", "DeNexus", "DeNexus")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_is_created() {
        let dir = app_data_dir().expect("home directory is resolvable in tests");
        assert!(dir.is_dir());
    }
}

//! Where the app keeps its config, saved worlds and logs.

use std::path::{Path, PathBuf};

use crate::AppError;

const APP_NAME: &str = "strata";

/// Per-user directories, following OS conventions (XDG on Linux, Known
/// Folders on Windows, Library on macOS).
#[derive(Clone, Debug)]
pub struct PlatformDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Saved worlds live under `world/` here unless the config says otherwise.
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl PlatformDirs {
    /// Looks the directories up without touching the disk.
    ///
    /// # Errors
    ///
    /// [`AppError::NoConfigDir`] when the OS has no configuration directory.
    pub fn resolve() -> Result<Self, AppError> {
        let config_root = dirs::config_dir().ok_or(AppError::NoConfigDir)?.join(APP_NAME);
        // Without a data directory, worlds are kept next to the config.
        let data_dir = match dirs::data_dir() {
            Some(data) => data.join(APP_NAME),
            None => config_root.join("data"),
        };
        Ok(Self::laid_out(&config_root, data_dir))
    }

    pub fn resolve_and_create() -> Result<Self, AppError> {
        let dirs = Self::resolve()?;
        dirs.create_dirs()?;
        Ok(dirs)
    }

    /// Everything under `root`, for tests and portable installs.
    pub fn resolve_with_root(root: &Path) -> Self {
        let app_root = root.join(APP_NAME);
        let data_dir = app_root.join("data");
        Self::laid_out(&app_root, data_dir)
    }

    pub fn create_dirs(&self) -> Result<(), AppError> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn laid_out(app_root: &Path, data_dir: PathBuf) -> Self {
        Self {
            config_dir: app_root.join("config"),
            data_dir,
            log_dir: app_root.join("logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_dirs_are_absolute() {
        let dirs = PlatformDirs::resolve().unwrap();
        for dir in [&dirs.config_dir, &dirs.data_dir, &dirs.log_dir] {
            assert!(dir.is_absolute(), "{} is relative", dir.display());
        }
        assert!(dirs.config_dir.ends_with("strata/config"));
    }

    #[test]
    fn test_rooted_dirs_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(tmp.path());
        assert!(!dirs.log_dir.exists());

        dirs.create_dirs().unwrap();
        for dir in [&dirs.config_dir, &dirs.data_dir, &dirs.log_dir] {
            assert!(dir.is_dir(), "{} missing", dir.display());
            assert!(dir.starts_with(tmp.path().join(APP_NAME)));
        }
    }
}

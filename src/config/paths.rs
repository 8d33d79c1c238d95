//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + baseline profiles):
//!   Windows: %APPDATA%\voice-quality\
//!   macOS:   ~/Library/Application Support/voice-quality/
//!   Linux:   ~/.config/voice-quality/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `profiles/`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding calibrated baseline profiles.
    pub profiles_dir: PathBuf,
    /// Profile used by `analyze` when none is given explicitly.
    pub default_profile_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-quality";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let profiles_dir = config_dir.join("profiles");
        let default_profile_file = profiles_dir.join("default.json");

        Self {
            config_dir,
            settings_file,
            profiles_dir,
            default_profile_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths.profiles_dir.starts_with(&paths.config_dir));
        assert!(paths
            .default_profile_file
            .extension()
            .is_some_and(|e| e == "json"));
    }
}

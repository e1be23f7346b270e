// src/infra/paths.rs — Path management for device-local state
//
// All paths respect the CHEFKIX_HOME environment variable for isolation.
// When CHEFKIX_HOME is set, config and state live under that directory.
// When unset, config uses ~/.chefkix/ and data uses the platform data dir.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "chefkix").expect("Could not determine home directory")
    })
}

/// Returns the CHEFKIX_HOME override, if set.
fn chefkix_home() -> Option<PathBuf> {
    std::env::var_os("CHEFKIX_HOME").map(PathBuf::from)
}

/// Configuration directory: $CHEFKIX_HOME/ or ~/.chefkix/
pub fn config_dir() -> PathBuf {
    if let Some(home) = chefkix_home() {
        return home;
    }
    dirs_home().join(".chefkix")
}

/// Data directory: $CHEFKIX_HOME/data/ or the platform-local data dir
pub fn data_dir() -> PathBuf {
    if let Some(home) = chefkix_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// State directory: holds the active-session fragment
pub fn state_dir() -> PathBuf {
    config_dir().join("state")
}

/// The persisted active-session fragment. Deliberately a different file from
/// the manual-recipe-draft fragment the recipe editor keeps, so the two can
/// never clobber each other.
pub fn active_session_path() -> PathBuf {
    state_dir().join("active-session.json")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    let dirs = [config_dir(), state_dir(), data_dir()];

    for dir in &dirs {
        tokio::fs::create_dir_all(dir).await?;
    }

    Ok(())
}

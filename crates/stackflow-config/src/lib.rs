pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "STACK_CONFIG_PATH";
/// Per-project directory holding local overrides and the sandbox state
pub const PROJECT_DIR: &str = ".stackflow";

const CANDIDATES: [&str; 4] = ["stack.local.kdl", ".stack.local.kdl", "stack.kdl", ".stack.kdl"];

/// Get the StackFlow config directory, creating it when missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the stack file for the current directory
///
/// Search order:
/// 1. `STACK_CONFIG_PATH` environment variable
/// 2. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. the same names inside `./.stackflow/`
/// 4. ~/.config/stackflow/stack.kdl
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if !path.exists() {
            return Err(ConfigError::ConfiguredPathMissing(path));
        }
        return Ok(path);
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_stack_file_in(&current_dir) {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join("stack.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

/// Look for a stack file in `dir` and its `.stackflow/` directory
pub fn find_stack_file_in(dir: &Path) -> Option<PathBuf> {
    let project_dir = dir.join(PROJECT_DIR);
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .chain(
            CANDIDATES
                .iter()
                .filter(|_| project_dir.is_dir())
                .map(|name| project_dir.join(name)),
        )
        .find(|path| path.is_file())
}

/// Project root of a stack file; a file inside `.stackflow/` belongs to its parent
pub fn project_root(stack_file: &Path) -> PathBuf {
    let dir = stack_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    match (dir.file_name(), dir.parent()) {
        (Some(name), Some(parent)) if name == PROJECT_DIR => parent.to_path_buf(),
        _ => dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("stackflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("stack.kdl"));
    }

    #[test]
    fn test_local_file_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("stack.local.kdl"), "// local").unwrap();

        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with("stack.local.kdl"));
    }

    #[test]
    fn test_hidden_local_file_beats_plain_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(".stack.local.kdl"), "// hidden local").unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// visible").unwrap();

        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with(".stack.local.kdl"));
    }

    #[test]
    fn test_find_stack_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(PROJECT_DIR);
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("stack.kdl"), "// in project dir").unwrap();

        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with(".stackflow/stack.kdl"));
        assert_eq!(project_root(&result), temp_dir.path());
    }

    #[test]
    fn test_nothing_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(find_stack_file_in(temp_dir.path()).is_none());
    }

    #[test]
    #[serial]
    fn test_find_stack_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.kdl");
        fs::write(&config_path, "// custom").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }
        let found = find_stack_file();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, temp_dir.path().join("gone.kdl"));
        }
        let missing = find_stack_file();

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }

        assert_eq!(found.unwrap(), config_path);
        assert!(matches!(missing, Err(ConfigError::ConfiguredPathMissing(_))));
    }

    #[test]
    fn test_project_root() {
        assert_eq!(
            project_root(Path::new("/srv/shop/stack.kdl")),
            PathBuf::from("/srv/shop")
        );
        assert_eq!(
            project_root(Path::new("/srv/shop/.stackflow/stack.local.kdl")),
            PathBuf::from("/srv/shop")
        );
        assert_eq!(project_root(Path::new("stack.kdl")), PathBuf::from("."));
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Stack file not found. Looked in:\n\
        - current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl\n\
        - ./.stackflow/ directory\n\
        - ~/.config/stackflow/stack.kdl\n\
        A path can also be given with the STACK_CONFIG_PATH environment variable"
    )]
    StackFileNotFound,

    #[error("STACK_CONFIG_PATH points to a missing file: {0}")]
    ConfiguredPathMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Failed to read stack file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}\nReason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Invalid stack configuration: {0}")]
    InvalidConfig(String),

    #[error("'{node}' requires '{field}'")]
    MissingField { node: String, field: String },

    #[error("'{0}' declared more than once")]
    DuplicateNode(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Topology error: {0}")]
    Topology(#[from] stackflow_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, StackError>;

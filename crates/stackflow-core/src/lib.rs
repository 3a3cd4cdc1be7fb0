//! StackFlow Core
//!
//! The stack model, the KDL stack-file parser and the builder that turns a
//! stack into the resource topology the engine converges.

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod topology;

pub use error::{Result, StackError};
pub use loader::{LoadedStack, load_stack};
pub use model::*;
pub use parser::{parse_stack_file, parse_stack_string, validate};
pub use topology::{StackNames, build_topology};

//! Stack loader
//!
//! Parses a stack file and builds its topology in one step.

use crate::error::Result;
use crate::model::StackSpec;
use crate::parser::parse_stack_file;
use crate::topology::build_topology;
use stackflow_cloud::Topology;
use std::path::Path;
use tracing::{info, instrument};

/// A parsed stack together with its topology
#[derive(Debug, Clone)]
pub struct LoadedStack {
    pub spec: StackSpec,
    pub topology: Topology,
}

#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_stack<P: AsRef<Path>>(path: P) -> Result<LoadedStack> {
    let spec = parse_stack_file(path.as_ref())?;
    let topology = build_topology(&spec)?;
    info!(
        project = %spec.project,
        resources = topology.len(),
        "Stack loaded"
    );
    Ok(LoadedStack { spec, topology })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.kdl");
        std::fs::write(
            &path,
            r#"
            project "shop"
            dns { zone "example.com"; record "www" }
            "#,
        )
        .unwrap();

        let loaded = load_stack(&path).unwrap();
        assert_eq!(loaded.spec.project, "shop");
        assert_eq!(loaded.topology.len(), 6);
    }
}

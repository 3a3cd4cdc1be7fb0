use super::Workspace;
use crate::utils;
use stackflow_cloud::OutputBinder;

/// Describe every resource and report the attributes of the ready ones
pub async fn handle(json: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open().await?;
    let mut binder = OutputBinder::new();
    for resource in workspace.stack.topology.iter() {
        let state = workspace
            .control_plane
            .describe(resource.kind(), resource.name())
            .await?;
        binder.publish(resource.id.clone(), &state);
    }

    let outputs = binder.outputs();
    if json {
        utils::print_json(&outputs)
    } else {
        utils::print_outputs(&outputs);
        Ok(())
    }
}

use super::{Workspace, cancel_on_ctrl_c};
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{ApplyOptions, ResourceId};

pub async fn handle(resource: &str, yes: bool, json: bool) -> anyhow::Result<()> {
    let id = ResourceId::parse(resource)
        .ok_or_else(|| anyhow::anyhow!("expected kind:name, got '{}'", resource))?;
    let workspace = Workspace::open().await?;
    let topology = &workspace.stack.topology;
    if !topology.contains(&id) {
        anyhow::bail!(
            "{} is not part of stack {}",
            id,
            workspace.stack.spec.project
        );
    }

    if !yes {
        workspace.print_header("Replace");
        println!();
        println!(
            "{}",
            format!("⚠ {} will be deleted and created again.", id).red().bold()
        );
        println!("Run again with --yes to replace it");
        return Ok(());
    }

    let _lock = workspace.lock().await?;
    if !json {
        workspace.print_header("Replacing");
    }
    let result = workspace
        .executor(ApplyOptions::default())
        .replace(topology, &id, cancel_on_ctrl_c())
        .await?;

    if json {
        utils::print_json(&result)?;
    } else {
        utils::print_result(&result);
    }

    result.into_result()?;
    Ok(())
}

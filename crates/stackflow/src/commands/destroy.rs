use super::{Workspace, cancel_on_ctrl_c};
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{ApplyOptions, DependencyGraph};

pub async fn handle(yes: bool, json: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open().await?;
    let topology = &workspace.stack.topology;

    if !yes {
        let graph = DependencyGraph::build(topology)?;
        workspace.print_header("Destroy");
        println!();
        for id in graph.reverse_sorted() {
            println!("  {} {}", "-".red().bold(), id.to_string().bold());
        }
        println!();
        println!(
            "{}",
            "⚠ Every resource above will be deleted.".red().bold()
        );
        println!("Run again with --yes to destroy the stack");
        return Ok(());
    }

    let _lock = workspace.lock().await?;
    if !json {
        workspace.print_header("Destroying");
    }
    let result = workspace
        .executor(ApplyOptions::default())
        .destroy(topology, cancel_on_ctrl_c())
        .await?;

    if json {
        utils::print_json(&result)?;
    } else {
        utils::print_result(&result);
    }

    result.into_result()?;
    Ok(())
}

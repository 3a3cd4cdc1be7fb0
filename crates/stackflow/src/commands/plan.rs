use super::Workspace;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::ApplyOptions;

pub async fn handle(json: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open().await?;
    let plan = workspace
        .executor(ApplyOptions::default())
        .plan(&workspace.stack.topology)
        .await?;

    if json {
        return utils::print_json(&plan);
    }

    workspace.print_header("Planning");
    utils::print_plan(&plan);
    if !plan.has_changes {
        println!("{}", "Stack is up to date.".green());
    }
    Ok(())
}

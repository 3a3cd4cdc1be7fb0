use super::{Workspace, cancel_on_ctrl_c};
use crate::utils;
use colored::Colorize;
use stackflow_cloud::ApplyOptions;
use std::time::Duration;

pub async fn handle(
    concurrency: usize,
    timeout_secs: Option<u64>,
    yes: bool,
    json: bool,
) -> anyhow::Result<()> {
    let workspace = Workspace::open().await?;
    let mut options = ApplyOptions::default().with_concurrency(concurrency);
    if let Some(secs) = timeout_secs {
        options.poll.timeout = Duration::from_secs(secs);
    }
    let executor = workspace.executor(options);
    let topology = &workspace.stack.topology;

    if !yes {
        let plan = executor.plan(topology).await?;
        workspace.print_header("Planning");
        utils::print_plan(&plan);
        if plan.has_changes {
            println!();
            println!("Run again with --yes to apply these changes");
        } else {
            println!("{}", "Stack is up to date.".green());
        }
        return Ok(());
    }

    let _lock = workspace.lock().await?;
    if !json {
        workspace.print_header("Applying");
    }
    let result = executor
        .apply_with_cancel(topology, cancel_on_ctrl_c())
        .await?;

    if json {
        utils::print_json(&result)?;
    } else {
        utils::print_result(&result);
        let conflicts = result.resources.iter().filter(|r| {
            r.failure
                .as_ref()
                .is_some_and(|f| f.kind == "immutable_field_conflict")
        });
        for outcome in conflicts {
            println!(
                "{} run `stack replace {}` to recreate it",
                "hint:".yellow().bold(),
                outcome.resource
            );
        }
    }

    result.into_result()?;
    Ok(())
}

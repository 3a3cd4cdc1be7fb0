use colored::{ColoredString, Colorize};
use serde::Serialize;
use stackflow_cloud::{ActionType, ApplyResult, FieldChange, OutcomeStatus, Outputs, Plan};

fn action_marker(action: ActionType) -> ColoredString {
    match action {
        ActionType::Create => "+".green().bold(),
        ActionType::Update => "~".yellow().bold(),
        ActionType::ReplaceRequired => "!".red().bold(),
        ActionType::NoOp => "=".dimmed(),
        ActionType::Await => "…".cyan(),
        ActionType::Failed => "✗".red().bold(),
        ActionType::Delete => "-".red().bold(),
    }
}

fn format_value(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => format!("\"{}\"", s),
        Some(v) => v.to_string(),
        None => "(known after apply)".to_string(),
    }
}

fn print_change(change: &FieldChange) {
    let before = change
        .before
        .as_ref()
        .map(|v| format_value(Some(v)))
        .unwrap_or_else(|| "(unset)".to_string());
    let line = format!(
        "      {}: {} -> {}",
        change.field,
        before,
        format_value(change.after.as_ref())
    );
    if change.immutable {
        println!("{} {}", line, "(forces replacement)".red());
    } else {
        println!("{}", line);
    }
}

/// Print a plan in dependency order
pub fn print_plan(plan: &Plan) {
    println!();
    for action in &plan.actions {
        println!(
            "  {} {} {}",
            action_marker(action.action),
            action.resource.to_string().bold(),
            format!("[{}]", action.action).dimmed()
        );
        for change in &action.changes {
            print_change(change);
        }
    }
    println!();
    println!("Plan: {}", plan.summary());
}

/// Print the terminal status of every resource of a pass
pub fn print_result(result: &ApplyResult) {
    println!();
    for outcome in &result.resources {
        let status = match outcome.status {
            OutcomeStatus::Ready => "ready".green(),
            OutcomeStatus::Deleted => "deleted".green(),
            OutcomeStatus::Failed => "failed".red().bold(),
            OutcomeStatus::Blocked => "blocked".yellow(),
            OutcomeStatus::Cancelled => "cancelled".yellow(),
            OutcomeStatus::Interrupted => "interrupted".red(),
        };
        println!(
            "  {:<12} {} {}",
            status,
            outcome.resource.to_string().bold(),
            format!("[{}]", outcome.action).dimmed()
        );
        if let Some(failure) = &outcome.failure {
            let retry = if failure.retryable { " (retryable)" } else { "" };
            println!("      {}{}", failure.message.red(), retry);
        }
        if let Some(producer) = &outcome.blocked_by {
            println!("      waiting on {}", producer);
        }
    }
    println!();
    let counts = result
        .counts()
        .into_iter()
        .map(|(status, n)| format!("{} {}", n, status))
        .collect::<Vec<_>>()
        .join(", ");
    println!("Done in {} ms: {}", result.duration_ms, counts);
}

/// Print ready attributes grouped by resource
pub fn print_outputs(outputs: &Outputs) {
    if outputs.is_empty() {
        println!("{}", "No resources are ready.".yellow());
        return;
    }
    for (id, attributes) in outputs.iter() {
        println!("{}", id.to_string().cyan().bold());
        for (key, value) in attributes {
            println!("  {} = {}", key, format_value(Some(value)));
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use colored::Colorize;

pub fn handle() -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());

    let stack_file = stackflow_config::find_stack_file()?;
    println!("Stack file: {}", stack_file.display().to_string().cyan());

    let loaded = match stackflow_core::load_stack(&stack_file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Invalid stack".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    // cycles and dangling references surface here, before any cloud call
    stackflow_cloud::DependencyGraph::build(&loaded.topology)?;

    println!("{}", "✓ Stack is valid".green().bold());
    println!();
    println!("Project: {}", loaded.spec.project.cyan());
    println!("Resources: {}", loaded.topology.len());
    for resource in loaded.topology.iter() {
        let deps = resource
            .depends_on
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>();
        if deps.is_empty() {
            println!("  - {}", resource.id.to_string().cyan());
        } else {
            println!(
                "  - {} (after {})",
                resource.id.to_string().cyan(),
                deps.join(", ")
            );
        }
    }
    Ok(())
}

use std::path::Path;

use console::style;

use crate::catalog::Catalog;
use crate::cli::commands::PlanArgs;
use crate::errors::ApexError;
use crate::models::ProjectFile;
use crate::planner::{generate_plan, PlanRequest};

pub async fn handle_plan(args: PlanArgs) -> Result<(), ApexError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let catalog = Catalog::load(config.catalog.extensions_dir.as_deref().map(Path::new))?;

    let content = tokio::fs::read_to_string(&args.project).await?;
    let project = ProjectFile::from_yaml(&content)?;
    let request = PlanRequest { test_cases: args.test_cases };

    let plan = generate_plan(
        &project.project,
        &project.targets,
        &project.credentials,
        &catalog,
        &request,
        &config.planner,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{} {} ({} in-scope targets, {} jobs, ~{} min)",
        style("Plan for").bold(),
        style(&plan.project_id).cyan().bold(),
        plan.in_scope_targets,
        plan.jobs.len(),
        plan.estimated_duration_minutes,
    );
    for (i, job) in plan.jobs.iter().enumerate() {
        println!(
            "{:>4}. [P{}] {:<14} {:<14} {}",
            i + 1,
            job.request.options.priority.unwrap_or_default(),
            job.request.test_case_id,
            style(job.role.as_str()).dim(),
            job.title,
        );
    }
    println!();
    for phase in &plan.phases {
        println!("  {:<6} {} test cases", style(&phase.category).yellow(), phase.test_cases.len());
    }
    Ok(())
}

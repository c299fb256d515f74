use std::path::Path;

use console::style;

use crate::catalog::Catalog;
use crate::cli::commands::CatalogArgs;
use crate::errors::ApexError;
use crate::models::TestCase;

pub async fn handle_catalog(args: CatalogArgs) -> Result<(), ApexError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let catalog = Catalog::load(config.catalog.extensions_dir.as_deref().map(Path::new))?;

    let entries: Vec<&TestCase> = catalog
        .iter()
        .filter(|c| {
            args.category
                .as_deref()
                .map_or(true, |cat| {
                    c.category.eq_ignore_ascii_case(cat)
                        || c.id.split('-').nth(1).is_some_and(|code| code.eq_ignore_ascii_case(cat))
                })
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for case in &entries {
        let manual = if case.automatable { "" } else { " (manual)" };
        println!(
            "{:<14} P{} {:<16} {}{}",
            style(&case.id).cyan(),
            case.base_priority,
            case.role.as_str(),
            case.title,
            style(manual).dim(),
        );
    }
    println!("\n{} test cases", entries.len());
    Ok(())
}

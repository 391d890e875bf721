//! `validate` and `bindings` subcommands

use crate::catalog::{ActionCatalog, CatalogError, PhysicalInput};
use crate::commands::output::{print_json, print_table};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize)]
struct CatalogSummary<'a> {
    path: &'a Path,
    game_name: &'a str,
    game_version: Option<&'a str>,
    config_name: Option<&'a str>,
    actions: usize,
    categories: BTreeMap<&'a str, usize>,
}

#[derive(Debug, Serialize)]
struct ValidationFailure<'a> {
    path: &'a Path,
    valid: bool,
    problems: &'a [String],
}

/// Loads the catalog and reports every problem found.
pub fn validate(path: &Path, json: bool) -> anyhow::Result<()> {
    let catalog = match ActionCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(CatalogError::Invalid { problems }) => {
            if json {
                print_json(&ValidationFailure {
                    path,
                    valid: false,
                    problems: &problems,
                })?;
            } else {
                println!("{} is invalid:", path.display());
                for problem in &problems {
                    println!("  - {}", problem);
                }
            }
            anyhow::bail!("{} problem(s) in {}", problems.len(), path.display());
        }
        Err(e) => return Err(e).with_context(|| format!("loading {}", path.display())),
    };

    let summary = CatalogSummary {
        path,
        game_name: catalog.game_name(),
        game_version: catalog.game_version(),
        config_name: catalog.config_name(),
        actions: catalog.count(),
        categories: catalog.category_counts(),
    };

    if json {
        return print_json(&summary);
    }

    println!("{} is valid", path.display());
    println!(
        "  game:    {}{}",
        summary.game_name,
        summary.game_version.map(|v| format!(" ({})", v)).unwrap_or_default()
    );
    if let Some(name) = summary.config_name {
        println!("  config:  {}", name);
    }
    println!("  actions: {}", summary.actions);
    for category in catalog.categories() {
        let count = summary.categories.get(category.key.as_str()).copied().unwrap_or(0);
        let label = category
            .names
            .get("en")
            .map(String::as_str)
            .unwrap_or(category.key.as_str());
        println!("    {:<16} {}", label, count);
    }
    Ok(())
}

fn binding_label(input: &PhysicalInput) -> String {
    match input {
        PhysicalInput::Key(name) => name.clone(),
        PhysicalInput::MouseButton(name) => format!("mouse:{}", name),
        PhysicalInput::Modifier(name) => name.clone(),
    }
}

/// Prints each action with its bindings.
pub fn bindings(path: &Path, lang: &str, json: bool) -> anyhow::Result<()> {
    let catalog = ActionCatalog::load(path).with_context(|| format!("loading {}", path.display()))?;

    if json {
        return print_json(&catalog.actions());
    }

    let rows: Vec<Vec<String>> = catalog
        .actions()
        .iter()
        .map(|action| {
            vec![
                action.id.to_string(),
                action.name.clone(),
                action.category.clone(),
                action.display_name(lang).unwrap_or("").to_string(),
                action
                    .bindings
                    .iter()
                    .map(binding_label)
                    .collect::<Vec<_>>()
                    .join(" + "),
            ]
        })
        .collect();

    println!("{} ({} actions)", catalog.game_name(), catalog.count());
    print_table(&["ID", "NAME", "CATEGORY", "DISPLAY", "KEYS"], &rows);
    Ok(())
}

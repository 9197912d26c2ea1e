use std::path::Path;

use anyhow::{Context, Result};

use mealmind_core::models::MealSlot;
use mealmind_core::service::MealMindService;

use super::helpers::{json_error, print_meal_table};

pub(crate) fn cmd_meals_import(
    service: &MealMindService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = service.import_catalog(file, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!("{}", json_error("No rows found in CSV file"));
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Meals to create: {}", summary.meals_created);
        println!("  Meals reused:    {}", summary.meals_reused);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:   {}", summary.rows_parsed);
        println!("  Meals created: {}", summary.meals_created);
        println!("  Meals reused:  {}", summary.meals_reused);
    }

    Ok(())
}

pub(crate) fn cmd_meals_list(
    service: &MealMindService,
    label: Option<&str>,
    json: bool,
) -> Result<()> {
    let label = label.map(MealSlot::parse).transpose()?;
    let meals = service.list_meals(label)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
        return Ok(());
    }

    if meals.is_empty() {
        println!("No meals in the catalog.");
        return Ok(());
    }
    print_meal_table(&meals);
    Ok(())
}

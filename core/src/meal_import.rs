use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::db::Database;
use crate::models::{MealSlot, NewMeal};

/// Catalog shipped with the binary, loaded into an empty database.
pub const DEFAULT_CATALOG_CSV: &str = include_str!("../data/meals.csv");

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub meals_created: usize,
    pub meals_reused: usize,
    pub dry_run: bool,
}

/// Parse a catalog CSV.
///
/// Expected header: `Name,Calories,Label[,Photo]` in any order and case.
/// Rows with an empty name are skipped.
pub fn parse_catalog_csv<R: Read>(reader: R) -> Result<Vec<NewMeal>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    for name in ["Name", "Calories", "Label"] {
        if col(name).is_none() {
            bail!("Missing required column: {name}");
        }
    }
    let idx_name = col("Name").context("Missing 'Name' column")?;
    let idx_cal = col("Calories").context("Missing 'Calories' column")?;
    let idx_label = col("Label").context("Missing 'Label' column")?;
    let idx_photo = col("Photo");

    let mut meals = Vec::new();
    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let name = record.get(idx_name).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }

        let raw_calories = record.get(idx_cal).unwrap_or("").trim();
        let calories: f64 = raw_calories
            .parse()
            .with_context(|| format!("Line {line}: invalid calories '{raw_calories}'"))?;
        if !calories.is_finite() || calories <= 0.0 {
            bail!("Line {line}: calories must be greater than 0");
        }

        let label = MealSlot::parse(record.get(idx_label).unwrap_or(""))
            .with_context(|| format!("Line {line}"))?;

        let photo = idx_photo
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string);

        meals.push(NewMeal {
            name: name.to_string(),
            calories,
            label,
            photo,
        });
    }

    Ok(meals)
}

/// Insert parsed meals, reusing any meal whose name already exists
/// (case-insensitive). When `dry_run` is true, nothing is written.
pub fn import_meals(db: &Database, meals: &[NewMeal], dry_run: bool) -> Result<ImportSummary> {
    let mut meals_created = 0;
    let mut meals_reused = 0;
    let mut seen: HashSet<String> = HashSet::new();

    for meal in meals {
        let key = meal.name.to_lowercase();
        if seen.contains(&key) || db.find_meal_by_name(&meal.name)?.is_some() {
            meals_reused += 1;
        } else {
            if !dry_run {
                db.insert_meal(meal)?;
            }
            meals_created += 1;
        }
        seen.insert(key);
    }

    Ok(ImportSummary {
        rows_parsed: meals.len(),
        meals_created,
        meals_reused,
        dry_run,
    })
}

/// Load the embedded catalog when the meals table is empty. Returns the
/// number of meals inserted.
pub fn seed_default_catalog(db: &Database) -> Result<usize> {
    if db.count_meals()? > 0 {
        return Ok(0);
    }
    let meals = parse_catalog_csv(DEFAULT_CATALOG_CSV.as_bytes())
        .context("Embedded meal catalog is invalid")?;
    let summary = import_meals(db, &meals, false)?;
    Ok(summary.meals_created)
}

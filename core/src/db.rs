use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    ActivityLevel, CalorieSample, CurrentDiet, DietMeal, Gender, Goal, Meal, MealSlot, NewMeal,
    NewUser, Profile, User, WeightSample,
};
use crate::planner::DietSelection;

pub struct Database {
    conn: Connection,
}

/// Timestamps are stored as RFC 3339 UTC text with second precision, so
/// lexical order matches chronological order.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn text_column<T>(idx: usize, value: &str, parse: fn(&str) -> Result<T>) -> rusqlite::Result<T> {
    parse(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn optional_text_column<T>(
    idx: usize,
    value: Option<String>,
    parse: fn(&str) -> Result<T>,
) -> rusqlite::Result<Option<T>> {
    value.map(|v| text_column(idx, &v, parse)).transpose()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{value}'"))
}

fn write_profile(conn: &Connection, user_id: i64, profile: &Profile) -> Result<()> {
    let rows = conn.execute(
        "UPDATE users SET height_cm = ?1, weight_kg = ?2, age = ?3, gender = ?4,
                activity_level = ?5, goal = ?6
         WHERE id = ?7",
        params![
            profile.height_cm,
            profile.weight_kg,
            profile.age,
            profile.gender.as_str(),
            profile.activity_level.as_str(),
            profile.goal.as_str(),
            user_id,
        ],
    )?;
    if rows == 0 {
        anyhow::bail!("User not found");
    }
    Ok(())
}

fn write_weight_sample(
    conn: &Connection,
    user_id: i64,
    weight_kg: f64,
    at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO weight_samples (user_id, weight_kg, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, weight_kg, format_timestamp(at)],
    )?;
    Ok(conn.last_insert_rowid())
}

const USER_COLUMNS: &str = "id, name, email, password_hash, image_file, height_cm, weight_kg, age,
     gender, activity_level, goal, created_at";

const MEAL_COLUMNS: &str = "id, name, calories, label, photo";

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    image_file TEXT,
                    height_cm REAL,
                    weight_kg REAL,
                    age INTEGER,
                    gender TEXT,
                    activity_level TEXT,
                    goal TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_calories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
                    calories INTEGER NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    calories REAL NOT NULL CHECK (calories > 0),
                    label TEXT NOT NULL CHECK (label IN ('breakfast', 'lunch', 'dinner')),
                    photo TEXT
                );

                CREATE TABLE IF NOT EXISTS diets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS diet_meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    diet_id INTEGER NOT NULL REFERENCES diets(id) ON DELETE CASCADE,
                    slot TEXT NOT NULL,
                    meal_id INTEGER NOT NULL REFERENCES meals(id),
                    serving REAL NOT NULL,
                    UNIQUE (diet_id, slot)
                );

                CREATE TABLE IF NOT EXISTS diet_calories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    diet_id INTEGER NOT NULL UNIQUE REFERENCES diets(id) ON DELETE CASCADE,
                    calories REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_samples (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    weight_kg REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS calorie_samples (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    calories REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meals_label ON meals(label);
                CREATE INDEX IF NOT EXISTS idx_weight_samples_user_time
                    ON weight_samples(user_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_calorie_samples_user_time
                    ON calorie_samples(user_id, created_at);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(11)?;
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            image_file: row.get(4)?,
            height_cm: row.get(5)?,
            weight_kg: row.get(6)?,
            age: row.get(7)?,
            gender: optional_text_column(8, row.get(8)?, Gender::parse)?,
            activity_level: optional_text_column(9, row.get(9)?, ActivityLevel::parse)?,
            goal: optional_text_column(10, row.get(10)?, Goal::parse)?,
            created_at: text_column(11, &created_at, parse_timestamp)?,
        })
    }

    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        let label: String = row.get(3)?;
        Ok(Meal {
            id: row.get(0)?,
            name: row.get(1)?,
            calories: row.get(2)?,
            label: text_column(3, &label, MealSlot::parse)?,
            photo: row.get(4)?,
        })
    }

    fn weight_sample_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightSample> {
        let created_at: String = row.get(3)?;
        Ok(WeightSample {
            id: row.get(0)?,
            user_id: row.get(1)?,
            weight_kg: row.get(2)?,
            created_at: text_column(3, &created_at, parse_timestamp)?,
        })
    }

    fn calorie_sample_from_row(row: &rusqlite::Row) -> rusqlite::Result<CalorieSample> {
        let created_at: String = row.get(3)?;
        Ok(CalorieSample {
            id: row.get(0)?,
            user_id: row.get(1)?,
            calories: row.get(2)?,
            created_at: text_column(3, &created_at, parse_timestamp)?,
        })
    }

    // --- Users ---

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = format_timestamp(Utc::now());
        self.conn
            .execute(
                "INSERT INTO users (name, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user.name, user.email, user.password_hash, now],
            )
            .with_context(|| format!("Failed to create user '{}'", user.email))?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.find_user(id)?.context("User not found")
    }

    pub fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Emails match case-insensitively.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
                params![email.trim()],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// True when another user (not `except_user`) already owns `email`.
    pub fn email_taken(&self, email: &str, except_user: Option<i64>) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE AND id != ?2",
            params![email.trim(), except_user.unwrap_or(-1)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_profile(&self, user_id: i64, profile: &Profile) -> Result<User> {
        write_profile(&self.conn, user_id, profile)?;
        self.get_user(user_id)
    }

    /// Stores a first profile together with its starting weight sample.
    pub fn complete_profile(&self, user_id: i64, profile: &Profile) -> Result<User> {
        let tx = self.conn.unchecked_transaction()?;
        write_profile(&tx, user_id, profile)?;
        write_weight_sample(&tx, user_id, profile.weight_kg, Utc::now())?;
        tx.commit()?;
        self.get_user(user_id)
    }

    /// Applies an account edit atomically: profile fields, a weight sample
    /// when the weight moved, then name and email. The flag reports whether
    /// a sample was written.
    pub fn update_account(
        &self,
        user_id: i64,
        name: &str,
        email: &str,
        profile: &Profile,
    ) -> Result<(User, bool)> {
        let tx = self.conn.unchecked_transaction()?;
        let previous: Option<f64> = tx
            .query_row(
                "SELECT weight_kg FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .context("User not found")?;

        write_profile(&tx, user_id, profile)?;
        let weight_changed =
            previous.is_none_or(|w| (w - profile.weight_kg).abs() > f64::EPSILON);
        if weight_changed {
            write_weight_sample(&tx, user_id, profile.weight_kg, Utc::now())?;
        }
        tx.execute(
            "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3",
            params![name, email, user_id],
        )
        .with_context(|| format!("Failed to update email to '{email}'"))?;
        tx.commit()?;

        Ok((self.get_user(user_id)?, weight_changed))
    }

    pub fn set_avatar(&self, user_id: i64, image_file: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET image_file = ?1 WHERE id = ?2",
            params![image_file, user_id],
        )?;
        Ok(())
    }

    pub fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id],
        )?;
        if rows == 0 {
            anyhow::bail!("User not found");
        }
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // --- Calorie targets ---

    pub fn set_calorie_target(&self, user_id: i64, calories: i64) -> Result<()> {
        let now = format_timestamp(Utc::now());
        self.conn.execute(
            "INSERT INTO user_calories (user_id, calories, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                calories = excluded.calories,
                updated_at = excluded.updated_at",
            params![user_id, calories, now],
        )?;
        Ok(())
    }

    pub fn get_calorie_target(&self, user_id: i64) -> Result<Option<i64>> {
        let calories = self
            .conn
            .query_row(
                "SELECT calories FROM user_calories WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(calories)
    }

    // --- Meal catalog ---

    pub fn insert_meal(&self, meal: &NewMeal) -> Result<Meal> {
        self.conn.execute(
            "INSERT INTO meals (name, calories, label, photo) VALUES (?1, ?2, ?3, ?4)",
            params![meal.name, meal.calories, meal.label.as_str(), meal.photo],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_meal(id)
    }

    pub fn get_meal(&self, id: i64) -> Result<Meal> {
        self.conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = ?1"),
                params![id],
                Self::meal_from_row,
            )
            .context("Meal not found")
    }

    pub fn list_meals(&self, label: Option<MealSlot>) -> Result<Vec<Meal>> {
        let meals = match label {
            Some(slot) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {MEAL_COLUMNS} FROM meals WHERE label = ?1 ORDER BY id"
                ))?;
                stmt.query_map(params![slot.as_str()], Self::meal_from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT {MEAL_COLUMNS} FROM meals ORDER BY id"))?;
                stmt.query_map([], Self::meal_from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(meals)
    }

    pub fn find_meal_by_name(&self, name: &str) -> Result<Option<Meal>> {
        let meal = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MEAL_COLUMNS} FROM meals WHERE name = ?1 COLLATE NOCASE
                     ORDER BY id LIMIT 1"
                ),
                params![name.trim()],
                Self::meal_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    pub fn count_meals(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM meals", [], |row| row.get(0))?;
        Ok(count)
    }

    // --- Current diet ---

    /// Replaces the user's current diet with `selection`. The prior diet's
    /// meals and total are removed and the new ones written in a single
    /// transaction, so a diet never holds anything but exactly three meals.
    pub fn replace_current_diet(&self, user_id: i64, selection: &DietSelection) -> Result<CurrentDiet> {
        let now = format_timestamp(Utc::now());
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM diets WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let diet_id = if let Some(id) = existing {
            tx.execute("DELETE FROM diet_meals WHERE diet_id = ?1", params![id])?;
            tx.execute("DELETE FROM diet_calories WHERE diet_id = ?1", params![id])?;
            tx.execute(
                "UPDATE diets SET updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            id
        } else {
            tx.execute(
                "INSERT INTO diets (user_id, updated_at) VALUES (?1, ?2)",
                params![user_id, now],
            )?;
            tx.last_insert_rowid()
        };

        for (slot, selected) in selection.slots() {
            tx.execute(
                "INSERT INTO diet_meals (diet_id, slot, meal_id, serving) VALUES (?1, ?2, ?3, ?4)",
                params![diet_id, slot.as_str(), selected.meal.id, selected.serving],
            )?;
        }
        tx.execute(
            "INSERT INTO diet_calories (diet_id, calories) VALUES (?1, ?2)",
            params![diet_id, selection.total_calories()],
        )?;
        tx.commit()?;

        self.get_current_diet(user_id)?
            .context("Diet not found after replace")
    }

    pub fn get_current_diet(&self, user_id: i64) -> Result<Option<CurrentDiet>> {
        let Some(diet_id) = self
            .conn
            .query_row(
                "SELECT id FROM diets WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT dm.slot, dm.serving, m.id, m.name, m.calories, m.label, m.photo
             FROM diet_meals dm
             JOIN meals m ON m.id = dm.meal_id
             WHERE dm.diet_id = ?1
             ORDER BY CASE dm.slot WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 ELSE 2 END",
        )?;
        let meals = stmt
            .query_map(params![diet_id], |row| {
                let slot: String = row.get(0)?;
                let label: String = row.get(5)?;
                Ok(DietMeal {
                    slot: text_column(0, &slot, MealSlot::parse)?,
                    serving: row.get(1)?,
                    meal: Meal {
                        id: row.get(2)?,
                        name: row.get(3)?,
                        calories: row.get(4)?,
                        label: text_column(5, &label, MealSlot::parse)?,
                        photo: row.get(6)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let total_calories: f64 = self
            .conn
            .query_row(
                "SELECT calories FROM diet_calories WHERE diet_id = ?1",
                params![diet_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_else(|| meals.iter().map(DietMeal::calories).sum());

        Ok(Some(CurrentDiet {
            id: diet_id,
            user_id,
            meals,
            total_calories,
        }))
    }

    // --- History samples ---

    pub fn insert_weight_sample_at(
        &self,
        user_id: i64,
        weight_kg: f64,
        at: DateTime<Utc>,
    ) -> Result<WeightSample> {
        let id = write_weight_sample(&self.conn, user_id, weight_kg, at)?;
        self.conn
            .query_row(
                "SELECT id, user_id, weight_kg, created_at FROM weight_samples WHERE id = ?1",
                params![id],
                Self::weight_sample_from_row,
            )
            .context("Weight sample not found after insert")
    }

    pub fn insert_calorie_sample(&self, user_id: i64, calories: f64) -> Result<CalorieSample> {
        self.insert_calorie_sample_at(user_id, calories, Utc::now())
    }

    pub fn insert_calorie_sample_at(
        &self,
        user_id: i64,
        calories: f64,
        at: DateTime<Utc>,
    ) -> Result<CalorieSample> {
        self.conn.execute(
            "INSERT INTO calorie_samples (user_id, calories, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, calories, format_timestamp(at)],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, user_id, calories, created_at FROM calorie_samples WHERE id = ?1",
                params![id],
                Self::calorie_sample_from_row,
            )
            .context("Calorie sample not found after insert")
    }

    /// Samples with `created_at >= since`, oldest first.
    pub fn weight_samples_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<WeightSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, weight_kg, created_at FROM weight_samples
             WHERE user_id = ?1 AND created_at >= ?2
             ORDER BY created_at, id",
        )?;
        let samples = stmt
            .query_map(
                params![user_id, format_timestamp(since)],
                Self::weight_sample_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    pub fn calorie_samples_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<CalorieSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, calories, created_at FROM calorie_samples
             WHERE user_id = ?1 AND created_at >= ?2
             ORDER BY created_at, id",
        )?;
        let samples = stmt
            .query_map(
                params![user_id, format_timestamp(since)],
                Self::calorie_sample_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    pub fn count_weight_samples(&self, user_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM weight_samples WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_calorie_samples(&self, user_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM calorie_samples WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

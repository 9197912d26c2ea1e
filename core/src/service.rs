use std::io::Read;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::credentials::{self, TokenSigner};
use crate::db::Database;
use crate::meal_import::{self, ImportSummary};
use crate::metabolic::{self, CalorieBreakdown};
use crate::models::{
    AccountUpdate, CalorieHistory, CalorieSample, ChartSeries, CurrentDiet, Meal, MealSlot,
    NewUser, Profile, TimeWindow, User, WeightHistory, validate_email, validate_name,
    validate_password, validate_profile,
};
use crate::planner::{CatalogMealSelector, MealSelector};

pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Application operations shared by the web server and the CLI.
///
/// Precondition failures (no target yet, no diet yet) come back as `None`
/// so callers can send the user to the step they skipped.
pub struct MealMindService {
    db: Database,
    selector: Box<dyn MealSelector>,
    signer: TokenSigner,
    bcrypt_cost: u32,
}

impl MealMindService {
    #[must_use]
    pub fn new(db: Database, signer: TokenSigner) -> Self {
        Self {
            db,
            selector: Box::new(CatalogMealSelector),
            signer,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    pub fn open(db_path: &Path, secret: &[u8]) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::new(db, TokenSigner::new(secret)))
    }

    pub fn new_in_memory(secret: &[u8]) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::new(db, TokenSigner::new(secret)))
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Box<dyn MealSelector>) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    // --- Accounts ---

    pub fn user(&self, user_id: i64) -> Result<User> {
        self.db.get_user(user_id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// True when no user other than `except_user` holds `email`.
    pub fn email_available(&self, email: &str, except_user: Option<i64>) -> Result<bool> {
        Ok(!self.db.email_taken(email, except_user)?)
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim();
        validate_name(name)?;
        validate_email(email)?;
        validate_password(password)?;
        if self.db.email_taken(email, None)? {
            bail!("That email is taken. Please choose a different one.");
        }
        let password_hash = credentials::hash_password(password, self.bcrypt_cost)?;
        let user = self.db.create_user(&NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
        })?;
        info!(user_id = user.id, "registered user");
        Ok(user)
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.db.get_user_by_email(email)? else {
            return Ok(None);
        };
        if credentials::verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// First-time profile setup. Records the starting weight.
    pub fn complete_profile(&self, user_id: i64, profile: &Profile) -> Result<User> {
        validate_profile(profile)?;
        let user = self.db.complete_profile(user_id, profile)?;
        info!(user_id, "profile completed");
        Ok(user)
    }

    /// Account edits. A weight sample is appended only when the weight moved.
    pub fn update_account(&self, user_id: i64, update: &AccountUpdate) -> Result<User> {
        let name = update.name.trim();
        let email = update.email.trim();
        validate_name(name)?;
        validate_email(email)?;
        validate_profile(&update.profile)?;
        if self.db.email_taken(email, Some(user_id))? {
            bail!("That email is taken. Please choose a different one.");
        }

        let (user, weight_changed) = self
            .db
            .update_account(user_id, name, email, &update.profile)?;
        info!(user_id, weight_changed, "account updated");
        Ok(user)
    }

    pub fn set_avatar(&self, user_id: i64, image_file: &str) -> Result<()> {
        self.db.set_avatar(user_id, image_file)
    }

    // --- Calories and diet ---

    /// Computes and stores the user's daily target. `None` when the
    /// profile is incomplete or yields no positive target; nothing is
    /// stored in that case.
    pub fn compute_calorie_target(&self, user_id: i64) -> Result<Option<CalorieBreakdown>> {
        let user = self.db.get_user(user_id)?;
        let Some(profile) = user.profile() else {
            return Ok(None);
        };
        let breakdown = metabolic::breakdown(&profile);
        if breakdown.target <= 0 {
            warn!(user_id, target = breakdown.target, "profile yields no usable target");
            return Ok(None);
        }
        self.db.set_calorie_target(user_id, breakdown.target)?;
        info!(user_id, target = breakdown.target, "calorie target stored");
        Ok(Some(breakdown))
    }

    pub fn calorie_target(&self, user_id: i64) -> Result<Option<i64>> {
        self.db.get_calorie_target(user_id)
    }

    /// Picks meals for the stored target and replaces the current diet.
    /// `None` when no usable target has been computed yet.
    pub fn assemble_diet(&self, user_id: i64) -> Result<Option<CurrentDiet>> {
        let Some(target) = self
            .db
            .get_calorie_target(user_id)?
            .filter(|t| *t > 0)
        else {
            return Ok(None);
        };
        let catalog = self.db.list_meals(None)?;
        let selection = self.selector.select(&catalog, target)?;
        let diet = self.db.replace_current_diet(user_id, &selection)?;
        info!(
            user_id,
            target,
            total = diet.total_calories,
            "diet replaced"
        );
        Ok(Some(diet))
    }

    pub fn current_diet(&self, user_id: i64) -> Result<Option<CurrentDiet>> {
        self.db.get_current_diet(user_id)
    }

    /// Logs the current diet's total as today's intake. `None` when the
    /// user has no diet.
    pub fn save_diet_calories(&self, user_id: i64) -> Result<Option<CalorieSample>> {
        let Some(diet) = self.db.get_current_diet(user_id)? else {
            return Ok(None);
        };
        let sample = self
            .db
            .insert_calorie_sample(user_id, diet.total_calories)?;
        info!(user_id, calories = sample.calories, "diet calories logged");
        Ok(Some(sample))
    }

    // --- History ---

    /// Calorie intake chart for `window` ending at `now`. `None` when the
    /// user has no target, which is distinct from an empty window.
    pub fn calorie_history(
        &self,
        user_id: i64,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<CalorieHistory>> {
        let Some(recommended_intake) = self.db.get_calorie_target(user_id)? else {
            return Ok(None);
        };
        let samples = self.db.calorie_samples_since(user_id, window.start(now))?;
        let mut series = ChartSeries::default();
        for sample in &samples {
            series.push(sample.created_at, sample.calories);
        }
        #[allow(clippy::cast_precision_loss)]
        let average = (!series.is_empty()).then(|| {
            let sum: f64 = series.values.iter().sum();
            (sum / series.values.len() as f64).round() as i64
        });
        Ok(Some(CalorieHistory {
            window,
            series,
            recommended_intake,
            average,
        }))
    }

    pub fn weight_history(
        &self,
        user_id: i64,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<WeightHistory> {
        let samples = self.db.weight_samples_since(user_id, window.start(now))?;
        let mut series = ChartSeries::default();
        for sample in &samples {
            series.push(sample.created_at, sample.weight_kg);
        }
        Ok(WeightHistory { window, series })
    }

    // --- Password reset and sessions ---

    /// Issues a reset token for the account registered under `email`.
    pub fn request_password_reset(&self, email: &str) -> Result<Option<(User, String)>> {
        let Some(user) = self.db.get_user_by_email(email)? else {
            return Ok(None);
        };
        let token = self.signer.issue_reset_token(user.id)?;
        info!(user_id = user.id, "password reset requested");
        Ok(Some((user, token)))
    }

    pub fn verify_reset_token(&self, token: &str) -> Result<Option<User>> {
        match self.signer.verify_reset_token(token) {
            Some(user_id) => self.db.find_user(user_id),
            None => Ok(None),
        }
    }

    /// Sets a new password when `token` is valid. `None` for a bad token.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<Option<User>> {
        let Some(user) = self.verify_reset_token(token)? else {
            return Ok(None);
        };
        validate_password(new_password)?;
        let hash = credentials::hash_password(new_password, self.bcrypt_cost)?;
        self.db.set_password_hash(user.id, &hash)?;
        info!(user_id = user.id, "password reset");
        self.db.find_user(user.id)
    }

    pub fn session_token(&self, user_id: i64) -> Result<String> {
        self.signer.issue_session_token(user_id)
    }

    pub fn user_from_session(&self, token: &str) -> Result<Option<User>> {
        match self.signer.verify_session_token(token) {
            Some(user_id) => self.db.find_user(user_id),
            None => Ok(None),
        }
    }

    // --- Catalog ---

    pub fn seed_catalog_if_empty(&self) -> Result<usize> {
        let inserted = meal_import::seed_default_catalog(&self.db)?;
        if inserted > 0 {
            info!(inserted, "seeded default meal catalog");
        }
        Ok(inserted)
    }

    pub fn import_catalog<R: Read>(&self, reader: R, dry_run: bool) -> Result<ImportSummary> {
        let meals = meal_import::parse_catalog_csv(reader)?;
        meal_import::import_meals(&self.db, &meals, dry_run)
    }

    pub fn list_meals(&self, label: Option<MealSlot>) -> Result<Vec<Meal>> {
        self.db.list_meals(label)
    }
}

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| anyhow::anyhow!("Invalid gender '{value}'. Must be Male or Female"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtraActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::LightlyActive,
        ActivityLevel::ModeratelyActive,
        ActivityLevel::VeryActive,
        ActivityLevel::ExtraActive,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sedentary => "Sedentary",
            Self::LightlyActive => "Lightly Active",
            Self::ModeratelyActive => "Moderately Active",
            Self::VeryActive => "Very Active",
            Self::ExtraActive => "Extra Active",
        }
    }

    /// Accepts the display form ("Lightly Active") as well as kebab/snake
    /// variants typed on the command line ("lightly-active").
    pub fn parse(value: &str) -> Result<Self> {
        let wanted = normalize_key(value);
        Self::ALL
            .into_iter()
            .find(|a| normalize_key(a.as_str()) == wanted)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid activity level '{value}'. Must be one of: {}",
                    Self::ALL.map(ActivityLevel::as_str).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
    LoseWeight,
    MaintainWeight,
    GainWeight,
}

impl Goal {
    pub const ALL: [Goal; 3] = [Goal::LoseWeight, Goal::MaintainWeight, Goal::GainWeight];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoseWeight => "Lose Weight",
            Self::MaintainWeight => "Maintain Weight",
            Self::GainWeight => "Gain Weight",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let wanted = normalize_key(value);
        Self::ALL
            .into_iter()
            .find(|g| normalize_key(g.as_str()) == wanted)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid goal '{value}'. Must be one of: {}",
                    Self::ALL.map(Goal::as_str).join(", ")
                )
            })
    }
}

fn normalize_key(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The three daily meal slots a diet is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let lower = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid meal label '{value}'. Must be one of: breakfast, lunch, dinner"
                )
            })
    }
}

/// Complete biometric profile. Every field is required to compute a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Profile {
    pub gender: Gender,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age: i64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image_file: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<Goal>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        Some(Profile {
            gender: self.gender?,
            weight_kg: self.weight_kg?,
            height_cm: self.height_cm?,
            age: self.age?,
            activity_level: self.activity_level?,
            goal: self.goal?,
        })
    }

    #[must_use]
    pub fn is_profile_complete(&self) -> bool {
        self.profile().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Fields editable from the account page.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub name: String,
    pub email: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub id: i64,
    pub name: String,
    pub calories: f64,
    pub label: MealSlot,
    pub photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub name: String,
    pub calories: f64,
    pub label: MealSlot,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DietMeal {
    pub slot: MealSlot,
    pub meal: Meal,
    pub serving: f64,
}

impl DietMeal {
    #[must_use]
    pub fn calories(&self) -> f64 {
        self.meal.calories * self.serving
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentDiet {
    pub id: i64,
    pub user_id: i64,
    /// Always breakfast, lunch, dinner in that order.
    pub meals: Vec<DietMeal>,
    pub total_calories: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightSample {
    pub id: i64,
    pub user_id: i64,
    pub weight_kg: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalorieSample {
    pub id: i64,
    pub user_id: i64,
    pub calories: f64,
    pub created_at: DateTime<Utc>,
}

/// Trailing chart window selectable on the history pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeWindow {
    OneWeek,
    TwoWeeks,
    ThreeWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

pub const CALORIE_WINDOWS: &[TimeWindow] = &[
    TimeWindow::OneWeek,
    TimeWindow::TwoWeeks,
    TimeWindow::ThreeWeeks,
    TimeWindow::OneMonth,
];

pub const WEIGHT_WINDOWS: &[TimeWindow] = &[
    TimeWindow::OneWeek,
    TimeWindow::TwoWeeks,
    TimeWindow::ThreeWeeks,
    TimeWindow::OneMonth,
    TimeWindow::ThreeMonths,
    TimeWindow::SixMonths,
    TimeWindow::OneYear,
];

impl TimeWindow {
    pub const DEFAULT_CALORIES: TimeWindow = TimeWindow::OneWeek;
    pub const DEFAULT_WEIGHT: TimeWindow = TimeWindow::OneMonth;

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::OneWeek => "1 Week",
            Self::TwoWeeks => "2 Weeks",
            Self::ThreeWeeks => "3 Weeks",
            Self::OneMonth => "1 Month",
            Self::ThreeMonths => "3 Months",
            Self::SixMonths => "6 Months",
            Self::OneYear => "1 Year",
        }
    }

    #[must_use]
    pub fn days(self) -> i64 {
        match self {
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::ThreeWeeks => 21,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
        }
    }

    /// Earliest timestamp included in the window ending at `now`.
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }

    /// Parse a window label, restricted to the windows offered by a form.
    pub fn parse_in(value: &str, allowed: &[TimeWindow]) -> Result<Self> {
        allowed
            .iter()
            .copied()
            .find(|w| w.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid time window '{value}'. Must be one of: {}",
                    allowed
                        .iter()
                        .map(|w| w.label())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Parallel label/value sequences for a line chart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, at: DateTime<Utc>, value: f64) {
        self.labels.push(at.format("%m/%d").to_string());
        self.values.push(value);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalorieHistory {
    pub window: TimeWindow,
    pub series: ChartSeries,
    pub recommended_intake: i64,
    /// Rounded mean of the window; `None` when the window holds no samples.
    pub average: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightHistory {
    pub window: TimeWindow,
    pub series: ChartSeries,
}

pub fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(2..=20).contains(&len) {
        bail!("Name must be between 2 and 20 characters long");
    }
    Ok(())
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        bail!("Invalid email address");
    };
    if local.is_empty()
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        bail!("Invalid email address");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 6 {
        bail!("Password must be at least 6 characters long");
    }
    Ok(())
}

pub fn validate_height(height_cm: f64) -> Result<()> {
    if !(100.0..=250.0).contains(&height_cm) {
        bail!("Height must be between 100 and 250 cm");
    }
    Ok(())
}

pub fn validate_weight(weight_kg: f64) -> Result<()> {
    if !(30.0..=300.0).contains(&weight_kg) {
        bail!("Weight must be between 30 and 300 kg");
    }
    Ok(())
}

pub fn validate_age(age: i64) -> Result<()> {
    if !(13..=120).contains(&age) {
        bail!("Age must be between 13 and 120");
    }
    Ok(())
}

pub fn validate_profile(profile: &Profile) -> Result<()> {
    validate_height(profile.height_cm)?;
    validate_weight(profile.weight_kg)?;
    validate_age(profile.age)?;
    validate_calorie_target(profile)?;
    Ok(())
}

/// Rejects profiles whose computed daily target is not positive, since no
/// meal plan can be built for them.
pub fn validate_calorie_target(profile: &Profile) -> Result<()> {
    let target = crate::metabolic::daily_calorie_target(profile);
    if target <= 0 {
        bail!(
            "These details give a daily target of {target} kcal. Please check your weight, height, age and goal."
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user() -> User {
        User {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            image_file: None,
            height_cm: Some(175.0),
            weight_kg: Some(70.0),
            age: Some(30),
            gender: Some(Gender::Male),
            activity_level: Some(ActivityLevel::ModeratelyActive),
            goal: Some(Goal::MaintainWeight),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("Male").unwrap(), Gender::Male);
        assert_eq!(Gender::parse("female").unwrap(), Gender::Female);
        assert!(Gender::parse("other").is_err());
    }

    #[test]
    fn test_activity_level_parse_variants() {
        assert_eq!(
            ActivityLevel::parse("Lightly Active").unwrap(),
            ActivityLevel::LightlyActive
        );
        assert_eq!(
            ActivityLevel::parse("very-active").unwrap(),
            ActivityLevel::VeryActive
        );
        assert_eq!(
            ActivityLevel::parse("extra_active").unwrap(),
            ActivityLevel::ExtraActive
        );
        assert!(ActivityLevel::parse("Couch").is_err());
    }

    #[test]
    fn test_goal_parse() {
        assert_eq!(Goal::parse("Lose Weight").unwrap(), Goal::LoseWeight);
        assert_eq!(Goal::parse("gain-weight").unwrap(), Goal::GainWeight);
        assert!(Goal::parse("bulk").is_err());
    }

    #[test]
    fn test_meal_slot_parse() {
        assert_eq!(MealSlot::parse("Breakfast").unwrap(), MealSlot::Breakfast);
        assert_eq!(MealSlot::parse(" dinner ").unwrap(), MealSlot::Dinner);
        assert!(MealSlot::parse("snack").is_err());
    }

    #[test]
    fn test_profile_requires_every_field() {
        let user = sample_user();
        assert!(user.is_profile_complete());

        let mut missing_goal = sample_user();
        missing_goal.goal = None;
        assert!(missing_goal.profile().is_none());

        let mut missing_age = sample_user();
        missing_age.age = None;
        assert!(!missing_age.is_profile_complete());
    }

    #[test]
    fn test_time_window_parse_restricted() {
        assert_eq!(
            TimeWindow::parse_in("2 Weeks", CALORIE_WINDOWS).unwrap(),
            TimeWindow::TwoWeeks
        );
        assert!(TimeWindow::parse_in("1 Year", CALORIE_WINDOWS).is_err());
        assert_eq!(
            TimeWindow::parse_in("1 Year", WEIGHT_WINDOWS).unwrap(),
            TimeWindow::OneYear
        );
    }

    #[test]
    fn test_time_window_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            TimeWindow::OneMonth.start(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(TimeWindow::OneYear.days(), 365);
    }

    #[test]
    fn test_chart_series_labels_month_day() {
        let mut series = ChartSeries::default();
        assert!(series.is_empty());
        series.push(Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap(), 2100.0);
        assert_eq!(series.labels, vec!["01/05"]);
        assert_eq!(series.values, vec![2100.0]);
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada example@example.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_name_length() {
        assert!(validate_name("Al").is_ok());
        assert!(validate_name("A").is_err());
        assert!(validate_name("A name that is far too long").is_err());
    }

    #[test]
    fn test_validate_profile_ranges() {
        let profile = sample_user().profile().unwrap();
        assert!(validate_profile(&profile).is_ok());
        assert!(validate_height(99.0).is_err());
        assert!(validate_weight(301.0).is_err());
        assert!(validate_age(12).is_err());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_validate_profile_rejects_non_positive_target() {
        let profile = Profile {
            gender: Gender::Male,
            weight_kg: 30.0,
            height_cm: 100.0,
            age: 120,
            activity_level: ActivityLevel::Sedentary,
            goal: Goal::LoseWeight,
        };
        let err = validate_profile(&profile).unwrap_err().to_string();
        assert!(err.contains("-298 kcal"));

        let maintain = Profile {
            goal: Goal::MaintainWeight,
            ..profile
        };
        assert!(validate_profile(&maintain).is_ok());
    }
}

//! Daily calorie target from a biometric profile.
//!
//! BMR uses the revised Harris-Benedict constants, AMR scales it by an
//! activity multiplier, and the goal shifts the result by a fixed 500 kcal.

use serde::Serialize;

use crate::models::{ActivityLevel, Gender, Goal, Profile};

const GOAL_ADJUSTMENT_KCAL: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalorieBreakdown {
    pub bmr: f64,
    pub amr: f64,
    pub target: i64,
}

#[must_use]
pub fn basal_metabolic_rate(gender: Gender, weight_kg: f64, height_cm: f64, age: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let age = age as f64;
    match gender {
        Gender::Male => 66.47 + (13.75 * weight_kg) + (5.003 * height_cm) - (6.755 * age),
        Gender::Female => 655.1 + (9.563 * weight_kg) + (1.85 * height_cm) - (4.676 * age),
    }
}

#[must_use]
pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::LightlyActive => 1.375,
        ActivityLevel::ModeratelyActive => 1.55,
        ActivityLevel::VeryActive => 1.725,
        ActivityLevel::ExtraActive => 1.9,
    }
}

#[must_use]
pub fn goal_adjustment(goal: Goal) -> f64 {
    match goal {
        Goal::LoseWeight => -GOAL_ADJUSTMENT_KCAL,
        Goal::MaintainWeight => 0.0,
        Goal::GainWeight => GOAL_ADJUSTMENT_KCAL,
    }
}

#[must_use]
pub fn active_metabolic_rate(bmr: f64, level: ActivityLevel) -> f64 {
    bmr * activity_multiplier(level)
}

#[must_use]
pub fn breakdown(profile: &Profile) -> CalorieBreakdown {
    let bmr = basal_metabolic_rate(
        profile.gender,
        profile.weight_kg,
        profile.height_cm,
        profile.age,
    );
    let amr = active_metabolic_rate(bmr, profile.activity_level);
    let target = (amr + goal_adjustment(profile.goal)).round() as i64;
    CalorieBreakdown { bmr, amr, target }
}

/// Recommended daily calories, rounded to the nearest integer.
#[must_use]
pub fn daily_calorie_target(profile: &Profile) -> i64 {
    breakdown(profile).target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(gender: Gender, activity_level: ActivityLevel, goal: Goal) -> Profile {
        Profile {
            gender,
            weight_kg: 70.0,
            height_cm: 175.0,
            age: 30,
            activity_level,
            goal,
        }
    }

    #[test]
    fn test_male_moderately_active_maintain() {
        let p = profile(Gender::Male, ActivityLevel::ModeratelyActive, Goal::MaintainWeight);
        let b = breakdown(&p);
        assert!((b.bmr - 1701.845).abs() < 1e-9);
        assert!((b.amr - 2637.859_75).abs() < 1e-6);
        assert_eq!(b.target, 2638);
    }

    #[test]
    fn test_female_sedentary_lose() {
        let p = profile(Gender::Female, ActivityLevel::Sedentary, Goal::LoseWeight);
        let b = breakdown(&p);
        assert!((b.bmr - 1507.98).abs() < 1e-9);
        assert!((b.amr - 1809.576).abs() < 1e-6);
        assert_eq!(daily_calorie_target(&p), 1310);
    }

    #[test]
    fn test_gain_adds_500() {
        let maintain = profile(Gender::Male, ActivityLevel::VeryActive, Goal::MaintainWeight);
        let gain = profile(Gender::Male, ActivityLevel::VeryActive, Goal::GainWeight);
        assert_eq!(
            daily_calorie_target(&gain) - daily_calorie_target(&maintain),
            500
        );
    }

    #[test]
    fn test_multipliers_increase_with_activity() {
        let targets: Vec<i64> = ActivityLevel::ALL
            .into_iter()
            .map(|level| daily_calorie_target(&profile(Gender::Female, level, Goal::MaintainWeight)))
            .collect();
        assert!(targets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_deterministic() {
        let p = profile(Gender::Female, ActivityLevel::ExtraActive, Goal::GainWeight);
        assert_eq!(daily_calorie_target(&p), daily_calorie_target(&p));
    }
}

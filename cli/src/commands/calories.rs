use anyhow::Result;

use mealmind_core::metabolic::{self, CalorieBreakdown};
use mealmind_core::models::{ActivityLevel, Gender, Goal, Profile, validate_profile};

pub(crate) struct CaloriesArgs<'a> {
    pub gender: &'a str,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age: i64,
    pub activity: &'a str,
    pub goal: &'a str,
}

fn profile_from_args(args: &CaloriesArgs<'_>) -> Result<Profile> {
    let profile = Profile {
        gender: Gender::parse(args.gender)?,
        weight_kg: args.weight_kg,
        height_cm: args.height_cm,
        age: args.age,
        activity_level: ActivityLevel::parse(args.activity)?,
        goal: Goal::parse(args.goal)?,
    };
    validate_profile(&profile)?;
    Ok(profile)
}

fn compute(args: &CaloriesArgs<'_>) -> Result<(Profile, CalorieBreakdown)> {
    let profile = profile_from_args(args)?;
    Ok((profile, metabolic::breakdown(&profile)))
}

pub(crate) fn cmd_calories(args: &CaloriesArgs<'_>, json: bool) -> Result<()> {
    let (profile, breakdown) = compute(args)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "profile": profile,
                "bmr": breakdown.bmr.round(),
                "amr": breakdown.amr.round(),
                "target": breakdown.target,
            })
        );
        return Ok(());
    }

    println!(
        "{}, {} kg, {} cm, {} years",
        profile.gender.as_str(),
        profile.weight_kg,
        profile.height_cm,
        profile.age
    );
    println!("  Basal metabolic rate:  {:>6.0} kcal", breakdown.bmr);
    println!(
        "  Active metabolic rate: {:>6.0} kcal ({})",
        breakdown.amr,
        profile.activity_level.as_str()
    );
    println!(
        "  Daily target:          {:>6} kcal ({})",
        breakdown.target,
        profile.goal.as_str()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(gender: &'a str, activity: &'a str, goal: &'a str) -> CaloriesArgs<'a> {
        CaloriesArgs {
            gender,
            weight_kg: 70.0,
            height_cm: 175.0,
            age: 30,
            activity,
            goal,
        }
    }

    #[test]
    fn test_compute_accepts_cli_spellings() {
        let (profile, breakdown) =
            compute(&args("male", "moderately-active", "maintain_weight")).unwrap();
        assert_eq!(profile.activity_level, ActivityLevel::ModeratelyActive);
        assert_eq!(breakdown.target, 2638);
    }

    #[test]
    fn test_compute_rejects_unknown_goal() {
        let err = compute(&args("female", "sedentary", "bulk")).unwrap_err();
        assert!(err.to_string().contains("Invalid goal"));
    }

    #[test]
    fn test_compute_rejects_out_of_range() {
        let mut a = args("female", "sedentary", "lose weight");
        a.age = 5;
        assert!(compute(&a).is_err());
    }

    #[test]
    fn test_compute_rejects_non_positive_target() {
        let mut a = args("male", "sedentary", "lose-weight");
        a.weight_kg = 30.0;
        a.height_cm = 100.0;
        a.age = 120;
        let err = compute(&a).unwrap_err();
        assert!(err.to_string().contains("-298 kcal"));
    }
}

use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealmind_core::models::{Meal, User};

pub(crate) fn print_meal_table(meals: &[Meal]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Label")]
        label: &'static str,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Photo")]
        photo: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id,
            label: m.label.title(),
            name: truncate(&m.name, 35),
            calories: format!("{:.0}", m.calories),
            photo: m
                .photo
                .as_deref()
                .map(|p| truncate(p, 30))
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Profile")]
    profile: &'static str,
    #[tabled(rename = "Goal")]
    goal: &'static str,
    #[tabled(rename = "Joined")]
    joined: String,
}

impl UserRow {
    fn new(user: &User) -> Self {
        Self {
            id: user.id,
            name: truncate(&user.name, 20),
            email: truncate(&user.email, 30),
            profile: if user.is_profile_complete() {
                "complete"
            } else {
                "incomplete"
            },
            goal: user.goal.map_or("-", |g| g.as_str()),
            joined: user.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

pub(crate) fn print_user_table(users: &[User]) {
    let rows: Vec<UserRow> = users.iter().map(UserRow::new).collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mealmind_core::models::Goal;

    fn user() -> User {
        User {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            image_file: None,
            height_cm: None,
            weight_kg: None,
            age: None,
            gender: None,
            activity_level: None,
            goal: Some(Goal::LoseWeight),
            created_at: Utc.with_ymd_and_hms(2024, 3, 9, 23, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_user_row_formats_join_date() {
        let row = UserRow::new(&user());
        assert_eq!(row.joined, "2024-03-09");
        assert_eq!(row.profile, "incomplete");
        assert_eq!(row.goal, "Lose Weight");
    }

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("Oatmeal", 10), "Oatmeal");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("Grilled Salmon with Quinoa", 10), "Grilled...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("Crème brûlée du jour", 8), "Crème...");
    }

    #[test]
    fn test_json_error_escapes() {
        let out = json_error("bad \"quote\"");
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["error"], "bad \"quote\"");
    }
}

//! Form payloads and their validation.
//!
//! Every field arrives as a string so that malformed numbers become inline
//! field errors instead of extractor rejections.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use mealmind_core::models::{
    ActivityLevel, AccountUpdate, Gender, Goal, Profile, TimeWindow, User, validate_age,
    validate_calorie_target, validate_email, validate_height, validate_name, validate_password,
    validate_weight,
};

use crate::avatar::avatar_extension;

/// Field name to error message.
pub(crate) type FieldErrors = BTreeMap<&'static str, String>;

const REQUIRED: &str = "This field is required.";

fn check(errors: &mut FieldErrors, field: &'static str, result: anyhow::Result<()>) {
    if let Err(e) = result {
        errors.entry(field).or_insert_with(|| e.to_string());
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.insert(field, REQUIRED.to_string());
        false
    } else {
        true
    }
}

fn check_confirmation(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if require(errors, "confirm_password", confirm) && password != confirm {
        errors.insert("confirm_password", "Field must be equal to password.".to_string());
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if require(&mut errors, "name", &self.name) {
            check(&mut errors, "name", validate_name(&self.name));
        }
        if require(&mut errors, "email", &self.email) {
            check(&mut errors, "email", validate_email(&self.email));
        }
        if require(&mut errors, "password", &self.password) {
            check(&mut errors, "password", validate_password(&self.password));
        }
        check_confirmation(&mut errors, &self.password, &self.confirm_password);
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginForm {
    pub email: String,
    pub password: String,
    pub remember: Option<String>,
}

impl LoginForm {
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if require(&mut errors, "email", &self.email) {
            check(&mut errors, "email", validate_email(&self.email));
        }
        require(&mut errors, "password", &self.password);
        errors
    }

    pub(crate) fn remember(&self) -> bool {
        self.remember.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// The six biometric inputs shared by the finish-account and account forms.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct ProfileFields {
    pub height: String,
    pub weight: String,
    pub age: String,
    pub gender: String,
    pub activity_level: String,
    pub goal: String,
}

impl ProfileFields {
    /// Current values of a user, for pre-filling the account form.
    pub(crate) fn from_user(user: &User) -> Self {
        Self {
            height: user.height_cm.map(|h| format!("{h:.2}")).unwrap_or_default(),
            weight: user.weight_kg.map(|w| format!("{w:.2}")).unwrap_or_default(),
            age: user.age.map(|a| a.to_string()).unwrap_or_default(),
            gender: user.gender.map(|g| g.as_str().to_string()).unwrap_or_default(),
            activity_level: user
                .activity_level
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            goal: user.goal.map(|g| g.as_str().to_string()).unwrap_or_default(),
        }
    }

    fn from_map(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();
        Self {
            height: get("height"),
            weight: get("weight"),
            age: get("age"),
            gender: get("gender"),
            activity_level: get("activity_level"),
            goal: get("goal"),
        }
    }

    /// Parses and range-checks every field, recording failures in `errors`.
    pub(crate) fn parse(&self, errors: &mut FieldErrors) -> Option<Profile> {
        let height = parse_number(errors, "height", &self.height, "Height");
        if let Some(h) = height {
            check(errors, "height", validate_height(h));
        }
        let weight = parse_number(errors, "weight", &self.weight, "Weight");
        if let Some(w) = weight {
            check(errors, "weight", validate_weight(w));
        }
        let age = if require(errors, "age", &self.age) {
            match self.age.trim().parse::<i64>() {
                Ok(a) => {
                    check(errors, "age", validate_age(a));
                    Some(a)
                }
                Err(_) => {
                    errors.insert("age", "Age must be a whole number".to_string());
                    None
                }
            }
        } else {
            None
        };
        let gender = parse_choice(errors, "gender", &self.gender, Gender::parse);
        let activity_level = parse_choice(
            errors,
            "activity_level",
            &self.activity_level,
            ActivityLevel::parse,
        );
        let goal = parse_choice(errors, "goal", &self.goal, Goal::parse);

        if !errors.is_empty() {
            return None;
        }
        let profile = Profile {
            gender: gender?,
            weight_kg: weight?,
            height_cm: height?,
            age: age?,
            activity_level: activity_level?,
            goal: goal?,
        };
        check(errors, "weight", validate_calorie_target(&profile));
        errors.is_empty().then_some(profile)
    }
}

fn parse_number(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    label: &str,
) -> Option<f64> {
    if !require(errors, field, value) {
        return None;
    }
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            errors.insert(field, format!("{label} must be a number"));
            None
        }
    }
}

fn parse_choice<T>(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    parse: fn(&str) -> anyhow::Result<T>,
) -> Option<T> {
    if !require(errors, field, value) {
        return None;
    }
    match parse(value) {
        Ok(v) => Some(v),
        Err(_) => {
            errors.insert(field, "Not a valid choice.".to_string());
            None
        }
    }
}

/// An uploaded file from a multipart form.
#[derive(Debug, Clone)]
pub(crate) struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Account edit form, assembled from multipart fields.
#[derive(Debug, Default)]
pub(crate) struct AccountForm {
    pub name: String,
    pub email: String,
    pub profile: ProfileFields,
    pub picture: Option<Upload>,
}

impl AccountForm {
    pub(crate) fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            profile: ProfileFields::from_user(user),
            picture: None,
        }
    }

    pub(crate) fn from_fields(fields: &HashMap<String, String>, picture: Option<Upload>) -> Self {
        Self {
            name: fields.get("name").cloned().unwrap_or_default(),
            email: fields.get("email").cloned().unwrap_or_default(),
            profile: ProfileFields::from_map(fields),
            picture,
        }
    }

    /// Returns the validated update, or the field errors.
    pub(crate) fn validate(&self) -> Result<AccountUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        if require(&mut errors, "name", &self.name) {
            check(&mut errors, "name", validate_name(&self.name));
        }
        if require(&mut errors, "email", &self.email) {
            check(&mut errors, "email", validate_email(&self.email));
        }
        if let Some(upload) = &self.picture {
            if avatar_extension(&upload.filename).is_none() {
                errors.insert(
                    "picture",
                    "File does not have an approved extension: jpg, png".to_string(),
                );
            }
        }
        let profile = self.profile.parse(&mut errors);
        match profile {
            Some(profile) if errors.is_empty() => Ok(AccountUpdate {
                name: self.name.trim().to_string(),
                email: self.email.trim().to_string(),
                profile,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResetRequestForm {
    pub email: String,
}

impl ResetRequestForm {
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if require(&mut errors, "email", &self.email) {
            check(&mut errors, "email", validate_email(&self.email));
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResetPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if require(&mut errors, "password", &self.password) {
            check(&mut errors, "password", validate_password(&self.password));
        }
        check_confirmation(&mut errors, &self.password, &self.confirm_password);
        errors
    }
}

/// Chart window selector.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WindowForm {
    pub time: String,
}

impl WindowForm {
    pub(crate) fn parse(&self, allowed: &[TimeWindow]) -> Result<TimeWindow, FieldErrors> {
        TimeWindow::parse_in(&self.time, allowed).map_err(|_| {
            let mut errors = FieldErrors::new();
            errors.insert("time", "Not a valid choice.".to_string());
            errors
        })
    }
}

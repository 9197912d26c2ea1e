//! HTML rendering. Templates are embedded at compile time and filled with
//! `{{NAME}}` placeholders; every user-controlled value is escaped first.

use std::fmt::Write as _;

use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use mealmind_core::metabolic::CalorieBreakdown;
use mealmind_core::models::{
    ActivityLevel, CALORIE_WINDOWS, CalorieHistory, ChartSeries, CurrentDiet, Gender, Goal,
    Profile, TimeWindow, User, WEIGHT_WINDOWS, WeightHistory,
};

use super::auth::{FLASH_COOKIE, Flash, append_cookie, expired_cookie};
use super::forms::{AccountForm, FieldErrors, LoginForm, ProfileFields, RegisterForm};

const BASE: &str = include_str!("../../templates/base.html");
const INDEX: &str = include_str!("../../templates/index.html");
const REGISTER: &str = include_str!("../../templates/register.html");
const LOGIN: &str = include_str!("../../templates/login.html");
const FINISH_ACCOUNT: &str = include_str!("../../templates/finish_account.html");
const ACCOUNT: &str = include_str!("../../templates/account.html");
const GET_CALORIES: &str = include_str!("../../templates/get_calories.html");
const SHOW_MEALS: &str = include_str!("../../templates/show_meals.html");
const CALORIES_OVER_TIME: &str = include_str!("../../templates/calories_over_time.html");
const WEIGHT_OVER_TIME: &str = include_str!("../../templates/weight_over_time.html");
const RESET_REQUEST: &str = include_str!("../../templates/reset_request.html");
const RESET_TOKEN: &str = include_str!("../../templates/reset_token.html");
const ERROR: &str = include_str!("../../templates/error.html");

pub(crate) const STYLE_CSS: &str = include_str!("../../assets/style.css");
pub(crate) const CHARTS_JS: &str = include_str!("../../assets/charts.js");

const CHART_JS_CDN: &str = "https://cdn.jsdelivr.net/npm/chart.js@4.4.1/dist/chart.umd.min.js";

/// Fills `{{KEY}}` placeholders in a single pass, so substituted values are
/// never scanned for further placeholders. Unknown keys render empty.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
            out.push_str(value);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// A full HTML page wrapped in the site layout.
pub(crate) struct Page {
    title: String,
    body: String,
    user: Option<User>,
    flash: Option<Flash>,
    status: StatusCode,
}

impl Page {
    pub(crate) fn new(title: impl Into<String>, body: String) -> Self {
        Self {
            title: title.into(),
            body,
            user: None,
            flash: None,
            status: StatusCode::OK,
        }
    }

    pub(crate) fn user(mut self, user: Option<&User>) -> Self {
        self.user = user.cloned();
        self
    }

    /// Shows `flash`; the one-shot cookie is cleared with this response.
    pub(crate) fn flash(mut self, flash: Option<Flash>) -> Self {
        if flash.is_some() {
            self.flash = flash;
        }
        self
    }

    pub(crate) fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// 422 when `errors` is non-empty.
    pub(crate) fn invalid_if(self, errors: &FieldErrors) -> Self {
        if errors.is_empty() {
            self
        } else {
            self.status(StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let html = render(
            BASE,
            &[
                ("TITLE", &text(&self.title)),
                ("NAV", &nav(self.user.as_ref())),
                ("FLASH", &flash_html(self.flash.as_ref())),
                ("CONTENT", &self.body),
            ],
        );
        let mut response = (self.status, Html(html)).into_response();
        if self.flash.is_some() {
            append_cookie(response.headers_mut(), &expired_cookie(FLASH_COOKIE));
        }
        response
    }
}

fn nav(user: Option<&User>) -> String {
    let links: &[(&str, &str)] = if user.is_some() {
        &[
            ("/", "Home"),
            ("/get-calories", "Get Calories"),
            ("/show-meals", "Meals"),
            ("/show-calories", "Calories Chart"),
            ("/show-weight", "Weight Chart"),
            ("/account", "Account"),
            ("/logout", "Logout"),
        ]
    } else {
        &[("/", "Home"), ("/login", "Login"), ("/register", "Register")]
    };
    links
        .iter()
        .map(|(href, label)| format!("<a href=\"{href}\">{label}</a>"))
        .collect::<Vec<_>>()
        .join("\n      ")
}

fn flash_html(flash: Option<&Flash>) -> String {
    flash.map_or_else(String::new, |f| {
        format!(
            "<div class=\"flash flash-{}\" role=\"alert\">{}</div>",
            f.level.as_str(),
            text(&f.message)
        )
    })
}

// --- Form fields ---

fn field_wrapper(name: &str, label: &str, control: &str, errors: &FieldErrors) -> String {
    let (class, error) = match errors.get(name) {
        Some(msg) => (
            "field invalid",
            format!("<div class=\"error\">{}</div>", text(msg)),
        ),
        None => ("field", String::new()),
    };
    format!(
        "<div class=\"{class}\"><label for=\"{name}\">{label}</label>{control}{error}</div>"
    )
}

pub(crate) fn text_field(
    name: &str,
    label: &str,
    input_type: &str,
    value: &str,
    errors: &FieldErrors,
) -> String {
    let value = if input_type == "password" { "" } else { value };
    let control = format!(
        "<input id=\"{name}\" name=\"{name}\" type=\"{input_type}\" value=\"{}\">",
        attr(value)
    );
    field_wrapper(name, label, &control, errors)
}

pub(crate) fn select_field(
    name: &str,
    label: &str,
    options: &[&str],
    selected: &str,
    errors: &FieldErrors,
) -> String {
    let mut control = format!("<select id=\"{name}\" name=\"{name}\">");
    for option in options {
        let mark = if option.eq_ignore_ascii_case(selected.trim()) {
            " selected"
        } else {
            ""
        };
        let _ = write!(
            control,
            "<option value=\"{0}\"{mark}>{0}</option>",
            attr(option)
        );
    }
    control.push_str("</select>");
    field_wrapper(name, label, &control, errors)
}

fn profile_fields_html(fields: &ProfileFields, errors: &FieldErrors) -> String {
    let genders = Gender::ALL.map(Gender::as_str);
    let levels = ActivityLevel::ALL.map(ActivityLevel::as_str);
    let goals = Goal::ALL.map(Goal::as_str);
    [
        text_field("height", "Height (cm)", "text", &fields.height, errors),
        text_field("weight", "Weight (kg)", "text", &fields.weight, errors),
        text_field("age", "Age", "text", &fields.age, errors),
        select_field("gender", "Gender", &genders, &fields.gender, errors),
        select_field(
            "activity_level",
            "Activity Level",
            &levels,
            &fields.activity_level,
            errors,
        ),
        select_field("goal", "Goal", &goals, &fields.goal, errors),
    ]
    .concat()
}

// --- Pages ---

pub(crate) fn home(user: Option<&User>) -> Page {
    let actions = match user {
        Some(u) => format!(
            "<p>Welcome back, {}.</p><a class=\"button\" href=\"/get-calories\">Plan today</a>",
            text(&u.name)
        ),
        None => "<a class=\"button\" href=\"/register\">Join Today</a> \
                 <a class=\"button secondary\" href=\"/login\">Log In</a>"
            .to_string(),
    };
    Page::new("Home", render(INDEX, &[("ACTIONS", &actions)])).user(user)
}

pub(crate) fn register(form: &RegisterForm, errors: &FieldErrors) -> Page {
    let fields = [
        text_field("name", "Name", "text", &form.name, errors),
        text_field("email", "Email", "email", &form.email, errors),
        text_field("password", "Password", "password", "", errors),
        text_field("confirm_password", "Confirm Password", "password", "", errors),
    ]
    .concat();
    let body = render(REGISTER, &[("LEGEND", "Join Today"), ("FIELDS", &fields)]);
    Page::new("Register", body).invalid_if(errors)
}

pub(crate) fn login(form: &LoginForm, next: Option<&str>, errors: &FieldErrors) -> Page {
    let action = match next {
        Some(n) => format!("/login?next={}", urlencoding::encode(n)),
        None => "/login".to_string(),
    };
    let fields = [
        text_field("email", "Email", "email", &form.email, errors),
        text_field("password", "Password", "password", "", errors),
    ]
    .concat();
    let body = render(
        LOGIN,
        &[
            ("ACTION", &attr(&action)),
            ("LEGEND", "Log In"),
            ("FIELDS", &fields),
        ],
    );
    Page::new("Login", body).invalid_if(errors)
}

pub(crate) fn finish_account(user: &User, fields: &ProfileFields, errors: &FieldErrors) -> Page {
    let body = render(
        FINISH_ACCOUNT,
        &[("FIELDS", &profile_fields_html(fields, errors))],
    );
    Page::new("Complete Account Details", body)
        .user(Some(user))
        .invalid_if(errors)
}

fn avatar_html(user: &User) -> String {
    match &user.image_file {
        Some(file) => format!(
            "<img class=\"avatar\" src=\"/static/images/{}\" alt=\"Profile picture\">",
            attr(file)
        ),
        None => {
            let initial = user
                .name
                .chars()
                .next()
                .map(|c| c.to_uppercase().to_string())
                .unwrap_or_default();
            format!(
                "<div class=\"avatar placeholder\">{}</div>",
                text(&initial)
            )
        }
    }
}

pub(crate) fn account(user: &User, form: &AccountForm, errors: &FieldErrors) -> Page {
    let mut fields = [
        text_field("name", "Name", "text", &form.name, errors),
        text_field("email", "Email", "email", &form.email, errors),
        profile_fields_html(&form.profile, errors),
    ]
    .concat();
    let picture = "<input id=\"picture\" name=\"picture\" type=\"file\" accept=\".jpg,.jpeg,.png\">";
    fields.push_str(&field_wrapper(
        "picture",
        "Update Profile Picture",
        picture,
        errors,
    ));
    let body = render(
        ACCOUNT,
        &[
            ("AVATAR", &avatar_html(user)),
            ("NAME", &text(&user.name)),
            ("EMAIL", &text(&user.email)),
            ("FIELDS", &fields),
        ],
    );
    Page::new("Account", body)
        .user(Some(user))
        .invalid_if(errors)
}

pub(crate) fn calories(user: &User, profile: &Profile, breakdown: &CalorieBreakdown) -> Page {
    let body = render(
        GET_CALORIES,
        &[
            ("BMR", &format!("{:.0}", breakdown.bmr)),
            ("AMR", &format!("{:.0}", breakdown.amr)),
            ("ACTIVITY", profile.activity_level.as_str()),
            ("GOAL", &profile.goal.as_str().to_lowercase()),
            ("TARGET", &breakdown.target.to_string()),
        ],
    );
    Page::new("Get Calories", body).user(Some(user))
}

pub(crate) fn meals(user: &User, diet: &CurrentDiet) -> Page {
    let cards = diet
        .meals
        .iter()
        .map(|m| {
            let photo = m.meal.photo.as_deref().map_or_else(String::new, |p| {
                format!(
                    "<img src=\"{}\" alt=\"{}\">",
                    attr(p),
                    attr(&m.meal.name)
                )
            });
            format!(
                "<article class=\"meal-card\">{photo}<h3>{}</h3><p>{}</p>\
                 <p>{} serving(s) x {:.0} kcal = <strong>{:.0} kcal</strong></p></article>",
                m.slot.title(),
                text(&m.meal.name),
                format_serving(m.serving),
                m.meal.calories,
                m.calories()
            )
        })
        .collect::<Vec<_>>()
        .join("\n    ");
    let body = render(
        SHOW_MEALS,
        &[
            ("MEALS", &cards),
            ("TOTAL", &format!("{:.0}", diet.total_calories)),
        ],
    );
    Page::new("Get Meals", body).user(Some(user))
}

fn format_serving(serving: f64) -> String {
    if serving.fract().abs() < f64::EPSILON {
        format!("{serving:.0}")
    } else {
        format!("{serving:.1}")
    }
}

fn window_form(
    action: &str,
    allowed: &[TimeWindow],
    current: TimeWindow,
    errors: &FieldErrors,
) -> String {
    let labels: Vec<&str> = allowed.iter().map(|w| w.label()).collect();
    format!(
        "<form method=\"POST\" action=\"{action}\" class=\"window-form\">{}\
         <button type=\"submit\">Submit</button></form>",
        select_field("time", "Time Frame", &labels, current.label(), errors)
    )
}

struct ChartData<'a> {
    label: &'a str,
    series: &'a ChartSeries,
    reference: Option<i64>,
    reference_label: &'a str,
}

fn chart_html(data: &ChartData<'_>) -> String {
    let json = serde_json::json!({
        "label": data.label,
        "labels": data.series.labels,
        "values": data.series.values,
        "reference": data.reference,
        "reference_label": data.reference_label,
    })
    .to_string()
    .replace('<', "\\u003c");
    format!(
        "<canvas id=\"chart\"></canvas>\n\
         <script type=\"application/json\" id=\"chart-data\">{json}</script>\n\
         <script src=\"{CHART_JS_CDN}\"></script>\n\
         <script src=\"/assets/charts.js\"></script>"
    )
}

pub(crate) fn calorie_chart(user: &User, history: &CalorieHistory, errors: &FieldErrors) -> Page {
    let (average, chart) = match history.average {
        Some(avg) => (
            format!(" &middot; Your average: <strong>{avg} kcal</strong>"),
            chart_html(&ChartData {
                label: "Calories",
                series: &history.series,
                reference: Some(history.recommended_intake),
                reference_label: "Recommended",
            }),
        ),
        None => (
            String::new(),
            "<p class=\"notice\">You have not entered any calories in this period</p>".to_string(),
        ),
    };
    let body = render(
        CALORIES_OVER_TIME,
        &[
            ("WINDOW", &text(history.window.label())),
            (
                "WINDOW_FORM",
                &window_form("/show-calories", CALORIE_WINDOWS, history.window, errors),
            ),
            ("RECOMMENDED", &history.recommended_intake.to_string()),
            ("AVERAGE", &average),
            ("CHART", &chart),
        ],
    );
    Page::new("Calories Over Time", body)
        .user(Some(user))
        .invalid_if(errors)
}

pub(crate) fn weight_chart(user: &User, history: &WeightHistory, errors: &FieldErrors) -> Page {
    let chart = if history.series.is_empty() {
        "<p class=\"notice\">No weight recorded in this period</p>".to_string()
    } else {
        chart_html(&ChartData {
            label: "Weight (kg)",
            series: &history.series,
            reference: None,
            reference_label: "",
        })
    };
    let body = render(
        WEIGHT_OVER_TIME,
        &[
            ("WINDOW", &text(history.window.label())),
            (
                "WINDOW_FORM",
                &window_form("/show-weight", WEIGHT_WINDOWS, history.window, errors),
            ),
            ("CHART", &chart),
        ],
    );
    Page::new("Weight Over Time", body)
        .user(Some(user))
        .invalid_if(errors)
}

pub(crate) fn reset_request(email: &str, errors: &FieldErrors) -> Page {
    let fields = text_field("email", "Email", "email", email, errors);
    Page::new("Reset Password", render(RESET_REQUEST, &[("FIELDS", &fields)])).invalid_if(errors)
}

pub(crate) fn reset_token(token: &str, errors: &FieldErrors) -> Page {
    let action = format!("/reset-password/{}", urlencoding::encode(token));
    let fields = [
        text_field("password", "Password", "password", "", errors),
        text_field("confirm_password", "Confirm Password", "password", "", errors),
    ]
    .concat();
    let body = render(
        RESET_TOKEN,
        &[("ACTION", &attr(&action)), ("FIELDS", &fields)],
    );
    Page::new("Reset Password", body).invalid_if(errors)
}

pub(crate) fn error(status: StatusCode, heading: &str, message: &str) -> Page {
    let body = render(
        ERROR,
        &[("HEADING", &text(heading)), ("MESSAGE", &text(message))],
    );
    Page::new(heading, body).status(status)
}

pub(crate) fn stylesheet() -> Response {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLE_CSS).into_response()
}

pub(crate) fn charts_script() -> Response {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        CHARTS_JS,
    )
        .into_response()
}

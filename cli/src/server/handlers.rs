use std::collections::HashMap;

use axum::Form;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use mealmind_core::models::{CALORIE_WINDOWS, TimeWindow, User, WEIGHT_WINDOWS};

use super::auth::{
    CompleteUser, CurrentUser, Flash, IncomingFlash, MaybeUser, SESSION_COOKIE, append_cookie,
    expired_cookie, flash_redirect, safe_next, session_cookie,
};
use super::forms::{
    AccountForm, FieldErrors, LoginForm, ProfileFields, RegisterForm, ResetPasswordForm,
    ResetRequestForm, Upload, WindowForm,
};
use super::views::{self, Page};
use super::{AppState, WebError};
use crate::avatar;
use crate::mailer::Email;

const EMAIL_TAKEN: &str = "That email is taken. Please choose a different one.";
const LOGIN_FAILED: &str = "Login Unsuccessful. Please check email and password";
const NO_DIET: &str = "Please choose your meals first";
const NO_TARGET: &str = "Your details do not give a positive calorie target. Please update them.";
const INVALID_TOKEN: &str = "That is an invalid or expired token";

type HandlerResult = Result<Response, WebError>;

fn home_redirect() -> Response {
    Redirect::to("/").into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NextQuery {
    next: Option<String>,
}

pub(crate) async fn index(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Page {
    views::home(user.as_ref()).flash(flash)
}

// --- Registration and login ---

pub(crate) async fn register_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return home_redirect();
    }
    views::register(&RegisterForm::default(), &FieldErrors::new())
        .flash(flash)
        .into_response()
}

pub(crate) async fn register(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<RegisterForm>,
) -> HandlerResult {
    if user.is_some() {
        return Ok(home_redirect());
    }
    let mut errors = form.validate();
    let service = state.service();
    if !errors.contains_key("email") && !service.email_available(&form.email, None)? {
        errors.insert("email", EMAIL_TAKEN.to_string());
    }
    if !errors.is_empty() {
        return Ok(views::register(&form, &errors).into_response());
    }

    let created = service.register(&form.name, &form.email, &form.password)?;
    Ok(flash_redirect(
        "/login",
        &Flash::success(format!("Account created for {}!", created.name)),
    ))
}

pub(crate) async fn login_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<NextQuery>,
) -> Response {
    if user.is_some() {
        return home_redirect();
    }
    let next = safe_next(query.next.as_deref());
    views::login(&LoginForm::default(), next, &FieldErrors::new())
        .flash(flash)
        .into_response()
}

pub(crate) async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> HandlerResult {
    if user.is_some() {
        return Ok(home_redirect());
    }
    let next = safe_next(query.next.as_deref());
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(views::login(&form, next, &errors).into_response());
    }

    let (user, token) = {
        let service = state.service();
        let Some(user) = service.authenticate(&form.email, &form.password)? else {
            info!("login failed");
            return Ok(views::login(&form, next, &errors)
                .flash(Some(Flash::danger(LOGIN_FAILED)))
                .into_response());
        };
        let token = service.session_token(user.id)?;
        (user, token)
    };
    info!(user_id = user.id, "user logged in");

    let mut response = if user.is_profile_complete() {
        flash_redirect(next.unwrap_or("/"), &Flash::success("You have been logged in!"))
    } else {
        flash_redirect(
            "/finish-account",
            &Flash::warning("Please complete your account details."),
        )
    };
    append_cookie(
        response.headers_mut(),
        &session_cookie(&token, form.remember(), state.settings.secure_cookies),
    );
    Ok(response)
}

pub(crate) async fn logout(CurrentUser(user): CurrentUser) -> Response {
    info!(user_id = user.id, "user logged out");
    let mut response = home_redirect();
    append_cookie(response.headers_mut(), &expired_cookie(SESSION_COOKIE));
    response
}

// --- Profile ---

pub(crate) async fn finish_account_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IncomingFlash(flash): IncomingFlash,
) -> HandlerResult {
    if state.service().calorie_target(user.id)?.is_some() {
        return Ok(home_redirect());
    }
    Ok(
        views::finish_account(&user, &ProfileFields::from_user(&user), &FieldErrors::new())
            .flash(flash)
            .into_response(),
    )
}

pub(crate) async fn finish_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(fields): Form<ProfileFields>,
) -> HandlerResult {
    let service = state.service();
    if service.calorie_target(user.id)?.is_some() {
        return Ok(home_redirect());
    }
    let mut errors = FieldErrors::new();
    let Some(profile) = fields.parse(&mut errors) else {
        return Ok(views::finish_account(&user, &fields, &errors).into_response());
    };
    service.complete_profile(user.id, &profile)?;
    Ok(flash_redirect(
        "/get-calories",
        &Flash::success("Your account has been initialized!"),
    ))
}

pub(crate) async fn account_page(
    CurrentUser(user): CurrentUser,
    IncomingFlash(flash): IncomingFlash,
) -> Page {
    views::account(&user, &AccountForm::from_user(&user), &FieldErrors::new()).flash(flash)
}

async fn read_account_multipart(
    multipart: &mut Multipart,
) -> Result<(HashMap<String, String>, Option<Upload>), WebError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| WebError::BadRequest(e.body_text());
    let mut fields = HashMap::new();
    let mut picture = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        if name == "picture" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_request)?;
            if !filename.is_empty() && !bytes.is_empty() {
                picture = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field.text().await.map_err(bad_request)?;
            fields.insert(name, value);
        }
    }
    Ok((fields, picture))
}

pub(crate) async fn account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> HandlerResult {
    let (fields, picture) = read_account_multipart(&mut multipart).await?;
    let form = AccountForm::from_fields(&fields, picture);
    let update = match form.validate() {
        Ok(update) => update,
        Err(errors) => return Ok(views::account(&user, &form, &errors).into_response()),
    };

    if !state.service().email_available(&update.email, Some(user.id))? {
        let mut errors = FieldErrors::new();
        errors.insert("email", EMAIL_TAKEN.to_string());
        return Ok(views::account(&user, &form, &errors).into_response());
    }

    let image_file = match &form.picture {
        Some(upload) => {
            let images = state.settings.static_dir.join("images");
            match avatar::save_avatar(&images, &upload.filename, &upload.bytes) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "avatar rejected");
                    let mut errors = FieldErrors::new();
                    errors.insert("picture", e.to_string());
                    return Ok(views::account(&user, &form, &errors).into_response());
                }
            }
        }
        None => None,
    };

    let service = state.service();
    service.update_account(user.id, &update)?;
    if let Some(file) = image_file {
        service.set_avatar(user.id, &file)?;
    }
    Ok(flash_redirect(
        "/get-calories",
        &Flash::success("Your account has been updated!"),
    ))
}

// --- Calories and meals ---

pub(crate) async fn get_calories(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
    IncomingFlash(flash): IncomingFlash,
) -> HandlerResult {
    let Some(profile) = user.profile() else {
        return Err(WebError::ProfileIncomplete);
    };
    let Some(breakdown) = state.service().compute_calorie_target(user.id)? else {
        return Ok(flash_redirect("/account", &Flash::danger(NO_TARGET)));
    };
    Ok(views::calories(&user, &profile, &breakdown)
        .flash(flash)
        .into_response())
}

pub(crate) async fn get_meals(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
) -> HandlerResult {
    match state.service().assemble_diet(user.id)? {
        Some(_) => Ok(Redirect::to("/show-meals").into_response()),
        None => Ok(Redirect::to("/get-calories").into_response()),
    }
}

pub(crate) async fn show_meals(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
    IncomingFlash(flash): IncomingFlash,
) -> HandlerResult {
    let Some(diet) = state.service().current_diet(user.id)? else {
        return Ok(Redirect::to("/get-meals").into_response());
    };
    Ok(views::meals(&user, &diet).flash(flash).into_response())
}

pub(crate) async fn save_meal(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
) -> HandlerResult {
    if state.service().save_diet_calories(user.id)?.is_none() {
        return Ok(flash_redirect("/get-meals", &Flash::danger(NO_DIET)));
    }
    Ok(flash_redirect(
        "/",
        &Flash::success("You chose a great meal plan for today!"),
    ))
}

// --- History charts ---

fn render_calories(
    state: &AppState,
    user: &User,
    window: TimeWindow,
    errors: &FieldErrors,
    flash: Option<Flash>,
) -> HandlerResult {
    let Some(history) = state
        .service()
        .calorie_history(user.id, window, Utc::now())?
    else {
        return Ok(flash_redirect("/show-meals", &Flash::danger(NO_DIET)));
    };
    Ok(views::calorie_chart(user, &history, errors)
        .flash(flash)
        .into_response())
}

pub(crate) async fn show_calories_page(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
    IncomingFlash(flash): IncomingFlash,
) -> HandlerResult {
    render_calories(
        &state,
        &user,
        TimeWindow::DEFAULT_CALORIES,
        &FieldErrors::new(),
        flash,
    )
}

pub(crate) async fn show_calories(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
    Form(form): Form<WindowForm>,
) -> HandlerResult {
    match form.parse(CALORIE_WINDOWS) {
        Ok(window) => render_calories(&state, &user, window, &FieldErrors::new(), None),
        Err(errors) => render_calories(&state, &user, TimeWindow::DEFAULT_CALORIES, &errors, None),
    }
}

fn render_weight(
    state: &AppState,
    user: &User,
    window: TimeWindow,
    errors: &FieldErrors,
    flash: Option<Flash>,
) -> HandlerResult {
    let history = state
        .service()
        .weight_history(user.id, window, Utc::now())?;
    Ok(views::weight_chart(user, &history, errors)
        .flash(flash)
        .into_response())
}

pub(crate) async fn show_weight_page(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
    IncomingFlash(flash): IncomingFlash,
) -> HandlerResult {
    render_weight(
        &state,
        &user,
        TimeWindow::DEFAULT_WEIGHT,
        &FieldErrors::new(),
        flash,
    )
}

pub(crate) async fn show_weight(
    State(state): State<AppState>,
    CompleteUser(user): CompleteUser,
    Form(form): Form<WindowForm>,
) -> HandlerResult {
    match form.parse(WEIGHT_WINDOWS) {
        Ok(window) => render_weight(&state, &user, window, &FieldErrors::new(), None),
        Err(errors) => render_weight(&state, &user, TimeWindow::DEFAULT_WEIGHT, &errors, None),
    }
}

// --- Password reset ---

pub(crate) async fn reset_request_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return home_redirect();
    }
    views::reset_request("", &FieldErrors::new())
        .flash(flash)
        .into_response()
}

pub(crate) async fn reset_request(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<ResetRequestForm>,
) -> HandlerResult {
    if user.is_some() {
        return Ok(home_redirect());
    }
    let mut errors = form.validate();
    if !errors.is_empty() {
        return Ok(views::reset_request(&form.email, &errors).into_response());
    }

    let Some((account, token)) = state.service().request_password_reset(form.email.trim())? else {
        errors.insert(
            "email",
            "There is no account with that email. You must register first.".to_string(),
        );
        return Ok(views::reset_request(&form.email, &errors).into_response());
    };
    let reset_url = format!(
        "{}/reset-password/{token}",
        state.settings.base_url.trim_end_matches('/')
    );
    state
        .mailer
        .send(&Email::password_reset(&account.email, &reset_url))?;
    Ok(flash_redirect(
        "/login",
        &Flash::info("An email has been sent with instructions to reset your password."),
    ))
}

pub(crate) async fn reset_token_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
    Path(token): Path<String>,
) -> HandlerResult {
    if user.is_some() {
        return Ok(home_redirect());
    }
    if state.service().verify_reset_token(&token)?.is_none() {
        return Ok(flash_redirect("/reset-password", &Flash::warning(INVALID_TOKEN)));
    }
    Ok(views::reset_token(&token, &FieldErrors::new())
        .flash(flash)
        .into_response())
}

pub(crate) async fn reset_token(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> HandlerResult {
    if user.is_some() {
        return Ok(home_redirect());
    }
    let service = state.service();
    if service.verify_reset_token(&token)?.is_none() {
        return Ok(flash_redirect("/reset-password", &Flash::warning(INVALID_TOKEN)));
    }
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(views::reset_token(&token, &errors).into_response());
    }
    match service.reset_password(&token, &form.password)? {
        Some(_) => Ok(flash_redirect(
            "/login",
            &Flash::success("Your password has been updated! You are now able to log in"),
        )),
        None => Ok(flash_redirect("/reset-password", &Flash::warning(INVALID_TOKEN))),
    }
}

// --- Assets and fallbacks ---

pub(crate) async fn stylesheet() -> Response {
    views::stylesheet()
}

pub(crate) async fn charts_script() -> Response {
    views::charts_script()
}

pub(crate) async fn not_found(MaybeUser(user): MaybeUser) -> Page {
    views::error(
        StatusCode::NOT_FOUND,
        "Page Not Found",
        "That page does not exist.",
    )
    .user(user.as_ref())
}

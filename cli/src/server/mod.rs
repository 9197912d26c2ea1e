mod auth;
mod forms;
mod handlers;
mod views;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::mailer::Mailer;
use auth::{Flash, flash_redirect};
use mealmind_core::service::MealMindService;

const BODY_LIMIT: usize = 5 * 1024 * 1024; // 5 MB, room for an avatar upload

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
     script-src 'self' https://cdn.jsdelivr.net; \
     style-src 'self'; \
     img-src 'self' https: data:; \
     form-action 'self'; \
     frame-ancestors 'none'";

/// Deployment settings the handlers need.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Absolute origin used in emailed links, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Served under `/static`; avatars are written to `images/` inside it.
    pub static_dir: PathBuf,
    /// Mark session cookies `Secure` (set when served over HTTPS).
    pub secure_cookies: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    service: Arc<Mutex<MealMindService>>,
    mailer: Arc<dyn Mailer>,
    settings: Arc<ServerSettings>,
}

impl AppState {
    pub(crate) fn new(
        service: MealMindService,
        mailer: Arc<dyn Mailer>,
        settings: ServerSettings,
    ) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            mailer,
            settings: Arc::new(settings),
        }
    }

    /// Locks the service. Never hold the guard across an `.await`.
    pub(crate) fn service(&self) -> MutexGuard<'_, MealMindService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Error handling ---

#[derive(Debug)]
pub(crate) enum WebError {
    /// Anonymous access to a protected page; `next` is the requested path.
    LoginRequired { next: String },
    ProfileIncomplete,
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::LoginRequired { next } => flash_redirect(
                &format!("/login?next={}", urlencoding::encode(&next)),
                &Flash::info("Please log in to access this page."),
            ),
            Self::ProfileIncomplete => flash_redirect(
                "/finish-account",
                &Flash::warning("Please complete your account details."),
            ),
            Self::BadRequest(msg) => {
                views::error(StatusCode::BAD_REQUEST, "Bad Request", &msg).into_response()
            }
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                views::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "An unexpected error occurred. Please try again later.",
                )
                .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("same-origin"),
    );
    response
}

fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.settings.static_dir);
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route(
            "/finish-account",
            get(handlers::finish_account_page).post(handlers::finish_account),
        )
        .route(
            "/account",
            get(handlers::account_page).post(handlers::account),
        )
        .route("/get-calories", get(handlers::get_calories))
        .route("/get-meals", get(handlers::get_meals))
        .route("/show-meals", get(handlers::show_meals))
        .route("/save-meal", get(handlers::save_meal))
        .route(
            "/show-calories",
            get(handlers::show_calories_page).post(handlers::show_calories),
        )
        .route(
            "/show-weight",
            get(handlers::show_weight_page).post(handlers::show_weight),
        )
        .route(
            "/reset-password",
            get(handlers::reset_request_page).post(handlers::reset_request),
        )
        .route(
            "/reset-password/{token}",
            get(handlers::reset_token_page).post(handlers::reset_token),
        )
        .route("/assets/style.css", get(handlers::stylesheet))
        .route("/assets/charts.js", get(handlers::charts_script))
        .nest_service("/static", static_files)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: MealMindService,
    mailer: Arc<dyn Mailer>,
    settings: ServerSettings,
    bind: &str,
    port: u16,
) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let state = AppState::new(service, mailer, settings);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    eprintln!("Listening on http://{addr}");
    if bind != "127.0.0.1" && bind != "localhost" {
        tracing::warn!(%bind, "server is reachable from other hosts");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::Email;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use http_body_util::BodyExt;
    use mealmind_core::models::{Meal, MealSlot, TimeWindow};
    use mealmind_core::planner::{DietSelection, MealSelector, SelectedMeal};
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, email: &Email) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(email.clone());
            Ok(())
        }
    }

    struct TestApp {
        state: AppState,
        mailer: Arc<RecordingMailer>,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("images")).unwrap();
            let service = MealMindService::new_in_memory(b"router-test-secret")
                .unwrap()
                .with_bcrypt_cost(4);
            service.seed_catalog_if_empty().unwrap();
            let mailer = Arc::new(RecordingMailer::default());
            let state = AppState::new(
                service,
                mailer.clone(),
                ServerSettings {
                    base_url: "http://mealmind.test".to_string(),
                    static_dir: dir.path().to_path_buf(),
                    secure_cookies: false,
                },
            );
            Self {
                state,
                mailer,
                _dir: dir,
            }
        }

        async fn send(&self, request: HttpRequest<Body>) -> Response {
            build_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap()
        }

        async fn get(&self, uri: &str, session: Option<&str>) -> Response {
            let mut builder = HttpRequest::get(uri);
            if let Some(token) = session {
                builder = builder.header(header::COOKIE, format!("mealmind_session={token}"));
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        async fn post_form(&self, uri: &str, body: &str, session: Option<&str>) -> Response {
            let mut builder = HttpRequest::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            if let Some(token) = session {
                builder = builder.header(header::COOKIE, format!("mealmind_session={token}"));
            }
            self.send(builder.body(Body::from(body.to_string())).unwrap())
                .await
        }

        /// Registers a user directly and returns a session token.
        fn session_for_new_user(&self, email: &str) -> String {
            let service = self.state.service();
            let user = service.register("Ada", email, "secret1").unwrap();
            service.session_token(user.id).unwrap()
        }

        async fn complete_profile(&self, token: &str) {
            let response = self
                .post_form(
                    "/finish-account",
                    "height=175&weight=70&age=30&gender=Male\
                     &activity_level=Moderately+Active&goal=Maintain+Weight",
                    Some(token),
                )
                .await;
            assert_eq!(location(&response), "/get-calories");
        }
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .map_or("", |v| v.to_str().unwrap())
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn session_from(response: &Response) -> Option<String> {
        set_cookies(response)
            .iter()
            .find_map(|c| c.strip_prefix("mealmind_session="))
            .and_then(|c| c.split(';').next())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    fn flash_from(response: &Response) -> Option<String> {
        set_cookies(response)
            .iter()
            .find_map(|c| c.strip_prefix("mealmind_flash="))
            .and_then(|c| c.split(';').next())
            .and_then(|v| v.split_once(':'))
            .map(|(_, msg)| urlencoding::decode(msg).unwrap().into_owned())
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = TestApp::new();
        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            headers.get("content-security-policy").unwrap(),
            CONTENT_SECURITY_POLICY
        );
    }

    #[tokio::test]
    async fn home_page_for_anonymous_user() {
        let app = TestApp::new();
        let body = body_text(app.get("/", None).await).await;
        assert!(body.contains("href=\"/register\""));
        assert!(body.contains("href=\"/login\""));
        assert!(!body.contains("href=\"/logout\""));
    }

    #[tokio::test]
    async fn protected_page_redirects_to_login_with_next() {
        let app = TestApp::new();
        let response = app.get("/show-weight", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fshow-weight");
        assert_eq!(
            flash_from(&response).as_deref(),
            Some("Please log in to access this page.")
        );
    }

    #[tokio::test]
    async fn register_creates_account() {
        let app = TestApp::new();
        let response = app
            .post_form(
                "/register",
                "name=Ada&email=ada%40example.com&password=secret1&confirm_password=secret1",
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        assert_eq!(
            flash_from(&response).as_deref(),
            Some("Account created for Ada!")
        );
        assert_eq!(app.state.service().list_users().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_rejects_invalid_form() {
        let app = TestApp::new();
        app.session_for_new_user("ada@example.com");
        let response = app
            .post_form(
                "/register",
                "name=A&email=ada%40example.com&password=secret1&confirm_password=nope",
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Name must be between 2 and 20 characters long"));
        assert!(body.contains("That email is taken. Please choose a different one."));
        assert!(body.contains("Field must be equal to password."));
        assert_eq!(app.state.service().list_users().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finish_account_rejects_profile_without_positive_target() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        let response = app
            .post_form(
                "/finish-account",
                "height=100&weight=30&age=120&gender=Male\
                 &activity_level=Sedentary&goal=Lose+Weight",
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("-298 kcal"));

        let user = app.state.service().list_users().unwrap().remove(0);
        assert!(!user.is_profile_complete());

        let response = app.get("/get-calories", Some(&token)).await;
        assert_eq!(location(&response), "/finish-account");
        let response = app.get("/get-meals", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/finish-account");
    }

    #[tokio::test]
    async fn login_with_bad_password_shows_flash() {
        let app = TestApp::new();
        app.session_for_new_user("ada@example.com");
        let response = app
            .post_form("/login", "email=ada%40example.com&password=wrong1", None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_from(&response).is_none());
        let body = body_text(response).await;
        assert!(body.contains("Login Unsuccessful. Please check email and password"));
    }

    #[tokio::test]
    async fn login_with_incomplete_profile_goes_to_finish_account() {
        let app = TestApp::new();
        app.session_for_new_user("ada@example.com");
        let response = app
            .post_form(
                "/login?next=%2Fshow-weight",
                "email=ada%40example.com&password=secret1",
                None,
            )
            .await;
        assert_eq!(location(&response), "/finish-account");
        assert!(session_from(&response).is_some());
    }

    #[tokio::test]
    async fn login_follows_local_next_only() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;

        let response = app
            .post_form(
                "/login?next=%2Fshow-weight",
                "email=ada%40example.com&password=secret1&remember=y",
                None,
            )
            .await;
        assert_eq!(location(&response), "/show-weight");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("mealmind_session=") && c.contains("Max-Age=1209600")));

        let response = app
            .post_form(
                "/login?next=https%3A%2F%2Fevil.example",
                "email=ada%40example.com&password=secret1",
                None,
            )
            .await;
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn incomplete_profile_is_sent_to_finish_account() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        let response = app.get("/get-calories", Some(&token)).await;
        assert_eq!(location(&response), "/finish-account");
        assert_eq!(
            flash_from(&response).as_deref(),
            Some("Please complete your account details.")
        );
    }

    #[tokio::test]
    async fn finish_account_rejects_out_of_range_values() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        let response = app
            .post_form(
                "/finish-account",
                "height=175&weight=10&age=30&gender=Male\
                 &activity_level=Sedentary&goal=Maintain+Weight",
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Weight must be between 30 and 300 kg"));
        let service = app.state.service();
        let user = service.list_users().unwrap().remove(0);
        assert!(!user.is_profile_complete());
    }

    #[tokio::test]
    async fn full_meal_planning_flow() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;

        let body = body_text(app.get("/get-calories", Some(&token)).await).await;
        assert!(body.contains("2638 kcal"));

        let response = app.get("/get-meals", Some(&token)).await;
        assert_eq!(location(&response), "/show-meals");

        let response = app.get("/show-meals", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Breakfast"));
        assert!(body.contains("Lunch"));
        assert!(body.contains("Dinner"));

        let response = app.get("/save-meal", Some(&token)).await;
        assert_eq!(location(&response), "/");
        assert_eq!(
            flash_from(&response).as_deref(),
            Some("You chose a great meal plan for today!")
        );

        let response = app
            .post_form("/show-calories", "time=2+Weeks", Some(&token))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Calories over the last 2 Weeks"));
        assert!(body.contains("Recommended intake: <strong>2638 kcal</strong>"));
        assert!(body.contains("id=\"chart-data\""));

        let body = body_text(app.get("/show-weight", Some(&token)).await).await;
        assert!(body.contains("Weight over the last 1 Month"));
        assert!(body.contains("70"));
    }

    #[tokio::test]
    async fn empty_calorie_window_renders_notice() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;
        app.get("/get-calories", Some(&token)).await;

        let response = app.get("/show-calories", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("You have not entered any calories in this period"));
        assert!(!body.contains("id=\"chart-data\""));
    }

    #[tokio::test]
    async fn invalid_window_is_a_form_error() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;
        let response = app
            .post_form("/show-weight", "time=2+Decades", Some(&token))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn save_meal_without_diet_redirects() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;
        let response = app.get("/save-meal", Some(&token)).await;
        assert_eq!(location(&response), "/get-meals");
        assert_eq!(
            flash_from(&response).as_deref(),
            Some("Please choose your meals first")
        );
    }

    #[tokio::test]
    async fn preconditions_redirect_to_previous_step() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;

        let response = app.get("/show-calories", Some(&token)).await;
        assert_eq!(location(&response), "/show-meals");
        let response = app.get("/get-meals", Some(&token)).await;
        assert_eq!(location(&response), "/get-calories");
        let response = app.get("/show-meals", Some(&token)).await;
        assert_eq!(location(&response), "/get-meals");
    }

    #[tokio::test]
    async fn finish_account_redirects_once_target_exists() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;
        app.get("/get-calories", Some(&token)).await;
        let response = app.get("/finish-account", Some(&token)).await;
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        let response = app.get("/logout", Some(&token)).await;
        assert_eq!(location(&response), "/");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("mealmind_session=;") && c.contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let app = TestApp::new();
        app.session_for_new_user("ada@example.com");

        let response = app
            .post_form("/reset-password", "email=nobody%40example.com", None)
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response)
            .await
            .contains("There is no account with that email. You must register first."));

        let response = app
            .post_form("/reset-password", "email=ada%40example.com", None)
            .await;
        assert_eq!(location(&response), "/login");
        let email = app.mailer.sent.lock().unwrap().pop().unwrap();
        assert_eq!(email.to, "ada@example.com");
        let link = email
            .body
            .lines()
            .find(|l| l.starts_with("http://mealmind.test/reset-password/"))
            .unwrap()
            .to_string();
        let path = link.trim_start_matches("http://mealmind.test");

        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .post_form(path, "password=newpass1&confirm_password=newpass1", None)
            .await;
        assert_eq!(location(&response), "/login");
        assert!(app
            .state
            .service()
            .authenticate("ada@example.com", "newpass1")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn bad_reset_token_redirects_with_warning() {
        let app = TestApp::new();
        let response = app.get("/reset-password/not-a-token", None).await;
        assert_eq!(location(&response), "/reset-password");
        assert_eq!(
            flash_from(&response).as_deref(),
            Some("That is an invalid or expired token")
        );
    }

    #[tokio::test]
    async fn session_token_is_not_a_reset_token() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        let response = app.get(&format!("/reset-password/{token}"), None).await;
        assert_eq!(location(&response), "/reset-password");
    }

    #[tokio::test]
    async fn account_update_via_multipart() {
        let app = TestApp::new();
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;

        let boundary = "XBOUNDARYX";
        let mut body = String::new();
        for (name, value) in [
            ("name", "Ada L"),
            ("email", "ada@example.com"),
            ("height", "175"),
            ("weight", "68"),
            ("age", "31"),
            ("gender", "Female"),
            ("activity_level", "Sedentary"),
            ("goal", "Lose Weight"),
        ] {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        let request = HttpRequest::post("/account")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::COOKIE, format!("mealmind_session={token}"))
            .body(Body::from(body))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(location(&response), "/get-calories");

        let service = app.state.service();
        let user = service.list_users().unwrap().remove(0);
        assert_eq!(user.name, "Ada L");
        assert_eq!(user.age, Some(31));
        let history = service
            .weight_history(user.id, TimeWindow::OneWeek, chrono::Utc::now())
            .unwrap();
        assert_eq!(history.series.values, vec![70.0, 68.0]);
    }

    #[tokio::test]
    async fn unknown_route_is_404_page() {
        let app = TestApp::new();
        let response = app.get("/no-such-page", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Page Not Found"));
    }

    #[tokio::test]
    async fn stylesheet_is_served() {
        let app = TestApp::new();
        let response = app.get("/assets/style.css", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = TestApp::new();
        let big_body = vec![b'a'; BODY_LIMIT + 1];
        let response = app
            .send(
                HttpRequest::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = WebError::Internal(anyhow::anyhow!("secret database path /var/lib/mealmind"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains("Something went wrong"));
        assert!(!body.contains("secret"));
    }

    struct FirstMealSelector;

    impl MealSelector for FirstMealSelector {
        fn select(&self, catalog: &[Meal], _target: i64) -> anyhow::Result<DietSelection> {
            let pick = |slot| {
                let meal = catalog.iter().find(|m| m.label == slot).unwrap().clone();
                SelectedMeal { meal, serving: 1.0 }
            };
            Ok(DietSelection {
                breakfast: pick(MealSlot::Breakfast),
                lunch: pick(MealSlot::Lunch),
                dinner: pick(MealSlot::Dinner),
            })
        }
    }

    #[tokio::test]
    async fn show_meals_lists_selected_meals() {
        let dir = tempfile::tempdir().unwrap();
        let service = MealMindService::new_in_memory(b"router-test-secret")
            .unwrap()
            .with_bcrypt_cost(4)
            .with_selector(Box::new(FirstMealSelector));
        service.seed_catalog_if_empty().unwrap();
        let first_breakfast = service
            .list_meals(Some(MealSlot::Breakfast))
            .unwrap()
            .remove(0);
        let mailer = Arc::new(RecordingMailer::default());
        let app = TestApp {
            state: AppState::new(
                service,
                mailer.clone(),
                ServerSettings {
                    base_url: "http://mealmind.test".to_string(),
                    static_dir: dir.path().to_path_buf(),
                    secure_cookies: false,
                },
            ),
            mailer,
            _dir: dir,
        };
        let token = app.session_for_new_user("ada@example.com");
        app.complete_profile(&token).await;
        app.get("/get-calories", Some(&token)).await;
        app.get("/get-meals", Some(&token)).await;

        let body = body_text(app.get("/show-meals", Some(&token)).await).await;
        assert!(body.contains(&*html_escape::encode_text(&first_breakfast.name)));
        assert!(body.contains("1 serving(s)"));
    }
}

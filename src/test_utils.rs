#[cfg(test)]
pub mod test_utils {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::config::{build_cache, Settings};
    use crate::realtime::NotificationHub;
    use crate::router::create_router;
    use crate::schemas::{ApiResponse, AppState};
    use axum::http::{header, HeaderName, HeaderValue, StatusCode};
    use axum::Router;
    use axum_test::TestServer;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::{json, Value};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    static PHONE_SEQUENCE: AtomicU32 = AtomicU32::new(1);

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None).await.expect("Failed to run migrations");

        db
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state() -> AppState {
        let db = setup_test_db().await;
        let mut settings = Settings::default();
        settings.jwt.secret = "test-secret".to_string();

        AppState {
            db,
            cache: build_cache(&settings),
            settings: Arc::new(settings),
            hub: Arc::new(NotificationHub::new()),
        }
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is read from RUST_LOG and defaults to WARN.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let _ = init_test_tracing();
        create_router(setup_test_app_state().await)
    }

    pub async fn setup_test_server() -> TestServer {
        TestServer::new(setup_test_app().await).expect("Failed to start test server")
    }

    /// Test server plus the state behind it, for tests that need to reach
    /// into the database directly.
    pub async fn setup_test_server_with_state() -> (TestServer, AppState) {
        let _ = init_test_tracing();
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
        (server, state)
    }

    /// `Authorization: Bearer <token>` header pair for axum-test requests.
    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("token is a valid header value");
        (header::AUTHORIZATION, value)
    }

    /// A registered account and its access token.
    pub struct TestUser {
        pub id: i64,
        pub username: String,
        pub access: String,
        pub refresh: String,
    }

    impl TestUser {
        pub fn auth(&self) -> (HeaderName, HeaderValue) {
            bearer(&self.access)
        }
    }

    /// Registers `username` with the given role and logs in.
    pub async fn register_user(server: &TestServer, username: &str, user_type: &str) -> TestUser {
        let phone = format!("024{:07}", PHONE_SEQUENCE.fetch_add(1, Ordering::SeqCst));
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": username,
                "email": format!("{username}@campus.test"),
                "password": "password123",
                "password_confirm": "password123",
                "user_type": user_type,
                "phone_number": phone,
                "first_name": "Test",
                "last_name": username,
            }))
            .await;
        if response.status_code() != StatusCode::CREATED {
            panic!("registration of {username} failed: {}", response.text());
        }

        let login = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username": username, "password": "password123" }))
            .await;
        login.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = login.json();
        TestUser {
            id: body.data["user"]["id"].as_i64().expect("user id"),
            username: username.to_string(),
            access: body.data["access"].as_str().expect("access token").to_string(),
            refresh: body.data["refresh"].as_str().expect("refresh token").to_string(),
        }
    }

    /// Places an order for `quantity` at the service's base price and
    /// returns the order id.
    pub async fn place_order(server: &TestServer, student: &TestUser, service_id: i64, quantity: i32) -> i64 {
        let (name, value) = student.auth();
        let response = server
            .post("/api/v1/orders")
            .add_header(name, value)
            .json(&json!({ "service_id": service_id, "quantity": quantity }))
            .await;
        if response.status_code() != StatusCode::CREATED {
            panic!("order creation failed: {}", response.text());
        }
        let body: ApiResponse<Value> = response.json();
        body.data["id"].as_i64().expect("order id")
    }

    /// Creates a service owned by `vendor` and returns its id.
    pub async fn create_service(server: &TestServer, vendor: &TestUser, name: &str, service_type: &str) -> i64 {
        let (name_header, value) = vendor.auth();
        let response = server
            .post("/api/v1/services")
            .add_header(name_header, value)
            .json(&json!({
                "service_name": name,
                "description": format!("{name} on campus"),
                "category": "food",
                "service_type": service_type,
                "base_price": "25.00",
                "contact_info": "0244000000",
                "location": "Main Gate",
            }))
            .await;
        if response.status_code() != StatusCode::CREATED {
            panic!("service creation failed: {}", response.text());
        }
        let body: ApiResponse<Value> = response.json();
        body.data["id"].as_i64().expect("service id")
    }
}

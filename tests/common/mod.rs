#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use wishdesk::access::PermissionActions;
use wishdesk::config::{Config, EmailSimulationConfig, GithubConfig};
use wishdesk::state::SharedState;

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const ADMIN_PASSWORD: &str = "password123";

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub state: SharedState,
}

/// Who a request is made as.
#[derive(Debug, Clone, Copy)]
pub enum As<'a> {
    Anonymous,
    /// Development `x-user-id` header.
    User(Uuid),
    Bearer(&'a str),
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn with_identity(&self, builder: RequestBuilder, who: As<'_>) -> RequestBuilder {
        match who {
            As::Anonymous => builder,
            As::User(id) => builder.header("x-user-id", id.to_string()),
            As::Bearer(token) => builder.bearer_auth(token),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> (Value, StatusCode) {
        let resp = builder.send().await.expect("request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str, who: As<'_>) -> (Value, StatusCode) {
        let builder = self.with_identity(self.client.get(self.url(path)), who);
        self.send(builder).await
    }

    pub async fn post(&self, path: &str, who: As<'_>, body: &Value) -> (Value, StatusCode) {
        let builder = self.with_identity(self.client.post(self.url(path)).json(body), who);
        self.send(builder).await
    }

    pub async fn put(&self, path: &str, who: As<'_>, body: &Value) -> (Value, StatusCode) {
        let builder = self.with_identity(self.client.put(self.url(path)).json(body), who);
        self.send(builder).await
    }

    pub async fn patch(&self, path: &str, who: As<'_>, body: &Value) -> (Value, StatusCode) {
        let builder = self.with_identity(self.client.patch(self.url(path)).json(body), who);
        self.send(builder).await
    }

    pub async fn delete(&self, path: &str, who: As<'_>) -> (Value, StatusCode) {
        let builder = self.with_identity(self.client.delete(self.url(path)), who);
        self.send(builder).await
    }

    /// Register the bootstrap admin through the API. Returns (token, user id).
    pub async fn bootstrap(&self) -> (String, Uuid) {
        let (body, status) = self
            .post(
                "/api/auth/register",
                As::Anonymous,
                &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD, "name": "Admin" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "bootstrap register failed: {body}");
        let token = body["access_token"].as_str().unwrap().to_string();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    /// Insert a user directly. The password hash is a placeholder, so these
    /// users authenticate through the development header only.
    pub async fn create_user(&self, role: &str) -> Uuid {
        let email = format!("{role}-{}@test.com", Uuid::now_v7().simple());
        wishdesk::db::users::create(&self.pool, &email, "not-a-hash", &format!("{role} user"), role)
            .await
            .expect("create user failed")
            .id
    }

    pub async fn grant(&self, role: &str, resource: &str, actions: PermissionActions) {
        wishdesk::db::role_permissions::upsert(&self.pool, role, resource, &actions)
            .await
            .expect("grant failed");
    }

    pub async fn audit_rows(&self, action: &str, resource: &str) -> Vec<(Option<String>, Option<Value>)> {
        sqlx::query_as::<_, (Option<String>, Option<Value>)>(
            "SELECT resource_id, new_values FROM audit_logs
             WHERE action = $1 AND resource = $2 ORDER BY created_at",
        )
        .bind(action)
        .bind(resource)
        .fetch_all(&self.pool)
        .await
        .expect("audit query failed")
    }
}

/// Poll `check` until it yields a value or roughly five seconds pass.
pub async fn eventually<T, F, Fut>(mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..100 {
        if let Some(value) = check().await {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

fn base_url() -> Option<String> {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").ok()
}

fn database_url(base_url: &str, db_name: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Spawn a test app with a fresh temporary database, or `None` when
/// `DATABASE_URL` is not set.
pub async fn spawn_app() -> Option<TestApp> {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> Option<TestApp> {
    let Some(base_url) = base_url() else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    // Create a unique test database
    let db_name = format!("wishdesk_test_{}", Uuid::now_v7().simple());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url(&base_url, "postgres"))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = database_url(&base_url, &db_name);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let mut config = Config {
        database_url: test_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 1_048_576,
        trusted_proxies: vec![],
        dev_auth: true,
        report_dir: std::env::temp_dir().join(&db_name),
        worker_count: 2,
        audit_page_size: 50,
        github: GithubConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            token: None,
        },
        email: EmailSimulationConfig {
            send_delay: Duration::from_millis(10),
            open_delay_max: Duration::from_millis(20),
            open_rate: 0.7,
        },
        log_level: "warn".to_string(),
        smtp: None,
    };
    configure(&mut config);

    let (app, state) = wishdesk::build_app(pool.clone(), config).expect("Failed to build app");

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    Some(TestApp {
        addr,
        pool,
        client,
        db_name,
        state,
    })
}

/// Drop the test database and report directory.
pub async fn cleanup(app: TestApp) {
    app.state.begin_shutdown();
    let report_dir = app.state.config.report_dir.clone();
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let _ = tokio::fs::remove_dir_all(&report_dir).await;

    let Some(base_url) = base_url() else {
        return;
    };

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url(&base_url, "postgres"))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use k_to_drinks_api::{
    auth::{AuthConfig, AuthService},
    build_router,
    config::AppConfig,
    db,
    entities::user::{self, UserRole},
    services::users::NewUser,
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str =
    "k2to9drinks4test7secret1value8with3enough5entropy6for0hs256_abcdefghij";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// A seeded account and its access token.
pub struct TestUser {
    pub model: user::Model,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.model.id
    }
}

/// Application backed by a fresh, migrated SQLite file in a temp directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub auth_service: Arc<AuthService>,
    pub admin: TestUser,
    pub manager: TestUser,
    pub driver: TestUser,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("k_to_drinks_test.db");

        let mut cfg = AppConfig::with_defaults(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET,
        );
        cfg.environment = "test".to_string();
        cfg.jwt_expiration = 3600;
        cfg.refresh_token_expiration = 86_400;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.media_root = dir.path().join("media").display().to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let auth_cfg = AuthConfig::from_app_config(&cfg).expect("valid auth config for tests");
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));
        let state = AppState::new(db_arc, cfg);

        let admin = seed_user(&state, &auth_service, "admin", UserRole::Admin).await;
        let manager = seed_user(&state, &auth_service, "manager", UserRole::Manager).await;
        let driver = seed_user(&state, &auth_service, "driver", UserRole::DeliveryDriver).await;

        let router = build_router(state.clone(), auth_service.clone());

        Self {
            router,
            state,
            auth_service,
            admin,
            manager,
            driver,
            _dir: dir,
        }
    }

    /// Creates another account through the service layer.
    pub async fn create_user(&self, username: &str, role: UserRole) -> TestUser {
        seed_user(&self.state, &self.auth_service, username, role).await
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.admin.token)).await
    }

    pub async fn as_manager(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.manager.token))
            .await
    }

    pub async fn as_driver(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.driver.token)).await
    }

    /// Creates a store and returns its id.
    pub async fn seed_store(&self, name: &str) -> String {
        let response = self
            .as_admin(
                Method::POST,
                "/api/v1/stores",
                Some(json!({
                    "name": name,
                    "location": "12 Rizal St, Quezon City",
                    "lat": 14.676,
                    "lng": 121.0437,
                    "owner_name": "Nena Santos",
                    "number": "0917-555-0101",
                    "day": "Monday"
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "seed store");
        data(response).await["id"].as_str().expect("store id").to_string()
    }

    /// Creates a category and returns its id.
    pub async fn seed_category(&self, name: &str) -> String {
        let response = self
            .as_admin(
                Method::POST,
                "/api/v1/categories",
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status(), 201, "seed category");
        data(response).await["id"].as_str().expect("category id").to_string()
    }

    /// Creates a product (and its zero-stock inventory row) in a fresh
    /// category and returns its id.
    pub async fn seed_product(&self, name: &str, unit_price: &str) -> String {
        let code = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let category_id = self.seed_category(&format!("Category {}", code)).await;
        let response = self
            .as_admin(
                Method::POST,
                "/api/v1/products",
                Some(json!({
                    "product_id": code,
                    "name": name,
                    "category_id": category_id,
                    "unit_price": unit_price,
                    "cost_price": "10.00",
                    "size": "1L",
                    "reorder_level": 5
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "seed product");
        data(response).await["id"].as_str().expect("product id").to_string()
    }

    /// Records an `in` transaction for `product_id`.
    pub async fn stock_in(&self, product_id: &str, quantity: i32) {
        let response = self
            .as_admin(
                Method::POST,
                "/api/v1/inventory/transactions",
                Some(json!({
                    "product_id": product_id,
                    "transaction_type": "in",
                    "quantity": quantity,
                    "reason": "initial stock"
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "stock in");
    }

    /// Creates an order for `store_id` with one line and returns the order body.
    pub async fn seed_order(&self, store_id: &str, product_id: &str, quantity: i32) -> Value {
        let response = self
            .as_admin(
                Method::POST,
                "/api/v1/orders",
                Some(json!({
                    "store_id": store_id,
                    "order_items": [
                        {"product_id": product_id, "quantity": quantity, "unit_price": "25.00"}
                    ]
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "seed order");
        data(response).await
    }

    /// Titles of the activity feed, newest first.
    pub async fn activity_titles(&self) -> Vec<String> {
        let response = self
            .as_admin(Method::GET, "/api/v1/dashboard/activities?limit=100", None)
            .await;
        assert_eq!(response.status(), 200, "activity feed");
        data(response)
            .await
            .as_array()
            .expect("activities")
            .iter()
            .filter_map(|activity| activity["title"].as_str().map(str::to_string))
            .collect()
    }
}

async fn seed_user(
    state: &AppState,
    auth_service: &AuthService,
    username: &str,
    role: UserRole,
) -> TestUser {
    let (model, _) = state
        .user_service()
        .create_user(
            NewUser {
                username: username.to_string(),
                email: format!("{}@ktodrinks.test", username),
                password: TEST_PASSWORD.to_string(),
                first_name: username.to_string(),
                last_name: "Tester".to_string(),
                role,
                phone_number: None,
            },
            None,
        )
        .await
        .expect("seed user");
    let token = auth_service
        .generate_token(&model)
        .await
        .expect("issue token")
        .access_token;
    TestUser { model, token }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// The `data` member of an `ApiResponse` body.
pub async fn data(response: Response) -> Value {
    response_json(response).await["data"].clone()
}

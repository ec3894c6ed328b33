#![allow(dead_code)]

use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

use foodgram::config::{AdminSeed, Config};

pub const PASSWORD: &str = "Muzion15secret";
pub const ADMIN_EMAIL: &str = "admin@foodgram.test";
pub const ADMIN_PASSWORD: &str = "AdminPass123";

// 1x1 png
pub const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub media_root: PathBuf,
}

/// Starts the service on an ephemeral port with its own database file and
/// media directory.
pub async fn spawn_app() -> TestApp {
    let root = std::env::temp_dir().join(format!("foodgram-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("Failed to create test directory");
    let media_root = root.join("media");

    let config = Config {
        database_url: format!("sqlite://{}?mode=rwc", root.join("foodgram.db").display()),
        bind_address: "127.0.0.1:0".into(),
        secret: "test-secret".into(),
        token_ttl_hours: 1,
        media_root: media_root.clone(),
        max_image_bytes: 1024 * 1024,
        admin: Some(AdminSeed {
            email: ADMIN_EMAIL.into(),
            username: "admin".into(),
            password: ADMIN_PASSWORD.into(),
        }),
    };

    let db = foodgram::connect(&config)
        .await
        .expect("Failed to prepare database");
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .expect("Failed to bind");
    let address = format!("http://{}", listener.local_addr().expect("No local address"));

    tokio::spawn(async move {
        axum::serve(listener, foodgram::app(db, config))
            .await
            .expect("Server failed");
    });

    TestApp {
        address,
        client: Client::new(),
        media_root,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.get(self.url(path)), token)
    }

    pub fn post(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.post(self.url(path)), token)
    }

    pub fn patch(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.patch(self.url(path)), token)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.delete(self.url(path)), token)
    }

    pub async fn register(&self, username: &str) -> Value {
        let response = self
            .post("/api/users", None)
            .json(&json!({
                "email": format!("{username}@foodgram.test"),
                "username": username,
                "first_name": "Test",
                "last_name": "User",
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse response JSON")
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post("/api/auth/token/login", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("Failed to parse response JSON");
        body["auth_token"]
            .as_str()
            .expect("No token in response")
            .to_string()
    }

    /// Registers a user and returns its id with a fresh token.
    pub async fn user(&self, username: &str) -> (i64, String) {
        let created = self.register(username).await;
        let token = self
            .login(&format!("{username}@foodgram.test"), PASSWORD)
            .await;
        (created["id"].as_i64().expect("No id"), token)
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn create_tag(&self, admin: &str, slug: &str) -> i64 {
        let response = self
            .post("/api/tags", Some(admin))
            .json(&json!({ "name": slug, "color": "#FBCEB1", "slug": slug }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response JSON");
        body["id"].as_i64().expect("No id")
    }

    pub async fn create_ingredient(&self, admin: &str, name: &str, unit: &str) -> i64 {
        let response = self
            .post("/api/ingredients", Some(admin))
            .json(&json!({ "name": name, "measurement_unit": unit }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response JSON");
        body["id"].as_i64().expect("No id")
    }

    pub async fn create_recipe(&self, token: &str, body: &Value) -> Value {
        let response = self
            .post("/api/recipes", Some(token))
            .json(body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse response JSON")
    }
}

pub fn recipe_body(name: &str, tags: &[i64], ingredients: &[(i64, i64)]) -> Value {
    json!({
        "name": name,
        "text": "Mix everything and cook.",
        "cooking_time": 10,
        "tags": tags,
        "ingredients": ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect::<Vec<_>>(),
    })
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Token {token}")),
        None => builder,
    }
}

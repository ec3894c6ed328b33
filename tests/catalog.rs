mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::spawn_app;

#[tokio::test]
async fn test_tag_writes_need_admin() {
    let app = spawn_app().await;
    let (_, token) = app.user("cook").await;
    let payload = json!({ "name": "Breakfast", "color": "#9ACEEB", "slug": "breakfast" });

    let response = app
        .post("/api/tags", None)
        .json(&payload)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post("/api/tags", Some(&token))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.admin_token().await;
    let response = app
        .post("/api/tags", Some(&admin))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let tag: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(tag["color"], "#9ACEEB");
    assert_eq!(tag["slug"], "breakfast");

    let response = app
        .get("/api/tags", None)
        .send()
        .await
        .expect("Failed to send request");
    let tags: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(tags.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_duplicate_slug_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_tag(&admin, "dinner").await;

    let response = app
        .post("/api/tags", Some(&admin))
        .json(&json!({ "name": "Dinner again", "color": "#FAE7B5", "slug": "dinner" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(body["slug"].is_array());
}

#[tokio::test]
async fn test_unknown_tag_color_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app
        .post("/api/tags", Some(&admin))
        .json(&json!({ "name": "Black", "color": "#000000", "slug": "black" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_duplicate_ingredient_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_ingredient(&admin, "salt", "g").await;

    let response = app
        .post("/api/ingredients", Some(&admin))
        .json(&json!({ "name": "salt", "measurement_unit": "g" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Same name, other unit is a different ingredient.
    app.create_ingredient(&admin, "salt", "pinch").await;
}

#[tokio::test]
async fn test_ingredient_name_search() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_ingredient(&admin, "sugar", "g").await;
    app.create_ingredient(&admin, "salt", "g").await;
    app.create_ingredient(&admin, "butter", "g").await;

    let response = app
        .get("/api/ingredients?name=s", None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let found: Value = response.json().await.expect("Failed to parse response JSON");
    let names: Vec<&str> = found
        .as_array()
        .expect("Expected an array")
        .iter()
        .filter_map(|i| i["name"].as_str())
        .collect();
    assert_eq!(names, vec!["salt", "sugar"]);
}

#[tokio::test]
async fn test_ingredient_update_and_delete() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let id = app.create_ingredient(&admin, "milk", "ml").await;

    let response = app
        .patch(&format!("/api/ingredients/{id}"), Some(&admin))
        .json(&json!({ "measurement_unit": "l" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(body["measurement_unit"], "l");
    assert_eq!(body["name"], "milk");

    let response = app
        .delete(&format!("/api/ingredients/{id}"), Some(&admin))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/ingredients/{id}"), None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_ingredient_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app
        .post("/api/ingredients", Some(&admin))
        .json(&json!({ "name": "   ", "measurement_unit": "  " }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(body["name"].is_array());
    assert!(body["measurement_unit"].is_array());

    let response = app
        .post("/api/ingredients", Some(&admin))
        .json(&json!({ "name": "  pepper ", "measurement_unit": " g " }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(body["name"], "pepper");
    assert_eq!(body["measurement_unit"], "g");
}

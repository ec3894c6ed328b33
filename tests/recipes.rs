mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{recipe_body, spawn_app, PIXEL_PNG};

#[tokio::test]
async fn test_create_and_read_recipe() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "lunch").await;
    let flour = app.create_ingredient(&admin, "flour", "g").await;
    let (author_id, token) = app.user("baker").await;

    let created = app
        .create_recipe(&token, &recipe_body("Bread", &[tag], &[(flour, 500)]))
        .await;
    assert_eq!(created["name"], "Bread");
    assert_eq!(created["author"]["id"], author_id);
    assert_eq!(created["tags"][0]["slug"], "lunch");
    assert_eq!(created["ingredients"][0]["name"], "flour");
    assert_eq!(created["ingredients"][0]["amount"], 500);
    assert_eq!(created["is_favorited"], false);
    assert!(created["image"].is_null());

    let id = created["id"].as_i64().expect("No id");
    let response = app
        .get(&format!("/api/recipes/{id}"), None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(fetched["text"], created["text"]);
}

#[tokio::test]
async fn test_duplicate_ingredient_in_recipe_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "soup").await;
    let salt = app.create_ingredient(&admin, "salt", "g").await;
    let (_, token) = app.user("chef").await;

    let response = app
        .post("/api/recipes", Some(&token))
        .json(&recipe_body("Salty", &[tag], &[(salt, 5), (salt, 3)]))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(body["ingredients"].is_array());
}

#[tokio::test]
async fn test_cooking_time_lower_bound() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "quick").await;
    let egg = app.create_ingredient(&admin, "egg", "pcs").await;
    let (_, token) = app.user("fast").await;

    let mut body = recipe_body("Raw egg", &[tag], &[(egg, 1)]);
    body["cooking_time"] = json!(0);
    let response = app
        .post("/api/recipes", Some(&token))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(errors["cooking_time"].is_array());

    body["cooking_time"] = json!(1);
    let created = app.create_recipe(&token, &body).await;
    assert_eq!(created["cooking_time"], 1);
}

#[tokio::test]
async fn test_unknown_references_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "misc").await;
    let (_, token) = app.user("ghost").await;

    let response = app
        .post("/api/recipes", Some(&token))
        .json(&recipe_body("Nothing", &[tag, 404], &[(777, 1)]))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(body["tags"].is_array());
    assert!(body["ingredients"].is_array());
}

#[tokio::test]
async fn test_anonymous_write_rejected() {
    let app = spawn_app().await;

    let response = app
        .post("/api/recipes", None)
        .json(&recipe_body("Anon", &[1], &[(1, 1)]))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_author_can_edit() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "cake").await;
    let sugar = app.create_ingredient(&admin, "sugar", "g").await;
    let (_, author) = app.user("author").await;
    let (_, stranger) = app.user("stranger").await;

    let created = app
        .create_recipe(&author, &recipe_body("Cake", &[tag], &[(sugar, 200)]))
        .await;
    let id = created["id"].as_i64().expect("No id");

    let response = app
        .patch(&format!("/api/recipes/{id}"), Some(&stranger))
        .json(&json!({ "name": "Stolen cake" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/api/recipes/{id}"), Some(&stranger))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patch_replaces_ingredients() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "salad").await;
    let tomato = app.create_ingredient(&admin, "tomato", "pcs").await;
    let cucumber = app.create_ingredient(&admin, "cucumber", "pcs").await;
    let (_, token) = app.user("greens").await;

    let created = app
        .create_recipe(&token, &recipe_body("Salad", &[tag], &[(tomato, 2)]))
        .await;
    let id = created["id"].as_i64().expect("No id");

    let response = app
        .patch(&format!("/api/recipes/{id}"), Some(&token))
        .json(&json!({ "ingredients": [{ "id": cucumber, "amount": 3 }] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.expect("Failed to parse response JSON");
    let ingredients = updated["ingredients"].as_array().expect("Expected an array");
    assert_eq!(ingredients.len(), 1);
    assert_eq!(ingredients[0]["id"], cucumber);
    assert_eq!(ingredients[0]["amount"], 3);
    assert_eq!(updated["name"], "Salad");
    assert_eq!(updated["tags"][0]["id"], tag);
}

#[tokio::test]
async fn test_delete_recipe() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "temp").await;
    let water = app.create_ingredient(&admin, "water", "ml").await;
    let (_, token) = app.user("cleaner").await;

    let created = app
        .create_recipe(&token, &recipe_body("Water", &[tag], &[(water, 250)]))
        .await;
    let id = created["id"].as_i64().expect("No id");

    let response = app
        .delete(&format!("/api/recipes/{id}"), Some(&token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/recipes/{id}"), None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let breakfast = app.create_tag(&admin, "breakfast").await;
    let dinner = app.create_tag(&admin, "dinner").await;
    let oats = app.create_ingredient(&admin, "oats", "g").await;
    let (first_id, first) = app.user("first").await;
    let (_, second) = app.user("second").await;

    app.create_recipe(&first, &recipe_body("Porridge", &[breakfast], &[(oats, 80)]))
        .await;
    app.create_recipe(&second, &recipe_body("Oat stew", &[dinner], &[(oats, 40)]))
        .await;

    let names = |body: Value| -> Vec<String> {
        body.as_array()
            .expect("Expected an array")
            .iter()
            .filter_map(|r| r["name"].as_str().map(str::to_string))
            .collect()
    };

    let response = app
        .get("/api/recipes", None)
        .send()
        .await
        .expect("Failed to send request");
    let all = names(response.json().await.expect("Failed to parse response JSON"));
    assert_eq!(all, vec!["Oat stew", "Porridge"]);

    let response = app
        .get(&format!("/api/recipes?author={first_id}"), None)
        .send()
        .await
        .expect("Failed to send request");
    let by_author = names(response.json().await.expect("Failed to parse response JSON"));
    assert_eq!(by_author, vec!["Porridge"]);

    let response = app
        .get("/api/recipes?tags=dinner", None)
        .send()
        .await
        .expect("Failed to send request");
    let by_tag = names(response.json().await.expect("Failed to parse response JSON"));
    assert_eq!(by_tag, vec!["Oat stew"]);
}

#[tokio::test]
async fn test_image_upload_and_serving() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "pics").await;
    let jam = app.create_ingredient(&admin, "jam", "g").await;
    let (_, token) = app.user("photographer").await;

    let mut body = recipe_body("Toast", &[tag], &[(jam, 30)]);
    body["image"] = json!(PIXEL_PNG);
    let created = app.create_recipe(&token, &body).await;

    let url = created["image"].as_str().expect("No image url");
    assert!(url.starts_with("/media/recipes/"));
    assert!(url.ends_with(".png"));

    let response = app
        .get(url, None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    let bytes = response.bytes().await.expect("Failed to read body");
    assert_eq!(&bytes[1..4], b"PNG");

    let response = app
        .get("/media/recipes/not-a-file.png", None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_image_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "broken").await;
    let jam = app.create_ingredient(&admin, "jam", "g").await;
    let (_, token) = app.user("clumsy").await;

    let mut body = recipe_body("Toast", &[tag], &[(jam, 30)]);
    body["image"] = json!("data:text/plain;base64,aGVsbG8=");
    let response = app
        .post("/api/recipes", Some(&token))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(errors["image"].is_array());

    let stored = std::fs::read_dir(app.media_root.join("recipes"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_blank_recipe_name_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "plain").await;
    let rice = app.create_ingredient(&admin, "rice", "g").await;
    let (_, token) = app.user("blank").await;

    let response = app
        .post("/api/recipes", Some(&token))
        .json(&recipe_body("    ", &[tag], &[(rice, 100)]))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(errors["name"].is_array());

    let created = app
        .create_recipe(&token, &recipe_body("Rice", &[tag], &[(rice, 100)]))
        .await;
    let id = created["id"].as_i64().expect("No id");
    let response = app
        .patch(&format!("/api/recipes/{id}"), Some(&token))
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_null_image_clears_it() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tag = app.create_tag(&admin, "photo").await;
    let jam = app.create_ingredient(&admin, "jam", "g").await;
    let (_, token) = app.user("undecided").await;

    let mut body = recipe_body("Toast", &[tag], &[(jam, 30)]);
    body["image"] = json!(PIXEL_PNG);
    let created = app.create_recipe(&token, &body).await;
    let id = created["id"].as_i64().expect("No id");
    let url = created["image"].as_str().expect("No image url").to_string();

    // Omitting the field leaves the image alone.
    let response = app
        .patch(&format!("/api/recipes/{id}"), Some(&token))
        .json(&json!({ "cooking_time": 3 }))
        .send()
        .await
        .expect("Failed to send request");
    let updated: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(updated["image"], url.as_str());

    let response = app
        .patch(&format!("/api/recipes/{id}"), Some(&token))
        .json(&json!({ "image": null }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.expect("Failed to parse response JSON");
    assert!(updated["image"].is_null());

    let response = app
        .get(&url, None)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

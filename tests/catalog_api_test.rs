//! Stores, categories, suppliers and products.

mod common;

use axum::http::Method;
use common::{data, TestApp};
use serde_json::json;

#[tokio::test]
async fn archiving_a_store_round_trips() {
    let app = TestApp::new().await;
    let store_id = app.seed_store("Aling Nena Sari-Sari").await;
    let archive_path = format!("/api/v1/stores/{}/archive", store_id);

    // An empty body archives
    let response = app.as_manager(Method::POST, &archive_path, None).await;
    assert_eq!(response.status(), 200);
    let archived = data(response).await;
    assert_eq!(archived["is_archived"], true);
    let stamped = archived["archived_at"].as_str().expect("archived_at").to_string();

    // archiving again keeps the first stamp
    let response = app.as_manager(Method::POST, &archive_path, None).await;
    assert_eq!(data(response).await["archived_at"], stamped.as_str());

    let response = app
        .as_manager(Method::GET, "/api/v1/stores?archived=true", None)
        .await;
    let page = data(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], store_id);

    let response = app
        .as_manager(Method::POST, &archive_path, Some(json!({"archive": false})))
        .await;
    assert_eq!(response.status(), 200);
    let restored = data(response).await;
    assert_eq!(restored["is_archived"], false);
    assert!(restored["archived_at"].is_null());
}

#[tokio::test]
async fn store_list_filters_and_paginates() {
    let app = TestApp::new().await;
    for name in ["Bayanihan Mart", "Carinderia Uno", "Dalisay Store"] {
        app.seed_store(name).await;
    }

    let response = app
        .as_manager(Method::GET, "/api/v1/stores?page=2&limit=2", None)
        .await;
    assert_eq!(response.status(), 200);
    let page = data(response).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["page"], 2);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["items"][0]["name"], "Dalisay Store");

    let response = app
        .as_manager(Method::GET, "/api/v1/stores?search=Carinderia&day=Monday", None)
        .await;
    let page = data(response).await;
    assert_eq!(page["total"], 1);

    let response = app
        .as_manager(Method::GET, "/api/v1/stores?day=Sunday", None)
        .await;
    assert_eq!(data(response).await["total"], 0);
}

#[tokio::test]
async fn unknown_store_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .as_manager(
            Method::GET,
            &format!("/api/v1/stores/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn store_validation_rejects_bad_email() {
    let app = TestApp::new().await;
    let response = app
        .as_manager(
            Method::POST,
            "/api/v1/stores",
            Some(json!({
                "name": "Bad Email Store",
                "location": "Somewhere",
                "owner_name": "Owner",
                "email": "nope",
                "number": "0917",
                "day": "Tuesday"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn creating_a_product_creates_zero_stock_inventory() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("Cola 1L", "25.00").await;

    let response = app
        .as_manager(Method::GET, &format!("/api/v1/products/{}", product_id), None)
        .await;
    assert_eq!(response.status(), 200);
    let product = data(response).await;
    assert_eq!(product["current_stock"], 0);
    assert_eq!(product["low_stock"], true);

    let response = app
        .as_manager(
            Method::GET,
            &format!("/api/v1/inventory?product_id={}", product_id),
            None,
        )
        .await;
    let page = data(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["current_stock"], 0);
}

#[tokio::test]
async fn duplicate_product_code_conflicts() {
    let app = TestApp::new().await;
    let category_id = app.seed_category("Softdrinks").await;
    let body = json!({
        "product_id": "CK-1500",
        "name": "Cola 1.5L",
        "category_id": category_id,
        "unit_price": "55.00",
        "cost_price": "40.00",
        "size": "1.5L"
    });

    let response = app
        .as_manager(Method::POST, "/api/v1/products", Some(body.clone()))
        .await;
    assert_eq!(response.status(), 201);
    let response = app.as_manager(Method::POST, "/api/v1/products", Some(body)).await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn category_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("Juice 250ml", "15.00").await;

    let response = app
        .as_manager(Method::GET, &format!("/api/v1/products/{}", product_id), None)
        .await;
    let category_id = data(response).await["category"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .as_manager(
            Method::DELETE,
            &format!("/api/v1/categories/{}", category_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 409);

    let response = app
        .as_manager(Method::DELETE, &format!("/api/v1/products/{}", product_id), None)
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .as_manager(
            Method::DELETE,
            &format!("/api/v1/categories/{}", category_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn supplier_crud() {
    let app = TestApp::new().await;

    let response = app
        .as_manager(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({"name": "Metro Bottlers", "contact_person": "Ana Cruz", "phone_number": "02-555-0000"})),
        )
        .await;
    assert_eq!(response.status(), 201);
    let id = data(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .as_manager(
            Method::PUT,
            &format!("/api/v1/suppliers/{}", id),
            Some(json!({"name": "Metro Bottlers Inc."})),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(data(response).await["name"], "Metro Bottlers Inc.");

    let response = app
        .as_manager(Method::DELETE, &format!("/api/v1/suppliers/{}", id), None)
        .await;
    assert_eq!(response.status(), 200);
    let response = app
        .as_manager(Method::GET, &format!("/api/v1/suppliers/{}", id), None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn out_of_range_pages_are_rejected() {
    let app = TestApp::new().await;
    app.seed_store("Bayanihan Mart").await;

    for path in [
        "/api/v1/stores?page=18446744073709551615&limit=100",
        "/api/v1/products?page=18446744073709551615",
        "/api/v1/orders?page=9223372036854775807&limit=3",
    ] {
        let response = app.as_manager(Method::GET, path, None).await;
        assert_eq!(response.status(), 400, "{}", path);
    }

    // far past the end but addressable: an empty page
    let response = app
        .as_manager(Method::GET, "/api/v1/stores?page=1000000&limit=100", None)
        .await;
    assert_eq!(response.status(), 200);
    let page = data(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(0));
}

mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{data, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn money(value: &Value) -> Decimal {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Decimal::from_str(&raw).unwrap_or_else(|_| panic!("not a decimal: {}", raw))
}

/// One order of 50.00 before tax with a delivery dated today, marked delivered.
async fn seed_delivered_order(app: &TestApp) -> Value {
    let store = app.seed_store("Dashboard Store").await;
    let product = app.seed_product("Cola", "25.00").await;
    app.stock_in(&product, 10).await;
    let order = app.seed_order(&store, &product, 2).await;

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "order_id": order["id"],
                "employee_id": app.driver.id(),
                "delivery_date": Utc::now().date_naive().to_string(),
                "delivery_time": "09:00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let delivery = data(response).await;

    let response = app
        .as_driver(
            Method::POST,
            &format!(
                "/api/v1/deliveries/{}/update-status",
                delivery["id"].as_str().expect("id")
            ),
            Some(json!({"status": "delivered"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    order
}

#[tokio::test]
async fn summary_reflects_orders_deliveries_and_stock() {
    let app = TestApp::new().await;
    let order = seed_delivered_order(&app).await;
    // a fresh product sits at zero stock, below its reorder level
    app.seed_product("Unstocked Soda", "20.00").await;

    let response = app
        .as_driver(Method::GET, "/api/v1/dashboard/summary", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary = data(response).await;

    assert_eq!(summary["today_deliveries"], 1);
    assert_eq!(summary["yesterday_deliveries"], 0);
    assert_eq!(money(&summary["today_deliveries_change"]), Decimal::ZERO);
    assert_eq!(summary["monthly_deliveries"], 1);
    // line totals only, tax excluded
    assert_eq!(money(&summary["total_sales"]), dec!(50.00));
    assert_eq!(summary["low_stock_count"], 1);
    assert_eq!(
        money(&summary["delivery_performance"]["on_time"]),
        dec!(100)
    );
    assert_eq!(money(&summary["delivery_performance"]["failed"]), Decimal::ZERO);
    assert_eq!(summary["recent_orders"][0]["id"], order["id"]);
    assert!(!summary["recent_activities"]
        .as_array()
        .expect("activities")
        .is_empty());
}

#[tokio::test]
async fn charts_bucket_by_period_and_reject_unknown_periods() {
    let app = TestApp::new().await;
    seed_delivered_order(&app).await;
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/sales?period=week", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let chart = data(response).await;
    assert_eq!(chart["period"], "week");
    let buckets = chart["data"].as_array().expect("buckets");
    assert_eq!(buckets.len(), 7);
    let last = buckets.last().expect("today bucket");
    assert_eq!(last["date"], today);
    assert_eq!(money(&last["sales"]), dec!(50.00));
    assert_eq!(money(&buckets[0]["sales"]), Decimal::ZERO);

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/sales", None)
        .await;
    let chart = data(response).await;
    assert_eq!(chart["period"], "month");
    let buckets = chart["data"].as_array().expect("buckets");
    assert_eq!(buckets.len(), 30);

    // the chart and the summary report the same tax-free figure
    let charted: Decimal = buckets.iter().map(|point| money(&point["sales"])).sum();
    let summary = data(
        app.as_admin(Method::GET, "/api/v1/dashboard/summary", None)
            .await,
    )
    .await;
    assert_eq!(charted, money(&summary["total_sales"]));

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/deliveries?period=year", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let chart = data(response).await;
    let buckets = chart["data"].as_array().expect("buckets");
    assert_eq!(buckets.len(), 12);
    let this_month = buckets.last().expect("current month");
    assert_eq!(this_month["date"], today[..7]);
    assert_eq!(this_month["total"], 1);
    assert_eq!(this_month["delivered"], 1);
    assert_eq!(this_month["cancelled"], 0);

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/sales?period=decade", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn activities_feed_is_newest_first_and_limited() {
    let app = TestApp::new().await;
    seed_delivered_order(&app).await;

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/activities?limit=1", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let activities = data(response).await;
    let activities = activities.as_array().expect("activities");
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["activity_type"], "delivery");

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/activities", None)
        .await;
    let titles: Vec<String> = data(response)
        .await
        .as_array()
        .expect("activities")
        .iter()
        .filter_map(|a| a["title"].as_str().map(str::to_string))
        .collect();
    assert!(titles.iter().any(|t| t.starts_with("New order")));
}

#[tokio::test]
async fn inventory_alerts_list_low_stock_products() {
    let app = TestApp::new().await;
    let product = app.seed_product("Low Juice", "30.00").await;
    app.stock_in(&product, 2).await;

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/inventory", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let alerts = data(response).await;
    assert_eq!(alerts[0]["product_id"], product);
    assert_eq!(alerts[0]["current_stock"], 2);
}

#[tokio::test]
async fn stat_cards_compute_percentage_change() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/dashboard/stats",
            Some(json!({
                "title": "Weekly sales",
                "stat_type": "sales",
                "period": "weekly",
                "current_value": "150",
                "previous_value": "100"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let stat = data(response).await;
    assert_eq!(money(&stat["percentage_change"]), dec!(50));
    assert_eq!(stat["is_active"], true);
    let stat_id = stat["id"].as_str().expect("id").to_string();

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/dashboard/stats",
            Some(json!({
                "title": "New stores",
                "stat_type": "orders",
                "period": "monthly",
                "current_value": "12",
                "previous_value": "0",
                "is_active": false
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(money(&data(response).await["percentage_change"]), Decimal::ZERO);

    let response = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/dashboard/stats/{}", stat_id),
            Some(json!({"current_value": "75"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(money(&data(response).await["percentage_change"]), dec!(-25));

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/stats?is_active=true", None)
        .await;
    let active = data(response).await;
    assert_eq!(active.as_array().expect("stats").len(), 1);
    assert_eq!(active[0]["title"], "Weekly sales");

    let response = app
        .as_driver(
            Method::POST,
            "/api/v1/dashboard/stats",
            Some(json!({
                "title": "Sneaky",
                "stat_type": "sales",
                "period": "daily",
                "current_value": "1",
                "previous_value": "1"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .as_admin(
            Method::DELETE,
            &format!("/api/v1/dashboard/stats/{}", stat_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .as_admin(Method::GET, "/api/v1/dashboard/stats", None)
        .await;
    assert_eq!(data(response).await.as_array().expect("stats").len(), 1);
}

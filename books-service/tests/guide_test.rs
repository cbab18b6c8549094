//! Galakiwi guide integration tests: surcharge, per-guide payments and the
//! parent roll-up.

mod common;

use common::{dec, TestApp};
use rust_decimal::Decimal;
use serde_json::json;
use serial_test::serial;

async fn parent_with_two_guides(app: &TestApp) -> (String, String, String) {
    let parent: serde_json::Value = app
        .create_book(&json!({ "client": "galakiwi", "name": "Season 2026" }))
        .await
        .json()
        .await
        .unwrap();
    let parent_id = parent["book_id"].as_str().unwrap().to_string();

    let mut guide_ids = Vec::new();
    for name in ["Guide Ana", "Guide Bruno"] {
        let guide: serde_json::Value = app
            .create_book(&json!({
                "client": "galakiwi",
                "name": name,
                "parent_id": parent_id
            }))
            .await
            .json()
            .await
            .unwrap();
        guide_ids.push(guide["book_id"].as_str().unwrap().to_string());
    }

    let second = guide_ids.pop().unwrap();
    let first = guide_ids.pop().unwrap();
    (parent_id, first, second)
}

#[tokio::test]
#[serial]
async fn parent_balance_rolls_up_guides_with_surcharge() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (parent_id, ana_id, bruno_id) = parent_with_two_guides(&app).await;

    // 100 with the 10% surcharge counts as 110.
    let response = app
        .add_item(
            &ana_id,
            &json!({
                "description": "Full day tour",
                "amount": "100",
                "surcharge": true
            }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .add_item(
            &bruno_id,
            &json!({ "description": "Half day tour", "amount": "50" }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let ana: serde_json::Value = app.get_book(&ana_id).await.json().await.unwrap();
    assert_eq!(dec(&ana["balance"]["charged"]), Decimal::new(110, 0));
    assert_eq!(ana["items"][0]["surcharge"], true);

    let parent: serde_json::Value = app.get_book(&parent_id).await.json().await.unwrap();
    assert_eq!(dec(&parent["balance"]["charged"]), Decimal::new(160, 0));
    assert_eq!(dec(&parent["balance"]["pending"]), Decimal::new(160, 0));
    assert_eq!(parent["guides"].as_array().unwrap().len(), 2);

    app.delete_book(&parent_id).await;
}

#[tokio::test]
#[serial]
async fn guide_payment_reduces_parent_pending() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (parent_id, ana_id, bruno_id) = parent_with_two_guides(&app).await;

    app.add_item(&ana_id, &json!({ "description": "Tour", "amount": "80" }))
        .await;
    app.add_item(&bruno_id, &json!({ "description": "Tour", "amount": "20" }))
        .await;

    let response = app
        .add_payment(&ana_id, &json!({ "amount": "50", "method": "transfer" }))
        .await;
    assert_eq!(response.status(), 201);

    let parent: serde_json::Value = app.get_book(&parent_id).await.json().await.unwrap();
    assert_eq!(dec(&parent["balance"]["charged"]), Decimal::new(100, 0));
    assert_eq!(dec(&parent["balance"]["paid"]), Decimal::new(50, 0));
    assert_eq!(dec(&parent["balance"]["pending"]), Decimal::new(50, 0));

    // The payment sits on the guide, not the parent.
    assert!(parent["payments"].as_array().unwrap().is_empty());
    let ana = parent["guides"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["book"]["book_id"] == ana_id.as_str())
        .unwrap();
    assert_eq!(ana["payments"].as_array().unwrap().len(), 1);
    assert_eq!(dec(&ana["balance"]["pending"]), Decimal::new(30, 0));

    app.delete_book(&parent_id).await;
}

#[tokio::test]
#[serial]
async fn fully_paid_guide_flips_to_paid() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (parent_id, ana_id, _bruno_id) = parent_with_two_guides(&app).await;

    app.add_item(
        &ana_id,
        &json!({ "description": "Tour", "amount": "100", "surcharge": true }),
    )
    .await;

    let response = app
        .add_payment(&ana_id, &json!({ "amount": "110", "method": "cash" }))
        .await;
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["book"]["status"], "paid");

    app.delete_book(&parent_id).await;
}

#[tokio::test]
#[serial]
async fn parent_book_rejects_direct_items_and_payments() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (parent_id, ana_id, _bruno_id) = parent_with_two_guides(&app).await;

    let item = app
        .add_item(&parent_id, &json!({ "description": "Tour", "amount": "10" }))
        .await;
    assert_eq!(item.status(), 400);

    app.add_item(&ana_id, &json!({ "description": "Tour", "amount": "50" }))
        .await;

    let payment = app
        .add_payment(&parent_id, &json!({ "amount": "10", "method": "cash" }))
        .await;
    assert_eq!(payment.status(), 400);

    // The parent's view stayed a pure roll-up of its guides.
    let parent: serde_json::Value = app.get_book(&parent_id).await.json().await.unwrap();
    assert!(parent["items"].as_array().unwrap().is_empty());
    assert!(parent["payments"].as_array().unwrap().is_empty());
    assert_eq!(dec(&parent["balance"]["charged"]), Decimal::new(50, 0));
}

#[tokio::test]
#[serial]
async fn surcharge_is_ignored_on_deep_blue_items() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let book: serde_json::Value = app
        .create_book(&json!({ "client": "deep_blue", "name": "No surcharge" }))
        .await
        .json()
        .await
        .unwrap();
    let book_id = book["book_id"].as_str().unwrap();

    let response = app
        .add_item(
            book_id,
            &json!({ "description": "Charter", "amount": "100", "surcharge": true }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let item: serde_json::Value = response.json().await.unwrap();
    assert_eq!(item["surcharge"], false);

    let detail: serde_json::Value = app.get_book(book_id).await.json().await.unwrap();
    assert_eq!(dec(&detail["balance"]["charged"]), Decimal::new(100, 0));
}

#[tokio::test]
#[serial]
async fn deleting_parent_cascades_to_guides() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let (parent_id, ana_id, bruno_id) = parent_with_two_guides(&app).await;

    app.add_item(&ana_id, &json!({ "description": "Tour", "amount": "40" }))
        .await;
    app.add_payment(&ana_id, &json!({ "amount": "10", "method": "check" }))
        .await;

    let response = app.delete_book(&parent_id).await;
    assert_eq!(response.status(), 204);

    assert_eq!(app.get_book(&parent_id).await.status(), 404);
    assert_eq!(app.get_book(&ana_id).await.status(), 404);
    assert_eq!(app.get_book(&bruno_id).await.status(), 404);
}

mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{acquire_db_lock, read_json, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReminderBody {
    id: Uuid,
    level: i32,
    status: String,
    sent_at: Option<String>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverdueBody {
    id: Uuid,
    days_overdue: i64,
    highest_reminder_level: Option<i32>,
}

struct Books {
    app: TestApp,
    admin: String,
    overdue: Uuid,
    paid: Uuid,
}

async fn books() -> Result<Option<Books>> {
    let Some(app) = TestApp::new().await? else {
        return Ok(None);
    };
    let tenant = app.insert_tenant("Acme").await?;
    app.insert_user(tenant, "admin", "admin").await?;
    let customer = app.insert_customer(tenant).await?;
    let today = Utc::now().date_naive();

    let overdue = app
        .insert_invoice(tenant, customer, 50_000, today - Duration::days(10), "PENDING")
        .await?;
    let paid = app
        .insert_invoice(tenant, customer, 20_000, today - Duration::days(40), "PAID")
        .await?;
    app.insert_invoice(tenant, customer, 99_000, today + Duration::days(14), "PENDING")
        .await?;
    // neither due today nor cancelled counts as overdue
    app.insert_invoice(tenant, customer, 7_000, today, "PENDING")
        .await?;
    app.insert_invoice(tenant, customer, 8_000, today - Duration::days(20), "CANCELLED")
        .await?;

    let admin = app.login_token("admin").await?;
    Ok(Some(Books {
        app,
        admin,
        overdue,
        paid,
    }))
}

fn reminder(invoice: Uuid, level: i32) -> Value {
    json!({ "invoiceId": invoice, "level": level, "method": "EMAIL" })
}

#[tokio::test]
async fn reminders_escalate_strictly() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(Books {
        app,
        admin,
        overdue,
        paid,
    }) = books().await?
    else {
        return Ok(());
    };

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 4), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 0), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 1), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first: ReminderBody = read_json(response).await?;
    assert_eq!(first.level, 1);
    assert_eq!(first.status, "PENDING");

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 1), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    assert_eq!(body["details"]["highestLevel"], 1);

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 2), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json("/api/invoices/reminders", &reminder(paid, 1), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/invoices/reminders",
            &reminder(Uuid::new_v4(), 1),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_json(
            "/api/invoices/reminders",
            &json!({ "invoiceId": overdue, "level": 3, "method": "PIGEON" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn delivery_outcomes_are_recorded() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(Books {
        app,
        admin,
        overdue,
        ..
    }) = books().await?
    else {
        return Ok(());
    };

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 1), Some(&admin))
        .await?;
    let created: ReminderBody = read_json(response).await?;

    let response = app
        .send_json(
            Method::PUT,
            &format!("/api/invoices/reminders/{}/failed", created.id),
            &json!({ "error": "mailbox full" }),
            Some(&admin),
            &[],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let failed: ReminderBody = read_json(response).await?;
    assert_eq!(failed.status, "FAILED");
    assert_eq!(failed.error_message.as_deref(), Some("mailbox full"));

    // a failed notice does not count towards escalation
    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 1), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let retry: ReminderBody = read_json(response).await?;

    let path = format!("/api/invoices/reminders/{}/sent", retry.id);
    for _ in 0..2 {
        let response = app.put_json(&path, &json!({}), Some(&admin)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let sent: ReminderBody = read_json(response).await?;
        assert_eq!(sent.status, "SENT");
        assert!(sent.sent_at.is_some());
        assert!(sent.error_message.is_none());
    }

    let response = app
        .put_json(
            &format!("/api/invoices/reminders/{}/sent", Uuid::new_v4()),
            &json!({}),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn failure_can_be_recorded_without_a_body() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(Books {
        app,
        admin,
        overdue,
        ..
    }) = books().await?
    else {
        return Ok(());
    };

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 1), Some(&admin))
        .await?;
    let created: ReminderBody = read_json(response).await?;
    let path = format!("/api/invoices/reminders/{}/failed", created.id);

    let response = app.send_empty(Method::PUT, &path, Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let failed: ReminderBody = read_json(response).await?;
    assert_eq!(failed.status, "FAILED");
    assert!(failed.error_message.is_none());

    let response = app
        .put_json(&path, &json!({ "reason": "bounced" }), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn overdue_listing_and_stats() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(Books {
        app,
        admin,
        overdue,
        ..
    }) = books().await?
    else {
        return Ok(());
    };

    let response = app
        .post_json("/api/invoices/reminders", &reminder(overdue, 1), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.get("/api/invoices/overdue", Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<OverdueBody> = read_json(response).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, overdue);
    assert_eq!(listed[0].days_overdue, 10);
    assert_eq!(listed[0].highest_reminder_level, Some(1));

    let response = app.get("/api/invoices/reminders/stats", Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = read_json(response).await?;
    assert_eq!(stats["overdueInvoices"], 1);
    assert_eq!(stats["overdueAmountCents"], 50_000);
    assert_eq!(stats["remindersByLevel"]["1"], 1);
    assert_eq!(stats["remindersByStatus"]["PENDING"], 1);

    app.cleanup().await?;
    Ok(())
}

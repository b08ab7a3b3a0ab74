mod common;

use anyhow::Result;
use axum::http::StatusCode;
use bizhub::models::{Expense, NewEmployee};
use chrono::NaiveDate;
use common::{acquire_db_lock, day, employee, read_json, TestApp, CRON_SECRET};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    processed: usize,
    created: usize,
    skipped: usize,
    errors: usize,
    results: Vec<Item>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: Uuid,
    status: String,
    expense_id: Option<Uuid>,
}

async fn run(app: &TestApp, path: &str) -> Result<Report> {
    let response = app.get(path, Some(CRON_SECRET)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

async fn expenses_of(app: &TestApp, template: Uuid) -> Result<Vec<Expense>> {
    app.with_conn(move |conn| {
        use bizhub::schema::expenses;
        Ok(expenses::table
            .filter(expenses::recurring_expense_id.eq(template))
            .load::<Expense>(conn)?)
    })
    .await
}

async fn next_run_of(app: &TestApp, template: Uuid) -> Result<NaiveDate> {
    app.with_conn(move |conn| {
        use bizhub::schema::recurring_expenses;
        Ok(recurring_expenses::table
            .find(template)
            .select(recurring_expenses::next_run)
            .first::<NaiveDate>(conn)?)
    })
    .await
}

#[tokio::test]
async fn monthly_template_advances_to_end_of_february() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let tenant = app.insert_tenant("Acme").await?;
    let template = app.insert_template(tenant, "MONTHLY", day(2024, 1, 31)).await?;
    let future = app.insert_template(tenant, "WEEKLY", day(2024, 3, 1)).await?;

    let report = run(&app, "/api/cron/recurring-expenses?asOf=2024-02-01").await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(report.results[0].id, template);
    assert_eq!(report.results[0].status, "created");

    let generated = expenses_of(&app, template).await?;
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].expense_date, day(2024, 2, 1));
    assert_eq!(generated[0].amount_cents, 120_000);
    assert_eq!(Some(generated[0].id), report.results[0].expense_id);
    assert_eq!(next_run_of(&app, template).await?, day(2024, 2, 29));

    // not yet due again, and the untouched template stays put
    let report = run(&app, "/api/cron/recurring-expenses?asOf=2024-02-01").await?;
    assert_eq!(report.processed, 0);
    assert_eq!(expenses_of(&app, template).await?.len(), 1);
    assert_eq!(next_run_of(&app, future).await?, day(2024, 3, 1));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn overdue_template_catches_up_one_period_per_run() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let tenant = app.insert_tenant("Acme").await?;
    let template = app.insert_template(tenant, "DAILY", day(2024, 5, 1)).await?;

    let report = run(&app, "/api/cron/recurring-expenses?asOf=2024-05-03").await?;
    assert_eq!(report.created, 1);
    assert_eq!(next_run_of(&app, template).await?, day(2024, 5, 2));

    // still due, but today's expense already exists
    let report = run(&app, "/api/cron/recurring-expenses?asOf=2024-05-03").await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.results[0].status, "skipped");
    assert_eq!(expenses_of(&app, template).await?.len(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn lagging_monthly_template_books_once_per_month() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let tenant = app.insert_tenant("Acme").await?;
    let template = app.insert_template(tenant, "MONTHLY", day(2024, 1, 31)).await?;

    let report = run(&app, "/api/cron/recurring-expenses?asOf=2024-05-01").await?;
    assert_eq!(report.created, 1);
    assert_eq!(next_run_of(&app, template).await?, day(2024, 2, 29));

    // still behind schedule, but May already has its expense
    for as_of in ["2024-05-02", "2024-05-03", "2024-05-31"] {
        let report = run(&app, &format!("/api/cron/recurring-expenses?asOf={as_of}")).await?;
        assert_eq!(report.processed, 1);
        assert_eq!(report.created, 0);
        assert_eq!(report.skipped, 1);
    }
    assert_eq!(expenses_of(&app, template).await?.len(), 1);
    assert_eq!(next_run_of(&app, template).await?, day(2024, 2, 29));

    let report = run(&app, "/api/cron/recurring-expenses?asOf=2024-06-01").await?;
    assert_eq!(report.created, 1);
    let mut dates: Vec<NaiveDate> = expenses_of(&app, template)
        .await?
        .into_iter()
        .map(|expense| expense.expense_date)
        .collect();
    dates.sort();
    assert_eq!(dates, vec![day(2024, 5, 1), day(2024, 6, 1)]);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn salary_is_booked_once_per_month() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let tenant = app.insert_tenant("Acme").await?;
    let paid = app
        .insert_employee(NewEmployee {
            fixed_salary_cents: Some(350_000),
            salary_payout_day: Some(31),
            ..employee(tenant, "Paid")
        })
        .await?;
    app.insert_employee(employee(tenant, "Hourly")).await?;

    let report = run(&app, "/api/cron/salary-expenses?asOf=2024-02-10").await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.results[0].id, paid);

    let report = run(&app, "/api/cron/salary-expenses?asOf=2024-02-20").await?;
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 1);

    let booked: Vec<Expense> = app
        .with_conn(move |conn| {
            use bizhub::schema::expenses;
            Ok(expenses::table
                .filter(expenses::employee_id.eq(paid))
                .load::<Expense>(conn)?)
        })
        .await?;
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].category, "GEHALT");
    assert_eq!(booked[0].amount_cents, 350_000);
    assert_eq!(booked[0].expense_date, day(2024, 2, 29));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn cron_endpoints_require_the_secret() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    for path in [
        "/api/cron/recurring-expenses",
        "/api/cron/salary-expenses",
    ] {
        let response = app.get(path, None).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.get(path, Some("wrong-secret")).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    app.cleanup().await?;
    Ok(())
}

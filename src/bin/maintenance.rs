use std::env;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use bizhub::{
    auth::{password, ROLE_ADMIN},
    config::AppConfig,
    db,
    models::{NewTenant, NewUser},
    schema::{tenants, users},
    workflows::{recurring, salary, BatchReport},
};

const USAGE: &str = "Usage:
  maintenance bootstrap-tenant <tenant-name> <admin-username> <admin-password>
  maintenance run-recurring-expenses [YYYY-MM-DD]
  maintenance run-salary-expenses [YYYY-MM-DD]";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).compact().init();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("bootstrap-tenant") => {
            let (Some(tenant), Some(username), Some(password)) =
                (args.next(), args.next(), args.next())
            else {
                eprintln!("{USAGE}");
                std::process::exit(1);
            };
            bootstrap_tenant(&tenant, &username, &password)?;
        }
        Some("run-recurring-expenses") => {
            let as_of = parse_date(args.next())?;
            let report = with_connection(|conn| {
                recurring::run_due_recurring_expenses(conn, as_of).map_err(Into::into)
            })?;
            print_report("recurring expenses", &report);
        }
        Some("run-salary-expenses") => {
            let today = parse_date(args.next())?;
            let report = with_connection(|conn| {
                salary::run_salary_expenses(conn, today).map_err(Into::into)
            })?;
            print_report("salary expenses", &report);
        }
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_date(arg: Option<String>) -> Result<NaiveDate> {
    match arg {
        Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .with_context(|| format!("invalid date {value:?}, expected YYYY-MM-DD")),
        None => Ok(Utc::now().date_naive()),
    }
}

fn with_connection<T>(f: impl FnOnce(&mut PgConnection) -> Result<T>) -> Result<T> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    if config.run_migrations {
        db::run_migrations(&pool)?;
    }
    let mut conn = pool.get().context("failed to get database connection")?;
    f(&mut conn)
}

fn bootstrap_tenant(name: &str, username: &str, plain_password: &str) -> Result<()> {
    if plain_password.len() < 8 {
        bail!("admin password must be at least 8 characters");
    }
    let password_hash = password::hash_password(plain_password)?;

    let (tenant_id, user_id) = with_connection(|conn| {
        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let tenant_id = Uuid::new_v4();
            diesel::insert_into(tenants::table)
                .values(&NewTenant {
                    id: tenant_id,
                    name: name.to_string(),
                })
                .execute(conn)
                .context("failed to create tenant")?;

            let user_id = Uuid::new_v4();
            diesel::insert_into(users::table)
                .values(&NewUser {
                    id: user_id,
                    tenant_id,
                    username: username.to_string(),
                    password_hash,
                    role: ROLE_ADMIN.to_string(),
                })
                .execute(conn)
                .context("failed to create admin user")?;

            Ok((tenant_id, user_id))
        })
    })?;

    println!("Created tenant {name} ({tenant_id}) with admin {username} ({user_id}).");
    Ok(())
}

fn print_report(label: &str, report: &BatchReport) {
    for line in render_report(label, report) {
        println!("{line}");
    }
}

fn render_report(label: &str, report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{label} as of {}: {} processed, {} created, {} skipped, {} errors",
        report.as_of, report.processed, report.created, report.skipped, report.errors
    )];
    let created = report.created_expense_ids();
    if !created.is_empty() {
        let ids: Vec<String> = created.iter().map(Uuid::to_string).collect();
        lines.push(format!("  new expenses: {}", ids.join(", ")));
    }
    for item in &report.results {
        if let Some(message) = &item.message {
            lines.push(format!("  {} ({:?}): {message}", item.id, item.status));
        }
    }
    lines
}

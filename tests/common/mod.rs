use std::env;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bizhub::auth::jwt::JwtService;
use bizhub::config::AppConfig;
use bizhub::db::{self, PgPool};
use bizhub::models::{
    NewAppointment, NewCustomer, NewEmployee, NewInvoice, NewRecurringExpense, NewTenant, NewUser,
    NewVacationRequest,
};
use bizhub::routes;
use bizhub::schema;
use bizhub::state::AppState;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const CRON_SECRET: &str = "test-cron-secret";
pub const PASSWORD: &str = "s3cret-pass";

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// `None` when `TEST_DATABASE_URL` is not set; callers skip the test.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping integration test");
            return Ok(None);
        };

        let config = AppConfig {
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            run_migrations: true,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            cron_secret: Some(CRON_SECRET.to_string()),
            default_vacation_days: 25,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt);
        let router = routes::create_router(state.clone());

        Ok(Some(Self { state, router }))
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    pub async fn insert_tenant(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let tenant = NewTenant {
                id: Uuid::new_v4(),
                name,
            };
            diesel::insert_into(schema::tenants::table)
                .values(&tenant)
                .execute(conn)
                .context("failed to insert tenant")?;
            Ok(tenant.id)
        })
        .await
    }

    pub async fn insert_user(&self, tenant_id: Uuid, username: &str, role: &str) -> Result<Uuid> {
        let username = username.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                tenant_id,
                username,
                password_hash: bizhub::auth::password::hash_password(PASSWORD)?,
                role,
            };
            diesel::insert_into(schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn insert_employee(&self, employee: NewEmployee) -> Result<Uuid> {
        self.with_conn(move |conn| {
            diesel::insert_into(schema::employees::table)
                .values(&employee)
                .execute(conn)
                .context("failed to insert employee")?;
            Ok(employee.id)
        })
        .await
    }

    pub async fn insert_customer(&self, tenant_id: Uuid) -> Result<Uuid> {
        self.with_conn(move |conn| {
            let customer = NewCustomer {
                id: Uuid::new_v4(),
                tenant_id,
                name: "Musterkunde".to_string(),
            };
            diesel::insert_into(schema::customers::table)
                .values(&customer)
                .execute(conn)
                .context("failed to insert customer")?;
            Ok(customer.id)
        })
        .await
    }

    pub async fn insert_appointment(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        employee_id: Option<Uuid>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        status: &str,
    ) -> Result<Uuid> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            let appointment = NewAppointment {
                id: Uuid::new_v4(),
                tenant_id,
                employee_id,
                customer_id,
                title: "Service visit".to_string(),
                start_time,
                end_time,
                status,
            };
            diesel::insert_into(schema::appointments::table)
                .values(&appointment)
                .execute(conn)
                .context("failed to insert appointment")?;
            Ok(appointment.id)
        })
        .await
    }

    pub async fn insert_vacation(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        status: &str,
    ) -> Result<Uuid> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            let request = NewVacationRequest {
                id: Uuid::new_v4(),
                tenant_id,
                employee_id,
                start_date,
                end_date,
                days: ((end_date - start_date).num_days() + 1) as i32,
                reason: None,
                status,
            };
            diesel::insert_into(schema::vacation_requests::table)
                .values(&request)
                .execute(conn)
                .context("failed to insert vacation request")?;
            Ok(request.id)
        })
        .await
    }

    pub async fn insert_template(
        &self,
        tenant_id: Uuid,
        run_interval: &str,
        next_run: NaiveDate,
    ) -> Result<Uuid> {
        let run_interval = run_interval.to_string();
        self.with_conn(move |conn| {
            let template = NewRecurringExpense {
                id: Uuid::new_v4(),
                tenant_id,
                name: "Office rent".to_string(),
                amount_cents: 120_000,
                category: "MIETE".to_string(),
                description: None,
                employee_id: None,
                run_interval,
                next_run,
                is_active: true,
            };
            diesel::insert_into(schema::recurring_expenses::table)
                .values(&template)
                .execute(conn)
                .context("failed to insert recurring expense")?;
            Ok(template.id)
        })
        .await
    }

    pub async fn insert_invoice(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        amount_cents: i64,
        due_date: NaiveDate,
        status: &str,
    ) -> Result<Uuid> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            let invoice = NewInvoice {
                id: Uuid::new_v4(),
                tenant_id,
                customer_id,
                invoice_number: format!("RE-{}", &Uuid::new_v4().simple().to_string()[..8]),
                amount_cents,
                due_date,
                status,
            };
            diesel::insert_into(schema::invoices::table)
                .values(&invoice)
                .execute(conn)
                .context("failed to insert invoice")?;
            Ok(invoice.id)
        })
        .await
    }

    pub async fn login_token(&self, username: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload {
                    username,
                    password: PASSWORD,
                },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = read_json(response).await?;
        Ok(parsed.access_token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token, &[]).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token, &[]).await
    }

    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.get_with_headers(path, token, &[]).await
    }

    pub async fn get_with_headers(
        &self,
        path: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

/// Active, healthy employee of `tenant_id` with no linked login.
#[allow(dead_code)]
pub fn employee(tenant_id: Uuid, name: &str) -> NewEmployee {
    NewEmployee {
        id: Uuid::new_v4(),
        tenant_id,
        name: name.to_string(),
        is_active: true,
        ..NewEmployee::default()
    }
}

#[allow(dead_code)]
pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, 0))
        .expect("valid timestamp")
}

#[allow(dead_code)]
pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body)
        .with_context(|| format!("unexpected body: {}", String::from_utf8_lossy(&body)))
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    db::run_migrations(pool)?;
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE invoice_reminders, invoices, expenses, recurring_expenses, \
         vacation_requests, appointments, customers, employees, refresh_tokens, users, tenants \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}

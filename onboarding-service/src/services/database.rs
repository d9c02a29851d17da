//! Application persistence.
//!
//! `ApplicationStore` is the seam the orchestrator talks to; `Database` is the
//! PostgreSQL implementation and `InMemoryApplicationStore` backs tests.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{Application, ApplicationRow, ApplicationStatus};
use crate::services::ServiceError;

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn create(&self, application: &Application) -> Result<(), ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, ServiceError>;

    /// First application whose email or phone number matches.
    async fn find_by_email_or_phone(
        &self,
        email: &str,
        phone_number: &str,
    ) -> Result<Option<Application>, ServiceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Application>, ServiceError>;

    async fn find_many(&self) -> Result<Vec<Application>, ServiceError>;

    /// Moves the application from `from` to `to`. Fails with `InvalidState`
    /// when the stored status is no longer `from`.
    async fn update_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

const APPLICATION_COLUMNS: &str = "application_id, email, phone_number, first_name, last_name, status_code, created_utc, updated_utc";

/// PostgreSQL-backed application store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_application(row: ApplicationRow) -> Result<Application, ServiceError> {
    Application::try_from(row).map_err(|e| ServiceError::storage(anyhow::anyhow!(e)))
}

fn transition_conflict(from: ApplicationStatus, current: Option<Application>) -> ServiceError {
    match current {
        Some(application) => ServiceError::InvalidState {
            expected: from.as_str(),
            actual: application.status.as_str(),
        },
        None => ServiceError::ApplicationNotFound,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl ApplicationStore for Database {
    async fn create(&self, application: &Application) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO applications (application_id, email, phone_number, first_name, last_name, status_code, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(application.id)
        .bind(&application.email)
        .bind(&application.phone_number)
        .bind(&application.first_name)
        .bind(&application.last_name)
        .bind(application.status.as_str())
        .bind(application.created_utc)
        .bind(application.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Lost a race against a concurrent registration.
            if is_unique_violation(&e) {
                ServiceError::DuplicateApplication
            } else {
                ServiceError::storage(e)
            }
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, ServiceError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications WHERE application_id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::storage)?;

        row.map(into_application).transpose()
    }

    async fn find_by_email_or_phone(
        &self,
        email: &str,
        phone_number: &str,
    ) -> Result<Option<Application>, ServiceError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications WHERE email = $1 OR phone_number = $2 LIMIT 1",
            APPLICATION_COLUMNS
        ))
        .bind(email)
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::storage)?;

        row.map(into_application).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Application>, ServiceError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications WHERE email = $1",
            APPLICATION_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::storage)?;

        row.map(into_application).transpose()
    }

    async fn find_many(&self) -> Result<Vec<Application>, ServiceError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications ORDER BY created_utc DESC",
            APPLICATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(ServiceError::storage)?;

        rows.into_iter().map(into_application).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE applications SET status_code = $1, updated_utc = $2 WHERE application_id = $3 AND status_code = $4",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(ServiceError::storage)?;

        if result.rows_affected() == 0 {
            let current = self.find_by_id(id).await?;
            return Err(transition_conflict(from, current));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Database health check failed");
                ServiceError::storage(e)
            })?;
        Ok(())
    }
}

/// In-process store used by tests and local runs without PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryApplicationStore {
    applications: Arc<Mutex<HashMap<Uuid, Application>>>,
    fail_updates: Arc<Mutex<bool>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `update_status` fail with a storage error.
    pub fn fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Application>> {
        self.applications.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn create(&self, application: &Application) -> Result<(), ServiceError> {
        let mut applications = self.lock();
        let clash = applications.values().any(|existing| {
            existing.email == application.email || existing.phone_number == application.phone_number
        });
        if clash {
            return Err(ServiceError::DuplicateApplication);
        }
        applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, ServiceError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn find_by_email_or_phone(
        &self,
        email: &str,
        phone_number: &str,
    ) -> Result<Option<Application>, ServiceError> {
        Ok(self
            .lock()
            .values()
            .find(|a| a.email == email || a.phone_number == phone_number)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Application>, ServiceError> {
        Ok(self.lock().values().find(|a| a.email == email).cloned())
    }

    async fn find_many(&self) -> Result<Vec<Application>, ServiceError> {
        let mut all: Vec<Application> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(all)
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<(), ServiceError> {
        if *self.fail_updates.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(ServiceError::storage(anyhow::anyhow!("store unavailable")));
        }
        let mut applications = self.lock();
        match applications.get_mut(&id) {
            Some(application) if application.status == from => {
                application.status = to;
                application.updated_utc = Utc::now();
                Ok(())
            }
            other => Err(transition_conflict(from, other.cloned())),
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(email: &str, phone: &str) -> Application {
        Application::new(
            email.to_string(),
            phone.to_string(),
            "A".to_string(),
            "B".to_string(),
        )
    }

    #[tokio::test]
    async fn in_memory_store_enforces_unique_email_and_phone() {
        let store = InMemoryApplicationStore::new();
        store.create(&application("a@x.com", "+1")).await.unwrap();

        let same_phone = store.create(&application("b@x.com", "+1")).await;
        assert!(matches!(same_phone, Err(ServiceError::DuplicateApplication)));

        let same_email = store.create(&application("a@x.com", "+2")).await;
        assert!(matches!(same_email, Err(ServiceError::DuplicateApplication)));

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_update_of_unknown_id_is_not_found() {
        let store = InMemoryApplicationStore::new();
        let result = store
            .update_status(
                Uuid::new_v4(),
                ApplicationStatus::Pending,
                ApplicationStatus::Approved,
            )
            .await;
        assert!(matches!(result, Err(ServiceError::ApplicationNotFound)));
    }

    #[tokio::test]
    async fn in_memory_update_from_stale_status_is_refused() {
        let store = InMemoryApplicationStore::new();
        let app = application("a@x.com", "+1");
        store.create(&app).await.unwrap();
        store
            .update_status(app.id, ApplicationStatus::Pending, ApplicationStatus::Rejected)
            .await
            .unwrap();

        let stale = store
            .update_status(app.id, ApplicationStatus::Pending, ApplicationStatus::Approved)
            .await;

        assert!(matches!(
            stale,
            Err(ServiceError::InvalidState {
                expected: "PENDING",
                actual: "REJECTED"
            })
        ));
        let stored = store.find_by_id(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Rejected);
    }

    #[tokio::test]
    async fn in_memory_lookup_by_email_or_phone() {
        let store = InMemoryApplicationStore::new();
        let app = application("a@x.com", "+1");
        store.create(&app).await.unwrap();

        let by_phone = store.find_by_email_or_phone("z@x.com", "+1").await.unwrap();
        assert_eq!(by_phone.map(|a| a.id), Some(app.id));
        assert!(store
            .find_by_email_or_phone("z@x.com", "+9")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL (DATABASE_URL)
    async fn postgres_store_round_trip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
        let db = Database::new(pool);

        let app = application(&format!("{}@x.com", Uuid::new_v4()), &Uuid::new_v4().to_string());
        db.create(&app).await.unwrap();

        let duplicate = db.create(&app).await;
        assert!(matches!(duplicate, Err(ServiceError::DuplicateApplication)));

        db.update_status(app.id, ApplicationStatus::Pending, ApplicationStatus::Approved)
            .await
            .unwrap();
        let stored = db.find_by_email(&app.email).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Approved);

        let stale = db
            .update_status(app.id, ApplicationStatus::Pending, ApplicationStatus::Rejected)
            .await;
        assert!(matches!(stale, Err(ServiceError::InvalidState { .. })));
    }
}

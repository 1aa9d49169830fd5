use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db;
use crate::models::{ImportSummary, Teacher, TeacherInput};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a teacher with faculty number '{0}' already exists")]
    Duplicate(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    fn from_sqlx(err: sqlx::Error, teacher_id: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(teacher_id.to_string())
            }
            _ => StoreError::Other(err.into()),
        }
    }
}

/// Record storage: Postgres in production, a shared vector for demos and tests.
#[derive(Debug, Clone)]
pub enum Store {
    Postgres(PgPool),
    Memory(Arc<RwLock<Vec<Teacher>>>),
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(Arc::new(RwLock::new(Vec::new())))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Postgres(_) => "postgres",
            Store::Memory(_) => "memory",
        }
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Teacher>> {
        match self {
            Store::Postgres(pool) => db::fetch_teachers(pool).await,
            Store::Memory(records) => Ok(records.read().await.clone()),
        }
    }

    pub async fn get(&self, id: Uuid) -> anyhow::Result<Option<Teacher>> {
        match self {
            Store::Postgres(pool) => db::fetch_teacher(pool, id).await,
            Store::Memory(records) => Ok(records.read().await.iter().find(|t| t.id == id).cloned()),
        }
    }

    pub async fn create(&self, input: TeacherInput) -> Result<Teacher, StoreError> {
        let teacher = Teacher::from_input(Uuid::new_v4(), input, Utc::now());
        match self {
            Store::Postgres(pool) => {
                db::insert_teacher(pool, &teacher)
                    .await
                    .map_err(|err| StoreError::from_sqlx(err, &teacher.teacher_id))?;
            }
            Store::Memory(records) => {
                let mut records = records.write().await;
                if records.iter().any(|t| t.teacher_id == teacher.teacher_id) {
                    return Err(StoreError::Duplicate(teacher.teacher_id));
                }
                records.push(teacher.clone());
            }
        }
        tracing::info!(id = %teacher.id, teacher_id = %teacher.teacher_id, "teacher created");
        Ok(teacher)
    }

    /// Replaces the editable fields of `id`. `Ok(None)` when no such record.
    pub async fn update(&self, id: Uuid, input: TeacherInput) -> Result<Option<Teacher>, StoreError> {
        let now = Utc::now();
        let updated = match self {
            Store::Postgres(pool) => {
                let Some(mut teacher) = db::fetch_teacher(pool, id).await? else {
                    return Ok(None);
                };
                teacher.apply(input, now);
                let found = db::update_teacher(pool, &teacher)
                    .await
                    .map_err(|err| StoreError::from_sqlx(err, &teacher.teacher_id))?;
                found.then_some(teacher)
            }
            Store::Memory(records) => {
                let mut records = records.write().await;
                if records
                    .iter()
                    .any(|t| t.id != id && t.teacher_id == input.teacher_id)
                {
                    return Err(StoreError::Duplicate(input.teacher_id));
                }
                match records.iter_mut().find(|t| t.id == id) {
                    Some(teacher) => {
                        teacher.apply(input, now);
                        Some(teacher.clone())
                    }
                    None => None,
                }
            }
        };

        if let Some(teacher) = &updated {
            tracing::info!(id = %teacher.id, teacher_id = %teacher.teacher_id, "teacher updated");
        }
        Ok(updated)
    }

    pub async fn import(&self, inputs: Vec<TeacherInput>) -> anyhow::Result<ImportSummary> {
        let summary = match self {
            Store::Postgres(pool) => db::import_teachers(pool, inputs).await?,
            Store::Memory(records) => {
                let mut records = records.write().await;
                merge_import(&mut records, inputs, Utc::now())
            }
        };
        tracing::info!(
            inserted = summary.inserted,
            updated = summary.updated,
            "import finished"
        );
        Ok(summary)
    }
}

/// In-memory equivalent of the Postgres upsert: matched by faculty number,
/// blank descriptive fields keep their previous values.
fn merge_import(
    records: &mut Vec<Teacher>,
    inputs: Vec<TeacherInput>,
    now: DateTime<Utc>,
) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for mut input in inputs {
        match records.iter_mut().find(|t| t.teacher_id == input.teacher_id) {
            Some(existing) => {
                for (incoming, previous) in [
                    (&mut input.department, &existing.department),
                    (&mut input.position, &existing.position),
                    (&mut input.status, &existing.status),
                    (&mut input.notes, &existing.notes),
                ] {
                    if incoming.trim().is_empty() {
                        incoming.clone_from(previous);
                    }
                }
                existing.apply(input, now);
                summary.updated += 1;
            }
            None => {
                records.push(Teacher::from_input(Uuid::new_v4(), input, now));
                summary.inserted += 1;
            }
        }
    }
    summary
}

use chrono::Utc;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::models::{ImportSummary, Teacher, TeacherInput, Zone};
use crate::zone;

const COLUMNS: &str = "id, teacher_id, first_name, middle_name, last_name, department, \
     position, status, notes, enrolled_students, \
     p1_failed, p1_percent, p1_category, \
     p2_failed, p2_percent, p2_category, \
     p3_failed, p3_percent, p3_category, \
     zone, created_at, updated_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Sample roster used by `seed` and by the in-memory demo server.
pub fn seed_records() -> Vec<TeacherInput> {
    let rows = [
        ("2019-0142", "Maria", Some("Santos"), "Reyes", "Mathematics", "Associate Professor", 184, Some(18), Some(25), None),
        ("2017-0088", "Jose", None, "Dela Cruz", "Physics", "Instructor", 307, Some(9), Some(4), None),
        ("2021-0311", "Angela", None, "Bautista", "English", "Assistant Professor", 120, Some(31), Some(55), None),
        ("2015-0020", "Ramon", Some("Lim"), "Garcia", "Mathematics", "Professor", 0, Some(5), None, Some(50.0)),
    ];

    rows.into_iter()
        .map(
            |(teacher_id, first, middle, last, department, position, enrolled, p1, p2, p1_percent)| {
                let mut input = TeacherInput {
                    teacher_id: teacher_id.to_string(),
                    first_name: first.to_string(),
                    middle_name: middle.map(str::to_string),
                    last_name: last.to_string(),
                    department: department.to_string(),
                    position: position.to_string(),
                    status: "Active".to_string(),
                    enrolled_students: enrolled,
                    p1_failed: p1,
                    p1_percent,
                    p2_failed: p2,
                    ..TeacherInput::default()
                };
                zone::precompute(&mut input);
                input.zone = zone::latest_zone(&input);
                input
            },
        )
        .collect()
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<ImportSummary> {
    import_teachers(pool, seed_records()).await
}

fn teacher_from_row(row: &PgRow) -> Result<Teacher, sqlx::Error> {
    let zone: Option<String> = row.try_get("zone")?;
    Ok(Teacher {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        first_name: row.try_get("first_name")?,
        middle_name: row.try_get("middle_name")?,
        last_name: row.try_get("last_name")?,
        department: row.try_get("department")?,
        position: row.try_get("position")?,
        status: row.try_get("status")?,
        notes: row.try_get("notes")?,
        enrolled_students: row.try_get("enrolled_students")?,
        p1_failed: row.try_get("p1_failed")?,
        p1_percent: row.try_get("p1_percent")?,
        p1_category: row.try_get("p1_category")?,
        p2_failed: row.try_get("p2_failed")?,
        p2_percent: row.try_get("p2_percent")?,
        p2_category: row.try_get("p2_category")?,
        p3_failed: row.try_get("p3_failed")?,
        p3_percent: row.try_get("p3_percent")?,
        p3_category: row.try_get("p3_category")?,
        zone: zone.and_then(|value| value.parse::<Zone>().ok()),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Binds every column in `COLUMNS` order as `$1..$22`.
fn bind_teacher<'q>(
    query: Query<'q, Postgres, PgArguments>,
    teacher: &'q Teacher,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(teacher.id)
        .bind(teacher.teacher_id.as_str())
        .bind(teacher.first_name.as_str())
        .bind(teacher.middle_name.as_deref())
        .bind(teacher.last_name.as_str())
        .bind(teacher.department.as_str())
        .bind(teacher.position.as_str())
        .bind(teacher.status.as_str())
        .bind(teacher.notes.as_str())
        .bind(teacher.enrolled_students)
        .bind(teacher.p1_failed)
        .bind(teacher.p1_percent)
        .bind(teacher.p1_category.as_deref())
        .bind(teacher.p2_failed)
        .bind(teacher.p2_percent)
        .bind(teacher.p2_category.as_deref())
        .bind(teacher.p3_failed)
        .bind(teacher.p3_percent)
        .bind(teacher.p3_category.as_deref())
        .bind(teacher.zone.map(Zone::as_str))
        .bind(teacher.created_at)
        .bind(teacher.updated_at)
}

pub async fn fetch_teachers(pool: &PgPool) -> anyhow::Result<Vec<Teacher>> {
    let query = format!(
        "SELECT {COLUMNS} FROM faculty_performance.teachers ORDER BY created_at, teacher_id"
    );
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    let mut teachers = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        teachers.push(teacher_from_row(row)?);
    }
    Ok(teachers)
}

pub async fn fetch_teacher(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Teacher>> {
    let query = format!("SELECT {COLUMNS} FROM faculty_performance.teachers WHERE id = $1");
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(teacher_from_row).transpose()?)
}

pub async fn insert_teacher(pool: &PgPool, teacher: &Teacher) -> Result<(), sqlx::Error> {
    let query = format!(
        "INSERT INTO faculty_performance.teachers ({COLUMNS}) VALUES \
         ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
          $19, $20, $21, $22)"
    );
    bind_teacher(sqlx::query(&query), teacher)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_teacher(pool: &PgPool, teacher: &Teacher) -> Result<bool, sqlx::Error> {
    let query = "UPDATE faculty_performance.teachers SET \
         teacher_id = $2, first_name = $3, middle_name = $4, last_name = $5, \
         department = $6, position = $7, status = $8, notes = $9, enrolled_students = $10, \
         p1_failed = $11, p1_percent = $12, p1_category = $13, \
         p2_failed = $14, p2_percent = $15, p2_category = $16, \
         p3_failed = $17, p3_percent = $18, p3_category = $19, \
         zone = $20, created_at = $21, updated_at = $22 \
         WHERE id = $1";
    let result = bind_teacher(sqlx::query(query), teacher)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Upserts by faculty number. Blank department/position/status/notes in an
/// import keep whatever the existing record has.
pub async fn import_teachers(
    pool: &PgPool,
    inputs: Vec<TeacherInput>,
) -> anyhow::Result<ImportSummary> {
    let query = format!(
        r#"
        INSERT INTO faculty_performance.teachers ({COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22)
        ON CONFLICT (teacher_id) DO UPDATE SET
            first_name = EXCLUDED.first_name,
            middle_name = EXCLUDED.middle_name,
            last_name = EXCLUDED.last_name,
            department = COALESCE(NULLIF(EXCLUDED.department, ''), teachers.department),
            position = COALESCE(NULLIF(EXCLUDED.position, ''), teachers.position),
            status = COALESCE(NULLIF(EXCLUDED.status, ''), teachers.status),
            notes = COALESCE(NULLIF(EXCLUDED.notes, ''), teachers.notes),
            enrolled_students = EXCLUDED.enrolled_students,
            p1_failed = EXCLUDED.p1_failed,
            p1_percent = EXCLUDED.p1_percent,
            p1_category = EXCLUDED.p1_category,
            p2_failed = EXCLUDED.p2_failed,
            p2_percent = EXCLUDED.p2_percent,
            p2_category = EXCLUDED.p2_category,
            p3_failed = EXCLUDED.p3_failed,
            p3_percent = EXCLUDED.p3_percent,
            p3_category = EXCLUDED.p3_category,
            zone = EXCLUDED.zone,
            updated_at = EXCLUDED.updated_at
        RETURNING (xmax = 0) AS inserted
        "#
    );

    let now = Utc::now();
    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;

    for input in inputs {
        let teacher = Teacher::from_input(Uuid::new_v4(), input, now);
        let inserted: bool = bind_teacher(sqlx::query(&query), &teacher)
            .fetch_one(&mut *tx)
            .await?
            .try_get("inserted")?;

        if inserted {
            summary.inserted += 1;
        } else {
            summary.updated += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}

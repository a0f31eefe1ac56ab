use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::models::{CohortMember, CourseWeight, EnrollmentRecord, ScoreRecord};
use crate::store::{CohortScope, ScoringStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    full_name: &str,
    matricule: &str,
    department_id: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO school_scoring.students (id, full_name, matricule, department_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (matricule) DO UPDATE
        SET full_name = EXCLUDED.full_name, department_id = EXCLUDED.department_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(matricule)
    .bind(department_id)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

async fn insert_score(
    pool: &PgPool,
    student_id: Uuid,
    record: &ScoreRecord,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_scoring.scores
        (id, student_id, course_id, term_id, academic_year_id, ca_score, exam_score, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(&record.course_id)
    .bind(&record.term_id)
    .bind(&record.academic_year_id)
    .bind(&record.ca_score)
    .bind(&record.exam_score)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let courses = vec![
        ("MATH", "Mathematics", "4"),
        ("ENG", "English", "3"),
        ("PHY", "Physics", "2"),
        ("PE", "Physical Education", "1"),
    ];

    for (id, name, coefficient) in courses {
        sqlx::query(
            r#"
            INSERT INTO school_scoring.courses (id, name, coefficient)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, coefficient = EXCLUDED.coefficient
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(coefficient)
        .execute(pool)
        .await?;
    }

    let students = vec![
        ("Amina Njoya", "MAT-2025-001", "SCI", 1, "2024-2025", None),
        ("Bruno Etoa", "MAT-2025-002", "SCI", 2, "2024-2025", Some(2)),
        ("Chloe Mbarga", "MAT-2025-003", "ART", 3, "2024-2025", Some(2)),
    ];

    let mut ids = Vec::new();
    for (name, matricule, department, level, previous_year, previous_level) in students {
        let student_id = upsert_student(pool, name, matricule, department).await?;
        ids.push((student_id, matricule));

        sqlx::query(
            r#"
            INSERT INTO school_scoring.enrollments
            (id, student_id, academic_year_id, level, promoted, promotion_status, is_repeater, previous_level)
            VALUES ($1, $2, '2025-2026', $3, FALSE, 'pending', FALSE, $4)
            ON CONFLICT (student_id, academic_year_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(level)
        .bind(previous_level)
        .execute(pool)
        .await?;

        if let Some(previous_level) = previous_level {
            sqlx::query(
                r#"
                INSERT INTO school_scoring.enrollments
                (id, student_id, academic_year_id, level, promoted, promotion_status, is_repeater, previous_level)
                VALUES ($1, $2, $3, $4, $5, $6, FALSE, NULL)
                ON CONFLICT (student_id, academic_year_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(previous_year)
            .bind(previous_level)
            .bind(previous_level < level)
            .bind(if previous_level < level { "promoted" } else { "repeated" })
            .execute(pool)
            .await?;
        }
    }

    let scores = vec![
        (0, "MATH", "T1", Some("14"), Some("15.5")),
        (0, "MATH", "T2", Some("13"), Some("12")),
        (0, "ENG", "T1", Some("11"), None),
        (0, "PHY", "T2", Some("16"), Some("17")),
        (1, "MATH", "T1", Some("9"), Some("10.5")),
        (1, "ENG", "T1", Some("12"), Some("11")),
        (1, "PHY", "T2", None, None),
        (2, "MATH", "T1", Some("18"), Some("19")),
        (2, "ENG", "T2", Some("17"), Some("16")),
        (2, "PE", "T1", Some("abs"), Some("15")),
    ];

    for (student, course_id, term_id, ca, exam) in scores {
        let (student_id, matricule) = ids[student];
        let record = ScoreRecord {
            student_id,
            course_id: course_id.to_string(),
            term_id: term_id.to_string(),
            academic_year_id: "2025-2026".to_string(),
            ca_score: ca.map(str::to_string),
            exam_score: exam.map(str::to_string),
        };
        let source_key = format!("seed-{matricule}-{course_id}-{term_id}");
        insert_score(pool, student_id, &record, &source_key).await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        matricule: String,
        department_id: String,
        course_id: String,
        term_id: String,
        academic_year_id: String,
        ca_score: Option<String>,
        exam_score: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let student_id =
            upsert_student(pool, &row.full_name, &row.matricule, &row.department_id).await?;

        let source_key = row.source_key.clone().unwrap_or_else(|| {
            format!(
                "import-{}-{}-{}-{}",
                row.matricule, row.course_id, row.academic_year_id, row.term_id
            )
        });
        let record = ScoreRecord {
            student_id,
            course_id: row.course_id,
            term_id: row.term_id,
            academic_year_id: row.academic_year_id,
            ca_score: row.ca_score,
            exam_score: row.exam_score,
        };

        if insert_score(pool, student_id, &record, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn enrollment_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<EnrollmentRecord> {
    let status: String = row.get("promotion_status");
    Ok(EnrollmentRecord {
        student_id: row.get("student_id"),
        academic_year_id: row.get("academic_year_id"),
        level: row.get("level"),
        promoted: row.get("promoted"),
        promotion_status: status.parse()?,
        is_repeater: row.get("is_repeater"),
        previous_level: row.get("previous_level"),
    })
}

#[async_trait]
impl ScoringStore for PgStore {
    async fn fetch_cohort(&self, scope: &CohortScope) -> anyhow::Result<Vec<CohortMember>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT st.id AS student_id, st.full_name, st.matricule, st.department_id, e.level \
             FROM school_scoring.enrollments e \
             JOIN school_scoring.students st ON st.id = e.student_id \
             WHERE e.academic_year_id = ",
        );
        query.push_bind(&scope.academic_year_id);

        if let Some(student_id) = scope.student_id {
            query.push(" AND st.id = ").push_bind(student_id);
        }
        if let Some(level) = scope.level {
            query.push(" AND e.level = ").push_bind(level);
        }
        if let Some(department_id) = &scope.department_id {
            query.push(" AND st.department_id = ").push_bind(department_id);
        }
        query.push(" ORDER BY st.full_name, st.matricule");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut members = Vec::new();

        for row in rows {
            members.push(CohortMember {
                student_id: row.get("student_id"),
                student_name: row.get("full_name"),
                matricule: row.get("matricule"),
                department_id: row.get("department_id"),
                level: row.get("level"),
            });
        }

        Ok(members)
    }

    async fn fetch_course_weights(&self) -> anyhow::Result<Vec<CourseWeight>> {
        let rows = sqlx::query("SELECT id, name, coefficient FROM school_scoring.courses ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CourseWeight {
                course_id: row.get("id"),
                course_name: row.get("name"),
                coefficient: row.get("coefficient"),
            })
            .collect())
    }

    async fn fetch_scores(
        &self,
        student_id: Uuid,
        academic_year_id: &str,
    ) -> anyhow::Result<Vec<ScoreRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, course_id, term_id, academic_year_id, ca_score, exam_score
            FROM school_scoring.scores
            WHERE student_id = $1 AND academic_year_id = $2
            ORDER BY course_id, term_id
            "#,
        )
        .bind(student_id)
        .bind(academic_year_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ScoreRecord {
                student_id: row.get("student_id"),
                course_id: row.get("course_id"),
                term_id: row.get("term_id"),
                academic_year_id: row.get("academic_year_id"),
                ca_score: row.get("ca_score"),
                exam_score: row.get("exam_score"),
            })
            .collect())
    }

    async fn fetch_enrollments(&self, student_id: Uuid) -> anyhow::Result<Vec<EnrollmentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, academic_year_id, level, promoted, promotion_status,
                   is_repeater, previous_level
            FROM school_scoring.enrollments
            WHERE student_id = $1
            ORDER BY academic_year_id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(enrollment_from_row).collect()
    }

    async fn save_promotion(
        &self,
        current: &EnrollmentRecord,
        next: Option<&EnrollmentRecord>,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE school_scoring.enrollments
            SET promoted = $3, promotion_status = $4, is_repeater = $5, finalized_at = $6
            WHERE student_id = $1 AND academic_year_id = $2
            "#,
        )
        .bind(current.student_id)
        .bind(&current.academic_year_id)
        .bind(current.promoted)
        .bind(current.promotion_status.as_str())
        .bind(current.is_repeater)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let mut inserted = false;
        if let Some(next) = next {
            let row = sqlx::query(
                r#"
                INSERT INTO school_scoring.enrollments
                (id, student_id, academic_year_id, level, promoted, promotion_status, is_repeater, previous_level)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (student_id, academic_year_id) DO UPDATE
                SET level = EXCLUDED.level,
                    is_repeater = EXCLUDED.is_repeater,
                    previous_level = EXCLUDED.previous_level
                WHERE school_scoring.enrollments.promotion_status = 'pending'
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(next.student_id)
            .bind(&next.academic_year_id)
            .bind(next.level)
            .bind(next.promoted)
            .bind(next.promotion_status.as_str())
            .bind(next.is_repeater)
            .bind(next.previous_level)
            .fetch_optional(&mut *tx)
            .await?;
            inserted = match row {
                Some(row) => row.try_get::<bool, _>("inserted")?,
                None => false,
            };
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

//! services/feedback_repository.rs
//! Acceso de solo lectura a formularios, inscripciones y respuestas.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Column, Connection, Executor, Row};

use crate::models::feedback_model::{FeedbackForm, PendingStudent, ResponseTable};

/// Fuente de datos del reporte. Una instancia vive lo que dura una ejecución.
#[async_trait]
pub trait FeedbackSource: Send {
    async fn feedback_forms(&mut self) -> Result<Vec<FeedbackForm>>;

    async fn count_participants(&mut self, course_id: i64) -> Result<i64>;

    async fn count_responses(&mut self, feedback_id: i64) -> Result<i64>;

    async fn responses(&mut self, feedback_id: i64) -> Result<ResponseTable>;

    async fn pending_students(
        &mut self,
        course_id: i64,
        feedback_id: i64,
    ) -> Result<Vec<PendingStudent>>;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Abre una `FeedbackSource` nueva por ejecución.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    type Source: FeedbackSource;

    async fn connect(&self) -> Result<Self::Source>;
}

// Los parámetros se fijan como BIGINT: así el tipo no depende de si las claves
// son INTEGER o BIGINT, ni del statement que `describe` deja en caché.
// Los textos nulos salen como cadena vacía.
const FEEDBACK_FORMS_SQL: &str = r#"
    SELECT CAST(f.feedback_id AS BIGINT) AS feedback_id,
           COALESCE(f.title, '') AS title,
           COALESCE(c.course_name, '') AS course_name,
           COALESCE(m.first_name, '') || ' ' || COALESCE(m.last_name, '') AS mentor_name,
           CAST(f.course_id AS BIGINT) AS course_id
    FROM feedback_forms f
    JOIN courses c ON f.course_id = c.course_id
    JOIN mentors m ON f.mentor_id = m.mentor_id
"#;

const COUNT_PARTICIPANTS_SQL: &str =
    "SELECT COUNT(*) FROM enrollments WHERE course_id = CAST($1 AS BIGINT)";

const COUNT_RESPONSES_SQL: &str =
    "SELECT COUNT(*) FROM feedback_responses WHERE feedback_id = CAST($1 AS BIGINT)";

// Todas las columnas salen como texto para exportarlas sin conversiones por tipo.
const RESPONSES_SQL: &str = r#"
    SELECT u.first_name,
           u.last_name,
           u.email,
           r.response_text,
           CAST(r.rating AS TEXT) AS rating,
           CAST(r.submitted_at AS TEXT) AS submitted_at
    FROM feedback_responses r
    JOIN users u ON r.user_id = u.user_id
    WHERE r.feedback_id = CAST($1 AS BIGINT)
"#;

const PENDING_STUDENTS_SQL: &str = r#"
    SELECT COALESCE(u.first_name, '') AS first_name,
           COALESCE(u.last_name, '') AS last_name
    FROM enrollments e
    JOIN users u ON e.user_id = u.user_id
    WHERE e.course_id = CAST($1 AS BIGINT)
      AND NOT EXISTS (
          SELECT 1 FROM feedback_responses r
          WHERE r.feedback_id = CAST($2 AS BIGINT) AND r.user_id = u.user_id
      )
"#;

#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SourceConnector for PgConnector {
    type Source = PgFeedbackSource;

    async fn connect(&self) -> Result<PgFeedbackSource> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .context("Failed to connect to PostgreSQL")?;
        log::info!("(connect) Conectado a la base de datos.");
        Ok(PgFeedbackSource::new(conn))
    }
}

pub struct PgFeedbackSource {
    conn: PgConnection,
}

impl PgFeedbackSource {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FeedbackSource for PgFeedbackSource {
    async fn feedback_forms(&mut self) -> Result<Vec<FeedbackForm>> {
        sqlx::query_as::<_, FeedbackForm>(FEEDBACK_FORMS_SQL)
            .fetch_all(&mut self.conn)
            .await
            .context("Failed to fetch feedback forms")
    }

    async fn count_participants(&mut self, course_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(COUNT_PARTICIPANTS_SQL)
            .bind(course_id)
            .fetch_one(&mut self.conn)
            .await
            .with_context(|| format!("Failed to count enrollments for course {course_id}"))
    }

    async fn count_responses(&mut self, feedback_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(COUNT_RESPONSES_SQL)
            .bind(feedback_id)
            .fetch_one(&mut self.conn)
            .await
            .with_context(|| format!("Failed to count responses for feedback {feedback_id}"))
    }

    async fn responses(&mut self, feedback_id: i64) -> Result<ResponseTable> {
        // Los encabezados salen de la descripción del statement, así existen
        // aunque no haya filas.
        let describe = (&mut self.conn)
            .describe(RESPONSES_SQL)
            .await
            .context("Failed to describe responses query")?;
        let columns: Vec<String> = describe
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let pg_rows = sqlx::query(RESPONSES_SQL)
            .bind(feedback_id)
            .fetch_all(&mut self.conn)
            .await
            .with_context(|| format!("Failed to fetch responses for feedback {feedback_id}"))?;

        let mut rows = Vec::with_capacity(pg_rows.len());
        for row in &pg_rows {
            let cells = (0..row.len())
                .map(|i| row.try_get::<Option<String>, _>(i))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to decode response row")?;
            rows.push(cells);
        }

        Ok(ResponseTable { columns, rows })
    }

    async fn pending_students(
        &mut self,
        course_id: i64,
        feedback_id: i64,
    ) -> Result<Vec<PendingStudent>> {
        sqlx::query_as::<_, PendingStudent>(PENDING_STUDENTS_SQL)
            .bind(course_id)
            .bind(feedback_id)
            .fetch_all(&mut self.conn)
            .await
            .with_context(|| format!("Failed to fetch pending students for feedback {feedback_id}"))
    }

    async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .context("Failed to close database connection")
    }
}

//! models/feedback_model.rs
//! Filas leídas de la base de datos para el reporte de feedback.

use serde::Serialize;

/// Un formulario de feedback, tal como lo devuelve el join forms/courses/mentors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeedbackForm {
    pub feedback_id: i64,
    pub title: String,
    pub course_name: String,
    pub mentor_name: String,
    pub course_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParticipationCount {
    pub total_participants: i64,
    pub responses_received: i64,
}

impl ParticipationCount {
    /// "recibidas/total", sin porcentaje (un curso sin inscritos da "0/0").
    pub fn ratio(&self) -> String {
        format!("{}/{}", self.responses_received, self.total_participants)
    }
}

/// Respuestas de un formulario para exportar a CSV.
///
/// `columns` son los nombres declarados por la consulta, en su orden; cada
/// celda es texto o NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PendingStudent {
    pub first_name: String,
    pub last_name: String,
}

impl PendingStudent {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Todo lo consultado para un formulario, listo para renderizar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormReport {
    pub form: FeedbackForm,
    pub participation: ParticipationCount,
    pub responses: ResponseTable,
    pub pending: Vec<PendingStudent>,
}

//! tests/support.rs
//! Dobles en memoria de la base de datos y del transporte de correo.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::email_model::{DeliveryReceipt, EmailMessage};
use crate::models::feedback_model::{FeedbackForm, PendingStudent, ResponseTable};
use crate::services::email_service::Mailer;
use crate::services::feedback_repository::{FeedbackSource, SourceConnector};

pub const RESPONSE_COLUMNS: [&str; 6] = [
    "first_name",
    "last_name",
    "email",
    "response_text",
    "rating",
    "submitted_at",
];

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub feedback_id: i64,
    pub user_id: i64,
    pub response_text: Option<String>,
    pub rating: Option<i64>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackDb {
    pub forms: Vec<FeedbackForm>,
    pub users: Vec<User>,
    /// (course_id, user_id)
    pub enrollments: Vec<(i64, i64)>,
    pub responses: Vec<Response>,
}

impl FeedbackDb {
    pub fn form(mut self, feedback_id: i64, title: &str, course_id: i64, course: &str, mentor: &str) -> Self {
        self.forms.push(FeedbackForm {
            feedback_id,
            title: title.to_string(),
            course_name: course.to_string(),
            mentor_name: mentor.to_string(),
            course_id,
        });
        self
    }

    pub fn user(mut self, user_id: i64, first: &str, last: &str) -> Self {
        self.users.push(User {
            user_id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        });
        self
    }

    pub fn enroll(mut self, course_id: i64, user_id: i64) -> Self {
        self.enrollments.push((course_id, user_id));
        self
    }

    pub fn respond(
        mut self,
        feedback_id: i64,
        user_id: i64,
        text: Option<&str>,
        rating: Option<i64>,
    ) -> Self {
        self.responses.push(Response {
            feedback_id,
            user_id,
            response_text: text.map(str::to_string),
            rating,
            submitted_at: "2025-03-01 10:00:00+00".to_string(),
        });
        self
    }

    fn user_by_id(&self, user_id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == user_id)
    }
}

/// Registro compartido de lo que hizo la fuente durante una ejecución.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    pub queries: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl SourceProbe {
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct InMemorySource {
    pub db: FeedbackDb,
    pub probe: SourceProbe,
    /// Si es `Some(n)`, la consulta número `n` (desde 1) falla.
    pub fail_at_query: Option<usize>,
}

impl InMemorySource {
    pub fn new(db: FeedbackDb) -> Self {
        Self {
            db,
            probe: SourceProbe::default(),
            fail_at_query: None,
        }
    }

    fn tick(&self) -> Result<()> {
        let n = self.probe.queries.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at_query == Some(n) {
            return Err(anyhow!("relation \"feedback_forms\" does not exist"));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedbackSource for InMemorySource {
    async fn feedback_forms(&mut self) -> Result<Vec<FeedbackForm>> {
        self.tick()?;
        Ok(self.db.forms.clone())
    }

    async fn count_participants(&mut self, course_id: i64) -> Result<i64> {
        self.tick()?;
        Ok(self
            .db
            .enrollments
            .iter()
            .filter(|(c, _)| *c == course_id)
            .count() as i64)
    }

    async fn count_responses(&mut self, feedback_id: i64) -> Result<i64> {
        self.tick()?;
        Ok(self
            .db
            .responses
            .iter()
            .filter(|r| r.feedback_id == feedback_id)
            .count() as i64)
    }

    async fn responses(&mut self, feedback_id: i64) -> Result<ResponseTable> {
        self.tick()?;
        let rows = self
            .db
            .responses
            .iter()
            .filter(|r| r.feedback_id == feedback_id)
            .filter_map(|r| {
                let u = self.db.user_by_id(r.user_id)?;
                Some(vec![
                    Some(u.first_name.clone()),
                    Some(u.last_name.clone()),
                    Some(u.email.clone()),
                    r.response_text.clone(),
                    r.rating.map(|v| v.to_string()),
                    Some(r.submitted_at.clone()),
                ])
            })
            .collect();

        Ok(ResponseTable {
            columns: RESPONSE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    async fn pending_students(
        &mut self,
        course_id: i64,
        feedback_id: i64,
    ) -> Result<Vec<PendingStudent>> {
        self.tick()?;
        Ok(self
            .db
            .enrollments
            .iter()
            .filter(|(c, _)| *c == course_id)
            .filter(|(_, user_id)| {
                !self
                    .db
                    .responses
                    .iter()
                    .any(|r| r.feedback_id == feedback_id && r.user_id == *user_id)
            })
            .filter_map(|(_, user_id)| self.db.user_by_id(*user_id))
            .map(|u| PendingStudent {
                first_name: u.first_name.clone(),
                last_name: u.last_name.clone(),
            })
            .collect())
    }

    async fn close(self) -> Result<()> {
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct InMemoryConnector {
    pub db: FeedbackDb,
    pub probe: SourceProbe,
    pub fail_connect: bool,
    pub fail_at_query: Option<usize>,
}

impl InMemoryConnector {
    pub fn new(db: FeedbackDb) -> Self {
        Self {
            db,
            probe: SourceProbe::default(),
            fail_connect: false,
            fail_at_query: None,
        }
    }
}

#[async_trait]
impl SourceConnector for InMemoryConnector {
    type Source = InMemorySource;

    async fn connect(&self) -> Result<InMemorySource> {
        if self.fail_connect {
            return Err(anyhow!("connection refused (os error 111)"));
        }
        Ok(InMemorySource {
            db: self.db.clone(),
            probe: self.probe.clone(),
            fail_at_query: self.fail_at_query,
        })
    }
}

/// Falla las primeras `failures` entregas y luego acepta.
#[derive(Clone)]
pub struct FakeMailer {
    failures: usize,
    pub attempts: Arc<AtomicUsize>,
    pub delivered: Arc<Mutex<Vec<EmailMessage>>>,
}

impl FakeMailer {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            attempts: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn ok() -> Self {
        Self::failing(0)
    }

    pub fn always_failing() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<EmailMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryReceipt> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(anyhow!("HTTP 503 Service Unavailable"));
        }
        self.delivered.lock().unwrap().push(message.clone());
        Ok(DeliveryReceipt {
            status: "202".to_string(),
        })
    }
}

/// Un formulario, 3 inscritos, 2 respuestas.
pub fn single_form_db() -> FeedbackDb {
    FeedbackDb::default()
        .form(10, "Week 1 Feedback", 1, "Intro to Rust", "Grace Hopper")
        .user(100, "Ada", "Lovelace")
        .user(101, "Alan", "Turing")
        .user(102, "Linus", "Torvalds")
        .enroll(1, 100)
        .enroll(1, 101)
        .enroll(1, 102)
        .respond(10, 100, Some("Great course"), Some(5))
        .respond(10, 101, Some("Too fast, but \"useful\""), Some(4))
}

//! services/job_service.rs
//! Orquestador del job: conectar, consultar, armar el correo y enviarlo.

use std::fmt;

use anyhow::Result;
use uuid::Uuid;

use crate::config::app_config::ReportBranding;
use crate::models::email_model::EmailMessage;
use crate::services::dispatch_service::EmailDispatcher;
use crate::services::feedback_repository::{FeedbackSource, SourceConnector};
use crate::services::report_service::{collect_form_reports, render_report, FeedbackReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Connecting,
    Querying,
    Building,
    Sending,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStage::Connecting => "connecting",
            JobStage::Querying => "querying",
            JobStage::Building => "building",
            JobStage::Sending => "sending",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    NoForms { delivered: bool },
    Summary { forms: usize, delivered: bool },
    /// `stage` es la etapa en la que ocurrió el error.
    Failed { stage: JobStage, error: String },
}

impl JobOutcome {
    /// Solo los errores de conexión/consulta/armado cuentan como fallo del
    /// proceso; un envío agotado termina "normal".
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    pub fn final_stage(&self) -> JobStage {
        if self.is_failure() {
            JobStage::Failed
        } else {
            JobStage::Done
        }
    }
}

/// Remitente, destinatarios y marca del reporte.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub from: String,
    pub recipients: Vec<String>,
    pub branding: ReportBranding,
}

pub struct FeedbackJob<C: SourceConnector> {
    connector: C,
    dispatcher: EmailDispatcher,
    settings: ReportSettings,
}

impl<C: SourceConnector> FeedbackJob<C> {
    pub fn new(connector: C, dispatcher: EmailDispatcher, settings: ReportSettings) -> Self {
        Self {
            connector,
            dispatcher,
            settings,
        }
    }

    pub async fn run(&self) -> JobOutcome {
        let run_id = Uuid::new_v4();
        log::info!("(run) [{}] Iniciando job de reportes de feedback.", run_id);

        log::info!("(run) [{}] Etapa: {}", run_id, JobStage::Connecting);
        let mut source = match self.connector.connect().await {
            Ok(source) => source,
            Err(e) => {
                log::error!("(run) [{}] Error de conexión: {:#}", run_id, e);
                return JobOutcome::Failed {
                    stage: JobStage::Connecting,
                    error: format!("{e:#}"),
                };
            }
        };

        let mut stage = JobStage::Querying;
        let result = self.execute(run_id, &mut source, &mut stage).await;

        // La conexión se cierra en ambos caminos.
        if let Err(e) = source.close().await {
            log::warn!("(run) [{}] No se pudo cerrar la conexión: {:#}", run_id, e);
        }

        match result {
            Ok(outcome) => {
                log::info!("(run) [{}] Etapa: {} ({:?})", run_id, outcome.final_stage(), outcome);
                outcome
            }
            Err(e) => {
                log::error!(
                    "(run) [{}] Error en etapa '{}': {:#}. No se envió ningún correo.",
                    run_id,
                    stage,
                    e
                );
                JobOutcome::Failed {
                    stage,
                    error: format!("{e:#}"),
                }
            }
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        source: &mut C::Source,
        stage: &mut JobStage,
    ) -> Result<JobOutcome> {
        *stage = JobStage::Querying;
        log::info!("(run) [{}] Etapa: {}", run_id, stage);
        let reports = collect_form_reports(source).await?;

        *stage = JobStage::Building;
        log::info!("(run) [{}] Etapa: {}", run_id, stage);
        let report = render_report(&reports, &self.settings.branding)?;
        let message = self.build_message(report);

        *stage = JobStage::Sending;
        log::info!(
            "(run) [{}] Etapa: {} ('{}', {} adjuntos)",
            run_id,
            stage,
            message.subject,
            message.attachments.len()
        );
        let delivered = self.dispatcher.send(message).await;

        if reports.is_empty() {
            log::warn!("(run) [{}] No hay formularios de feedback en la base de datos.", run_id);
            Ok(JobOutcome::NoForms { delivered })
        } else {
            Ok(JobOutcome::Summary {
                forms: reports.len(),
                delivered,
            })
        }
    }

    fn build_message(&self, report: FeedbackReport) -> EmailMessage {
        report.into_message(&self.settings.from, &self.settings.recipients)
    }
}

use std::process::ExitCode;

use dotenv::dotenv;

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::dispatch_service::EmailDispatcher;
use crate::services::email_service::build_mailer;
use crate::services::feedback_repository::PgConnector;
use crate::services::job_service::{FeedbackJob, ReportSettings};

mod config;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuración inválida: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Base de datos {:?}, correo {:?}, {} destinatarios",
        config.database,
        config.mail.transport,
        config.mail.recipients.len()
    );

    let mailer = match build_mailer(&config.mail) {
        Ok(mailer) => mailer,
        Err(e) => {
            log::error!("No se pudo inicializar el cliente de correo: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = EmailDispatcher::new(mailer, config.mail.retry_policy());
    let connector = PgConnector::new(config.database.connect_options());
    let settings = ReportSettings {
        from: config.mail.from.clone(),
        recipients: config.mail.recipients.clone(),
        branding: config.report.clone(),
    };

    let outcome = FeedbackJob::new(connector, dispatcher, settings).run().await;
    if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

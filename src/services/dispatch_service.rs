//! services/dispatch_service.rs
//! Envío con reintentos acotados y espera fija entre intentos.

use std::time::Duration;

use crate::models::email_model::EmailMessage;
use crate::services::email_service::Mailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` se ajusta a 1 como mínimo.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(5))
    }
}

pub struct EmailDispatcher {
    mailer: Box<dyn Mailer>,
    policy: RetryPolicy,
}

impl EmailDispatcher {
    pub fn new(mailer: Box<dyn Mailer>, policy: RetryPolicy) -> Self {
        Self { mailer, policy }
    }

    pub async fn send(&self, message: EmailMessage) -> bool {
        self.send_with_policy(message, self.policy).await
    }

    /// Devuelve `true` en el primer intento exitoso y `false` solo cuando se
    /// agotaron todos. Nunca propaga errores.
    pub async fn send_with_policy(&self, message: EmailMessage, policy: RetryPolicy) -> bool {
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.mailer.deliver(&message).await {
                Ok(receipt) => {
                    log::info!(
                        "(send) Email enviado a {} destinatarios (intento {}/{}). Status: {}",
                        message.recipients.len(),
                        attempt,
                        max_attempts,
                        receipt.status
                    );
                    return true;
                }
                Err(e) => {
                    log::error!("(send) Intento {} falló: {:#}", attempt, e);
                    if attempt < max_attempts {
                        log::info!("(send) Reintentando en {} segundos...", policy.delay.as_secs());
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        log::error!(
            "(send) Fallaron los {} intentos. Email no enviado: '{}'",
            max_attempts,
            message.subject
        );
        false
    }
}

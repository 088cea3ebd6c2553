//! services/email_service.rs
//! Transportes de correo: API HTTP (SendGrid v3) o SMTP.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentDisposition, ContentType},
        Body, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Certificate, Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use serde::Serialize;

use crate::config::app_config::{MailConfig, MailTransportConfig, SmtpConfig};
use crate::models::email_model::{DeliveryReceipt, EmailAttachment, EmailMessage};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Un intento de entrega. Todo o nada: o salen todos los destinatarios y
/// adjuntos, o devuelve error.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryReceipt>;
}

pub fn build_mailer(config: &MailConfig) -> Result<Box<dyn Mailer>> {
    let ca_cert = match &config.ca_cert_path {
        Some(path) => Some(read_pem(path)?),
        None => None,
    };

    let mailer: Box<dyn Mailer> = match &config.transport {
        MailTransportConfig::SendGrid { api_key, api_url } => Box::new(SendGridMailer::new(
            api_key.clone(),
            api_url.clone(),
            ca_cert.as_deref(),
        )?),
        MailTransportConfig::Smtp(smtp) => Box::new(SmtpMailer::new(smtp, ca_cert.as_deref())?),
    };
    log::info!(
        "(build_mailer) Transporte de correo: {:?}",
        config.transport.kind()
    );
    Ok(mailer)
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read CA certificate {}", path.display()))
}

// ----------------------------------------------------------------
// API HTTP
// ----------------------------------------------------------------

pub struct SendGridMailer {
    http_client: Client,
    api_key: String,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct SendGridPersonalization<'a> {
    to: Vec<SendGridAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct SendGridContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendGridPayload<'a> {
    personalizations: Vec<SendGridPersonalization<'a>>,
    from: SendGridAddress<'a>,
    subject: &'a str,
    content: Vec<SendGridContent<'a>>,
    #[serde(skip_serializing_if = "no_attachments")]
    attachments: &'a [EmailAttachment],
}

fn no_attachments(attachments: &&[EmailAttachment]) -> bool {
    attachments.is_empty()
}

impl<'a> SendGridPayload<'a> {
    pub(crate) fn from_message(message: &'a EmailMessage) -> Self {
        Self {
            personalizations: vec![SendGridPersonalization {
                to: message
                    .recipients
                    .iter()
                    .map(|email| SendGridAddress { email })
                    .collect(),
            }],
            from: SendGridAddress {
                email: &message.from,
            },
            subject: &message.subject,
            content: vec![SendGridContent {
                content_type: "text/html",
                value: &message.html_body,
            }],
            attachments: &message.attachments,
        }
    }
}

impl SendGridMailer {
    /// El cliente verifica certificados siempre; `ca_cert` solo agrega una raíz.
    pub fn new(api_key: String, api_url: String, ca_cert: Option<&[u8]>) -> Result<Self> {
        let mut builder = Client::builder().timeout(SEND_TIMEOUT);
        if let Some(pem) = ca_cert {
            let cert = reqwest::Certificate::from_pem(pem).context("Invalid CA certificate")?;
            builder = builder.add_root_certificate(cert);
        }
        let http_client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryReceipt> {
        let payload = SendGridPayload::from_message(message);

        let resp = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("(deliver) Fallo al hacer POST a la API de correo")?;

        let status = resp.status();
        if !status.is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Email API rejected message ({status}): {body_txt}"));
        }

        Ok(DeliveryReceipt {
            status: status.as_u16().to_string(),
        })
    }
}

// ----------------------------------------------------------------
// SMTP
// ----------------------------------------------------------------

pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, ca_cert: Option<&[u8]>) -> Result<Self> {
        let mut tls_builder = TlsParameters::builder(config.host.clone());
        if let Some(pem) = ca_cert {
            let cert = Certificate::from_pem(pem).context("Invalid CA certificate")?;
            tls_builder = tls_builder.add_root_certificate(cert);
        }
        let tls_params = tls_builder.build().context("Failed to build TLS parameters")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("Failed to create SMTP transport")?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .tls(Tls::Required(tls_params))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        Ok(Self { mailer })
    }
}

/// Un único mensaje multipart con todos los destinatarios en `To`.
pub fn build_smtp_message(message: &EmailMessage) -> Result<Message> {
    let from: Mailbox = message.from.parse().context("Invalid from address")?;

    let mut builder = Message::builder().from(from).subject(&message.subject);
    for recip_str in &message.recipients {
        let to: Mailbox = recip_str
            .parse()
            .with_context(|| format!("Invalid recipient address '{recip_str}'"))?;
        builder = builder.to(to);
    }

    let html_part = SinglePart::builder()
        .header(ContentType::TEXT_HTML)
        .body(message.html_body.clone());

    let mut multipart = MultiPart::mixed().singlepart(html_part);
    for attach in &message.attachments {
        let part = SinglePart::builder()
            .header(ContentType::parse(&attach.content_type)?)
            .header(ContentDisposition::attachment(&attach.filename))
            .body(Body::new(attach.data.clone()));
        multipart = multipart.singlepart(part);
    }

    builder
        .multipart(multipart)
        .context("Failed to build SMTP message")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryReceipt> {
        let smtp_message = build_smtp_message(message)?;
        let response = self
            .mailer
            .send(smtp_message)
            .await
            .context("SMTP delivery failed")?;

        Ok(DeliveryReceipt {
            status: response.code().to_string(),
        })
    }
}

//! services/report_service.rs
//! Arma el reporte de feedback: consulta cada formulario, genera la tabla HTML
//! resumen y un CSV adjunto por formulario.

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};

use crate::config::app_config::ReportBranding;
use crate::models::email_model::{EmailAttachment, EmailMessage};
use crate::models::feedback_model::{FormReport, ParticipationCount, ResponseTable};
use crate::services::feedback_repository::FeedbackSource;

pub const NO_FORMS_SUBJECT: &str = "📢 Feedback Reports - No Feedbacks Found";
pub const SUMMARY_SUBJECT: &str = "📢 All Feedback Reports";
pub const COMPLETED_MARKER: &str = "None 🎉";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Resultado del Report Builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackReport {
    /// No hay formularios: solo se envía el aviso.
    NoForms { html: String },
    /// Resumen + un CSV por formulario, en el orden devuelto por la consulta.
    Summary {
        html: String,
        attachments: Vec<EmailAttachment>,
    },
}

impl FeedbackReport {
    pub fn subject(&self) -> &'static str {
        match self {
            FeedbackReport::NoForms { .. } => NO_FORMS_SUBJECT,
            FeedbackReport::Summary { .. } => SUMMARY_SUBJECT,
        }
    }

    pub fn into_message(self, from: &str, recipients: &[String]) -> EmailMessage {
        let subject = self.subject().to_string();
        let (html_body, attachments) = match self {
            FeedbackReport::NoForms { html } => (html, Vec::new()),
            FeedbackReport::Summary { html, attachments } => (html, attachments),
        };

        EmailMessage {
            from: from.to_string(),
            recipients: recipients.to_vec(),
            subject,
            html_body,
            attachments,
        }
    }
}

/// Consulta todo lo necesario para el reporte. Si no hay formularios no se
/// hace ninguna otra consulta.
pub async fn collect_form_reports<S>(source: &mut S) -> Result<Vec<FormReport>>
where
    S: FeedbackSource + ?Sized,
{
    let forms = source.feedback_forms().await?;
    log::info!(
        "(collect_form_reports) Se encontraron {} formularios de feedback.",
        forms.len()
    );

    let mut reports = Vec::with_capacity(forms.len());
    for form in forms {
        let total_participants = source.count_participants(form.course_id).await?;
        let responses_received = source.count_responses(form.feedback_id).await?;
        let responses = source.responses(form.feedback_id).await?;
        let pending = source
            .pending_students(form.course_id, form.feedback_id)
            .await?;

        log::debug!(
            "(collect_form_reports) feedback_id={} respuestas={}/{} pendientes={}",
            form.feedback_id,
            responses_received,
            total_participants,
            pending.len()
        );

        reports.push(FormReport {
            form,
            participation: ParticipationCount {
                total_participants,
                responses_received,
            },
            responses,
            pending,
        });
    }

    Ok(reports)
}

/// Genera el HTML y los adjuntos a partir de lo consultado.
pub fn render_report(reports: &[FormReport], branding: &ReportBranding) -> Result<FeedbackReport> {
    if reports.is_empty() {
        return Ok(FeedbackReport::NoForms {
            html: render_no_forms_html(branding),
        });
    }

    let mut attachments = Vec::with_capacity(reports.len());
    let mut rows = String::new();

    for report in reports {
        attachments.push(csv_attachment(&report.form.course_name, &report.responses)?);
        rows.push_str(&render_summary_row(report));
    }

    Ok(FeedbackReport::Summary {
        html: render_summary_html(&rows, branding),
        attachments,
    })
}

/// Report Builder completo: consulta y renderiza.
pub async fn build_report<S>(source: &mut S, branding: &ReportBranding) -> Result<FeedbackReport>
where
    S: FeedbackSource + ?Sized,
{
    let reports = collect_form_reports(source).await?;
    render_report(&reports, branding)
}

/// Serializa la tabla de respuestas a CSV (encabezado + filas, CRLF).
/// Los NULL quedan como campos vacíos.
pub fn encode_csv(table: &ResponseTable) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(&table.columns)
        .context("Failed to write CSV header")?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .context("Failed to write CSV row")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV buffer: {}", e.error()))
}

pub fn attachment_filename(course_name: &str) -> String {
    format!("{}.csv", course_name.replace(' ', "_"))
}

fn csv_attachment(course_name: &str, table: &ResponseTable) -> Result<EmailAttachment> {
    let data = encode_csv(table)
        .with_context(|| format!("Failed to build CSV for course '{course_name}'"))?;
    Ok(EmailAttachment::new(
        attachment_filename(course_name),
        CSV_CONTENT_TYPE,
        data,
    ))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_pending_cell(report: &FormReport) -> String {
    if report.pending.is_empty() {
        return format!("<td class=\"completed\">{COMPLETED_MARKER}</td>");
    }
    let names = report
        .pending
        .iter()
        .map(|s| escape_html(&s.full_name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("<td class=\"pending\">{names}</td>")
}

fn render_summary_row(report: &FormReport) -> String {
    format!(
        r#"
                <tr>
                    <td>{title}</td>
                    <td>{course}</td>
                    <td>{mentor}</td>
                    <td>{ratio}</td>
                    {pending}
                </tr>"#,
        title = escape_html(&report.form.title),
        course = escape_html(&report.form.course_name),
        mentor = escape_html(&report.form.mentor_name),
        ratio = report.participation.ratio(),
        pending = render_pending_cell(report),
    )
}

fn render_header(branding: &ReportBranding) -> String {
    format!(
        r#"<div style="text-align: center; padding: 15px; background: #2c3e50;">
                <img src="{logo}" alt="{brand} Logo" style="height:60px;">
            </div>"#,
        logo = escape_html(&branding.logo_url),
        brand = escape_html(&branding.brand_name),
    )
}

fn render_footer(branding: &ReportBranding) -> String {
    format!(
        r#"<div style="margin-top: 30px; padding: 10px; background: #2c3e50; color: white; text-align: center; font-size: 12px;">
                © {year} {brand} · Automated Email System
            </div>"#,
        year = Utc::now().year(),
        brand = escape_html(&branding.brand_name),
    )
}

fn render_no_forms_html(branding: &ReportBranding) -> String {
    format!(
        r#"<html>
        <body style="font-family: Arial, sans-serif; color: #333; background: #f9f9f9;">
            {header}
            <h2 style="color:#e74c3c;">⚠️ No Feedback Forms Found</h2>
            <p>There are currently <b>no feedback forms</b> available.</p>
            <p>This is an automated notification from <b>{brand}</b>.</p>
            {footer}
        </body>
        </html>"#,
        header = render_header(branding),
        brand = escape_html(&branding.brand_name),
        footer = render_footer(branding),
    )
}

fn render_summary_html(rows: &str, branding: &ReportBranding) -> String {
    format!(
        r#"<html>
        <head>
            <style>
                body {{ font-family: Arial, sans-serif; color: #333; background: #f9f9f9; }}
                h2 {{ color: #2c3e50; }}
                table {{ border-collapse: collapse; width: 100%; margin-bottom: 20px; }}
                th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
                th {{ background-color: #2c3e50; color: white; }}
                tr:nth-child(even) {{ background-color: #f2f2f2; }}
                .pending {{ color: #e74c3c; font-weight: bold; }}
                .completed {{ color: #27ae60; font-weight: bold; }}
            </style>
        </head>
        <body>
            {header}
            <h2>📊 Feedback Reports Summary</h2>
            <table>
                <tr>
                    <th>Feedback Title</th>
                    <th>Course</th>
                    <th>Mentor</th>
                    <th>Responses</th>
                    <th>Pending Students</th>
                </tr>{rows}
            </table>
            <p>📎 Attached are the detailed CSV reports for each feedback form.</p>
            {footer}
        </body>
        </html>"#,
        header = render_header(branding),
        rows = rows,
        footer = render_footer(branding),
    )
}

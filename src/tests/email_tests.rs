//! tests/email_tests.rs
//! Formato de los mensajes que salen por cada transporte.

#[cfg(test)]
mod tests {
    use crate::models::email_model::{EmailAttachment, EmailMessage};
    use crate::services::email_service::{build_smtp_message, SendGridPayload};

    fn message_with_csv() -> EmailMessage {
        EmailMessage {
            from: "reports@example.com".into(),
            recipients: vec!["ops@example.com".into(), "lead@example.com".into()],
            subject: "📢 All Feedback Reports".into(),
            html_body: "<html><body>summary</body></html>".into(),
            attachments: vec![EmailAttachment::new(
                "Intro_to_Rust.csv",
                "text/csv",
                b"first_name\r\nAda\r\n".to_vec(),
            )],
        }
    }

    #[test]
    fn test_sendgrid_payload_shape() {
        let message = message_with_csv();
        let json = serde_json::to_value(SendGridPayload::from_message(&message)).unwrap();

        assert_eq!(
            json["personalizations"][0]["to"],
            serde_json::json!([{ "email": "ops@example.com" }, { "email": "lead@example.com" }])
        );
        assert_eq!(json["from"]["email"], "reports@example.com");
        assert_eq!(json["subject"], "📢 All Feedback Reports");
        assert_eq!(json["content"][0]["type"], "text/html");
        assert_eq!(json["content"][0]["value"], message.html_body);

        let attachment = &json["attachments"][0];
        assert_eq!(attachment["filename"], "Intro_to_Rust.csv");
        assert_eq!(attachment["type"], "text/csv");
        assert_eq!(attachment["disposition"], "attachment");
        assert_eq!(attachment["content"], message.attachments[0].encoded_content());
    }

    #[test]
    fn test_sendgrid_payload_omits_empty_attachments() {
        let mut message = message_with_csv();
        message.attachments.clear();
        let json = serde_json::to_value(SendGridPayload::from_message(&message)).unwrap();
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn test_attachment_roundtrips_through_json() {
        let original = message_with_csv().attachments.remove(0);
        let json = serde_json::to_string(&original).unwrap();
        let back: EmailAttachment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_smtp_message_addresses_all_recipients() {
        let smtp = build_smtp_message(&message_with_csv()).unwrap();
        let raw = String::from_utf8(smtp.formatted()).unwrap();

        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("lead@example.com"));
        assert!(raw.contains("attachment; filename=\"Intro_to_Rust.csv\""));
        assert!(raw.contains("text/csv"));
    }

    #[test]
    fn test_smtp_message_rejects_bad_recipient() {
        let mut message = message_with_csv();
        message.recipients.push("not an address".into());
        assert!(build_smtp_message(&message).is_err());
    }
}

//! Email service for notifying the instructor about new contact form leads.
//!
//! Uses the SMTP configuration from the main config file. When email is not
//! configured the service degrades to a no-op so lead submission never fails.

use anyhow::{Context, Result};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::db::models::Lead;

pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Sending needs working SMTP settings plus somewhere to deliver to.
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured() && self.config.notify_address.is_some()
    }

    /// Notify the configured recipient about a newly submitted lead.
    pub async fn send_lead_notification(&self, lead: &Lead) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping lead notification");
            return Ok(());
        }

        let to = self
            .config
            .notify_address
            .as_deref()
            .context("notify_address is not set")?;
        let subject = format!("New lead: {} ({})", lead.name, service_label(&lead.service));

        // Replying to the notification should reach the person who asked
        self.send(to, &subject, &lead_html(lead), &lead_text(lead), Some(&lead.email))
            .await
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<()> {
        let host = self.config.smtp_host.as_deref().context("smtp_host is not set")?;
        let from_address = self
            .config
            .from_address
            .as_deref()
            .context("from_address is not set")?;

        let from = Mailbox::new(
            Some(self.config.from_name.clone()),
            from_address.parse::<Address>()?,
        );

        let message = Message::builder().from(from).to(to.parse::<Mailbox>()?);
        let message = match reply_to.and_then(|addr| addr.parse::<Mailbox>().ok()) {
            Some(reply) => message.reply_to(reply),
            None => message,
        };
        let message = message.subject(subject).multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.to_string()),
                ),
        )?;

        let transport = match self.config.smtp_tls {
            true => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            false => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(self.config.smtp_port);

        let credentials = self
            .config
            .smtp_username
            .clone()
            .zip(self.config.smtp_password.clone());
        let transport = match credentials {
            Some((username, password)) => {
                transport.credentials(Credentials::new(username, password))
            }
            None => transport,
        };

        transport.build().send(message).await?;

        tracing::info!(to, subject, "Email sent");
        Ok(())
    }
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        r#"<tr><td style="padding:6px 12px;color:#64748b;font-size:14px;">{}</td><td style="padding:6px 12px;color:#0f172a;font-size:14px;font-weight:600;text-align:right;">{}</td></tr>"#,
        label,
        html_escape(value)
    )
}

/// HTML body. Inline styles and a plain table keep it readable in every
/// mail client.
fn lead_html(lead: &Lead) -> String {
    let mut rows = String::new();
    rows.push_str(&detail_row("Name", &lead.name));
    rows.push_str(&detail_row("Email", &lead.email));
    rows.push_str(&detail_row("Phone", &lead.phone));
    rows.push_str(&detail_row("Service", &service_label(&lead.service)));
    rows.push_str(&detail_row("License category", &lead.license_category));

    let message_block = match lead.message.as_deref().filter(|m| !m.trim().is_empty()) {
        Some(message) => format!(
            r#"<div style="margin:16px 0;padding:12px 16px;background:#f0fdf4;border-left:3px solid #16a34a;border-radius:4px;">
<div style="color:#64748b;font-size:13px;margin-bottom:4px;">Message</div>
<p style="margin:0;color:#0f172a;line-height:1.5;">{}</p>
</div>"#,
            html_escape(message)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="margin:0;padding:24px;background:#f1f5f9;font-family:-apple-system,'Segoe UI',Roboto,Arial,sans-serif;">
<div style="max-width:540px;margin:0 auto;background:#ffffff;border-radius:8px;overflow:hidden;border:1px solid #e2e8f0;">
<div style="background:#16a34a;color:#ffffff;padding:20px 24px;">
<h1 style="margin:0;font-size:20px;">New lead from the website</h1>
</div>
<div style="padding:24px;">
<p style="margin:0 0 16px;color:#0f172a;">Someone filled in the contact form on your site.</p>
<table style="width:100%;border-collapse:collapse;background:#f8fafc;border-radius:6px;">
{rows}
</table>
{message_block}
<p style="margin:16px 0 0;color:#64748b;font-size:13px;text-align:center;">Reply to this email to answer directly.</p>
</div>
<div style="padding:16px 24px;border-top:1px solid #f1f5f9;color:#94a3b8;font-size:12px;text-align:center;">Sent by Drivedesk</div>
</div>
</body>
</html>"#,
        rows = rows,
        message_block = message_block,
    )
}

fn lead_text(lead: &Lead) -> String {
    let message_block = match lead.message.as_deref().filter(|m| !m.trim().is_empty()) {
        Some(message) => format!("\n\nMessage:\n{}", message),
        None => String::new(),
    };

    format!(
        r#"New lead from the website

Someone filled in the contact form on your site.

Name: {name}
Email: {email}
Phone: {phone}
Service: {service}
License category: {category}{message_block}

Reply to this email to answer directly.

---
Sent by Drivedesk"#,
        name = lead.name,
        email = lead.email,
        phone = lead.phone,
        service = service_label(&lead.service),
        category = lead.license_category,
        message_block = message_block,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Human-readable label for a service slug
fn service_label(service: &str) -> String {
    match service {
        "driving-lessons" => "Driving lessons".to_string(),
        "car-rental" => "Car rental".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lead() -> Lead {
        Lead {
            id: "lead-1".to_string(),
            name: "Ana Ionescu".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+40 721 111 222".to_string(),
            service: "driving-lessons".to_string(),
            license_category: "B".to_string(),
            message: Some("When can I start?".to_string()),
            is_read: false,
            created_at: "2025-01-15T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(html_escape("\"quoted\""), "&quot;quoted&quot;");
    }

    #[test]
    fn test_service_label() {
        assert_eq!(service_label("driving-lessons"), "Driving lessons");
        assert_eq!(service_label("car-rental"), "Car rental");
        assert_eq!(service_label("something-else"), "something-else");
    }

    #[test]
    fn test_text_body_lists_every_field() {
        let text = lead_text(&sample_lead());
        assert!(text.contains("Ana Ionescu"));
        assert!(text.contains("ana@example.com"));
        assert!(text.contains("+40 721 111 222"));
        assert!(text.contains("Driving lessons"));
        assert!(text.contains("When can I start?"));
    }

    #[test]
    fn test_text_body_omits_empty_message() {
        let mut lead = sample_lead();
        lead.message = Some("   ".to_string());
        assert!(!lead_text(&lead).contains("Message:"));
    }

    #[test]
    fn test_html_body_lists_every_field() {
        let html = lead_html(&sample_lead());
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("Ana Ionescu"));
        assert!(html.contains("+40 721 111 222"));
        assert!(html.contains("License category"));
        assert!(html.contains("When can I start?"));
    }

    #[test]
    fn test_html_body_escapes_user_input() {
        let mut lead = sample_lead();
        lead.name = "<b>Ana</b>".to_string();
        lead.message = Some("1 < 2 & 3 > 2".to_string());

        let html = lead_html(&lead);
        assert!(html.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(html.contains("1 &lt; 2 &amp; 3 &gt; 2"));
        assert!(!html.contains("<b>Ana</b>"));
    }

    #[test]
    fn test_disabled_without_notify_address() {
        let mut config = EmailConfig::default();
        config.smtp_host = Some("smtp.example.com".to_string());
        config.from_address = Some("noreply@example.com".to_string());

        let service = EmailService::new(config.clone());
        assert!(!service.is_enabled());

        config.notify_address = Some("instructor@example.com".to_string());
        let service = EmailService::new(config);
        assert!(service.is_enabled());
    }
}

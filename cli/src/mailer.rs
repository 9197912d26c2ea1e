use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::random::random_hex;

pub const RESET_SENDER: &str = "mealmindy@proton.me";

#[derive(Debug, Clone)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    #[must_use]
    pub fn password_reset(to: &str, reset_url: &str) -> Self {
        Self {
            from: RESET_SENDER.to_string(),
            to: to.to_string(),
            subject: "Password Reset Request".to_string(),
            body: format!(
                "To reset your password, visit the following link:\n\n{reset_url}\n\n\
                 If you did not make this request then simply ignore this email and no \
                 changes will be made.\n"
            ),
        }
    }

    /// RFC 5322 rendering with CRLF line endings.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "From: {}\r\n", self.from);
        let _ = write!(out, "To: {}\r\n", self.to);
        let _ = write!(out, "Subject: {}\r\n", self.subject);
        let _ = write!(out, "Date: {}\r\n", Utc::now().to_rfc2822());
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("\r\n");
        for line in self.body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> Result<()>;
}

/// Writes each message as an `.eml` file for a local MTA to pick up.
pub struct SpoolMailer {
    outbox: PathBuf,
}

impl SpoolMailer {
    #[must_use]
    pub fn new(outbox: PathBuf) -> Self {
        Self { outbox }
    }
}

impl Mailer for SpoolMailer {
    fn send(&self, email: &Email) -> Result<()> {
        let name = format!(
            "{}-{}.eml",
            Utc::now().format("%Y%m%dT%H%M%S"),
            random_hex(4)
        );
        let path = self.outbox.join(name);
        std::fs::write(&path, email.to_rfc5322())
            .with_context(|| format!("Failed to spool mail to {}", path.display()))?;
        tracing::info!(to = %email.to, path = %path.display(), "mail spooled");
        Ok(())
    }
}

/// Logs messages instead of delivering them.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "mail not delivered (log mailer)"
        );
        Ok(())
    }
}

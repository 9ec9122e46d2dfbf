use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

/// One append-only audit record of a ledger operation or scheduler event.
///
/// The audit log is best-effort observability, never a persistence mechanism:
/// ledger state is not reloaded from it.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrower: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lender: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(event: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            borrower: None,
            lender: None,
            amount: None,
            principal: None,
            rate: None,
            interest: None,
            error: None,
        }
    }

    pub fn borrow(borrower: i64, lender: i64, amount: f64, principal: f64) -> Self {
        Self {
            borrower: Some(borrower),
            lender: Some(lender),
            amount: Some(amount),
            principal: Some(principal),
            ..Self::base("borrow")
        }
    }

    pub fn repayment(borrower: i64, lender: i64, amount: f64, principal: f64) -> Self {
        Self {
            borrower: Some(borrower),
            lender: Some(lender),
            amount: Some(amount),
            principal: Some(principal),
            ..Self::base("return")
        }
    }

    pub fn rate_assigned(borrower: i64, lender: i64, rate: f64, interest: f64) -> Self {
        Self {
            borrower: Some(borrower),
            lender: Some(lender),
            rate: Some(rate),
            interest: Some(interest),
            ..Self::base("rate")
        }
    }

    pub fn announcement(borrower: i64, lender: i64, interest: f64) -> Self {
        Self {
            borrower: Some(borrower),
            lender: Some(lender),
            interest: Some(interest),
            ..Self::base("announcement")
        }
    }

    pub fn delivery_error(borrower: i64, error: &str) -> Self {
        Self {
            borrower: Some(borrower),
            error: Some(error.to_string()),
            ..Self::base("delivery_error")
        }
    }

    pub fn command_error(borrower: i64, error: &str) -> Self {
        Self {
            borrower: Some(borrower),
            error: Some(error.to_string()),
            ..Self::base("command_error")
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        // Error strings can carry large upstream payloads.
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

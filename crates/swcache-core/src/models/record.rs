use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a queued record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Verification,
    Report,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Verification, RecordKind::Report];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Verification => "verification",
            RecordKind::Report => "report",
        }
    }

    /// Plural form used for queue file names and endpoint paths
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Verification => "verifications",
            RecordKind::Report => "reports",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verification" | "verifications" => Ok(RecordKind::Verification),
            "report" | "reports" => Ok(RecordKind::Report),
            other => Err(format!("unknown record kind: {}", other)),
        }
    }
}

/// A record queued while offline, waiting to be sent to the server.
///
/// The id doubles as the delivery's idempotency key, so it must stay unique
/// across every process that writes to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub id: String,
    pub kind: RecordKind,
    pub payload: serde_json::Value,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl PendingRecord {
    pub fn new(kind: RecordKind, payload: serde_json::Value) -> Self {
        Self {
            id: format!("{}-{}", kind, Uuid::new_v4()),
            kind,
            payload,
            queued_at: Utc::now(),
            attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_kind_from_str() {
        assert_eq!("verification".parse::<RecordKind>(), Ok(RecordKind::Verification));
        assert_eq!("Reports".parse::<RecordKind>(), Ok(RecordKind::Report));
        assert!("invoice".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_new_records_have_unique_ids() {
        let a = PendingRecord::new(RecordKind::Report, json!({}));
        let b = PendingRecord::new(RecordKind::Report, json!({}));
        assert_ne!(a.id, b.id);
        let uuid = a.id.strip_prefix("report-").unwrap();
        assert!(Uuid::parse_str(uuid).is_ok());
        assert_eq!(a.attempts, 0);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let record = PendingRecord::new(RecordKind::Verification, json!({"code": "ABC"}));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "verification");
        assert_eq!(value["payload"]["code"], "ABC");
    }
}

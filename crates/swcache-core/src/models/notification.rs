use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::config::NotificationConfig;

/// Path opened when a notification carries no target URL.
const DEFAULT_TARGET_URL: &str = "/";

/// Body of a push message. Every field is optional; empty fields count as
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse push data. JSON data is read field by field, so one odd field
    /// never hides the others; data that is not JSON becomes the body.
    pub fn parse(data: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(data) {
            Ok(value) => Self {
                title: field(&value, "title"),
                body: field(&value, "body"),
                url: field(&value, "url"),
            },
            Err(_) => {
                let text = String::from_utf8_lossy(data).trim().to_string();
                Self {
                    body: (!text.is_empty()).then_some(text),
                    ..Self::default()
                }
            }
        }
    }
}

/// A usable text field: non-empty strings as they are, numbers and `true`
/// as their text. Empty strings, zero, `false`, null, arrays and objects
/// fall back to the default.
fn field(value: &Value, name: &str) -> Option<String> {
    match value.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => number_text(n),
        _ => None,
    }
}

fn number_text(n: &Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return (i != 0).then(|| i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    let f = n.as_f64()?;
    if f == 0.0 {
        None
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        Some(format!("{:.0}", f))
    } else {
        Some(f.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// A notification ready to be shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Fill the payload's gaps with the configured defaults.
    pub fn from_payload(config: &NotificationConfig, payload: PushPayload) -> Self {
        Self {
            title: non_empty(payload.title).unwrap_or_else(|| config.default_title.clone()),
            body: non_empty(payload.body).unwrap_or_else(|| config.default_body.clone()),
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            data: NotificationData {
                url: non_empty(payload.url).unwrap_or_else(|| DEFAULT_TARGET_URL.to_string()),
            },
            actions: config.actions.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

//! Data models shared by the worker, the storage backends and the hosts.
//!
//! - `Request`, `RequestKey`, `RequestMode`: intercepted requests and their cache identity
//! - `Response`, `ResponseType`: network or cached responses
//! - `PushPayload`, `Notification`: push messages and what gets shown for them
//! - `PendingRecord`, `RecordKind`: locally queued records awaiting background sync

pub mod notification;
pub mod record;
pub mod request;
pub mod response;

pub use notification::{Notification, NotificationAction, NotificationData, PushPayload};
pub use record::{PendingRecord, RecordKind};
pub use request::{same_origin, Request, RequestKey, RequestMode};
pub use response::{Response, ResponseType};

/// Header map used by requests and responses. Names are stored lowercase.
pub type Headers = std::collections::BTreeMap<String, String>;

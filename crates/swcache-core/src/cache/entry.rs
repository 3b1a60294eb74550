use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{RequestKey, Response};

/// A stored value and when it was written. The timestamp is informational:
/// cache entries never expire or revalidate on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Contents of one cache namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub created_at: DateTime<Utc>,
    pub entries: BTreeMap<RequestKey, CachedData<Response>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<&Response> {
        self.entries.get(key).map(|cached| &cached.data)
    }

    pub fn insert(&mut self, key: RequestKey, response: Response) {
        self.entries.insert(key, CachedData::new(response));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use url::Url;

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_rounding() {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::minutes(70);
        assert_eq!(cached.age_display(), "1h ago");

        cached.cached_at = Utc::now() - Duration::hours(40);
        assert_eq!(cached.age_display(), "2d ago");
    }

    #[test]
    fn test_cached_data_clock_skew() {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() + Duration::minutes(10);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_namespace_insert_replaces() {
        let key = RequestKey::get(&Url::parse("https://app.example/").unwrap());
        let mut ns = Namespace::new();
        ns.insert(key.clone(), Response::ok("one"));
        ns.insert(key.clone(), Response::ok("two"));
        assert_eq!(ns.len(), 1);
        assert_eq!(ns.get(&key).map(Response::text).as_deref(), Some("two"));
    }
}

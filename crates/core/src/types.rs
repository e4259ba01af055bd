/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form key/value details attached to log events.
pub type Details = serde_json::Map<String, serde_json::Value>;

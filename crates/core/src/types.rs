/// Local job identifiers are a per-scheduler sequence starting at 1.
///
/// They are unrelated to the id the remote API hands out on submission.
pub type JobId = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

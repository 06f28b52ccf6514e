//! Registration records: the mapping from an identifier to a remote resource.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// How the fetch engine authenticates against the upstream.
///
/// `Basic` attaches the single process-wide configured credential pair;
/// registrations never carry credentials of their own.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Basic,
}

/// A stored registration.
///
/// The same serialization is used on the wire (create confirmation) and in
/// the store, so field names follow the API's camelCase convention.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Caller-supplied identifier, unique among live registrations.
    pub id: String,
    /// Upstream location fetched on read.
    pub target_url: String,
    /// Content type echoed on a successful fetch.
    pub content_type: String,
    /// When set, the fetch response presents the content as a named attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_name: Option<String>,
    /// Upstream authentication mode.
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// Absolute expiry deadline in epoch milliseconds; absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Registration {
    /// Whether the registration is expired at the given instant.
    ///
    /// The boundary is inclusive: a record whose deadline equals the current
    /// clock reading is already expired.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        match self.expires_at {
            Some(deadline) => epoch_millis(now) >= deadline,
            None => false,
        }
    }
}

/// Input for the create operation.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    pub id: String,
    pub target_url: String,
    pub content_type: String,
    #[serde(default)]
    pub download_name: Option<String>,
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// Relative expiry in minutes; converted exactly once at creation time.
    #[serde(default, deserialize_with = "deserialize_minutes")]
    pub expires_in_minutes: Option<u64>,
}

impl NewRegistration {
    /// Validate the input and build the record to store.
    ///
    /// `expires_in_minutes` is resolved against `now` here and never
    /// recomputed afterwards.
    pub fn into_registration(self, now: OffsetDateTime) -> Result<Registration> {
        validate_id(&self.id)?;
        validate_target_url(&self.target_url)?;

        let expires_at = match self.expires_in_minutes {
            Some(minutes) => Some(compute_expiry(now, minutes)?),
            None => None,
        };

        Ok(Registration {
            id: self.id,
            target_url: self.target_url,
            content_type: self.content_type,
            download_name: self.download_name,
            auth_mode: self.auth_mode,
            expires_at,
            created_at: now,
        })
    }
}

/// Validate a registration identifier.
///
/// Identifiers are used verbatim as storage key components, so they are
/// restricted to a filesystem-safe character set: ASCII alphanumerics plus
/// `.`, `_` and `-`, at most [`crate::MAX_ID_LEN`] characters, and never the
/// relative path components `.` or `..`.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidId("id must not be empty".to_string()));
    }
    if id.len() > crate::MAX_ID_LEN {
        return Err(Error::InvalidId(format!(
            "id exceeds {} characters",
            crate::MAX_ID_LEN
        )));
    }
    if id == "." || id == ".." {
        return Err(Error::InvalidId(format!(
            "id must not be a relative path component: {id}"
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(Error::InvalidId(format!(
            "id contains disallowed character {bad:?}"
        )));
    }
    Ok(())
}

/// Validate that the target is an absolute http(s) URL.
fn validate_target_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| Error::InvalidTargetUrl(format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidTargetUrl(format!(
            "unsupported scheme {other:?}: {raw}"
        ))),
    }
}

/// Compute the absolute expiry deadline from a relative minute count.
fn compute_expiry(now: OffsetDateTime, minutes: u64) -> Result<i64> {
    let offset_ms = minutes
        .checked_mul(60_000)
        .and_then(|ms| i64::try_from(ms).ok())
        .ok_or_else(|| Error::InvalidExpiry(format!("expiresInMinutes too large: {minutes}")))?;
    epoch_millis(now)
        .checked_add(offset_ms)
        .ok_or_else(|| Error::InvalidExpiry(format!("expiry overflows: {minutes} minutes")))
}

/// Current instant as epoch milliseconds.
pub fn epoch_millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Accept any non-negative JSON number, truncating fractional minutes.
fn deserialize_minutes<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v.trunc() as u64)),
        Some(v) => Err(serde::de::Error::custom(format!(
            "expiresInMinutes must be a non-negative number, got {v}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn input(id: &str) -> NewRegistration {
        NewRegistration {
            id: id.to_string(),
            target_url: "https://files.example.com/report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            download_name: None,
            auth_mode: AuthMode::None,
            expires_in_minutes: None,
        }
    }

    #[test]
    fn valid_ids_accepted() {
        for id in ["abc", "a-b_c.1", "X", "0", "a".repeat(128).as_str()] {
            assert!(validate_id(id).is_ok(), "expected {id:?} to be valid");
        }
    }

    #[test]
    fn unsafe_ids_rejected() {
        for id in ["", ".", "..", "a/b", "..\\x", "a b", "ü", "a".repeat(129).as_str()] {
            assert!(validate_id(id).is_err(), "expected {id:?} to be rejected");
        }
    }

    #[test]
    fn target_url_must_be_absolute_http() {
        let mut reg = input("x");
        reg.target_url = "ftp://example.com/f".to_string();
        assert!(reg.into_registration(OffsetDateTime::now_utc()).is_err());

        let mut reg = input("x");
        reg.target_url = "/relative/path".to_string();
        assert!(reg.into_registration(OffsetDateTime::now_utc()).is_err());
    }

    #[test]
    fn expiry_computed_once_from_creation_clock() {
        let now = OffsetDateTime::now_utc();
        let mut reg = input("x");
        reg.expires_in_minutes = Some(60);
        let stored = reg.into_registration(now).unwrap();
        assert_eq!(stored.expires_at, Some(epoch_millis(now) + 60 * 60_000));
    }

    #[test]
    fn zero_minutes_expires_immediately() {
        let now = OffsetDateTime::now_utc();
        let mut reg = input("x");
        reg.expires_in_minutes = Some(0);
        let stored = reg.into_registration(now).unwrap();
        // Inclusive boundary: now >= expiresAt already holds at creation time.
        assert!(stored.is_expired(now));
    }

    #[test]
    fn absent_expiry_never_expires() {
        let now = OffsetDateTime::now_utc();
        let stored = input("x").into_registration(now).unwrap();
        assert!(!stored.is_expired(now + Duration::days(365 * 100)));
    }

    #[test]
    fn fractional_minutes_are_truncated() {
        let parsed: NewRegistration = serde_json::from_value(serde_json::json!({
            "id": "x",
            "targetUrl": "https://example.com/f",
            "contentType": "text/plain",
            "expiresInMinutes": 90.7,
        }))
        .unwrap();
        assert_eq!(parsed.expires_in_minutes, Some(90));
    }

    #[test]
    fn negative_minutes_rejected() {
        let parsed: std::result::Result<NewRegistration, _> =
            serde_json::from_value(serde_json::json!({
                "id": "x",
                "targetUrl": "https://example.com/f",
                "contentType": "text/plain",
                "expiresInMinutes": -5,
            }));
        assert!(parsed.is_err());
    }

    #[test]
    fn stored_document_round_trips_camel_case() {
        let now = OffsetDateTime::now_utc();
        let mut reg = input("doc-1");
        reg.download_name = Some("report.pdf".to_string());
        reg.auth_mode = AuthMode::Basic;
        reg.expires_in_minutes = Some(5);
        let stored = reg.into_registration(now).unwrap();

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], "doc-1");
        assert_eq!(json["targetUrl"], "https://files.example.com/report.pdf");
        assert_eq!(json["downloadName"], "report.pdf");
        assert_eq!(json["authMode"], "basic");
        assert!(json["expiresAt"].is_i64());

        let back: Registration = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }
}

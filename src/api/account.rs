//! Account endpoints: registration, referral, entitlements and the user's
//! library (favorites, watch history, settings, reports).
//!
//! The guest identity (id 0) is never sent to the backend. Reads for a guest
//! short-circuit to empty values; writes fail with [`ApiError::Guest`].
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ApiClient, ApiError};
use crate::access::{ReferralCode, ReferralOutcome};
use crate::catalog::{CatalogItem, UNKNOWN_TITLE};
use crate::session::{UserIdentity, GUEST_ID};

// ============================================================================
// Wire Types
// ============================================================================

/// Backend user record, as echoed by registration or the profile endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "lenient::int")]
    pub telegram_id: i64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub membership: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub referral_count: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub points: i64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub commission: f64,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub referred_by: Option<i64>,
}

impl UserProfile {
    pub fn is_vip(&self) -> bool {
        self.membership
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("vip"))
    }

    pub fn has_admin_role(&self) -> bool {
        self.is_admin
            || self
                .role
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case("admin"))
    }

    /// Membership label for display ("Free" when none).
    pub fn membership_label(&self) -> &str {
        self.membership.as_deref().unwrap_or("Free")
    }

    pub fn referral_count(&self) -> u32 {
        u32::try_from(self.referral_count.max(0)).unwrap_or(u32::MAX)
    }
}

/// Reply of `GET /api/subscription/check/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub membership: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub has_referral_access: bool,
    #[serde(
        default,
        alias = "referral_access_expires_at",
        deserialize_with = "lenient::timestamp"
    )]
    pub referral_expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_admin: bool,
}

/// A favorite or watch-history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    #[serde(deserialize_with = "lenient::required_text")]
    pub book_id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cover_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub episode_number: Option<i64>,
    #[serde(default, alias = "watched_at", deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LibraryEntry {
    pub fn as_card(&self) -> CatalogItem {
        CatalogItem {
            id: self.book_id.clone(),
            title: self
                .title
                .clone()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            cover_url: self.cover_url.clone().unwrap_or_default(),
        }
    }
}

/// Per-user preferences stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_language", deserialize_with = "lenient::language")]
    pub language: String,
    #[serde(default = "default_true", deserialize_with = "lenient::flag")]
    pub notifications_enabled: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub membership: Option<String>,
}

fn default_language() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            notifications_enabled: true,
            membership: None,
        }
    }
}

/// Partial settings update; only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.notifications_enabled.is_none()
    }
}

fn require_member(user_id: i64, action: &'static str) -> Result<(), ApiError> {
    if user_id == GUEST_ID {
        return Err(ApiError::Guest(action));
    }
    Ok(())
}

/// Parse a list reply row by row; rows that do not fit are skipped.
fn parse_entries(payload: &Value) -> Vec<LibraryEntry> {
    let Some(rows) = payload.as_array() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match LibraryEntry::deserialize(row) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed library row");
                None
            }
        })
        .collect()
}

// ============================================================================
// Endpoints
// ============================================================================

impl ApiClient {
    /// Register (upsert) the identity with the backend.
    ///
    /// Returns the echoed profile when the reply carries one.
    pub async fn register_user(
        &self,
        identity: &UserIdentity,
    ) -> Result<Option<UserProfile>, ApiError> {
        require_member(identity.id, "register")?;
        let body = serde_json::to_value(identity)?;
        let reply = self.send_json(Method::POST, "api/user", &body).await?;
        let profile = UserProfile::deserialize(&reply)
            .ok()
            .filter(|p| p.telegram_id != GUEST_ID);
        Ok(profile)
    }

    /// Submit a referral code on behalf of `user_id`.
    ///
    /// Backend rejections (4xx) come back as [`ReferralOutcome::Rejected`],
    /// and `already_referred` as [`ReferralOutcome::AlreadyReferred`].
    ///
    /// # Errors
    ///
    /// [`ApiError::Guest`] for the guest id; transport failures and 5xx
    /// statuses as usual.
    pub async fn submit_referral(
        &self,
        user_id: i64,
        code: &ReferralCode,
    ) -> Result<ReferralOutcome, ApiError> {
        require_member(user_id, "submit referrals")?;
        let body = json!({ "telegram_id": user_id, "ref_code": code.to_string() });
        let (status, reply) = self
            .send_json_with_status(Method::POST, "api/referral", &body)
            .await?;
        Ok(ReferralOutcome::from_reply(status, &reply))
    }

    /// Current entitlement facts for `user_id`.
    pub async fn subscription_status(&self, user_id: i64) -> Result<SubscriptionStatus, ApiError> {
        if user_id == GUEST_ID {
            return Ok(SubscriptionStatus::default());
        }
        let reply = self
            .get_json(&format!("api/subscription/check/{user_id}"), &[])
            .await?;
        Ok(SubscriptionStatus::deserialize(&reply)?)
    }

    /// Fetch the stored profile. `Ok(None)` for guests and unknown users.
    pub async fn user_profile(&self, user_id: i64) -> Result<Option<UserProfile>, ApiError> {
        if user_id == GUEST_ID {
            return Ok(None);
        }
        match self.get_json(&format!("api/user/{user_id}"), &[]).await {
            Ok(reply) => Ok(UserProfile::deserialize(&reply)
                .ok()
                .filter(|p| p.telegram_id != GUEST_ID)),
            Err(ApiError::HttpStatus(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn favorites(&self, user_id: i64) -> Result<Vec<LibraryEntry>, ApiError> {
        if user_id == GUEST_ID {
            return Ok(Vec::new());
        }
        let reply = self.get_json(&format!("api/favorites/{user_id}"), &[]).await?;
        Ok(parse_entries(&reply))
    }

    pub async fn add_favorite(&self, user_id: i64, card: &CatalogItem) -> Result<(), ApiError> {
        require_member(user_id, "save favorites")?;
        let body = json!({
            "telegram_id": user_id,
            "book_id": card.id,
            "title": card.title,
            "cover_url": card.cover_url,
        });
        self.send_json(Method::POST, "api/favorites", &body).await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, user_id: i64, book_id: &str) -> Result<(), ApiError> {
        require_member(user_id, "remove favorites")?;
        let body = json!({ "telegram_id": user_id, "book_id": book_id });
        self.send_json(Method::DELETE, "api/favorites", &body).await?;
        Ok(())
    }

    pub async fn history(&self, user_id: i64) -> Result<Vec<LibraryEntry>, ApiError> {
        if user_id == GUEST_ID {
            return Ok(Vec::new());
        }
        let reply = self.get_json(&format!("api/history/{user_id}"), &[]).await?;
        Ok(parse_entries(&reply))
    }

    /// Record that `episode_number` (1-based) of `card` was watched.
    pub async fn record_history(
        &self,
        user_id: i64,
        card: &CatalogItem,
        episode_number: usize,
    ) -> Result<(), ApiError> {
        require_member(user_id, "record history")?;
        let body = json!({
            "telegram_id": user_id,
            "book_id": card.id,
            "title": card.title,
            "cover_url": card.cover_url,
            "episode_number": episode_number,
        });
        self.send_json(Method::POST, "api/history", &body).await?;
        Ok(())
    }

    pub async fn clear_history(&self, user_id: i64) -> Result<(), ApiError> {
        require_member(user_id, "clear history")?;
        self.delete(&format!("api/history/{user_id}")).await?;
        Ok(())
    }

    pub async fn settings(&self, user_id: i64) -> Result<UserSettings, ApiError> {
        if user_id == GUEST_ID {
            return Ok(UserSettings::default());
        }
        let reply = self.get_json(&format!("api/settings/{user_id}"), &[]).await?;
        if reply.is_null() {
            return Ok(UserSettings::default());
        }
        Ok(UserSettings::deserialize(&reply)?)
    }

    pub async fn update_settings(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> Result<(), ApiError> {
        require_member(user_id, "change settings")?;
        if update.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_value(update)?;
        self.send_json(Method::PUT, &format!("api/settings/{user_id}"), &body)
            .await?;
        Ok(())
    }

    /// Send an issue report. Guests may report too.
    pub async fn submit_report(
        &self,
        user_id: i64,
        issue_type: &str,
        description: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "telegram_id": user_id,
            "issue_type": issue_type,
            "description": description,
        });
        self.send_json(Method::POST, "api/report", &body).await?;
        Ok(())
    }
}

// ============================================================================
// Lenient Field Decoding
// ============================================================================

/// The backend serializes database rows as-is: numbers may arrive as strings,
/// booleans as 0/1, and any column may be `null`.
mod lenient {
    use super::*;
    use serde::de::{Deserializer, Error};

    fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(d)?;
        if let Some(i) = value.as_i64() {
            return Ok(i);
        }
        Ok(number(&value).map(|f| f as i64).unwrap_or(0))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let value = int(d)?;
        Ok((value != 0).then_some(value))
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(number(&Value::deserialize(d)?).unwrap_or(0.0))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            other => number(&other).is_some_and(|n| n != 0.0),
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn required_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        text(d)?.ok_or_else(|| D::Error::custom("expected a non-empty string or number"))
    }

    pub fn language<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(d)?.unwrap_or_else(default_language))
    }

    /// RFC 3339, RFC 2822 (Flask's default), naive `YYYY-MM-DD HH:MM:SS`
    /// taken as UTC, or Unix seconds.
    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => parse_timestamp(s.trim()),
            Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
            _ => None,
        })
    }

    fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn member() -> UserIdentity {
        UserIdentity {
            id: 555,
            username: "ana".to_string(),
            first_name: "Ana".to_string(),
            last_name: String::new(),
            avatar_url: String::new(),
        }
    }

    #[test]
    fn test_profile_lenient_fields() {
        let profile = UserProfile::deserialize(&json!({
            "telegram_id": "555",
            "membership": "VIP",
            "referral_count": "7",
            "points": 700,
            "commission": "12.50",
            "referred_by": null,
            "role": "admin",
            "created_at": "Tue, 03 Mar 2026 10:00:00 GMT"
        }))
        .unwrap();
        assert_eq!(profile.telegram_id, 555);
        assert!(profile.is_vip());
        assert!(profile.has_admin_role());
        assert_eq!(profile.referral_count(), 7);
        assert_eq!(profile.commission, 12.5);
        assert_eq!(profile.referred_by, None);
    }

    #[test]
    fn test_subscription_status_decoding() {
        let status = SubscriptionStatus::deserialize(&json!({
            "is_active": 0,
            "membership": "Free",
            "has_referral_access": 1,
            "referral_access_expires_at": "2026-03-04 10:00:00"
        }))
        .unwrap();
        assert!(!status.is_active);
        assert!(status.has_referral_access);
        assert_eq!(
            status.referral_expires_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_library_rows_skip_malformed() {
        let rows = json!([
            { "book_id": "1", "title": "One", "cover_url": "1.jpg" },
            { "title": "no id" },
            { "book_id": 2, "episode_number": 4, "watched_at": "2026-03-01T08:00:00Z" }
        ]);
        let entries = parse_entries(&rows);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].book_id, "2");
        assert_eq!(entries[1].episode_number, Some(4));
        assert_eq!(entries[1].as_card().title, UNKNOWN_TITLE);
        assert!(entries[1].created_at.is_some());
        assert!(parse_entries(&json!({ "error": "boom" })).is_empty());
    }

    #[test]
    fn test_settings_update_serializes_only_set_fields() {
        let update = SettingsUpdate {
            notifications_enabled: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "notifications_enabled": false })
        );
        assert!(SettingsUpdate::default().is_empty());
    }

    #[tokio::test]
    async fn test_register_sends_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user"))
            .and(body_json(json!({
                "telegram_id": 555,
                "username": "ana",
                "first_name": "Ana",
                "last_name": "",
                "avatar_url": ""
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "telegram_id": 555,
                "membership": "VIP",
                "referral_count": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        let profile = client.register_user(&member()).await.unwrap().unwrap();
        assert!(profile.is_vip());
        assert_eq!(profile.referral_count(), 3);
    }

    #[tokio::test]
    async fn test_register_without_echo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        assert_eq!(client.register_user(&member()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_guest_never_hits_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        assert!(client.favorites(GUEST_ID).await.unwrap().is_empty());
        assert!(client.history(GUEST_ID).await.unwrap().is_empty());
        assert_eq!(client.user_profile(GUEST_ID).await.unwrap(), None);
        assert_eq!(
            client.settings(GUEST_ID).await.unwrap(),
            UserSettings::default()
        );

        let card = CatalogItem {
            id: "1".to_string(),
            title: "t".to_string(),
            cover_url: String::new(),
        };
        assert!(matches!(
            client.add_favorite(GUEST_ID, &card).await,
            Err(ApiError::Guest(_))
        ));
        assert!(matches!(
            client.register_user(&UserIdentity::guest()).await,
            Err(ApiError::Guest(_))
        ));
    }

    #[tokio::test]
    async fn test_referral_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/referral"))
            .and(body_json(json!({ "telegram_id": 555, "ref_code": "ref_9" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": "already_referred" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/referral"))
            .and(body_json(json!({ "telegram_id": 555, "ref_code": "ref_555" })))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "cannot refer yourself" })),
            )
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        assert_eq!(
            client
                .submit_referral(555, &ReferralCode::for_user(9))
                .await
                .unwrap(),
            ReferralOutcome::AlreadyReferred
        );
        assert_eq!(
            client
                .submit_referral(555, &ReferralCode::for_user(555))
                .await
                .unwrap(),
            ReferralOutcome::Rejected("cannot refer yourself".to_string())
        );
    }

    #[tokio::test]
    async fn test_profile_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/555"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "User not found" })))
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        assert_eq!(client.user_profile(555).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_history_and_clear() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/history"))
            .and(body_json(json!({
                "telegram_id": 555,
                "book_id": "77",
                "title": "Drama",
                "cover_url": "c.jpg",
                "episode_number": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/history/555"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        let card = CatalogItem {
            id: "77".to_string(),
            title: "Drama".to_string(),
            cover_url: "c.jpg".to_string(),
        };
        client.record_history(555, &card, 3).await.unwrap();
        client.clear_history(555).await.unwrap();
    }
}

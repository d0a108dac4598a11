//! Models that represent principals, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;
use validator::Validate;

use crate::{models::session::SessionList, types::UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Persistent representation of an authenticated principal and its sessions.
pub struct Principal {
    /// Unique identifier, immutable after creation.
    pub id: UserId,
    /// Lower-cased email address used for password login.
    pub email: Option<String>,
    /// Mobile number used for passcode login.
    pub mobile: Option<String>,
    /// Argon2id hash of the long-term secret, if the principal has one.
    pub password_hash: Option<String>,
    pub full_name: String,
    /// Role describing the principal's privileges.
    pub role: UserRole,
    /// Device sessions owned exclusively by this principal.
    #[serde(default)]
    pub sessions: SessionList,
    /// Optimistic-concurrency counter bumped on every successful save.
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Constructs a new, unsaved principal with a freshly generated identifier.
    pub fn new(
        email: Option<String>,
        mobile: Option<String>,
        password_hash: Option<String>,
        full_name: String,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: email.map(|email| normalize_email(&email)),
            mobile: mobile.map(|mobile| normalize_mobile(&mobile)),
            password_hash,
            full_name,
            role,
            sessions: SessionList::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when the principal holds the `Administrator` role.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Administrator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema, Default)]
/// Supported principal roles.
pub enum UserRole {
    #[default]
    Standard,
    Provider,
    Administrator,
}

impl UserRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Standard => "standard",
            UserRole::Provider => "provider",
            UserRole::Administrator => "administrator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(UserRole::Standard),
            "provider" => Some(UserRole::Provider),
            "administrator" | "admin" => Some(UserRole::Administrator),
            _ => None,
        }
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UserRole::parse(&s).ok_or_else(|| {
            serde::de::Error::unknown_variant(&s, &["standard", "provider", "administrator"])
        })
    }
}

/// Unique key a principal can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginKey {
    Email(String),
    Mobile(String),
}

impl LoginKey {
    pub fn email(raw: &str) -> Self {
        LoginKey::Email(normalize_email(raw))
    }

    pub fn mobile(raw: &str) -> Self {
        LoginKey::Mobile(normalize_mobile(raw))
    }

    /// True when normalization left nothing that can identify a principal.
    pub fn is_blank(&self) -> bool {
        match self {
            LoginKey::Email(value) => value.is_empty(),
            LoginKey::Mobile(value) => !value.chars().any(|c| c.is_ascii_digit()),
        }
    }

    /// Identifier handed to the passcode verifier.
    pub fn as_str(&self) -> &str {
        match self {
            LoginKey::Email(value) | LoginKey::Mobile(value) => value,
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn normalize_mobile(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// Partial update applied through the principal store without touching sessions.
#[derive(Debug, Clone, Default)]
pub struct PrincipalUpdate {
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Credentials submitted by a principal attempting to authenticate.
///
/// Either `email` + `password` or `mobile` + `otp` must be present.
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
    /// Optional label to identify the client/device for the new session.
    #[serde(default)]
    pub device_label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
/// Payload for self-service account creation.
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[serde(default)]
    #[validate(length(min = 6, max = 20))]
    pub mobile: Option<String>,
    #[serde(default)]
    pub device_label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
/// Payload submitted when a principal requests to change their password.
pub struct ChangePasswordRequest {
    /// Existing password that will be verified before applying the change.
    pub current_password: String,
    /// Replacement password that will be stored if verification succeeds.
    #[validate(length(min = 1, max = 1024))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Payload for an administrator changing a principal's role.
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Access credential returned in the response body. The refresh credential is
/// only ever delivered through the refresh cookie.
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Public-facing representation of a principal.
pub struct UserResponse {
    pub id: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub full_name: String,
    pub role: String,
    pub session_count: usize,
}

impl From<&Principal> for UserResponse {
    fn from(principal: &Principal) -> Self {
        UserResponse {
            id: principal.id.to_string(),
            email: principal.email.clone(),
            mobile: principal.mobile.clone(),
            full_name: principal.full_name.clone(),
            role: principal.role.as_str().to_string(),
            session_count: principal.sessions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn user_role_serde_accepts_and_emits_snake_case() {
        let s: UserRole = serde_json::from_str("\"standard\"").unwrap();
        let p: UserRole = serde_json::from_str("\"provider\"").unwrap();
        let a: UserRole = serde_json::from_str("\"ADMINISTRATOR\"").unwrap();
        assert_eq!(s, UserRole::Standard);
        assert_eq!(p, UserRole::Provider);
        assert_eq!(a, UserRole::Administrator);

        assert!(serde_json::from_str::<UserRole>("\"superuser\"").is_err());

        let sa = serde_json::to_value(UserRole::Administrator).unwrap();
        assert_eq!(sa, Value::String("administrator".into()));
    }

    #[test]
    fn new_principal_normalizes_unique_keys() {
        let principal = Principal::new(
            Some("  Alice@Example.COM ".into()),
            Some("+1 (999) 000-1111".into()),
            None,
            "Alice".into(),
            UserRole::Standard,
        );
        assert_eq!(principal.email.as_deref(), Some("alice@example.com"));
        assert_eq!(principal.mobile.as_deref(), Some("+19990001111"));
        assert_eq!(principal.version, 0);
        assert!(principal.sessions.is_empty());
    }

    #[test]
    fn user_response_hides_secrets() {
        let principal = Principal::new(
            Some("bob@example.com".into()),
            None,
            Some("$argon2id$secret".into()),
            "Bob".into(),
            UserRole::Provider,
        );
        let resp = UserResponse::from(&principal);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("argon2"));
        assert_eq!(resp.role, "provider");
    }

    #[test]
    fn login_key_constructors_normalize() {
        assert_eq!(
            LoginKey::email(" Carol@Example.com"),
            LoginKey::Email("carol@example.com".into())
        );
        assert_eq!(LoginKey::mobile("999-000-1111").as_str(), "9990001111");
    }

    #[test]
    fn keys_without_identifying_characters_are_blank() {
        assert!(LoginKey::mobile("------").is_blank());
        assert!(LoginKey::mobile("not a number").is_blank());
        assert!(LoginKey::mobile("+").is_blank());
        assert!(LoginKey::email("   ").is_blank());
        assert!(!LoginKey::mobile("+1 (999) 000-1111").is_blank());
        assert!(!LoginKey::email("a@example.com").is_blank());
    }
}

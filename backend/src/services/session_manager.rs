//! Session lifecycle: login, refresh rotation, logout and revocation.
//!
//! Every mutation is a read-modify-write of one principal document. The store
//! rejects a save whose version is stale, and the manager reloads and re-applies
//! the mutation, so concurrent requests for the same principal serialize without
//! a global lock. Two refreshes racing on one token therefore resolve with a
//! single winner; the loser reloads, misses the rotated hash and fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    error::SessionError,
    models::{
        session::Session,
        user::{LoginKey, LoginRequest, Principal, PrincipalUpdate, UserRole},
    },
    repositories::principal::{PrincipalStore, StoreError},
    services::passcode::PasscodeVerifier,
    types::{SessionId, UserId},
    utils::{
        jwt::{generate_correlation_id, hash_correlation_id, IssuedToken, TokenCodec, TokenError},
        password::SecretHasher,
    },
};

const MAX_SAVE_ATTEMPTS: usize = 5;

/// Proof of identity presented at login.
#[derive(Debug, Clone)]
pub enum LoginCredentials {
    Password { email: String, password: String },
    Passcode { mobile: String, code: String },
}

impl LoginCredentials {
    /// Picks the credential pair present in a login body. Password login wins
    /// when both pairs are supplied.
    pub fn from_request(request: &LoginRequest) -> Option<Self> {
        if let (Some(email), Some(password)) = (&request.email, &request.password) {
            return Some(LoginCredentials::Password {
                email: email.clone(),
                password: password.clone(),
            });
        }
        if let (Some(mobile), Some(code)) = (&request.mobile, &request.otp) {
            return Some(LoginCredentials::Passcode {
                mobile: mobile.clone(),
                code: code.clone(),
            });
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub mobile: Option<String>,
}

/// Token pair handed back after login, registration or refresh.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub principal: Principal,
    pub session_id: SessionId,
    pub access_token: IssuedToken,
    /// Only ever sent to the client through the refresh cookie.
    pub refresh_token: IssuedToken,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub max_sessions_per_user: usize,
    pub password_min_length: usize,
}

impl SessionPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_sessions_per_user: config.max_sessions_per_user,
            password_min_length: config.password_min_length,
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn PrincipalStore>,
    codec: TokenCodec,
    hasher: SecretHasher,
    passcodes: Arc<dyn PasscodeVerifier>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        codec: TokenCodec,
        hasher: SecretHasher,
        passcodes: Arc<dyn PasscodeVerifier>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            codec,
            hasher,
            passcodes,
            policy,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn hasher(&self) -> &SecretHasher {
        &self.hasher
    }

    pub async fn login(
        &self,
        credentials: LoginCredentials,
        device_label: Option<String>,
    ) -> Result<IssuedSession, SessionError> {
        let principal = self.authenticate(&credentials).await?;
        let issued = self
            .open_session(principal.id, device_label)
            .await
            .map_err(|err| match err {
                SessionError::PrincipalNotFound => SessionError::AuthenticationFailed,
                other => other,
            })?;
        tracing::info!(
            user_id = %issued.principal.id,
            session_id = %issued.session_id,
            "Login succeeded"
        );
        Ok(issued)
    }

    /// Creates a standard principal and logs it in on the calling device.
    pub async fn register(
        &self,
        new_principal: NewPrincipal,
        device_label: Option<String>,
    ) -> Result<IssuedSession, SessionError> {
        self.check_password_strength(&new_principal.password)?;
        if LoginKey::email(&new_principal.email).is_blank() {
            return Err(SessionError::InvalidInput("Email is required".into()));
        }
        if let Some(mobile) = &new_principal.mobile {
            if LoginKey::mobile(mobile).is_blank() {
                return Err(SessionError::InvalidInput(
                    "Mobile number must contain digits".into(),
                ));
            }
        }
        let password_hash = self.hasher.hash(&new_principal.password)?;
        let principal = Principal::new(
            Some(new_principal.email),
            new_principal.mobile,
            Some(password_hash),
            new_principal.full_name.trim().to_string(),
            UserRole::Standard,
        );
        let saved = self.store.save(&principal).await?;
        tracing::info!(user_id = %saved.id, "Principal registered");
        self.open_session(saved.id, device_label).await
    }

    /// Rotates the session behind `refresh_token` and mints a new token pair.
    ///
    /// Reuse of a token that was already rotated away misses the hash lookup
    /// and fails with `SessionNotFound`. Sibling sessions are left untouched.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedSession, SessionError> {
        let claims = match self.codec.validate_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                self.prune_expired(refresh_token).await;
                return Err(SessionError::RefreshExpired);
            }
            Err(TokenError::InvalidSignature | TokenError::MalformedToken) => {
                return Err(SessionError::InvalidRefreshToken);
            }
        };

        let presented_hash = hash_correlation_id(&claims.sid);
        let next_correlation_id = generate_correlation_id();
        let next_hash = hash_correlation_id(&next_correlation_id);

        let result = self
            .update_principal(claims.sub, |principal, now| {
                let session = principal
                    .sessions
                    .find_by_hash(&presented_hash)
                    .cloned()
                    .ok_or(SessionError::SessionNotFound)?;
                if session.is_expired(now) {
                    principal.sessions.remove_by_hash(&presented_hash);
                    return Err(SessionError::SessionExpired);
                }
                principal
                    .sessions
                    .replace_hash(session.id, next_hash.clone(), now);
                Ok(session)
            })
            .await;

        let (principal, session) = match result {
            Ok(rotated) => rotated,
            Err(SessionError::SessionNotFound) | Err(SessionError::PrincipalNotFound) => {
                tracing::warn!(
                    user_id = %claims.sub,
                    "Refresh token matched no live session; possible reuse of a rotated token"
                );
                return Err(SessionError::SessionNotFound);
            }
            Err(SessionError::SessionExpired) => {
                tracing::info!(user_id = %claims.sub, "Expired session pruned on refresh");
                return Err(SessionError::SessionExpired);
            }
            Err(other) => return Err(other),
        };

        let refresh_token =
            self.codec
                .issue_refresh_until(principal.id, &next_correlation_id, session.expires_at)?;
        let access_token = self.codec.issue_access(principal.id, principal.role)?;
        tracing::debug!(user_id = %principal.id, session_id = %session.id, "Session rotated");

        Ok(IssuedSession {
            principal,
            session_id: session.id,
            access_token,
            refresh_token,
        })
    }

    /// Removes the session behind `refresh_token`, if any.
    ///
    /// Returns whether a session was removed. An absent, invalid or stale
    /// token is not an error and mutates nothing.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<bool, SessionError> {
        let Some(claims) = refresh_token.and_then(|token| self.codec.validate_refresh(token).ok())
        else {
            return Ok(false);
        };
        let token_hash = hash_correlation_id(&claims.sid);

        let result = self
            .update_principal(claims.sub, |principal, _| {
                Ok(principal.sessions.remove_by_hash(&token_hash))
            })
            .await;

        match result {
            Ok((_, Some(session))) => {
                tracing::info!(user_id = %claims.sub, session_id = %session.id, "Logged out");
                Ok(true)
            }
            Ok((_, None)) | Err(SessionError::PrincipalNotFound) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Revokes one named session. Access tokens already issued for it stay
    /// valid until their own expiry.
    pub async fn revoke(
        &self,
        principal_id: UserId,
        session_id: SessionId,
    ) -> Result<Session, SessionError> {
        let (_, session) = self
            .update_principal(principal_id, |principal, _| {
                principal
                    .sessions
                    .remove_by_id(session_id)
                    .ok_or(SessionError::SessionNotFound)
            })
            .await?;
        tracing::info!(user_id = %principal_id, session_id = %session_id, "Session revoked");
        Ok(session)
    }

    /// Removes every session of the principal and returns how many were dropped.
    pub async fn revoke_all(&self, principal_id: UserId) -> Result<usize, SessionError> {
        let (_, removed) = self
            .update_principal(principal_id, |principal, _| Ok(principal.sessions.clear()))
            .await?;
        tracing::info!(user_id = %principal_id, removed, "All sessions revoked");
        Ok(removed)
    }

    /// Live sessions of the principal, oldest first. Expired entries are
    /// hidden here and pruned when their token is next presented.
    pub async fn list_sessions(&self, principal_id: UserId) -> Result<Vec<Session>, SessionError> {
        let principal = self.principal(principal_id).await?;
        let now = Utc::now();
        Ok(principal
            .sessions
            .iter()
            .filter(|session| !session.is_expired(now))
            .cloned()
            .collect())
    }

    pub async fn principal(&self, principal_id: UserId) -> Result<Principal, SessionError> {
        self.store
            .find_by_id(principal_id)
            .await?
            .ok_or(SessionError::PrincipalNotFound)
    }

    pub async fn list_principals(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Principal>, i64), SessionError> {
        Ok(self.store.list(limit, offset).await?)
    }

    /// Installs a new password and revokes every session in the same save.
    pub async fn change_password(
        &self,
        principal_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<usize, SessionError> {
        let principal = self.principal(principal_id).await?;
        let verified_hash = principal
            .password_hash
            .clone()
            .filter(|digest| self.hasher.verify(digest, current_password))
            .ok_or(SessionError::AuthenticationFailed)?;
        self.check_password_strength(new_password)?;
        if current_password == new_password {
            return Err(SessionError::InvalidInput(
                "New password must differ from the current password".to_string(),
            ));
        }
        let new_hash = self.hasher.hash(new_password)?;

        let (_, removed) = self
            .update_principal(principal_id, |principal, _| {
                if principal.password_hash.as_deref() != Some(verified_hash.as_str()) {
                    return Err(SessionError::AuthenticationFailed);
                }
                principal.password_hash = Some(new_hash.clone());
                Ok(principal.sessions.clear())
            })
            .await?;
        tracing::info!(user_id = %principal_id, removed, "Password changed; sessions revoked");
        Ok(removed)
    }

    /// Changes a principal's role. Outstanding access tokens keep the old
    /// role until they expire.
    pub async fn change_role(
        &self,
        principal_id: UserId,
        role: UserRole,
    ) -> Result<Principal, SessionError> {
        let updated = self
            .store
            .update_fields(
                principal_id,
                PrincipalUpdate {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(SessionError::PrincipalNotFound)?;
        tracing::info!(user_id = %principal_id, role = role.as_str(), "Role changed");
        Ok(updated)
    }

    async fn authenticate(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<Principal, SessionError> {
        match credentials {
            LoginCredentials::Password { email, password } => {
                let key = LoginKey::email(email);
                if key.is_blank() {
                    self.hasher.verify_dummy(password);
                    return Err(SessionError::AuthenticationFailed);
                }
                let found = self.store.find_by_unique_key(&key).await?;
                let Some((principal, digest)) = found.and_then(|principal| {
                    let digest = principal.password_hash.clone()?;
                    Some((principal, digest))
                }) else {
                    self.hasher.verify_dummy(password);
                    return Err(SessionError::AuthenticationFailed);
                };
                if !self.hasher.verify(&digest, password) {
                    return Err(SessionError::AuthenticationFailed);
                }
                Ok(principal)
            }
            LoginCredentials::Passcode { mobile, code } => {
                let key = LoginKey::mobile(mobile);
                if key.is_blank() {
                    return Err(SessionError::AuthenticationFailed);
                }
                let found = self.store.find_by_unique_key(&key).await?;
                let accepted = self.passcodes.verify(key.as_str(), code).await;
                match found {
                    Some(principal) if accepted => Ok(principal),
                    _ => Err(SessionError::AuthenticationFailed),
                }
            }
        }
    }

    /// Removes the session behind a refresh token that has run out. The
    /// caller reports `RefreshExpired` whatever happens here.
    async fn prune_expired(&self, refresh_token: &str) {
        let Ok(claims) = self.codec.decode_expired_refresh(refresh_token) else {
            return;
        };
        let token_hash = hash_correlation_id(&claims.sid);

        let result = self
            .update_principal(claims.sub, |principal, now| {
                let expired = principal
                    .sessions
                    .find_by_hash(&token_hash)
                    .is_some_and(|session| session.is_expired(now));
                Ok(if expired {
                    principal.sessions.remove_by_hash(&token_hash)
                } else {
                    None
                })
            })
            .await;

        match result {
            Ok((_, Some(session))) => {
                tracing::info!(
                    user_id = %claims.sub,
                    session_id = %session.id,
                    "Expired session pruned on refresh"
                );
            }
            Ok((_, None)) | Err(SessionError::PrincipalNotFound) => {}
            Err(err) => {
                tracing::warn!(
                    user_id = %claims.sub,
                    error = %err,
                    "Failed to prune expired session"
                );
            }
        }
    }

    async fn open_session(
        &self,
        principal_id: UserId,
        device_label: Option<String>,
    ) -> Result<IssuedSession, SessionError> {
        let correlation_id = generate_correlation_id();
        let refresh_token = self.codec.issue_refresh(principal_id, &correlation_id)?;
        let token_hash = hash_correlation_id(&correlation_id);
        let cap = self.policy.max_sessions_per_user;

        let (principal, (session_id, evicted)) = self
            .update_principal(principal_id, |principal, now| {
                let session = Session::new(
                    token_hash.clone(),
                    device_label.clone(),
                    now,
                    refresh_token.expires_at,
                );
                let session_id = session.id;
                let evicted = principal.sessions.append(session, cap);
                Ok((session_id, evicted))
            })
            .await?;

        for session in &evicted {
            tracing::info!(
                user_id = %principal_id,
                session_id = %session.id,
                "Oldest session evicted at capacity"
            );
        }

        let access_token = self.codec.issue_access(principal.id, principal.role)?;
        Ok(IssuedSession {
            principal,
            session_id,
            access_token,
            refresh_token,
        })
    }

    fn check_password_strength(&self, password: &str) -> Result<(), SessionError> {
        if password.chars().count() < self.policy.password_min_length {
            return Err(SessionError::InvalidInput(format!(
                "Password must be at least {} characters",
                self.policy.password_min_length
            )));
        }
        Ok(())
    }

    /// Loads the principal, applies `apply` and saves the result when the
    /// session list or password changed. A stale save reloads and re-applies.
    ///
    /// `apply` may mutate and still fail; the mutation is persisted before the
    /// error is returned (an expired session is removed that way).
    async fn update_principal<T, F>(
        &self,
        principal_id: UserId,
        mut apply: F,
    ) -> Result<(Principal, T), SessionError>
    where
        F: FnMut(&mut Principal, DateTime<Utc>) -> Result<T, SessionError>,
    {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let mut principal = self.principal(principal_id).await?;
            let sessions_before = principal.sessions.clone();
            let password_before = principal.password_hash.clone();

            let outcome = apply(&mut principal, Utc::now());
            let changed = principal.sessions != sessions_before
                || principal.password_hash != password_before;
            if !changed {
                return outcome.map(|value| (principal, value));
            }

            match self.store.save(&principal).await {
                Ok(saved) => return outcome.map(|value| (saved, value)),
                Err(StoreError::Conflict) => {
                    tracing::debug!(
                        user_id = %principal_id,
                        attempt,
                        "Concurrent update; retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(
            user_id = %principal_id,
            attempts = MAX_SAVE_ATTEMPTS,
            "Giving up after repeated concurrent updates"
        );
        Err(SessionError::Store(StoreError::Conflict))
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_core::{SubscriptionId, UserId};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Collab, ErrorCode};

/// What a token verifier vouches for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Instructor,
    Staff,
    Admin,
}

impl UserType {
    /// Whether the user may run classroom meetings
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Instructor | Self::Staff | Self::Admin)
    }
}

/// A user as known by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(default)]
    pub subscription: Option<SubscriptionId>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// The identity bound to a connection when it is accepted. It never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub user_type: UserType,
    pub subscription: Option<SubscriptionId>,
    pub groups: Vec<String>,
}

impl From<UserRecord> for Identity {
    fn from(value: UserRecord) -> Self {
        Self {
            user_id: value.id,
            display_name: value.name,
            email: value.email,
            user_type: value.user_type,
            subscription: value.subscription,
            groups: value.groups,
        }
    }
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn belongs_to(&self, subscription: &str) -> bool {
        self.subscription.as_deref() == Some(subscription)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is malformed, forged, or expired
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    /// The verifier or directory could not be reached
    #[error("Auth backend failure: {0}")]
    Backend(String),
}

/// Verifies tokens and looks up users. Issuing tokens happens elsewhere.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError>;
    async fn load_user(&self, user_id: &str) -> Result<Option<UserRecord>, AuthError>;
}

pub type BoxedAuthenticator = Box<dyn Authenticator>;

/// Something a user may attempt, checked by a [Policy]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateMeeting,
    ViewMeetings,
    JoinMeeting,
    UpdatePermissions,
    StartStream,
}

impl Action {
    /// Phrase used in refusals, as in "You are not allowed to ..."
    pub fn describe(&self) -> &'static str {
        match self {
            Self::CreateMeeting => "create meetings",
            Self::ViewMeetings => "view these meetings",
            Self::JoinMeeting => "join this meeting",
            Self::UpdatePermissions => "change meeting permissions",
            Self::StartStream => "start streams",
        }
    }
}

/// Decides whether a user may perform an action within a subscription
pub trait Policy: Send + Sync {
    fn is_authorized(&self, identity: &Identity, action: Action, subscription: Option<&str>)
        -> bool;
}

/// Staff run meetings inside their own subscription, anyone may stream.
/// Admins are not bound to a subscription.
#[derive(Debug, Default, Clone, Copy)]
pub struct RolePolicy;

impl Policy for RolePolicy {
    fn is_authorized(
        &self,
        identity: &Identity,
        action: Action,
        subscription: Option<&str>,
    ) -> bool {
        let in_scope = identity.is_admin() || subscription.is_some_and(|s| identity.belongs_to(s));

        match action {
            Action::CreateMeeting | Action::UpdatePermissions => {
                identity.user_type.is_staff() && in_scope
            }
            Action::ViewMeetings | Action::JoinMeeting => in_scope,
            Action::StartStream => true,
        }
    }
}

/// Why a connection was refused during the handshake
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication token is required")]
    MissingToken,
    #[error("Authentication token is invalid or expired")]
    InvalidToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Authentication is unavailable")]
    Internal(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MissingToken,
            Self::InvalidToken => ErrorCode::InvalidToken,
            Self::UserNotFound => ErrorCode::UserNotFound,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl Collab {
    /// Resolves a handshake token into the identity a connection will carry.
    ///
    /// All lookups here happen before any registry is touched.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, GatewayError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(GatewayError::MissingToken)?;

        let claims = self.auth.verify_token(token).await.map_err(|e| match e {
            AuthError::InvalidToken(reason) => {
                debug!("Refused token: {}", reason);
                GatewayError::InvalidToken
            }
            AuthError::Backend(reason) => {
                error!("Token verification failed: {}", reason);
                GatewayError::Internal(reason)
            }
        })?;

        if claims.expires_at <= Utc::now() {
            debug!("Refused expired token for {}", claims.user_id);
            return Err(GatewayError::InvalidToken);
        }

        let user = self
            .auth
            .load_user(&claims.user_id)
            .await
            .map_err(|e| {
                error!("Loading user {} failed: {}", claims.user_id, e);
                GatewayError::Internal(e.to_string())
            })?
            .ok_or(GatewayError::UserNotFound)?;

        Ok(user.into())
    }
}

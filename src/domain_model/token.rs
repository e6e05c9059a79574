use crate::domain_model::{FamilyId, TokenId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Token audience. `PasswordReset` and `Invitation` are reserved values:
/// their issuance flows live outside this service but share the signing
/// primitive, so the wire values must not collide.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Audience {
    #[serde(rename = "API_ACCESS")]
    ApiAccess,
    #[serde(rename = "API_REFRESH")]
    ApiRefresh,
    #[serde(rename = "PASSWORD_RESET")]
    PasswordReset,
    #[serde(rename = "INVITATION")]
    Invitation,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::ApiAccess => "API_ACCESS",
            Audience::ApiRefresh => "API_REFRESH",
            Audience::PasswordReset => "PASSWORD_RESET",
            Audience::Invitation => "INVITATION",
        }
    }
}

/// Verified identity of a bearer on a protected route. Produced by
/// `AuthService::authorize`; everything in it originates from the token
/// payload, never from request state.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: UserId,
    pub family_id: FamilyId,
    pub refresh_id: TokenId,
}

use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    pub uid: String,
    pub fid: String,
    pub rid: String,
    pub exp: i64,
    pub iat: i64,
    pub aud: Audience,
    #[serde(flatten)]
    pub extra: ExtraClaims,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RefreshClaims {
    pub uid: String,
    pub fid: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub aud: Audience,
}

fn encode_access(
    user_id: UserId,
    family_id: FamilyId,
    refresh_id: TokenId,
    extra: ExtraClaims,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.access_ttl;
    let claims = AccessClaims {
        uid: user_id.to_string(),
        fid: family_id.to_string(),
        rid: refresh_id.to_string(),
        exp: exp_dt.timestamp(),
        iat: iat_dt.timestamp(),
        aud: Audience::ApiAccess,
        extra,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok((token, exp_dt))
}

fn encode_refresh(
    user_id: UserId,
    family_id: FamilyId,
    token_id: TokenId,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + cfg.refresh_ttl;
    let claims = RefreshClaims {
        uid: user_id.to_string(),
        fid: family_id.to_string(),
        jti: token_id.to_string(),
        exp: exp_dt.timestamp(),
        iat: iat_dt.timestamp(),
        aud: Audience::ApiRefresh,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok((token, exp_dt))
}

fn validation(audience: Audience) -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    v.leeway = 0;
    v.set_audience(&[audience.as_str()]);
    v
}

// Every verification failure collapses into InvalidToken: a forged
// signature must be indistinguishable from an expired or mistargeted token.
fn decode_access(token: &str, cfg: &JwtConfig) -> Result<AccessClaims, AuthError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(&cfg.signing_key),
        &validation(Audience::ApiAccess),
    )
    .map_err(|_| AuthError::InvalidToken)?;
    Ok(data.claims)
}

fn decode_refresh(token: &str, cfg: &JwtConfig) -> Result<RefreshClaims, AuthError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(&cfg.signing_key),
        &validation(Audience::ApiRefresh),
    )
    .map_err(|_| AuthError::InvalidToken)?;
    Ok(data.claims)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    fn parse_ids(uid: &str, fid: &str, tid: &str) -> Result<VerifiedClaims, AuthError> {
        Ok(VerifiedClaims {
            user_id: uid.parse::<UserId>().map_err(|_| AuthError::InvalidToken)?,
            family_id: fid
                .parse::<FamilyId>()
                .map_err(|_| AuthError::InvalidToken)?,
            token_id: tid.parse::<TokenId>().map_err(|_| AuthError::InvalidToken)?,
        })
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        refresh_id: TokenId,
        extra_claims: Option<ExtraClaims>,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let extra = extra_claims.unwrap_or_default();
        let (token, exp_dt) = encode_access(user_id, family_id, refresh_id, extra, &self.cfg)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_refresh(user_id, family_id, token_id, &self.cfg)?;
        Ok((RefreshToken(token), exp_dt))
    }

    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<VerifiedClaims, AuthError> {
        let claims = decode_access(&token.0, &self.cfg)?;
        Self::parse_ids(&claims.uid, &claims.fid, &claims.rid)
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<VerifiedClaims, AuthError> {
        let claims = decode_refresh(&token.0, &self.cfg)?;
        Self::parse_ids(&claims.uid, &claims.fid, &claims.jti)
    }
}

use anyhow::{anyhow, bail, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
}

/// Which half of the token pair a token is. Encoded into the `typ` claim and
/// checked again on every verification, so a refresh token can never be used
/// where an access token is expected (or vice versa).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub typ: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Only the HMAC family is supported; asymmetric algorithms would need a key
/// pair instead of the shared `SECRET_KEY`.
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => bail!("unsupported JWT algorithm: {other}"),
    }
}

pub fn issue_token(subject: &str, kind: TokenKind, config: &JwtConfig) -> Result<(String, TokenClaims)> {
    let now = unix_seconds()?;
    let ttl = match kind {
        TokenKind::Access => config.access_ttl_seconds,
        TokenKind::Refresh => config.refresh_ttl_seconds,
    };
    let exp = now
        .checked_add(ttl)
        .ok_or_else(|| anyhow!("token expiry overflow"))?;

    let claims = TokenClaims {
        sub: subject.to_string(),
        exp: exp as usize,
        iat: now as usize,
        typ: kind.as_str().to_string(),
    };

    let token = encode(
        &Header::new(config.algorithm),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn issue_token_pair(subject: &str, config: &JwtConfig) -> Result<TokenPair> {
    let (access_token, _) = issue_token(subject, TokenKind::Access, config)?;
    let (refresh_token, _) = issue_token(subject, TokenKind::Refresh, config)?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

pub fn verify_token(token: &str, kind: TokenKind, config: &JwtConfig) -> Result<TokenClaims> {
    let validation = Validation::new(config.algorithm);
    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;

    if data.claims.typ != kind.as_str() {
        bail!("token type mismatch: expected {}", kind.as_str());
    }
    Ok(data.claims)
}

pub fn unix_seconds() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .map_err(|_| anyhow!("invalid system clock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            algorithm: Algorithm::HS256,
            access_ttl_seconds: 1800,
            refresh_ttl_seconds: 604_800,
        }
    }

    #[test]
    fn round_trip_preserves_subject() {
        let config = test_config();
        let (token, _) = issue_token("user-123", TokenKind::Access, &config).unwrap();
        let claims = verify_token(&token, TokenKind::Access, &config).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.typ, "access");
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let config = test_config();
        let (token, _) = issue_token("user-123", TokenKind::Refresh, &config).unwrap();
        assert!(verify_token(&token, TokenKind::Access, &config).is_err());
        assert!(verify_token(&token, TokenKind::Refresh, &config).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let now = unix_seconds().unwrap();
        let claims = TokenClaims {
            sub: "user-123".to_string(),
            // Past the default validation leeway.
            exp: (now - 3600) as usize,
            iat: (now - 7200) as usize,
            typ: "refresh".to_string(),
        };
        let token = encode(
            &Header::new(config.algorithm),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, TokenKind::Refresh, &config).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let config = test_config();
        assert!(verify_token("not-a-token", TokenKind::Access, &config).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = test_config();
        let (token, _) = issue_token("user-123", TokenKind::Access, &config).unwrap();
        let other = JwtConfig {
            secret: "other-secret".to_string(),
            ..test_config()
        };
        assert!(verify_token(&token, TokenKind::Access, &other).is_err());
    }

    #[test]
    fn parse_algorithm_accepts_hmac_only() {
        assert_eq!(parse_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
    }
}

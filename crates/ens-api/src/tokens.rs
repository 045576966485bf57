use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use ens_types::api::{Claims, TokenKind, TokenPair};

/// Signs and verifies the HS256 token pairs handed out at signup, login and
/// refresh.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Fails when a TTL is too large to stamp onto a token.
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: ttl("access", access_ttl_secs)?,
            refresh_ttl: ttl("refresh", refresh_ttl_secs)?,
        })
    }

    /// When a session opened now should lapse: together with its refresh token.
    pub fn session_expiry(&self) -> anyhow::Result<DateTime<Utc>> {
        expiry(Utc::now(), self.refresh_ttl)
    }

    pub fn issue_pair(&self, user_id: Uuid, session_id: Uuid) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user_id, session_id, TokenKind::Access)?,
            refresh_token: self.issue(user_id, session_id, TokenKind::Refresh)?,
        })
    }

    fn issue(&self, user_id: Uuid, session_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id,
            sid: session_id,
            kind,
            iat: now.timestamp() as usize,
            exp: expiry(now, ttl)?.timestamp() as usize,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Signature, expiry and token kind are all checked. Session liveness is
    /// not; that needs the store.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).ok()?;
        (data.claims.kind == expected).then_some(data.claims)
    }
}

// One hundred years. Keeps `exp` well inside chrono's range.
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 3600;

fn ttl(which: &str, secs: u64) -> anyhow::Result<Duration> {
    anyhow::ensure!(
        secs <= MAX_TTL_SECS,
        "{which} token TTL of {secs}s exceeds the maximum of {MAX_TTL_SECS}s"
    );
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .with_context(|| format!("{which} token TTL of {secs}s is out of range"))
}

fn expiry(from: DateTime<Utc>, ttl: Duration) -> anyhow::Result<DateTime<Utc>> {
    from.checked_add_signed(ttl)
        .context("token expiry is out of range")
}

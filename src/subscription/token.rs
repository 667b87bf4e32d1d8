//! Signed, time-limited unsubscribe tokens.
//!
//! Layout before encoding: `{email}:{expires_ms}:{hex hmac-sha256}` where the
//! MAC covers `{email}:{expires_ms}`. Encoded as unpadded URL-safe base64 so
//! it can sit in a query string as is.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL: Duration = Duration::days(7);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenCheck {
    pub email: String,
    pub valid: bool,
}

impl TokenCheck {
    fn invalid() -> Self {
        Self {
            email: String::new(),
            valid: false,
        }
    }
}

fn mac_for(secret: &str, payload: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(mac)
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn generate(secret: &str, email: &str) -> String {
    generate_at(secret, email, OffsetDateTime::now_utc())
}

pub fn generate_at(secret: &str, email: &str, now: OffsetDateTime) -> String {
    let expires = unix_millis(now + TOKEN_TTL);
    let payload = format!("{email}:{expires}");
    let signature = mac_for(secret, &payload)
        .map(|m| hex::encode(m.finalize().into_bytes()))
        .unwrap_or_default();
    URL_SAFE_NO_PAD.encode(format!("{payload}:{signature}"))
}

pub fn verify(secret: &str, token: &str) -> TokenCheck {
    verify_at(secret, token, OffsetDateTime::now_utc())
}

pub fn verify_at(secret: &str, token: &str, now: OffsetDateTime) -> TokenCheck {
    let token = token.trim();
    let Ok(raw) = URL_SAFE_NO_PAD
        .decode(token)
        .or_else(|_| STANDARD.decode(token))
    else {
        return TokenCheck::invalid();
    };
    let Ok(decoded) = String::from_utf8(raw) else {
        return TokenCheck::invalid();
    };

    // Split from the right: the signature and expiry never contain ':'.
    let mut parts = decoded.rsplitn(3, ':');
    let (Some(signature), Some(expires), Some(email)) = (parts.next(), parts.next(), parts.next())
    else {
        return TokenCheck::invalid();
    };
    if email.is_empty() {
        return TokenCheck::invalid();
    }

    let Ok(expires_ms) = expires.parse::<i64>() else {
        return TokenCheck::invalid();
    };
    if unix_millis(now) > expires_ms {
        return TokenCheck::invalid();
    }

    let Ok(signature) = hex::decode(signature) else {
        return TokenCheck::invalid();
    };
    let Some(mac) = mac_for(secret, &format!("{email}:{expires}")) else {
        return TokenCheck::invalid();
    };
    if mac.verify_slice(&signature).is_err() {
        return TokenCheck::invalid();
    }

    TokenCheck {
        email: email.to_string(),
        valid: true,
    }
}

//! Token descrambler
//!
//! The portal's authenticate endpoint returns two scrambled token strings and
//! five numeric salts. The real tokens are recovered by asking the transform
//! module for six cut indices per string and dropping the byte found at each
//! index. The salt orderings fed to each transform call are fixed protocol
//! constants; they follow no single permutation and must not be "simplified".

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AuthError, AuthResult};
use crate::transform::TokenTransform;

/// The five server-issued salts, in declared response order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salts([i64; 5]);

impl Salts {
    /// Build from the five salts in `salt1..salt5` order
    pub fn new(values: [i64; 5]) -> Self {
        Self(values)
    }

    /// Salt at `index` (0-based)
    pub fn get(&self, index: usize) -> i64 {
        self.0[index]
    }

    /// All five salts in declared order
    pub fn values(&self) -> [i64; 5] {
        self.0
    }

    /// Build from a server-provided array, rejecting anything but 5 values
    pub fn from_slice(values: &[i64]) -> Option<Self> {
        <[i64; 5]>::try_from(values).ok().map(Self)
    }
}

/// Raw body of `GET /api/authenticate/prove`
///
/// Salts arrive either as JSON numbers or numeric strings depending on the
/// portal build, so they are held loose here and coerced in [`descramble`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenResponse {
    #[serde(default)]
    pub salt1: Option<Value>,
    #[serde(default)]
    pub salt2: Option<Value>,
    #[serde(default)]
    pub salt3: Option<Value>,
    #[serde(default)]
    pub salt4: Option<Value>,
    #[serde(default)]
    pub salt5: Option<Value>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Descrambled tokens plus the salts that produced them
///
/// The salts are returned in their original response order for reuse by the
/// payload-id signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescrambledTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub salts: Salts,
}

/// Recover the access and refresh tokens from a scrambled auth response
///
/// Pure given the response and transform module: identical inputs always
/// yield identical outputs. Salt validation happens before any transform
/// call; a missing or non-numeric salt fails with
/// [`AuthError::MalformedResponse`] naming the offending field.
pub fn descramble<T: TokenTransform + ?Sized>(
    transform: &T,
    response: &RawTokenResponse,
) -> AuthResult<DescrambledTokens> {
    let s = [
        coerce_salt("salt1", response.salt1.as_ref())?,
        coerce_salt("salt2", response.salt2.as_ref())?,
        coerce_salt("salt3", response.salt3.as_ref())?,
        coerce_salt("salt4", response.salt4.as_ref())?,
        coerce_salt("salt5", response.salt5.as_ref())?,
    ];

    let access_raw = require_token("accessToken", response.access_token.as_deref())?;
    let refresh_raw = require_token("refreshToken", response.refresh_token.as_deref())?;

    // Access-token cut indices. The first call sees the salts in declared
    // order; the remaining four swap positions 3 and 4.
    let access_cuts = [
        transform.invoke("cdx", [s[0], s[1], s[2], s[3], s[4]])?,
        transform.invoke("rdx", [s[0], s[1], s[3], s[2], s[4]])?,
        transform.invoke("bdx", [s[0], s[1], s[3], s[2], s[4]])?,
        transform.invoke("ndx", [s[0], s[1], s[3], s[2], s[4]])?,
        transform.invoke("mdx", [s[0], s[1], s[3], s[2], s[4]])?,
    ];

    // Refresh-token cut indices. Each call uses its own salt ordering; these
    // tuples are protocol constants, reproduced literally.
    let refresh_cuts = [
        transform.invoke("cdx", [s[1], s[0], s[2], s[4], s[3]])?,
        transform.invoke("rdx", [s[1], s[0], s[2], s[3], s[4]])?,
        transform.invoke("bdx", [s[1], s[0], s[3], s[2], s[4]])?,
        transform.invoke("ndx", [s[1], s[0], s[3], s[2], s[4]])?,
        transform.invoke("mdx", [s[1], s[0], s[3], s[2], s[4]])?,
    ];

    Ok(DescrambledTokens {
        access_token: reassemble("accessToken", access_raw, access_cuts)?,
        refresh_token: reassemble("refreshToken", refresh_raw, refresh_cuts)?,
        salts: Salts::new(s),
    })
}

fn coerce_salt(field: &'static str, value: Option<&Value>) -> AuthResult<i64> {
    let value = value.ok_or(AuthError::MalformedResponse {
        field,
        reason: "missing".to_string(),
    })?;

    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| *v >= 0)
        .ok_or_else(|| AuthError::MalformedResponse {
            field,
            reason: format!("expected a non-negative integer, got {}", value),
        })
}

fn require_token(field: &'static str, value: Option<&str>) -> AuthResult<&str> {
    value.ok_or(AuthError::MalformedResponse {
        field,
        reason: "missing".to_string(),
    })
}

/// Drop the byte at each cut index and concatenate the six remaining ranges.
///
/// Cut points are not validated against the string length; ranges clamp and
/// inverted ranges collapse to empty, so an out-of-range index degrades to a
/// no-op rather than an error.
fn reassemble(field: &'static str, raw: &str, cuts: [i64; 5]) -> AuthResult<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut start = 0usize;
    for cut in cuts {
        let cut = cut.max(0) as usize;
        out.extend_from_slice(segment(bytes, start, cut));
        start = cut.saturating_add(1);
    }
    out.extend_from_slice(segment(bytes, start, bytes.len()));

    String::from_utf8(out).map_err(|_| AuthError::MalformedResponse {
        field,
        reason: "descrambled token is not valid UTF-8".to_string(),
    })
}

fn segment(bytes: &[u8], start: usize, end: usize) -> &[u8] {
    let len = bytes.len();
    let start = start.min(len);
    let end = end.min(len);
    if end <= start {
        &[]
    } else {
        &bytes[start..end]
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified JWT expiry decoding.
//!
//! The access token's `exp` claim is decoded client-side as an optimistic
//! expiry hint, nothing more. No signature is checked; the server's 401
//! response remains the authoritative signal of invalidity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Decode the `exp` claim (seconds since epoch) from a compact JWS token.
///
/// Returns `None` for any malformed shape: missing segments, invalid
/// base64, invalid JSON, or a missing/non-numeric `exp` claim.
pub fn decode_expiry(token: &str) -> Option<u64> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    // A compact JWS always carries a signature segment; its content is
    // irrelevant here but its absence means this is not a token.
    segments.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_u64()
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Opaque random identifiers from the system CSPRNG.

use std::fmt::Write;

use ring::rand::{SecureRandom, SystemRandom};

/// Bytes of entropy in OAuth state nonces and session ids (256 bits).
pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("system random source unavailable")]
pub struct RandomError;

/// Fill `buf` from the system CSPRNG.
pub fn fill(buf: &mut [u8]) -> Result<(), RandomError> {
    SystemRandom::new().fill(buf).map_err(|_| RandomError)
}

/// A fresh 256-bit identifier, lowercase hex (64 characters).
pub fn hex_token() -> Result<String, RandomError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    fill(&mut bytes)?;
    Ok(hex_encode(&bytes))
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

/// Log-safe prefix of a secret identifier.
pub fn redact(id: &str) -> &str {
    id.get(..16).unwrap_or(id)
}

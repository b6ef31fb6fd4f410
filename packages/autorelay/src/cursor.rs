//! Opaque position cursors.
//! See: https://relay.dev/graphql/connections.htm#sec-Cursor
//!
//! A cursor wraps a position within the current ordered result set: the raw
//! text `offset:<n>` encoded with standard base64. Cursors are meaningful
//! only to this codec; they are not stable across changes to the underlying
//! ordering or filter.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{RelayError, RelayResult};

const RAW_PREFIX: &str = "offset:";

/// Raw form of the sentinel returned for the start/end cursors of an empty
/// page. It deliberately does not decode to a position.
const EMPTY_RAW: &str = "offset:empty";

/// Encode a list position as an opaque cursor string.
pub fn encode(position: u64) -> String {
    STANDARD.encode(format!("{RAW_PREFIX}{position}"))
}

/// Decode a cursor back into the position it was encoded from.
///
/// This is the single validation boundary for cursor input: any string that
/// is not a product of [`encode`] fails with [`RelayError::InvalidCursor`],
/// including the empty-page sentinel.
pub fn decode(cursor: &str) -> RelayResult<u64> {
    let invalid = || RelayError::InvalidCursor(cursor.to_string());
    let bytes = STANDARD.decode(cursor).map_err(|_| invalid())?;
    let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
    let digits = raw.strip_prefix(RAW_PREFIX).ok_or_else(invalid)?;
    // `u64::from_str` accepts a leading `+`, which `encode` never produces.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    digits.parse().map_err(|_| invalid())
}

/// The sentinel cursor used for `startCursor`/`endCursor` of an empty page.
pub fn empty() -> String {
    STANDARD.encode(EMPTY_RAW)
}

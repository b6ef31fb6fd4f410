//! Translation of Relay pagination arguments into a fetch window.
//! See: https://relay.dev/graphql/connections.htm#sec-Arguments
//!
//! Windows are always expressed as offset/limit because the only store
//! contract this engine requires is offset/limit fetch. This keeps the
//! adapter surface minimal at the cost of cursor stability under concurrent
//! mutation, which is an accepted trade-off.

use crate::{config::PagePrecedence, cursor, RelayError, RelayResult};

/// Direction of a paginated query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

/// Client-supplied Relay connection arguments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub first: Option<i64>,
    pub after: Option<String>,
    pub last: Option<i64>,
    pub before: Option<String>,
}

impl ConnectionArgs {
    /// Reject negative `first`/`last` values.
    pub fn validate(&self) -> RelayResult<()> {
        for (name, value) in [("first", self.first), ("last", self.last)] {
            if let Some(value) = value {
                if value < 0 {
                    return Err(RelayError::NegativePageArgument { name, value });
                }
            }
        }
        Ok(())
    }

    /// Whether translating these arguments requires the total list length.
    ///
    /// True exactly when backward pagination is active without a `before`
    /// cursor to anchor the upper edge of the window. Callers that cannot
    /// supply the length up front probe the store for it first.
    pub fn needs_total_count(&self, precedence: PagePrecedence) -> bool {
        self.last_is_active(precedence) && self.before.is_none()
    }

    fn last_is_active(&self, precedence: PagePrecedence) -> bool {
        match precedence {
            PagePrecedence::FirstWins => self.first.is_none() && self.last.is_some(),
            PagePrecedence::LastWins => self.last.is_some(),
        }
    }
}

/// The offset/limit window a store fetch must satisfy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FetchWindow {
    pub offset: u64,
    pub limit: u64,
    pub direction: PageDirection,
}

/// Translate connection arguments into a [`FetchWindow`].
///
/// Negative `first`/`last` values are rejected before anything else, so a
/// malformed request can never reach a fetch. When both `first` and `last`
/// are supplied, `precedence` decides which side wins. Backward windows
/// anchor on the `before` cursor when present and on `total_count`
/// otherwise; if neither is known the translation fails with
/// [`RelayError::UnknownListLength`].
pub fn translate(
    args: &ConnectionArgs,
    default_page_size: u64,
    total_count: Option<u64>,
    precedence: PagePrecedence,
) -> RelayResult<FetchWindow> {
    args.validate()?;

    if args.last_is_active(precedence) {
        let last = args.last.unwrap_or_default() as u64;
        let before_offset = match &args.before {
            Some(before) => cursor::decode(before)?,
            None => total_count.ok_or(RelayError::UnknownListLength)?,
        };
        return Ok(FetchWindow {
            offset: before_offset.saturating_sub(last),
            // The window must not cross the `before` position.
            limit: last.min(before_offset),
            direction: PageDirection::Backward,
        });
    }

    let offset = match &args.after {
        Some(after) => cursor::decode(after)?
            .checked_add(1)
            .ok_or_else(|| RelayError::InvalidCursor(after.clone()))?,
        None => 0,
    };
    Ok(FetchWindow {
        offset,
        limit: args.first.map(|first| first as u64).unwrap_or(default_page_size),
        direction: PageDirection::Forward,
    })
}

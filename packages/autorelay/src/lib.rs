//! # autorelay
//!
//! `autorelay` augments an `async_graphql::dynamic` schema with Relay
//! cursor-based connections without hand-written boilerplate per entity
//! relationship.
//! See: https://relay.dev/graphql/connections.htm
//!
//! The crate is organized around four pure pieces and one boundary adapter:
//!
//! - [`cursor`] encodes list positions as opaque cursor strings and is the
//!   single validation boundary for cursor input.
//! - [`paging`] translates Relay connection arguments (`first`, `after`,
//!   `last`, `before`) into an offset/limit fetch window.
//! - [`registry`] synthesizes and memoizes the paired `Edge`/`Connection`
//!   type shapes for an entity, or for an entity pair linked by a through
//!   relation.
//! - [`connection`] assembles a fetched slice plus a total count into a
//!   Relay-compliant connection payload.
//! - [`resolve`] binds `(owner, field)` pairs to fetch logic and drives the
//!   translate/fetch/assemble pipeline behind a dynamic schema field.
//!
//! How the underlying store is queried is not defined here; adapters
//! implement [`resolve::StoreAdapter`] against a plain offset/limit
//! contract.

pub mod config;
pub mod connection;
pub mod cursor;
pub mod defaults;
pub mod paging;
pub mod registry;
pub mod resolve;
pub mod shape;

use thiserror::Error;
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no PageInfo shape is registered; set one on the engine config before building a type registry")]
    MissingPageInfoShape,
    #[error("no store adapter is registered; related-field bindings require one on the engine config")]
    MissingStoreAdapter,
    #[error("Reserved type name: {0:?}")]
    ReservedTypeName(String),
    #[error("Generated type name collides with an existing generation: {0:?}")]
    DuplicateTypeName(String),
    #[error("Pagination argument {name:?} must be non-negative, got {value}")]
    NegativePageArgument { name: &'static str, value: i64 },
    #[error("Invalid cursor: {0:?}")]
    InvalidCursor(String),
    #[error("Cannot page from the end of a list of unknown length")]
    UnknownListLength,
    #[error("No connection binding for {0:?}.{1:?}")]
    UnboundField(String, String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[cfg(test)]
pub(crate) mod test {
    pub use assert_matches::*;
    pub use async_graphql::dynamic::*;
    pub use extension_trait::*;
    pub use graphql_parser::*;
    pub use insta::*;

    #[extension_trait]
    pub impl SchemaTestExt for Schema {
        fn test_build() -> SchemaBuilder {
            let mut schema = Schema::build("Query", None, None);

            // Insert a dummy query to avoid erroring from the lack of it.
            let query = Object::new("Query").field(Field::new(
                "dummy",
                TypeRef::named("Int"),
                |_| unimplemented!(),
            ));
            schema = schema.register(query);

            schema
        }

        fn pretty_sdl(&self) -> String {
            let sdl = self.sdl();
            let ugly = parse_schema::<&str>(&sdl).unwrap();
            ugly.format(&Style::default())
        }
    }
}

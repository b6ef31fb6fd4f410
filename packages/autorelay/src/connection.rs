//! Connection payload assembly.
//! See: https://relay.dev/graphql/connections.htm#sec-Connection-Types
//!
//! Assembly is pure: a fetched slice, the window it was fetched with, and
//! the total count fully determine the payload. Edge order equals input
//! order; the engine never re-sorts.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{config::ConnectionExtension, cursor, paging::FetchWindow};

pub type JsonMap = Map<String, Value>;

/// See: https://relay.dev/graphql/connections.htm#sec-undefined.PageInfo
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: String,
    pub end_cursor: String,
}

/// A single result plus its cursor and any relationship metadata.
#[derive(Clone, Debug, Serialize)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// A paginated result wrapper containing edges and page metadata.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Build a connection payload from a fetched slice.
///
/// The `i`-th item's cursor encodes the absolute position
/// `window.offset + i`. `edge_extra` fills per-row relationship metadata;
/// `extension` fields are computed from the raw total count. The payload
/// never reports more edges than items were actually returned.
pub fn assemble<T>(
    items: Vec<T>,
    window: &FetchWindow,
    total_count: u64,
    edge_extra: Option<&(dyn Fn(&T) -> JsonMap + Send + Sync)>,
    extension: Option<&ConnectionExtension>,
) -> Connection<T> {
    let offset = if window.offset > total_count {
        warn!(
            offset = window.offset,
            total_count, "fetch window starts past the total count; clamping"
        );
        total_count
    } else {
        window.offset
    };

    let edges: Vec<Edge<T>> = items
        .into_iter()
        .enumerate()
        .map(|(i, node)| Edge {
            cursor: cursor::encode(offset + i as u64),
            extra: edge_extra.map(|f| f(&node)).unwrap_or_default(),
            node,
        })
        .collect();

    let page_info = PageInfo {
        has_next_page: (offset + edges.len() as u64) < total_count,
        has_previous_page: offset > 0,
        start_cursor: edges
            .first()
            .map(|e| e.cursor.clone())
            .unwrap_or_else(cursor::empty),
        end_cursor: edges
            .last()
            .map(|e| e.cursor.clone())
            .unwrap_or_else(cursor::empty),
    };

    let mut extra = JsonMap::new();
    if let Some(extension) = extension {
        for field in &extension.fields {
            extra.insert(field.shape.name.clone(), (field.resolve)(total_count));
        }
    }

    Connection {
        edges,
        page_info,
        extra,
    }
}

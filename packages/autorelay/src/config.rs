//! Engine configuration.
//!
//! One configuration value is built during startup wiring and shared by
//! reference from then on; nothing here is mutated once [`EngineConfigBuilder::finish`]
//! has run. Components that require a missing registration fail with a
//! configuration error instead of falling back.

use std::sync::Arc;

use async_graphql::dynamic::TypeRef;
use serde_json::{json, Value};

use crate::{
    defaults,
    resolve::StoreAdapter,
    shape::{FieldShape, ShapeType, TypeShape},
};

/// Policy applied when a request supplies both `first` and `last`.
///
/// The Relay spec leaves the combination to the server. The engine defaults
/// to letting `first` win but the opposite reading is available for hosts
/// that prefer it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PagePrecedence {
    #[default]
    FirstWins,
    LastWins,
}

/// Computes a connection-extension field value from the raw total count.
pub type TotalCountFn = Arc<dyn Fn(u64) -> Value + Send + Sync>;

/// A field added to every generated connection shape, backed by a callback
/// invoked with the raw total count at assembly time.
#[derive(Clone)]
pub struct ExtensionField {
    pub shape: FieldShape,
    pub resolve: TotalCountFn,
}

/// Fields grafted onto every generated connection shape.
#[derive(Clone, Default)]
pub struct ConnectionExtension {
    pub fields: Vec<ExtensionField>,
}

impl ConnectionExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, shape: FieldShape, resolve: TotalCountFn) -> Self {
        self.fields.push(ExtensionField { shape, resolve });
        self
    }

    /// The common `totalCount: Int!` extension.
    pub fn total_count() -> Self {
        Self::new().field(
            FieldShape::new("totalCount", ShapeType::named_nn(TypeRef::INT)),
            Arc::new(|total| json!(total)),
        )
    }
}

/// Fields grafted onto every generated edge shape. Per-row values are filled
/// by the edge-extra extractor supplied at assembly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeExtension {
    pub fields: Vec<FieldShape>,
}

impl EdgeExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, shape: FieldShape) -> Self {
        self.fields.push(shape);
        self
    }
}

/// Immutable engine configuration, built once at process start.
pub struct EngineConfig {
    page_info: Option<TypeShape>,
    connection_extension: Option<ConnectionExtension>,
    edge_extension: Option<EdgeExtension>,
    store_adapter: Option<Arc<dyn StoreAdapter>>,
    default_page_size: u64,
    precedence: PagePrecedence,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    pub fn page_info(&self) -> Option<&TypeShape> {
        self.page_info.as_ref()
    }

    pub fn connection_extension(&self) -> Option<&ConnectionExtension> {
        self.connection_extension.as_ref()
    }

    pub fn edge_extension(&self) -> Option<&EdgeExtension> {
        self.edge_extension.as_ref()
    }

    pub fn store_adapter(&self) -> Option<&Arc<dyn StoreAdapter>> {
        self.store_adapter.as_ref()
    }

    pub fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    pub fn precedence(&self) -> PagePrecedence {
        self.precedence
    }
}

pub struct EngineConfigBuilder {
    page_info: Option<TypeShape>,
    connection_extension: Option<ConnectionExtension>,
    edge_extension: Option<EdgeExtension>,
    store_adapter: Option<Arc<dyn StoreAdapter>>,
    default_page_size: u64,
    precedence: PagePrecedence,
}

impl EngineConfigBuilder {
    fn new() -> Self {
        EngineConfigBuilder {
            page_info: None,
            connection_extension: None,
            edge_extension: None,
            store_adapter: None,
            default_page_size: defaults::DEFAULT_PAGE_SIZE,
            precedence: PagePrecedence::default(),
        }
    }

    pub fn page_info(mut self, shape: TypeShape) -> Self {
        self.page_info = Some(shape);
        self
    }

    /// Register the standard Relay `PageInfo` shape.
    pub fn standard_page_info(self) -> Self {
        self.page_info(TypeShape::page_info())
    }

    pub fn connection_extension(mut self, extension: ConnectionExtension) -> Self {
        self.connection_extension = Some(extension);
        self
    }

    pub fn edge_extension(mut self, extension: EdgeExtension) -> Self {
        self.edge_extension = Some(extension);
        self
    }

    pub fn store_adapter(mut self, adapter: Arc<dyn StoreAdapter>) -> Self {
        self.store_adapter = Some(adapter);
        self
    }

    pub fn default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn precedence(mut self, precedence: PagePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn finish(self) -> Arc<EngineConfig> {
        Arc::new(EngineConfig {
            page_info: self.page_info,
            connection_extension: self.connection_extension,
            edge_extension: self.edge_extension,
            store_adapter: self.store_adapter,
            default_page_size: self.default_page_size,
            precedence: self.precedence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = EngineConfig::builder().finish();
        assert_eq!(config.default_page_size(), defaults::DEFAULT_PAGE_SIZE);
        assert_eq!(config.precedence(), PagePrecedence::FirstWins);
        assert!(config.page_info().is_none());
        assert!(config.store_adapter().is_none());
    }

    #[test]
    fn total_count_extension_reports_the_raw_total() {
        let extension = ConnectionExtension::total_count();
        assert_eq!(extension.fields.len(), 1);
        assert_eq!(extension.fields[0].shape.name, "totalCount");
        assert_eq!((extension.fields[0].resolve)(7), json!(7));
    }
}

//! Connection resolution.
//!
//! Bindings are registered explicitly during startup wiring: a capability
//! table maps `(owner type, field name)` to the fetch logic for that
//! relationship. At request time the binder translates the client's
//! connection arguments, runs the fetch (the sole suspension point), and
//! assembles the payload. Fetch failures propagate unchanged; this boundary
//! neither retries nor rewraps store errors.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, ResolverContext, TypeRef};
use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::{
    config::EngineConfig,
    connection::{assemble, Connection, JsonMap},
    paging::{translate, ConnectionArgs, FetchWindow, PageDirection},
    registry::ConnectionShapes,
    shape::FieldPagingExt,
    RelayError, RelayResult,
};

/// One fetched page plus the un-windowed total.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchPage {
    pub items: Vec<Value>,
    pub total_count: u64,
}

/// Offset/limit access to stored rows.
///
/// Implementations must return at most `window.limit` items starting at
/// `window.offset` within the relation's ordering, and `total_count` as the
/// count of all matching rows ignoring the window.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn fetch_related(
        &self,
        owner: Option<&Value>,
        relation: &str,
        window: &FetchWindow,
        order: Option<&str>,
    ) -> anyhow::Result<FetchPage>;
}

pub type FetchFuture = Pin<Box<dyn Future<Output = anyhow::Result<FetchPage>> + Send>>;
pub type FetchFn = Arc<dyn Fn(FetchWindow) -> FetchFuture + Send + Sync>;
pub type EdgeExtraFn = Arc<dyn Fn(&Value) -> JsonMap + Send + Sync>;

enum BindingSource {
    Fetch(FetchFn),
    Related {
        relation: String,
        order: Option<String>,
    },
}

/// The fetch logic bound to one `(owner, field)` pair.
pub struct ConnectionBinding {
    source: BindingSource,
    edge_extra: Option<EdgeExtraFn>,
}

impl ConnectionBinding {
    /// Bind a user-supplied fetch function.
    pub fn fetch(fetch: impl Fn(FetchWindow) -> FetchFuture + Send + Sync + 'static) -> Self {
        ConnectionBinding {
            source: BindingSource::Fetch(Arc::new(fetch)),
            edge_extra: None,
        }
    }

    /// Delegate fetching to the configured store adapter.
    pub fn related(relation: impl Into<String>) -> Self {
        ConnectionBinding {
            source: BindingSource::Related {
                relation: relation.into(),
                order: None,
            },
            edge_extra: None,
        }
    }

    /// Set the ordering passed to the store adapter. Only meaningful for
    /// `related` bindings.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        if let BindingSource::Related { order: slot, .. } = &mut self.source {
            *slot = Some(order.into());
        }
        self
    }

    /// Extract per-row edge metadata (e.g. through-relation fields) from a
    /// fetched row.
    pub fn edge_extra(mut self, extract: impl Fn(&Value) -> JsonMap + Send + Sync + 'static) -> Self {
        self.edge_extra = Some(Arc::new(extract));
        self
    }
}

fn binding_key(owner: &str, field: &str) -> String {
    format!("{owner}.{field}")
}

/// Intercepts bound connection fields and drives the
/// translate/fetch/assemble pipeline.
pub struct ResolverBinder {
    config: Arc<EngineConfig>,
    bindings: HashMap<String, ConnectionBinding>,
}

impl ResolverBinder {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        ResolverBinder {
            config,
            bindings: HashMap::new(),
        }
    }

    /// Register the binding for `owner.field`. Wiring happens once at
    /// startup; the table is read-only afterwards.
    pub fn bind(
        &mut self,
        owner: impl Into<String>,
        field: impl Into<String>,
        binding: ConnectionBinding,
    ) -> &mut Self {
        self.bindings
            .insert(binding_key(&owner.into(), &field.into()), binding);
        self
    }

    /// Resolve one connection request.
    pub async fn resolve(
        &self,
        owner: &str,
        field: &str,
        args: &ConnectionArgs,
        parent: Option<&Value>,
    ) -> RelayResult<Connection<Value>> {
        let binding = self
            .bindings
            .get(&binding_key(owner, field))
            .ok_or_else(|| RelayError::UnboundField(owner.to_string(), field.to_string()))?;

        // Malformed arguments must never reach a fetch, including the
        // total-count probe.
        args.validate()?;

        let precedence = self.config.precedence();
        let total_hint = if args.needs_total_count(precedence) {
            // A backward page with no anchor needs the list length; a
            // zero-limit window obtains it without pulling rows.
            let probe = FetchWindow {
                offset: 0,
                limit: 0,
                direction: PageDirection::Forward,
            };
            trace!(owner, field, "probing store for total count");
            Some(self.run_fetch(binding, probe, parent).await?.total_count)
        } else {
            None
        };

        let window = translate(args, self.config.default_page_size(), total_hint, precedence)?;
        let page = self.run_fetch(binding, window, parent).await?;
        Ok(assemble(
            page.items,
            &window,
            page.total_count,
            binding.edge_extra.as_deref(),
            self.config.connection_extension(),
        ))
    }

    async fn run_fetch(
        &self,
        binding: &ConnectionBinding,
        window: FetchWindow,
        parent: Option<&Value>,
    ) -> RelayResult<FetchPage> {
        match &binding.source {
            BindingSource::Fetch(fetch) => fetch(window).await.map_err(RelayError::Store),
            BindingSource::Related { relation, order } => {
                let adapter = self
                    .config
                    .store_adapter()
                    .ok_or(RelayError::MissingStoreAdapter)?;
                adapter
                    .fetch_related(parent, relation, &window, order.as_deref())
                    .await
                    .map_err(RelayError::Store)
            }
        }
    }

    /// Build the dynamic schema field for a bound connection: the Relay
    /// paging arguments plus a resolver that runs [`ResolverBinder::resolve`]
    /// and hands the payload to the host as a JSON value.
    pub fn connection_field(
        self: &Arc<Self>,
        owner: impl Into<String>,
        field: impl Into<String>,
        shapes: &ConnectionShapes,
    ) -> Field {
        let owner = owner.into();
        let field_name = field.into();
        let binder = Arc::clone(self);
        let connection_ty = shapes.connection.name.clone();
        Field::new(
            field_name.clone(),
            TypeRef::named_nn(connection_ty),
            move |ctx| {
                let binder = Arc::clone(&binder);
                let owner = owner.clone();
                let field_name = field_name.clone();
                FieldFuture::new(async move {
                    let args = connection_args(&ctx)?;
                    // Root fields see a null parent; only real owner values
                    // reach the store adapter.
                    let parent = ctx
                        .parent_value
                        .as_value()
                        .filter(|value| **value != async_graphql::Value::Null)
                        .map(|value| value.clone().into_json())
                        .transpose()?;
                    let connection = binder
                        .resolve(&owner, &field_name, &args, parent.as_ref())
                        .await?;
                    let payload =
                        async_graphql::Value::from_json(serde_json::to_value(&connection)?)?;
                    Ok(Some(FieldValue::value(payload)))
                })
            },
        )
        .paging_arguments()
    }
}

fn connection_args(ctx: &ResolverContext) -> async_graphql::Result<ConnectionArgs> {
    Ok(ConnectionArgs {
        first: int_arg(ctx, "first")?,
        after: string_arg(ctx, "after")?,
        last: int_arg(ctx, "last")?,
        before: string_arg(ctx, "before")?,
    })
}

fn int_arg(ctx: &ResolverContext, name: &str) -> async_graphql::Result<Option<i64>> {
    ctx.args.get(name).map(|value| value.i64()).transpose()
}

fn string_arg(ctx: &ResolverContext, name: &str) -> async_graphql::Result<Option<String>> {
    ctx.args
        .get(name)
        .map(|value| value.string().map(str::to_string))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::EngineConfig, cursor, test::*};
    use serde_json::json;
    use std::sync::Mutex;

    struct Shelf {
        rows: Vec<Value>,
        windows: Mutex<Vec<FetchWindow>>,
    }

    impl Shelf {
        fn new(count: usize) -> Arc<Self> {
            Arc::new(Shelf {
                rows: (0..count)
                    .map(|i| json!({ "id": i, "title": format!("book-{i}") }))
                    .collect(),
                windows: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl StoreAdapter for Shelf {
        async fn fetch_related(
            &self,
            _owner: Option<&Value>,
            relation: &str,
            window: &FetchWindow,
            _order: Option<&str>,
        ) -> anyhow::Result<FetchPage> {
            if relation == "missing" {
                anyhow::bail!("relation not found: {relation}");
            }
            self.windows.lock().unwrap().push(*window);
            let items = self
                .rows
                .iter()
                .skip(window.offset as usize)
                .take(window.limit as usize)
                .cloned()
                .collect();
            Ok(FetchPage {
                items,
                total_count: self.rows.len() as u64,
            })
        }
    }

    fn binder_for(shelf: Arc<Shelf>) -> ResolverBinder {
        let config = EngineConfig::builder()
            .standard_page_info()
            .store_adapter(shelf)
            .finish();
        let mut binder = ResolverBinder::new(config);
        binder.bind("Query", "books", ConnectionBinding::related("books"));
        binder
    }

    fn titles(connection: &Connection<Value>) -> Vec<String> {
        connection
            .edges
            .iter()
            .map(|e| e.node["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn resolves_a_forward_page_through_the_adapter() {
        let shelf = Shelf::new(5);
        let binder = binder_for(Arc::clone(&shelf));

        let args = ConnectionArgs {
            first: Some(2),
            ..Default::default()
        };
        let connection = binder.resolve("Query", "books", &args, None).await.unwrap();

        assert_eq!(titles(&connection), ["book-0", "book-1"]);
        assert!(connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);
        assert_eq!(connection.page_info.end_cursor, cursor::encode(1));
    }

    #[tokio::test]
    async fn probes_for_the_total_on_last_only_queries() {
        let shelf = Shelf::new(10);
        let binder = binder_for(Arc::clone(&shelf));

        let args = ConnectionArgs {
            last: Some(2),
            ..Default::default()
        };
        let connection = binder.resolve("Query", "books", &args, None).await.unwrap();

        assert_eq!(titles(&connection), ["book-8", "book-9"]);
        assert!(!connection.page_info.has_next_page);
        assert!(connection.page_info.has_previous_page);

        let windows = shelf.windows.lock().unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].limit, 0);
        assert_eq!(windows[1].offset, 8);
        assert_eq!(windows[1].limit, 2);
    }

    #[tokio::test]
    async fn user_fetch_functions_are_supported() {
        let config = EngineConfig::builder().standard_page_info().finish();
        let mut binder = ResolverBinder::new(config);
        binder.bind(
            "Query",
            "numbers",
            ConnectionBinding::fetch(|window| {
                Box::pin(async move {
                    let items = (window.offset..window.offset + window.limit)
                        .map(|i| json!(i))
                        .collect();
                    Ok(FetchPage {
                        items,
                        total_count: 100,
                    })
                })
            }),
        );

        let args = ConnectionArgs {
            first: Some(3),
            after: Some(cursor::encode(9)),
            ..Default::default()
        };
        let connection = binder
            .resolve("Query", "numbers", &args, None)
            .await
            .unwrap();
        let nodes: Vec<u64> = connection
            .edges
            .iter()
            .map(|e| e.node.as_u64().unwrap())
            .collect();
        assert_eq!(nodes, [10, 11, 12]);
    }

    #[tokio::test]
    async fn edge_extras_surface_row_metadata() {
        let shelf = Shelf::new(2);
        let config = EngineConfig::builder()
            .standard_page_info()
            .store_adapter(shelf)
            .finish();
        let mut binder = ResolverBinder::new(config);
        binder.bind(
            "Query",
            "books",
            ConnectionBinding::related("books").edge_extra(|row| {
                let mut extra = JsonMap::new();
                extra.insert("titleLength".to_string(), json!(row["title"].as_str().unwrap().len()));
                extra
            }),
        );

        let args = ConnectionArgs {
            first: Some(1),
            ..Default::default()
        };
        let connection = binder.resolve("Query", "books", &args, None).await.unwrap();
        assert_eq!(connection.edges[0].extra["titleLength"], json!(6));
    }

    #[tokio::test]
    async fn unbound_fields_are_a_configuration_error() {
        let binder = binder_for(Shelf::new(1));
        let err = binder
            .resolve("Query", "films", &ConnectionArgs::default(), None)
            .await
            .unwrap_err();
        assert_matches!(err, RelayError::UnboundField(owner, field) if owner == "Query" && field == "films");
    }

    #[tokio::test]
    async fn related_bindings_require_an_adapter() {
        let config = EngineConfig::builder().standard_page_info().finish();
        let mut binder = ResolverBinder::new(config);
        binder.bind("Query", "books", ConnectionBinding::related("books"));
        let err = binder
            .resolve("Query", "books", &ConnectionArgs::default(), None)
            .await
            .unwrap_err();
        assert_matches!(err, RelayError::MissingStoreAdapter);
    }

    #[tokio::test]
    async fn store_errors_pass_through_unchanged() {
        let shelf = Shelf::new(1);
        let config = EngineConfig::builder()
            .standard_page_info()
            .store_adapter(shelf)
            .finish();
        let mut binder = ResolverBinder::new(config);
        binder.bind("Query", "broken", ConnectionBinding::related("missing"));

        let err = binder
            .resolve("Query", "broken", &ConnectionArgs::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "relation not found: missing");
    }

    #[tokio::test]
    async fn negative_arguments_fail_before_any_fetch() {
        let shelf = Shelf::new(5);
        let binder = binder_for(Arc::clone(&shelf));

        // `last: -1` would otherwise trigger the total-count probe.
        for args in [
            ConnectionArgs {
                first: Some(-1),
                ..Default::default()
            },
            ConnectionArgs {
                last: Some(-1),
                ..Default::default()
            },
        ] {
            let err = binder
                .resolve("Query", "books", &args, None)
                .await
                .unwrap_err();
            assert_matches!(err, RelayError::NegativePageArgument { .. });
        }
        assert!(shelf.windows.lock().unwrap().is_empty());
    }
}

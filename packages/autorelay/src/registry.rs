//! Edge/Connection shape synthesis.
//! See: https://relay.dev/graphql/connections.htm#sec-Connection-Types
//!
//! Shapes are generated lazily on first request for a `(node, through)`
//! pair and memoized for the lifetime of the process; the host schema
//! builder forbids duplicate type names, so repeated requests must observe
//! the same generation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_graphql::dynamic::{SchemaBuilder, TypeRef};
use lazy_static::lazy_static;
use tracing::{debug, warn};

use crate::{
    config::EngineConfig,
    shape::{FieldShape, ShapeType, TypeRefRelayExt, TypeShape},
    RelayError, RelayResult,
};

lazy_static! {
    /// Type names owned by the engine or the host root; node shapes may not
    /// take them.
    static ref RESERVED_TYPE_NAMES: HashSet<&'static str> =
        HashSet::from(["PageInfo", "Node", "Query", "Mutation", "Subscription"]);
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TypeKey {
    node: String,
    through: Option<String>,
}

/// An intermediate association entity carrying metadata about the link
/// between `source` and the node a connection is generated for. Its declared
/// fields surface on the generated edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThroughRelation {
    pub source: String,
    pub shape: TypeShape,
}

impl ThroughRelation {
    pub fn new(source: impl Into<String>, shape: TypeShape) -> Self {
        ThroughRelation {
            source: source.into(),
            shape,
        }
    }
}

/// The generated pair for one cache key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionShapes {
    pub edge: TypeShape,
    pub connection: TypeShape,
}

#[derive(Default)]
struct Generations {
    shapes: HashMap<TypeKey, Arc<ConnectionShapes>>,
    // Generated base name -> key that produced it, for collision detection.
    names: HashMap<String, TypeKey>,
}

/// Memoizing factory for Edge/Connection shape pairs.
pub struct TypeRegistry {
    config: Arc<EngineConfig>,
    page_info: TypeShape,
    generations: RwLock<Generations>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry").finish_non_exhaustive()
    }
}

impl TypeRegistry {
    /// Fails if the config carries no PageInfo shape; generated connections
    /// reference it, so registering one is a hard precondition.
    pub fn new(config: Arc<EngineConfig>) -> RelayResult<Self> {
        let page_info = config
            .page_info()
            .cloned()
            .ok_or(RelayError::MissingPageInfoShape)?;
        Ok(TypeRegistry {
            config,
            page_info,
            generations: RwLock::new(Generations::default()),
        })
    }

    /// Produce or retrieve the Edge/Connection pair for a node shape,
    /// optionally linked through an association relation.
    ///
    /// Idempotent: repeated calls with the same `(node, through)` key return
    /// the same `Arc`. Names follow `<Node>Edge`/`<Node>Connection`, or
    /// `<Source>To<Node>…` when a through relation links two distinct node
    /// types.
    pub fn get_or_create(
        &self,
        node: &TypeShape,
        through: Option<&ThroughRelation>,
    ) -> RelayResult<Arc<ConnectionShapes>> {
        if RESERVED_TYPE_NAMES.contains(node.name.as_str()) {
            return Err(RelayError::ReservedTypeName(node.name.clone()));
        }

        let key = TypeKey {
            node: node.name.clone(),
            through: through.map(|t| t.shape.name.clone()),
        };

        if let Some(shapes) = self
            .generations
            .read()
            .expect("type registry lock poisoned")
            .shapes
            .get(&key)
        {
            return Ok(Arc::clone(shapes));
        }

        let base = match through {
            Some(t) if t.source != node.name => {
                format!("{}To{}", t.source, node.name)
            }
            _ => node.name.clone(),
        };
        let shapes = Arc::new(self.generate(&base, node, through));

        let mut generations = self
            .generations
            .write()
            .expect("type registry lock poisoned");
        // A concurrent first use may have won the race; return its shapes so
        // every caller observes one generation per key.
        if let Some(existing) = generations.shapes.get(&key) {
            return Ok(Arc::clone(existing));
        }
        if let Some(holder) = generations.names.get(&base) {
            if *holder != key {
                return Err(RelayError::DuplicateTypeName(base));
            }
        }
        debug!(node = %node.name, edge = %shapes.edge.name, "synthesized connection shapes");
        generations.names.insert(base, key.clone());
        generations.shapes.insert(key, Arc::clone(&shapes));
        Ok(shapes)
    }

    fn generate(
        &self,
        base: &str,
        node: &TypeShape,
        through: Option<&ThroughRelation>,
    ) -> ConnectionShapes {
        let mut edge = TypeShape::new(TypeRef::edge(base))
            .field(FieldShape::new(
                "cursor",
                ShapeType::named_nn(TypeRef::STRING),
            ))
            .field(FieldShape::new(
                "node",
                ShapeType::named_nn(node.name.clone()),
            ));
        if let Some(through) = through {
            for field in &through.shape.fields {
                if field.name == "cursor" || field.name == "node" {
                    warn!(
                        field = %field.name,
                        through = %through.shape.name,
                        "through field shadows a core edge field; skipping"
                    );
                    continue;
                }
                edge = edge.field(field.clone());
            }
        }
        if let Some(extension) = self.config.edge_extension() {
            for field in &extension.fields {
                edge = edge.field(field.clone());
            }
        }

        let mut connection = TypeShape::new(TypeRef::connection(base))
            .field(FieldShape::new("edges", ShapeType::list_nn(edge.name.as_str())))
            .field(FieldShape::new(
                "pageInfo",
                ShapeType::named_nn(TypeRef::PAGE_INFO),
            ));
        if let Some(extension) = self.config.connection_extension() {
            for field in &extension.fields {
                connection = connection.field(field.shape.clone());
            }
        }

        ConnectionShapes { edge, connection }
    }

    /// Register the PageInfo shape and every generated pair into a schema
    /// builder. Call once, after all `get_or_create` calls of the startup
    /// wiring have run.
    pub fn register_into(&self, builder: SchemaBuilder) -> SchemaBuilder {
        let generations = self
            .generations
            .read()
            .expect("type registry lock poisoned");
        generations.shapes.values().fold(
            builder.register(self.page_info.to_object()),
            |builder, shapes| {
                builder
                    .register(shapes.edge.to_object())
                    .register(shapes.connection.to_object())
            },
        )
    }
}

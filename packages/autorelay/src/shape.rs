//! Type-shape descriptors and `async_graphql::dynamic` extensions.
//!
//! Generated Relay types are described as plain [`TypeShape`] data first and
//! only lowered into `async_graphql::dynamic::Object`s when a schema is
//! wired up. Keeping shapes as data lets the registry memoize and compare
//! them without touching the host schema builder, which forbids duplicate
//! registrations.

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, Object, TypeRef,
};
use async_graphql::Value;
use extension_trait::extension_trait;

#[extension_trait]
pub impl TypeRefRelayExt for TypeRef {
    const PAGE_INFO: &'static str = "PageInfo";

    fn edge(node_name: impl Into<String>) -> String {
        format!("{}Edge", node_name.into())
    }

    fn connection(node_name: impl Into<String>) -> String {
        format!("{}Connection", node_name.into())
    }
}

#[extension_trait]
pub impl FieldPagingExt for Field {
    /// Add the Relay pagination arguments to a field.
    /// See: https://relay.dev/graphql/connections.htm#sec-Arguments
    fn paging_arguments(self) -> Self {
        // Forward pagination arguments
        self.argument(
            InputValue::new("first", TypeRef::named(TypeRef::INT)).description(
                "Paginate forward, returning the given amount of edges at most.",
            ),
        )
        .argument(
            InputValue::new("after", TypeRef::named(TypeRef::STRING))
                .description("Return edges after the given cursor."),
        )
        // Backward pagination arguments
        .argument(
            InputValue::new("last", TypeRef::named(TypeRef::INT)).description(
                "Paginate backward, returning the given amount of edges at most.",
            ),
        )
        .argument(
            InputValue::new("before", TypeRef::named(TypeRef::STRING))
                .description("Return edges before the given cursor."),
        )
    }
}

/// The wrapped type of a single field within a shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Named {
        name: String,
        nullable: bool,
    },
    List {
        name: String,
        nullable: bool,
        nullable_elements: bool,
    },
}

impl ShapeType {
    pub fn named(name: impl Into<String>) -> Self {
        ShapeType::Named {
            name: name.into(),
            nullable: true,
        }
    }

    pub fn named_nn(name: impl Into<String>) -> Self {
        ShapeType::Named {
            name: name.into(),
            nullable: false,
        }
    }

    /// A non-null list with nullable elements, i.e. `[T]!`.
    pub fn list_nn(name: impl Into<String>) -> Self {
        ShapeType::List {
            name: name.into(),
            nullable: false,
            nullable_elements: true,
        }
    }

    pub fn to_type_ref(&self) -> TypeRef {
        match self {
            ShapeType::Named { name, nullable } => {
                if *nullable {
                    TypeRef::named(name.to_string())
                } else {
                    TypeRef::named_nn(name.to_string())
                }
            }
            ShapeType::List {
                name,
                nullable,
                nullable_elements,
            } => {
                if *nullable && *nullable_elements {
                    TypeRef::named_list(name.to_string())
                } else if *nullable && !*nullable_elements {
                    TypeRef::named_nn_list(name.to_string())
                } else if !*nullable && *nullable_elements {
                    TypeRef::named_list_nn(name.to_string())
                } else {
                    TypeRef::named_nn_list_nn(name.to_string())
                }
            }
        }
    }
}

/// A named field within a [`TypeShape`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldShape {
    pub name: String,
    pub ty: ShapeType,
}

impl FieldShape {
    pub fn new(name: impl Into<String>, ty: ShapeType) -> Self {
        FieldShape {
            name: name.into(),
            ty,
        }
    }
}

/// A described output type: a name plus its declared fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeShape {
    pub name: String,
    pub fields: Vec<FieldShape>,
}

impl TypeShape {
    pub fn new(name: impl Into<String>) -> Self {
        TypeShape {
            name: name.into(),
            fields: vec![],
        }
    }

    pub fn field(mut self, field: FieldShape) -> Self {
        self.fields.push(field);
        self
    }

    /// The standard Relay `PageInfo` shape.
    /// See: https://relay.dev/graphql/connections.htm#sec-PageInfo
    pub fn page_info() -> Self {
        TypeShape::new(TypeRef::PAGE_INFO)
            .field(FieldShape::new(
                "hasNextPage",
                ShapeType::named_nn(TypeRef::BOOLEAN),
            ))
            .field(FieldShape::new(
                "hasPreviousPage",
                ShapeType::named_nn(TypeRef::BOOLEAN),
            ))
            .field(FieldShape::new(
                "startCursor",
                ShapeType::named(TypeRef::STRING),
            ))
            .field(FieldShape::new(
                "endCursor",
                ShapeType::named(TypeRef::STRING),
            ))
    }

    /// Lower the shape into a dynamic object whose fields resolve against a
    /// JSON parent value keyed by field name. The engine hands every payload
    /// to the host as such a value, so generated types and caller-described
    /// node types resolve uniformly.
    pub fn to_object(&self) -> Object {
        self.fields
            .iter()
            .fold(Object::new(self.name.clone()), |obj, field| {
                let key = field.name.clone();
                obj.field(Field::new(
                    field.name.clone(),
                    field.ty.to_type_ref(),
                    move |ctx| {
                        let key = key.clone();
                        FieldFuture::new(async move {
                            Ok(json_child(ctx.parent_value.as_value(), &key))
                        })
                    },
                ))
            })
    }
}

/// Select `key` out of a JSON object parent, lifting lists into field lists.
fn json_child<'a>(parent: Option<&Value>, key: &str) -> Option<FieldValue<'a>> {
    let child = match parent {
        Some(Value::Object(map)) => map.get(key).cloned(),
        _ => None,
    };
    match child {
        None | Some(Value::Null) => None,
        Some(Value::List(items)) => Some(FieldValue::list(
            items.into_iter().map(FieldValue::value),
        )),
        Some(value) => Some(FieldValue::value(value)),
    }
}

//! Resource type schemas.
//!
//! A [`Schema`] describes the attributes and nested blocks of a resource
//! type as reported by its provider. It determines the implied value type,
//! which attributes the provider may compute, and which attributes are
//! statically sensitive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::{Path, PathStep, Type, Value};

/// Schema of one block: named attributes plus nested block types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested block types by name.
    #[serde(default)]
    pub block_types: BTreeMap<String, NestedBlock>,
}

/// Schema of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Must be set in configuration.
    #[serde(default)]
    pub required: bool,
    /// May be set in configuration.
    #[serde(default)]
    pub optional: bool,
    /// May be decided by the provider.
    #[serde(default)]
    pub computed: bool,
    /// Must never be displayed.
    #[serde(default)]
    pub sensitive: bool,
}

/// A nested block type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// How instances of the block are collected.
    pub nesting: Nesting,
    /// Schema of each block instance.
    pub block: Schema,
}

/// Nesting mode of a nested block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nesting {
    /// At most one block, as an object.
    Single,
    /// Ordered blocks, as a list of objects.
    List,
    /// Unordered blocks, as a set of objects.
    Set,
    /// Labelled blocks, as a map of objects.
    Map,
}

/// Schemas for every resource type a provider supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Resource type schemas and their versions.
    #[serde(default)]
    pub resource_types: BTreeMap<String, VersionedSchema>,
    /// Schema for `provider_meta` blocks, if the provider accepts them.
    #[serde(default)]
    pub provider_meta: Option<Schema>,
}

/// A schema together with its version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedSchema {
    /// The schema.
    pub schema: Schema,
    /// Schema version, recorded with stored objects.
    #[serde(default)]
    pub version: u64,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Adds a nested block type.
    #[must_use]
    pub fn with_block(mut self, name: impl Into<String>, nesting: Nesting, block: Self) -> Self {
        self.block_types.insert(name.into(), NestedBlock { nesting, block });
        self
    }

    /// Returns the object type implied by this schema.
    #[must_use]
    pub fn implied_type(&self) -> Type {
        let mut attrs: BTreeMap<String, Type> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.ty.clone()))
            .collect();
        for (name, nested) in &self.block_types {
            let inner = nested.block.implied_type();
            let ty = match nested.nesting {
                Nesting::Single => inner,
                Nesting::List => Type::list(inner),
                Nesting::Set => Type::set(inner),
                Nesting::Map => Type::map(inner),
            };
            attrs.insert(name.clone(), ty);
        }
        Type::Object(attrs)
    }

    /// Returns an object with every attribute and block set to null.
    #[must_use]
    pub fn null_object(&self) -> Value {
        Value::Object(
            self.attributes
                .keys()
                .chain(self.block_types.keys())
                .map(|name| (name.clone(), Value::Null))
                .collect(),
        )
    }

    /// Returns true if this block or any nested block has a sensitive attribute.
    #[must_use]
    pub fn contains_sensitive(&self) -> bool {
        self.attributes.values().any(|a| a.sensitive)
            || self.block_types.values().any(|b| b.block.contains_sensitive())
    }

    /// Returns the paths within `value` that the schema declares sensitive.
    ///
    /// Sensitive attributes are reported even when null. Nested blocks are
    /// inspected per instance.
    #[must_use]
    pub fn sensitive_paths(&self, value: &Value, base: &Path) -> Vec<Path> {
        let mut paths: Vec<Path> = self
            .attributes
            .iter()
            .filter(|(_, attr)| attr.sensitive)
            .map(|(name, _)| base.get_attr(name.clone()))
            .collect();

        if value.is_null() || value.is_unknown() {
            return paths;
        }

        for (name, nested) in &self.block_types {
            if !nested.block.contains_sensitive() {
                continue;
            }
            let Some(block_value) = value.get_attr(name) else {
                continue;
            };
            let block_path = base.get_attr(name.clone());
            match (nested.nesting, block_value) {
                (Nesting::Single, v) => paths.extend(nested.block.sensitive_paths(v, &block_path)),
                (Nesting::List | Nesting::Set, Value::List(items) | Value::Set(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        paths.extend(nested.block.sensitive_paths(item, &block_path.index(i)));
                    }
                }
                (Nesting::Map, Value::Map(entries)) => {
                    for (key, item) in entries {
                        paths.extend(nested.block.sensitive_paths(item, &block_path.key(key.clone())));
                    }
                }
                _ => {}
            }
        }
        paths
    }

    /// Looks up the attribute addressed by `path`, descending through nested
    /// blocks and skipping collection steps.
    #[must_use]
    pub fn attribute_at(&self, path: &Path) -> Option<&Attribute> {
        let mut block = self;
        let mut steps = path.steps().iter().peekable();
        while let Some(step) = steps.next() {
            let PathStep::Attr(name) = step else {
                return None;
            };
            if let Some(attr) = block.attributes.get(name) {
                return Some(attr);
            }
            let nested = block.block_types.get(name)?;
            if nested.nesting != Nesting::Single {
                // A block collection is addressed element-wise.
                if matches!(steps.peek(), Some(PathStep::Index(_) | PathStep::Key(_))) {
                    steps.next();
                }
            }
            block = &nested.block;
        }
        None
    }

    /// Returns true if `path` addresses something this schema defines.
    #[must_use]
    pub fn has_path(&self, path: &Path) -> bool {
        type_has_path(&self.implied_type(), path.steps())
    }
}

fn type_has_path(ty: &Type, steps: &[PathStep]) -> bool {
    let Some((first, rest)) = steps.split_first() else {
        return true;
    };
    match (first, ty) {
        (_, Type::Dynamic) => true,
        (PathStep::Attr(name), Type::Object(attrs)) => {
            attrs.get(name).is_some_and(|t| type_has_path(t, rest))
        }
        (PathStep::Index(_), Type::List(elem)) | (PathStep::Key(_), Type::Map(elem)) => {
            type_has_path(elem, rest)
        }
        _ => false,
    }
}

impl Attribute {
    /// A required, non-computed attribute.
    #[must_use]
    pub const fn required(ty: Type) -> Self {
        Self {
            ty,
            required: true,
            optional: false,
            computed: false,
            sensitive: false,
        }
    }

    /// An optional, non-computed attribute.
    #[must_use]
    pub const fn optional(ty: Type) -> Self {
        Self {
            ty,
            required: false,
            optional: true,
            computed: false,
            sensitive: false,
        }
    }

    /// A computed-only attribute.
    #[must_use]
    pub const fn computed(ty: Type) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: true,
            sensitive: false,
        }
    }

    /// An optional attribute that the provider fills in when unset.
    #[must_use]
    pub const fn optional_computed(ty: Type) -> Self {
        Self {
            ty,
            required: false,
            optional: true,
            computed: true,
            sensitive: false,
        }
    }

    /// Marks the attribute sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

impl ProviderSchema {
    /// Creates an empty provider schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource type schema at the given version.
    #[must_use]
    pub fn with_resource_type(mut self, name: impl Into<String>, schema: Schema, version: u64) -> Self {
        self.resource_types
            .insert(name.into(), VersionedSchema { schema, version });
        self
    }

    /// Sets the `provider_meta` schema.
    #[must_use]
    pub fn with_provider_meta(mut self, schema: Schema) -> Self {
        self.provider_meta = Some(schema);
        self
    }

    /// Returns the schema and version for a resource type.
    #[must_use]
    pub fn schema_for(&self, resource_type: &str) -> Option<(&Schema, u64)> {
        self.resource_types
            .get(resource_type)
            .map(|v| (&v.schema, v.version))
    }
}

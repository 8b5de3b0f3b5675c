//! Merge of prior state and configuration into a proposed new object.

use std::collections::BTreeMap;

use crate::schema::{Nesting, Schema};
use crate::value::Value;

/// Builds the proposed new object sent to the provider's plan call.
///
/// Non-computed attributes take their configured value. Computed
/// attributes left null in configuration keep their prior value, or become
/// unknown when there is no prior object. Nested blocks are merged
/// element-wise: lists by index, maps by key, sets taken from configuration.
#[must_use]
pub fn proposed_new_object(schema: &Schema, prior: &Value, config: &Value) -> Value {
    match config {
        Value::Null => Value::Null,
        Value::Unknown => Value::Unknown,
        _ => proposed_block(schema, prior, config),
    }
}

fn proposed_block(schema: &Schema, prior: &Value, config: &Value) -> Value {
    let creating = prior.is_null() || prior.is_unknown();
    let mut attrs = BTreeMap::new();

    for (name, attr) in &schema.attributes {
        let config_v = config.get_attr(name).unwrap_or(&Value::Null);
        let value = if attr.computed && config_v.is_null() {
            if creating {
                Value::Unknown
            } else {
                prior.get_attr(name).cloned().unwrap_or(Value::Null)
            }
        } else {
            config_v.clone()
        };
        attrs.insert(name.clone(), value);
    }

    for (name, nested) in &schema.block_types {
        let config_v = config.get_attr(name).unwrap_or(&Value::Null);
        let prior_v = if creating {
            &Value::Null
        } else {
            prior.get_attr(name).unwrap_or(&Value::Null)
        };
        let value = match (nested.nesting, config_v) {
            (_, Value::Null | Value::Unknown) => config_v.clone(),
            (Nesting::Single, _) => proposed_block(&nested.block, prior_v, config_v),
            (Nesting::List, Value::List(items)) => Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let prior_elem = match prior_v {
                            Value::List(prior_items) => prior_items.get(i).unwrap_or(&Value::Null),
                            _ => &Value::Null,
                        };
                        proposed_nested(&nested.block, prior_elem, item)
                    })
                    .collect(),
            ),
            (Nesting::Map, Value::Map(entries)) => Value::Map(
                entries
                    .iter()
                    .map(|(key, item)| {
                        let prior_elem = match prior_v {
                            Value::Map(prior_entries) => prior_entries.get(key).unwrap_or(&Value::Null),
                            _ => &Value::Null,
                        };
                        (key.clone(), proposed_nested(&nested.block, prior_elem, item))
                    })
                    .collect(),
            ),
            _ => config_v.clone(),
        };
        attrs.insert(name.clone(), value);
    }

    Value::Object(attrs)
}

fn proposed_nested(schema: &Schema, prior: &Value, config: &Value) -> Value {
    if config.is_null() || config.is_unknown() {
        config.clone()
    } else {
        proposed_block(schema, prior, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::value::{Path, Type};

    fn schema() -> Schema {
        Schema::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("name", Attribute::required(Type::String))
            .with_attribute("zone", Attribute::optional_computed(Type::String))
            .with_block(
                "disk",
                Nesting::List,
                Schema::new()
                    .with_attribute("size", Attribute::required(Type::Number))
                    .with_attribute("device", Attribute::computed(Type::String)),
            )
    }

    #[test]
    fn test_create_marks_computed_unknown() {
        let config = Value::object([
            ("id", Value::Null),
            ("name", Value::string("web")),
            ("zone", Value::Null),
            ("disk", Value::list([Value::object([("size", Value::number(10.0)), ("device", Value::Null)])])),
        ]);
        let proposed = proposed_new_object(&schema(), &Value::Null, &config);
        assert_eq!(proposed.get_attr("id"), Some(&Value::Unknown));
        assert_eq!(proposed.get_attr("zone"), Some(&Value::Unknown));
        assert_eq!(proposed.get_attr("name"), Some(&Value::string("web")));
        assert_eq!(
            Path::attr("disk").index(0).get_attr("device").apply(&proposed),
            Ok(Value::Unknown)
        );
    }

    #[test]
    fn test_update_keeps_prior_computed() {
        let prior = Value::object([
            ("id", Value::string("i-1")),
            ("name", Value::string("web")),
            ("zone", Value::string("z1")),
            ("disk", Value::list([Value::object([("size", Value::number(10.0)), ("device", Value::string("sda"))])])),
        ]);
        let config = Value::object([
            ("id", Value::Null),
            ("name", Value::string("web2")),
            ("zone", Value::Null),
            (
                "disk",
                Value::list([
                    Value::object([("size", Value::number(20.0)), ("device", Value::Null)]),
                    Value::object([("size", Value::number(5.0)), ("device", Value::Null)]),
                ]),
            ),
        ]);
        let proposed = proposed_new_object(&schema(), &prior, &config);
        assert_eq!(proposed.get_attr("id"), Some(&Value::string("i-1")));
        assert_eq!(proposed.get_attr("zone"), Some(&Value::string("z1")));
        assert_eq!(proposed.get_attr("name"), Some(&Value::string("web2")));
        let disk0 = Path::attr("disk").index(0);
        assert_eq!(disk0.get_attr("device").apply(&proposed), Ok(Value::string("sda")));
        assert_eq!(disk0.get_attr("size").apply(&proposed), Ok(Value::number(20.0)));
        assert_eq!(
            Path::attr("disk").index(1).get_attr("device").apply(&proposed),
            Ok(Value::Unknown)
        );
    }
}

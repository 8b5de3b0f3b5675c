//! Consistency checks on values returned by a provider.
//!
//! Each check returns the list of problems it found; callers decide whether
//! a problem is fatal (a provider contract violation) or only a warning.

use crate::schema::{Nesting, Schema};
use crate::value::{Path, Type, Value};

/// Checks that `value` conforms to the type implied by `schema`.
#[must_use]
pub fn test_conformance(schema: &Schema, value: &Value) -> Vec<String> {
    value.conformance_errors(&schema.implied_type())
}

/// Checks that a planned value is a valid response to a plan request.
///
/// Non-computed attributes must be planned as configured, or keep their
/// prior value. Computed attributes left null in configuration may take any
/// value. A non-null configuration must not be planned as null.
#[must_use]
pub fn assert_plan_valid(schema: &Schema, prior: &Value, config: &Value, planned: &Value) -> Vec<String> {
    let mut errs = Vec::new();
    plan_valid_block(schema, prior, config, planned, &Path::root(), &mut errs);
    errs
}

fn plan_valid_block(
    schema: &Schema,
    prior: &Value,
    config: &Value,
    planned: &Value,
    path: &Path,
    errs: &mut Vec<String>,
) {
    match (config, planned) {
        (Value::Null, Value::Null) => return,
        (Value::Null, _) => {
            errs.push(at(path, "planned for existence but config wants absence"));
            return;
        }
        (_, Value::Null) => {
            errs.push(at(path, "planned for absence but config wants existence"));
            return;
        }
        (Value::Unknown, _) | (_, Value::Unknown) => return,
        _ => {}
    }

    for (name, attr) in &schema.attributes {
        let attr_path = path.get_attr(name.clone());
        let config_v = attr_value(config, name);
        let planned_v = attr_value(planned, name);
        let prior_v = attr_value(prior, name);

        if attr.computed && config_v.is_null() {
            continue;
        }
        if config_v.is_unknown() {
            if !planned_v.is_unknown() {
                errs.push(at(&attr_path, "planned value for a non-computed attribute must be unknown when the config value is unknown"));
            }
            continue;
        }
        if planned_v.known_equal(config_v) || (!prior.is_null() && planned_v.known_equal(prior_v)) {
            continue;
        }
        if attr.sensitive {
            errs.push(at(
                &attr_path,
                "sensitive planned value does not match config value nor prior value",
            ));
        } else if prior.is_null() {
            errs.push(at(
                &attr_path,
                &format!("planned value {planned_v} does not match config value {config_v}"),
            ));
        } else {
            errs.push(at(
                &attr_path,
                &format!(
                    "planned value {planned_v} does not match config value {config_v} nor prior value {prior_v}"
                ),
            ));
        }
    }

    for (name, nested) in &schema.block_types {
        let block_path = path.get_attr(name.clone());
        let config_v = attr_value(config, name);
        let planned_v = attr_value(planned, name);
        let prior_v = attr_value(prior, name);

        match nested.nesting {
            Nesting::Single => {
                plan_valid_block(&nested.block, prior_v, config_v, planned_v, &block_path, errs);
            }
            Nesting::List => match (config_v, planned_v) {
                (Value::List(cfg), Value::List(plan)) => {
                    if cfg.len() != plan.len() {
                        errs.push(at(
                            &block_path,
                            &format!("block count in plan ({}) disagrees with count in config ({})", plan.len(), cfg.len()),
                        ));
                        continue;
                    }
                    for (i, (c, p)) in cfg.iter().zip(plan).enumerate() {
                        let prior_elem = match prior_v {
                            Value::List(items) => items.get(i).unwrap_or(&Value::Null),
                            _ => &Value::Null,
                        };
                        plan_valid_block(&nested.block, prior_elem, c, p, &block_path.index(i), errs);
                    }
                }
                (c, p) => collection_presence(c, p, &block_path, errs),
            },
            Nesting::Map => match (config_v, planned_v) {
                (Value::Map(cfg), Value::Map(plan)) => {
                    for key in plan.keys().filter(|k| !cfg.contains_key(*k)) {
                        errs.push(at(&block_path.key(key.clone()), "block key present in plan but absent in config"));
                    }
                    for (key, c) in cfg {
                        let elem_path = block_path.key(key.clone());
                        let Some(p) = plan.get(key) else {
                            errs.push(at(&elem_path, "block key present in config but absent in plan"));
                            continue;
                        };
                        let prior_elem = match prior_v {
                            Value::Map(items) => items.get(key).unwrap_or(&Value::Null),
                            _ => &Value::Null,
                        };
                        plan_valid_block(&nested.block, prior_elem, c, p, &elem_path, errs);
                    }
                }
                (c, p) => collection_presence(c, p, &block_path, errs),
            },
            Nesting::Set => match (config_v, planned_v) {
                (Value::Set(cfg), Value::Set(plan)) => {
                    let known = cfg.iter().chain(plan).all(Value::is_wholly_known);
                    if known && cfg.len() != plan.len() {
                        errs.push(at(
                            &block_path,
                            &format!("block set length in plan ({}) disagrees with config ({})", plan.len(), cfg.len()),
                        ));
                    }
                }
                (c, p) => collection_presence(c, p, &block_path, errs),
            },
        }
    }
}

fn collection_presence(config: &Value, planned: &Value, path: &Path, errs: &mut Vec<String>) {
    if config.is_unknown() || planned.is_unknown() {
        return;
    }
    match (config.is_null(), planned.is_null()) {
        (true, false) => errs.push(at(path, "planned for existence but config wants absence")),
        (false, true) => errs.push(at(path, "planned for absence but config wants existence")),
        _ => {}
    }
}

/// Checks that an object returned after apply (or refresh) is compatible
/// with the value that was planned (or previously recorded).
///
/// Every known planned value must be preserved exactly. Unknown planned
/// values may resolve to anything, but must not remain unknown.
#[must_use]
pub fn assert_object_compatible(schema: &Schema, planned: &Value, actual: &Value) -> Vec<String> {
    let mut errs = Vec::new();
    let ty = schema.implied_type();
    compatible(schema, &ty, planned, actual, &Path::root(), &mut errs);
    errs
}

fn compatible(schema: &Schema, ty: &Type, planned: &Value, actual: &Value, path: &Path, errs: &mut Vec<String>) {
    if planned.is_unknown() {
        if !actual.is_wholly_known() {
            errs.push(at(path, "value is still unknown after apply"));
        }
        return;
    }
    if !actual.is_wholly_known() && !matches!(actual, Value::List(_) | Value::Map(_) | Value::Object(_)) {
        errs.push(at(path, "value is unknown after apply"));
        return;
    }
    let sensitive = !path.is_empty() && schema.attribute_at(path).is_some_and(|a| a.sensitive);
    let describe = |v: &Value| {
        if sensitive {
            String::from("(sensitive value)")
        } else {
            v.to_string()
        }
    };

    match (planned, actual) {
        (Value::Null, Value::Null) => {}
        (Value::Null, _) | (_, Value::Null) => {
            if path.is_empty() {
                let msg = if planned.is_null() {
                    "was absent, but now present"
                } else {
                    "was present, but now absent"
                };
                errs.push(msg.to_string());
            } else {
                errs.push(at(path, &format!("was {}, but now {}", describe(planned), describe(actual))));
            }
        }
        (Value::List(p), Value::List(a)) => {
            if p.len() != a.len() {
                errs.push(at(path, &format!("length changed from {} to {}", p.len(), a.len())));
                return;
            }
            let elem_ty = ty.element_type().unwrap_or(&Type::Dynamic);
            for (i, (pe, ae)) in p.iter().zip(a).enumerate() {
                compatible(schema, elem_ty, pe, ae, &path.index(i), errs);
            }
        }
        (Value::Map(p), Value::Map(a)) => {
            let elem_ty = ty.element_type().unwrap_or(&Type::Dynamic);
            for key in p.keys().filter(|k| !a.contains_key(*k)) {
                errs.push(at(&path.key(key.clone()), "element has vanished"));
            }
            for (key, ae) in a {
                match p.get(key) {
                    Some(pe) => compatible(schema, elem_ty, pe, ae, &path.key(key.clone()), errs),
                    None => errs.push(at(&path.key(key.clone()), "new element appeared")),
                }
            }
        }
        (Value::Object(p), Value::Object(a)) => {
            for (name, pe) in p {
                let attr_ty = ty.attribute_type(name).unwrap_or(&Type::Dynamic);
                let ae = a.get(name).unwrap_or(&Value::Null);
                compatible(schema, attr_ty, pe, ae, &path.get_attr(name.clone()), errs);
            }
        }
        (Value::Set(p), Value::Set(a)) => {
            if p.iter().all(Value::is_wholly_known) {
                if planned.equals(actual) != Some(true) {
                    errs.push(at(path, &format!("planned set element {} does not correlate with any element in actual", describe(planned))));
                }
            } else if p.len() > a.len() {
                errs.push(at(path, &format!("length changed from {} to {}", p.len(), a.len())));
            }
        }
        _ => {
            if planned.equals(actual) != Some(true) {
                errs.push(at(path, &format!("was {}, but now {}", describe(planned), describe(actual))));
            }
        }
    }
}

fn attr_value<'a>(object: &'a Value, name: &str) -> &'a Value {
    object.get_attr(name).unwrap_or(&Value::Null)
}

fn at(path: &Path, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!(".{path}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    fn schema() -> Schema {
        Schema::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("name", Attribute::required(Type::String))
            .with_attribute("token", Attribute::optional(Type::String).sensitive())
    }

    fn obj(id: Value, name: &str) -> Value {
        Value::object([("id", id), ("name", Value::string(name)), ("token", Value::Null)])
    }

    #[test]
    fn test_plan_valid_allows_computed_and_prior() {
        let config = obj(Value::Null, "web");
        assert!(assert_plan_valid(&schema(), &Value::Null, &config, &obj(Value::Unknown, "web")).is_empty());

        let prior = obj(Value::string("i-1"), "WEB");
        assert!(assert_plan_valid(&schema(), &prior, &config, &obj(Value::string("i-1"), "WEB")).is_empty());
    }

    #[test]
    fn test_plan_invalid_when_config_not_honored() {
        let config = obj(Value::Null, "web");
        let errs = assert_plan_valid(&schema(), &Value::Null, &config, &obj(Value::Unknown, "db"));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with(".name:"));

        let errs = assert_plan_valid(&schema(), &Value::Null, &config, &Value::Null);
        assert_eq!(errs, vec![String::from("planned for absence but config wants existence")]);
    }

    #[test]
    fn test_object_compatible() {
        let planned = obj(Value::Unknown, "web");
        assert!(assert_object_compatible(&schema(), &planned, &obj(Value::string("i-1"), "web")).is_empty());

        let errs = assert_object_compatible(&schema(), &planned, &obj(Value::Unknown, "web"));
        assert_eq!(errs, vec![String::from(".id: value is still unknown after apply")]);

        let errs = assert_object_compatible(&schema(), &planned, &obj(Value::string("i-1"), "db"));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("was \"web\", but now \"db\""));
    }

    #[test]
    fn test_sensitive_values_are_redacted() {
        let mut planned = obj(Value::string("i-1"), "web");
        let mut actual = planned.clone();
        if let (Value::Object(p), Value::Object(a)) = (&mut planned, &mut actual) {
            p.insert(String::from("token"), Value::string("old"));
            a.insert(String::from("token"), Value::string("new"));
        }
        let errs = assert_object_compatible(&schema(), &planned, &actual);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("(sensitive value)"));
        assert!(!errs[0].contains("old"));
    }
}

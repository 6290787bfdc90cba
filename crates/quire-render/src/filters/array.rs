//! Array filters.
//!
//! Property arguments accept dotted paths. A scalar input is treated as a
//! one-element array and nil as an empty one, except for the stack
//! operations (`push`, `pop`, `shift`, `unshift`), which return anything
//! that is not an array unchanged.

use std::cmp::Ordering;
use std::collections::HashSet;

use liquid_core::model::{Object, Value, ValueView};
use liquid_core::Result;

use super::number;
use super::{FnFilter, arg, arg_int, arg_text, invalid_argument, items, property, text};

fn values(list: &[&dyn ValueView]) -> Value {
    Value::Array(list.iter().map(|v| v.to_value()).collect())
}

/// Whether `item.property` equals `target`, or contains it when the
/// property is an array.
fn property_matches(item: &dyn ValueView, path: &str, target: &str) -> bool {
    let Some(value) = property(item, path) else {
        return false;
    };
    match value.as_array() {
        Some(array) => array.values().any(|v| text(v) == target),
        None => text(value) == target,
    }
}

fn where_filter(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let path = arg_text(args, 0).ok_or_else(|| invalid_argument("where", "property required"))?;
    let target = arg_text(args, 1).unwrap_or_default();
    let matched: Vec<_> = items(input)
        .into_iter()
        .filter(|item| property_matches(*item, &path, &target))
        .collect();
    Ok(values(&matched))
}

fn find(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let path = arg_text(args, 0).ok_or_else(|| invalid_argument("find", "property required"))?;
    let target = arg_text(args, 1).unwrap_or_default();
    Ok(items(input)
        .into_iter()
        .find(|item| property_matches(*item, &path, &target))
        .map_or(Value::Nil, |item| item.to_value()))
}

fn group_by(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let path =
        arg_text(args, 0).ok_or_else(|| invalid_argument("group_by", "property required"))?;

    let mut groups: Vec<(String, Vec<&dyn ValueView>)> = Vec::new();
    for item in items(input) {
        let name = property(item, &path).map(|v| text(v)).unwrap_or_default();
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, members)) => members.push(item),
            None => groups.push((name, vec![item])),
        }
    }

    let groups = groups
        .into_iter()
        .map(|(name, members)| {
            let mut group = Object::new();
            group.insert("name".into(), Value::scalar(name));
            group.insert(
                "size".into(),
                Value::scalar(i64::try_from(members.len()).unwrap_or(i64::MAX)),
            );
            group.insert("items".into(), values(&members));
            Value::Object(group)
        })
        .collect();
    Ok(Value::Array(groups))
}

/// Order two values: numerically when both are numbers, else by text.
fn compare(a: &dyn ValueView, b: &dyn ValueView) -> Ordering {
    match (number::parse(a), number::parse(b)) {
        (Some(x), Some(y)) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        _ => text(a).cmp(&text(b)),
    }
}

fn sort_by_key<'a>(
    list: Vec<&'a dyn ValueView>,
    path: Option<&str>,
    nils_last: bool,
    cmp: fn(&dyn ValueView, &dyn ValueView) -> Ordering,
) -> Vec<&'a dyn ValueView> {
    let key = |item: &'a dyn ValueView| -> Option<&'a dyn ValueView> {
        match path {
            Some(path) => property(item, path),
            None => (!item.is_nil()).then_some(item),
        }
    };
    let mut list = list;
    list.sort_by(|a, b| match (key(*a), key(*b)) {
        (Some(x), Some(y)) => cmp(x, y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) if nils_last => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) if nils_last => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    });
    list
}

fn sort(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    if input.is_nil() {
        return Ok(Value::Nil);
    }
    let path = arg_text(args, 0);
    let nils_last = arg_text(args, 1).is_some_and(|n| n == "last");
    let sorted = sort_by_key(items(input), path.as_deref(), nils_last, compare);
    Ok(values(&sorted))
}

fn sort_natural(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    if input.is_nil() {
        return Ok(Value::Nil);
    }
    let path = arg_text(args, 0);
    let sorted = sort_by_key(items(input), path.as_deref(), true, |a, b| {
        text(a).to_lowercase().cmp(&text(b).to_lowercase())
    });
    Ok(values(&sorted))
}

fn uniq(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let path = arg_text(args, 0);
    let mut seen = HashSet::new();
    let unique: Vec<_> = items(input)
        .into_iter()
        .filter(|item| {
            let key = match &path {
                Some(path) => property(*item, path).map(|v| v.source().to_string()),
                None => Some(item.source().to_string()),
            };
            seen.insert(key)
        })
        .collect();
    Ok(values(&unique))
}

fn map(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let path = arg_text(args, 0).ok_or_else(|| invalid_argument("map", "property required"))?;
    let mapped = items(input)
        .into_iter()
        .map(|item| property(item, &path).map_or(Value::Nil, |v| v.to_value()))
        .collect();
    Ok(Value::Array(mapped))
}

fn compact(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let path = arg_text(args, 0);
    let kept: Vec<_> = items(input)
        .into_iter()
        .filter(|item| match &path {
            Some(path) => property(*item, path).is_some(),
            None => !item.is_nil(),
        })
        .collect();
    Ok(values(&kept))
}

fn concat(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let mut joined = items(input);
    if let Some(other) = arg(args, 0) {
        joined.extend(items(other));
    }
    Ok(values(&joined))
}

/// Repeat count for stack operations; defaults to one.
fn count(args: &[Value], index: usize) -> usize {
    arg_int(args, index).map_or(1, |n| usize::try_from(n).unwrap_or(0))
}

fn push(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let Some(array) = input.as_array() else {
        return Ok(input.to_value());
    };
    let mut list: Vec<Value> = array.values().map(|v| v.to_value()).collect();
    let element = args.first().cloned().unwrap_or(Value::Nil);
    for _ in 0..count(args, 1) {
        list.push(element.clone());
    }
    Ok(Value::Array(list))
}

fn unshift(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let Some(array) = input.as_array() else {
        return Ok(input.to_value());
    };
    let element = args.first().cloned().unwrap_or(Value::Nil);
    let mut list: Vec<Value> = std::iter::repeat_n(element, count(args, 1)).collect();
    list.extend(array.values().map(|v| v.to_value()));
    Ok(Value::Array(list))
}

fn pop(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let Some(array) = input.as_array() else {
        return Ok(input.to_value());
    };
    let mut list: Vec<Value> = array.values().map(|v| v.to_value()).collect();
    let keep = list.len().saturating_sub(count(args, 0));
    list.truncate(keep);
    Ok(Value::Array(list))
}

fn shift(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let Some(array) = input.as_array() else {
        return Ok(input.to_value());
    };
    let list = array
        .values()
        .skip(count(args, 0))
        .map(|v| v.to_value())
        .collect();
    Ok(Value::Array(list))
}

pub(super) fn filters() -> Vec<FnFilter> {
    vec![
        FnFilter::new("where", where_filter),
        FnFilter::new("find", find),
        FnFilter::new("group_by", group_by),
        FnFilter::new("sort", sort),
        FnFilter::new("sort_natural", sort_natural),
        FnFilter::new("uniq", uniq),
        FnFilter::new("map", map),
        FnFilter::new("compact", compact),
        FnFilter::new("concat", concat),
        FnFilter::new("push", push),
        FnFilter::new("pop", pop),
        FnFilter::new("shift", shift),
        FnFilter::new("unshift", unshift),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::filters::test_support::{apply, s};
    use crate::value::TemplateValue;

    fn list(value: serde_json::Value) -> Value {
        TemplateValue::from_json(&value).to_value()
    }

    fn texts(value: &Value) -> Vec<String> {
        items(value).into_iter().map(text).collect()
    }

    fn titles(value: &Value) -> Vec<String> {
        items(value)
            .into_iter()
            .map(|item| property(item, "title").map(|v| text(v)).unwrap_or_default())
            .collect()
    }

    fn posts() -> Value {
        list(json!([
            {"title": "B", "category": "rust", "tags": ["async"], "rank": 2},
            {"title": "A", "category": "go", "tags": ["web", "async"], "rank": 10},
            {"title": "C", "category": "rust", "tags": []}
        ]))
    }

    #[test]
    fn test_where_and_find() {
        let rust = apply("where", &posts(), &[s("category"), s("rust")]);
        assert_eq!(titles(&rust), vec!["B", "C"]);

        let tagged = apply("where", &posts(), &[s("tags"), s("async")]);
        assert_eq!(titles(&tagged), vec!["B", "A"]);

        let found = apply("find", &posts(), &[s("category"), s("go")]);
        assert_eq!(property(&found, "title").map(|v| text(v)), Some("A".to_owned()));
        assert!(apply("find", &posts(), &[s("category"), s("none")]).is_nil());
    }

    #[test]
    fn test_group_by() {
        let groups = apply("group_by", &posts(), &[s("category")]);
        let groups = items(&groups);
        assert_eq!(groups.len(), 2);
        assert_eq!(property(groups[0], "name").map(|v| text(v)), Some("rust".to_owned()));
        assert_eq!(property(groups[0], "size").map(|v| text(v)), Some("2".to_owned()));
        assert_eq!(property(groups[1], "items").map(|v| items(v).len()), Some(1));
    }

    #[test]
    fn test_sort_by_property_with_nils_first() {
        let sorted = apply("sort", &posts(), &[s("rank")]);
        assert_eq!(titles(&sorted), vec!["C", "B", "A"]);

        let sorted = apply("sort", &posts(), &[s("rank"), s("last")]);
        assert_eq!(titles(&sorted), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_sort_natural_and_uniq() {
        let sorted = apply("sort_natural", &list(json!(["b", "A", "c"])), &[]);
        assert_eq!(texts(&sorted), vec!["A", "b", "c"]);

        let unique = apply("uniq", &list(json!([1, 2, 1, "1"])), &[]);
        assert_eq!(texts(&unique), vec!["1", "2", "1"]);
    }

    #[test]
    fn test_map_compact_concat() {
        let mapped = apply("map", &posts(), &[s("rank")]);
        assert_eq!(texts(&mapped), vec!["2", "10", ""]);

        let compacted = apply("compact", &mapped, &[]);
        assert_eq!(texts(&compacted), vec!["2", "10"]);

        let joined = apply("concat", &list(json!([1])), &[list(json!([2, 3]))]);
        assert_eq!(texts(&joined), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_push_and_unshift_with_count() {
        let base = list(json!(["a"]));
        assert_eq!(texts(&apply("push", &base, &[s("b")])), vec!["a", "b"]);
        assert_eq!(
            texts(&apply("push", &base, &[s("b"), Value::scalar(2i64)])),
            vec!["a", "b", "b"]
        );
        assert_eq!(
            texts(&apply("unshift", &base, &[s("z"), Value::scalar(2i64)])),
            vec!["z", "z", "a"]
        );
        assert_eq!(
            texts(&apply("push", &base, &[s("b"), Value::scalar(0i64)])),
            vec!["a"]
        );
    }

    #[test]
    fn test_pop_and_shift_with_count() {
        let base = list(json!([1, 2, 3, 4]));
        assert_eq!(texts(&apply("pop", &base, &[])), vec!["1", "2", "3"]);
        assert_eq!(texts(&apply("pop", &base, &[Value::scalar(2i64)])), vec!["1", "2"]);
        assert_eq!(texts(&apply("shift", &base, &[Value::scalar(3i64)])), vec!["4"]);
        assert_eq!(texts(&apply("shift", &base, &[Value::scalar(9i64)])), Vec::<String>::new());
        assert_eq!(
            texts(&apply("pop", &base, &[Value::scalar(-1i64)])),
            vec!["1", "2", "3", "4"]
        );
    }

    #[test]
    fn test_stack_ops_leave_non_arrays() {
        assert_eq!(apply("push", &s("x"), &[s("y")]).to_kstr().as_str(), "x");
    }
}

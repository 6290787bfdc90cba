//! Filters over whole values: `default`, `jsonify`, `inspect`,
//! `markdownify` and `sample`.

use liquid_core::model::{Value, ValueView};
use liquid_core::Result;

use super::text::xml_escape;
use super::{FnFilter, invalid_argument, text};
use crate::convert::markdown_to_html;

/// Whether `default` should replace the input.
///
/// Only nil and the empty string count as missing; `false` and `0` are
/// real values.
fn is_missing(input: &dyn ValueView) -> bool {
    input.is_nil() || (input.as_scalar().is_some() && input.to_kstr().is_empty())
}

fn default(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    if is_missing(input) {
        Ok(args.first().cloned().unwrap_or(Value::Nil))
    } else {
        Ok(input.to_value())
    }
}

fn jsonify(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    let json = serde_json::to_value(input.to_value())
        .and_then(|value| serde_json::to_string(&value))
        .map_err(|e| invalid_argument("jsonify", &e.to_string()))?;
    Ok(Value::scalar(json))
}

fn inspect(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    Ok(Value::scalar(xml_escape(&input.source().to_string())))
}

fn markdownify(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    Ok(Value::scalar(markdown_to_html(&text(input))))
}

fn sample(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    match input.as_array() {
        Some(array) => Ok(array.values().next().map_or(Value::Nil, |v| v.to_value())),
        None => Ok(input.to_value()),
    }
}

pub(super) fn filters() -> Vec<FnFilter> {
    vec![
        FnFilter::new("default", default),
        FnFilter::new("jsonify", jsonify),
        FnFilter::new("inspect", inspect),
        FnFilter::new("markdownify", markdownify),
        FnFilter::new("sample", sample),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::filters::test_support::{apply, s};
    use crate::value::TemplateValue;

    fn run(name: &str, input: &Value, args: &[Value]) -> String {
        apply(name, input, args).to_kstr().to_string()
    }

    #[test]
    fn test_default_replaces_only_nil_and_empty() {
        let fallback = [s("fallback")];
        assert_eq!(run("default", &Value::Nil, &fallback), "fallback");
        assert_eq!(run("default", &s(""), &fallback), "fallback");
        assert_eq!(run("default", &Value::scalar(false), &fallback), "false");
        assert_eq!(run("default", &Value::scalar(0i64), &fallback), "0");
        assert_eq!(run("default", &s("set"), &fallback), "set");
    }

    #[test]
    fn test_jsonify_sorts_keys() {
        let value = TemplateValue::from_json(&json!({"b": [1, "x"], "a": true, "c": null}));
        assert_eq!(
            run("jsonify", &value.to_value(), &[]),
            r#"{"a":true,"b":[1,"x"],"c":null}"#
        );
        assert_eq!(run("jsonify", &s("q\"uote"), &[]), r#""q\"uote""#);
    }

    #[test]
    fn test_markdownify() {
        assert_eq!(run("markdownify", &s("**bold**"), &[]), "<p><strong>bold</strong></p>\n");
    }

    #[test]
    fn test_sample_and_inspect() {
        let list = TemplateValue::from_json(&json!(["first", "second"])).to_value();
        assert_eq!(run("sample", &list, &[]), "first");
        assert_eq!(run("inspect", &s("<a>"), &[]), "&quot;&lt;a&gt;&quot;");
    }
}

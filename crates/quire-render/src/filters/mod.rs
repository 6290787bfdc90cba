//! Built-in template filters.
//!
//! Filters are plain functions over the piped input and the evaluated
//! positional arguments. [`FnFilter`] adapts such a function to the engine's
//! filter registry, which is also how plugins add their own.
//!
//! The families live in submodules:
//!
//! - [`url`]: `relative_url`, `absolute_url`
//! - [`text`]: escaping, slugs, word handling, typography
//! - [`array`]: selection, grouping, sorting and stack operations
//! - [`number`]: arithmetic and rounding
//! - [`date`]: date formatting
//! - [`data`]: `default`, `jsonify`, `markdownify` and friends

mod array;
mod data;
mod date;
mod number;
mod text;
mod url;

use std::fmt;
use std::sync::Arc;

use liquid_core::model::{Value, ValueView};
use liquid_core::parser::{FilterArguments, FilterReflection, ParameterReflection, ParseFilter};
use liquid_core::runtime::{Expression, Runtime};
use liquid_core::{Error, Filter, Result};

/// Signature of a filter function.
pub type FilterFn = dyn Fn(&dyn ValueView, &[Value]) -> Result<Value> + Send + Sync;

/// Site settings filters depend on.
#[derive(Debug, Clone, Default)]
pub(crate) struct FilterContext {
    pub baseurl: String,
    pub url: String,
}

/// Every built-in filter.
///
/// Registered after the engine's standard library, so same-named filters
/// here replace the standard ones.
pub(crate) fn builtin(context: &FilterContext) -> Vec<FnFilter> {
    let mut filters = url::filters(context);
    filters.extend(text::filters());
    filters.extend(array::filters());
    filters.extend(number::filters());
    filters.extend(date::filters());
    filters.extend(data::filters());
    filters
}

/// A named filter backed by a function.
#[derive(Clone)]
pub struct FnFilter {
    name: String,
    func: Arc<FilterFn>,
}

impl FnFilter {
    /// Wrap `func` as the filter `name`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn ValueView, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Filter name used in templates.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}

impl FilterReflection for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        ""
    }

    fn positional_parameters(&self) -> &'static [ParameterReflection] {
        &[]
    }

    fn keyword_parameters(&self) -> &'static [ParameterReflection] {
        &[]
    }
}

impl ParseFilter for FnFilter {
    fn parse(&self, arguments: FilterArguments<'_>) -> Result<Box<dyn Filter>> {
        Ok(Box::new(BoundFilter {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
            args: arguments.positional.collect(),
        }))
    }

    fn reflection(&self) -> &dyn FilterReflection {
        self
    }
}

/// A filter invocation with its unevaluated arguments.
struct BoundFilter {
    name: String,
    func: Arc<FilterFn>,
    args: Vec<Expression>,
}

impl fmt::Debug for BoundFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFilter")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl fmt::Display for BoundFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{sep}{arg}")?;
        }
        Ok(())
    }
}

impl Filter for BoundFilter {
    fn evaluate(&self, input: &dyn ValueView, runtime: &dyn Runtime) -> Result<Value> {
        let args: Vec<Value> = self
            .args
            .iter()
            .map(|arg| arg.try_evaluate(runtime).map_or(Value::Nil, |v| v.to_value()))
            .collect();
        (self.func)(input, &args)
    }
}

/// Argument `index`, unless absent or nil.
pub(crate) fn arg(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index).filter(|v| !v.is_nil())
}

/// Argument `index` as text.
pub(crate) fn arg_text(args: &[Value], index: usize) -> Option<String> {
    arg(args, index).map(|v| text(v))
}

/// Argument `index` as an integer.
pub(crate) fn arg_int(args: &[Value], index: usize) -> Option<i64> {
    arg(args, index).and_then(|v| match number::parse(v)? {
        number::Number::Int(i) => Some(i),
        #[allow(clippy::cast_possible_truncation)]
        number::Number::Float(f) => Some(f as i64),
    })
}

/// Rendered text of a value; nil is empty.
pub(crate) fn text(value: &dyn ValueView) -> String {
    if value.is_nil() {
        String::new()
    } else {
        value.to_kstr().to_string()
    }
}

/// Elements of an array input. Nil is empty and anything else is a single
/// element.
pub(crate) fn items(value: &dyn ValueView) -> Vec<&dyn ValueView> {
    if value.is_nil() {
        Vec::new()
    } else if let Some(array) = value.as_array() {
        array.values().collect()
    } else {
        vec![value]
    }
}

/// Property lookup supporting dotted paths (`author.name`).
pub(crate) fn property<'a>(value: &'a dyn ValueView, path: &str) -> Option<&'a dyn ValueView> {
    let mut current = value;
    for key in path.split('.') {
        let object = current.as_object()?;
        if !object.contains_key(key) {
            return None;
        }
        current = object.get(key)?;
    }
    (!current.is_nil()).then_some(current)
}

/// Error for an unusable argument.
pub(crate) fn invalid_argument(filter: &str, message: &str) -> Error {
    Error::with_msg(format!("{filter}: {message}"))
}

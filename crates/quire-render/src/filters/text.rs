//! Text filters: escaping, slugs, word handling and typography.

use std::sync::LazyLock;

use liquid_core::model::{Value, ValueView};
use liquid_core::Result;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use quire_site::url::{SlugMode, slugify};
use regex::Regex;

use super::{FnFilter, arg_int, arg_text, items, text};

/// Characters kept by `cgi_escape`, besides alphanumerics.
const CGI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// Characters kept by `uri_escape`: URI reserved and unreserved sets.
const URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'?')
    .remove(b'@')
    .remove(b'[')
    .remove(b']');

static HTML_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<!--.*?-->")
        .expect("static regex is valid")
});
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<.*?>").expect("static regex is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));
static NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n").expect("static regex is valid"));

fn text_filter(name: &'static str, f: fn(&str) -> String) -> FnFilter {
    FnFilter::new(name, move |input, _args| Ok(Value::scalar(f(&text(input)))))
}

/// Escape the five XML special characters.
pub(crate) fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn cgi_escape(input: &str) -> String {
    utf8_percent_encode(input, CGI).to_string().replace("%20", "+")
}

fn uri_escape(input: &str) -> String {
    utf8_percent_encode(input, URI).to_string()
}

fn strip_html(input: &str) -> String {
    let stripped = HTML_BLOCKS.replace_all(input, "");
    HTML_TAG.replace_all(&stripped, "").into_owned()
}

fn normalize_whitespace(input: &str) -> String {
    WHITESPACE.replace_all(input, " ").trim().to_owned()
}

fn newline_to_br(input: &str) -> String {
    NEWLINE.replace_all(input, "<br />\n").into_owned()
}

/// Replace straight quotes, dashes and ellipses with typographic ones.
fn smartify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev: Option<char> = None;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        let opening = prev.is_none_or(|p| p.is_whitespace() || "([{-\u{2014}".contains(p));
        match c {
            '"' => out.push(if opening { '\u{201c}' } else { '\u{201d}' }),
            '\'' => out.push(if opening { '\u{2018}' } else { '\u{2019}' }),
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                if chars.peek() == Some(&'-') {
                    chars.next();
                    out.push('\u{2014}');
                } else {
                    out.push('\u{2013}');
                }
            }
            '.' if input_starts_with(&chars, "..") => {
                chars.next();
                chars.next();
                out.push('\u{2026}');
            }
            _ => out.push(c),
        }
        prev = out.chars().last();
    }
    out
}

fn input_starts_with(chars: &std::iter::Peekable<std::str::Chars<'_>>, prefix: &str) -> bool {
    chars.clone().take(prefix.len()).eq(prefix.chars())
}

fn number_of_words(input: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    let count = text(input).split_whitespace().count();
    Ok(Value::scalar(i64::try_from(count).unwrap_or(i64::MAX)))
}

fn truncatewords(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let text = text(input);
    let limit = usize::try_from(arg_int(args, 0).unwrap_or(15).max(1)).unwrap_or(1);
    let ellipsis = arg_text(args, 1).unwrap_or_else(|| "...".to_owned());

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return Ok(Value::scalar(text));
    }
    Ok(Value::scalar(format!("{}{ellipsis}", words[..limit].join(" "))))
}

fn array_to_sentence_string(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let connector = arg_text(args, 0).unwrap_or_else(|| "and".to_owned());
    let words: Vec<String> = items(input).into_iter().map(text).collect();
    let sentence = match words.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} {connector} {b}"),
        [head @ .., last] => format!("{}, {connector} {last}", head.join(", ")),
    };
    Ok(Value::scalar(sentence))
}

fn slugify_filter(input: &dyn ValueView, args: &[Value]) -> Result<Value> {
    if input.is_nil() {
        return Ok(Value::Nil);
    }
    let mode = arg_text(args, 0).map_or(SlugMode::Default, |m| SlugMode::from_name(&m));
    let cased = args.get(1).is_some_and(|v| v.query_state(liquid_core::model::State::Truthy));
    Ok(Value::scalar(slugify(&text(input), mode, cased)))
}

pub(super) fn filters() -> Vec<FnFilter> {
    vec![
        text_filter("xml_escape", xml_escape),
        text_filter("cgi_escape", cgi_escape),
        text_filter("uri_escape", uri_escape),
        text_filter("strip_html", strip_html),
        text_filter("normalize_whitespace", normalize_whitespace),
        text_filter("newline_to_br", newline_to_br),
        text_filter("smartify", smartify),
        FnFilter::new("number_of_words", number_of_words),
        FnFilter::new("truncatewords", truncatewords),
        FnFilter::new("array_to_sentence_string", array_to_sentence_string),
        FnFilter::new("slugify", slugify_filter),
    ]
}

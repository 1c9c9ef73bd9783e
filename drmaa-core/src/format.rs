//! Native-argument interpolation
//!
//! Expands `{field}` placeholders in a template string against a job's
//! attributes. Supported forms are `{name}`, `{name.key}`, `{name[key]}` and
//! `{name[0]}`; `{{` and `}}` produce literal braces.
//!
//! A placeholder may carry a format spec after a colon, e.g. `{threads:02d}`
//! or `{wildcards.sample:>8}`. Fill, alignment, zero padding, width,
//! precision (strings only) and the `s` and `d` types are understood.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("placeholder pattern is valid")
});

static SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(.)?([<>^]))?(0)?(\d+)?(?:\.(\d+))?([sd])?$")
        .expect("format spec pattern is valid")
});

/// Errors raised while interpolating a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The placeholder does not name an attribute of the job
    #[error("'{0}' is not a known job attribute")]
    UnknownAttribute(String),

    /// A brace without its counterpart
    #[error("single '{brace}' encountered at position {position} in format string")]
    UnbalancedBrace { brace: char, position: usize },

    /// The format spec or conversion after the attribute cannot be applied
    #[error("format spec '{spec}' is not supported for '{field}'")]
    UnsupportedSpec { field: String, spec: String },
}

/// Accessor applied to a named attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor<'a> {
    Key(&'a str),
    Index(usize),
}

/// A parsed placeholder such as `wildcards.sample` or `input[0]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef<'a> {
    pub name: &'a str,
    pub accessor: Option<Accessor<'a>>,
}

impl<'a> FieldRef<'a> {
    fn parse(field: &'a str) -> Option<Self> {
        if let Some((name, key)) = field.split_once('.') {
            if !is_identifier(name) || !is_identifier(key) {
                return None;
            }
            return Some(Self {
                name,
                accessor: Some(Accessor::Key(key)),
            });
        }

        if let Some((name, rest)) = field.split_once('[') {
            let inner = rest.strip_suffix(']')?;
            if !is_identifier(name) || inner.is_empty() {
                return None;
            }
            let accessor = match inner.parse::<usize>() {
                Ok(index) => Accessor::Index(index),
                Err(_) => Accessor::Key(inner),
            };
            return Some(Self {
                name,
                accessor: Some(accessor),
            });
        }

        is_identifier(field).then_some(Self {
            name: field,
            accessor: None,
        })
    }
}

/// Format spec of a placeholder, the part after the colon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let caps = SPEC.captures(spec)?;
        let char_at = |i: usize| caps.get(i).and_then(|m| m.as_str().chars().next());
        let number_at = |i: usize| caps.get(i).map(|m| m.as_str().parse::<usize>());

        Some(Self {
            fill: char_at(1),
            align: char_at(2),
            zero: caps.get(3).is_some(),
            width: number_at(4).transpose().ok()?.unwrap_or(0),
            precision: number_at(5).transpose().ok()?,
            kind: char_at(6),
        })
    }

    /// Formats `value`, returning `None` when the spec does not fit it
    ///
    /// Values are strings; integers are recognized by parsing so that they
    /// align right and zero-pad after the sign.
    fn apply(&self, value: &str) -> Option<String> {
        let numeric = match self.kind {
            Some('d') => {
                value.parse::<i64>().ok()?;
                true
            }
            Some(_) => false,
            None => value.parse::<i64>().is_ok(),
        };

        let mut value = value.to_string();
        if let Some(precision) = self.precision {
            if numeric {
                return None;
            }
            value = value.chars().take(precision).collect();
        }

        let len = value.chars().count();
        if len >= self.width {
            return Some(value);
        }
        let pad = self.width - len;

        if self.zero && self.fill.is_none() && self.align.is_none() && numeric {
            let (sign, digits) = match value.strip_prefix('-') {
                Some(digits) => ("-", digits),
                None => ("", value.as_str()),
            };
            return Some(format!("{}{}{}", sign, "0".repeat(pad), digits));
        }

        let fill = self.fill.unwrap_or(if self.zero { '0' } else { ' ' });
        let (left, right) = match self.align.unwrap_or(if numeric { '>' } else { '<' }) {
            '<' => (0, pad),
            '>' => (pad, 0),
            _ => (pad / 2, pad - pad / 2),
        };
        let padding = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
        Some(format!("{}{}{}", padding(left), value, padding(right)))
    }
}

/// Splits `field` at the first `:` or `!` outside of brackets
fn split_spec(field: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    for (i, c) in field.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ':' | '!' if depth == 0 => return (&field[..i], Some(&field[i..])),
            _ => {}
        }
    }
    (field, None)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Expands every placeholder in `template` using `resolve`
///
/// `resolve` returns `None` when the referenced attribute does not exist,
/// which aborts interpolation with [`FormatError::UnknownAttribute`].
pub fn format_template<F>(template: &str, mut resolve: F) -> Result<String, FormatError>
where
    F: FnMut(FieldRef<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        match whole.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            "{" | "}" => {
                return Err(FormatError::UnbalancedBrace {
                    brace: template[whole.start()..].chars().next().unwrap_or('{'),
                    position: whole.start(),
                });
            }
            _ => {
                let (field, spec) =
                    split_spec(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
                let value = FieldRef::parse(field)
                    .and_then(&mut resolve)
                    .ok_or_else(|| FormatError::UnknownAttribute(field.to_string()))?;

                match spec {
                    None => out.push_str(&value),
                    Some(spec) => {
                        let formatted = spec
                            .strip_prefix(':')
                            .and_then(FormatSpec::parse)
                            .and_then(|parsed| parsed.apply(&value))
                            .ok_or_else(|| FormatError::UnsupportedSpec {
                                field: field.to_string(),
                                spec: spec.to_string(),
                            })?;
                        out.push_str(&formatted);
                    }
                }
            }
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

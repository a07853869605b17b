//! SQL text templating: `{table}` interpolation and `?` marker rewriting.
//!
//! Both transforms are pure and return a borrowed `Cow` when the text needs no change.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::DataHelperError;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_doubled, is_line_comment_start,
    matches_tag, try_start_dollar_quote,
};
use scanner::State;

/// The dialect-neutral bound-parameter marker accepted in statement text.
pub const DEFAULT_MARKER: &str = "?";

static TABLE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{([a-zA-Z0-9\[\]"_\-]*)\}"#).expect("table placeholder pattern is valid")
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// How each `?` is rewritten into the dialect's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerStyle {
    /// Marker followed by a 1-based running index, e.g. `$1`, `$2`.
    Numbered,
    /// The same marker for every position, e.g. `?` or `:p`.
    #[default]
    Repeated,
}

impl MarkerStyle {
    #[must_use]
    pub fn from_in_sequence(in_sequence: bool) -> Self {
        if in_sequence {
            MarkerStyle::Numbered
        } else {
            MarkerStyle::Repeated
        }
    }
}

/// Marker rewriting configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerOptions {
    pub style: MarkerStyle,
    pub marker: String,
    /// Leave `?` inside quoted strings, quoted identifiers, comments and dollar-quoted
    /// bodies untouched. Off by default: every `?` in the text is a parameter.
    pub skip_literals: bool,
    /// With `skip_literals`, also treat `[name]` as a quoted identifier. Only dialects
    /// that quote with brackets set this; elsewhere `[` is an array subscript.
    pub bracket_identifiers: bool,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            style: MarkerStyle::Repeated,
            marker: DEFAULT_MARKER.to_owned(),
            skip_literals: false,
            bracket_identifiers: false,
        }
    }
}

impl MarkerOptions {
    #[must_use]
    pub fn numbered(marker: impl Into<String>) -> Self {
        Self {
            style: MarkerStyle::Numbered,
            marker: marker.into(),
            skip_literals: false,
            bracket_identifiers: false,
        }
    }

    #[must_use]
    pub fn repeated(marker: impl Into<String>) -> Self {
        Self {
            style: MarkerStyle::Repeated,
            marker: marker.into(),
            skip_literals: false,
            bracket_identifiers: false,
        }
    }

    #[must_use]
    pub fn with_skip_literals(mut self, skip_literals: bool) -> Self {
        self.skip_literals = skip_literals;
        self
    }

    #[must_use]
    pub fn with_bracket_identifiers(mut self, bracket_identifiers: bool) -> Self {
        self.bracket_identifiers = bracket_identifiers;
        self
    }
}

/// Everything a helper applies to statement text before it reaches the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSettings {
    pub schema: Option<String>,
    pub interpolate_tables: bool,
    pub marker: MarkerOptions,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            schema: None,
            interpolate_tables: true,
            marker: MarkerOptions::default(),
        }
    }
}

/// Replace every `{name}` placeholder with `schema.name`, or with `name` when `schema` is empty.
///
/// `name` may contain ASCII letters, digits, `_`, `-`, `[`, `]` and `"`, so quoted forms such as
/// `{"Order Lines"}` are not placeholders but `{[dbo]}` and `{"orders"}` are. An unterminated `{`
/// is left alone.
///
/// An empty schema still consumes the braces: `interpolate_table(sql, "")` equals `sql` only
/// when `sql` has no placeholders. Stripping them lets a statement written with `{name}` run
/// unchanged against the default schema, and makes a second pass a no-op.
/// ```rust
/// use datahelper_lite::translation::interpolate_table;
///
/// assert_eq!(interpolate_table("select * from {orders}", "app"), "select * from app.orders");
/// assert_eq!(interpolate_table("select * from {orders}", ""), "select * from orders");
/// ```
#[must_use]
pub fn interpolate_table<'a>(sql: &'a str, schema: &str) -> Cow<'a, str> {
    if !sql.contains('{') {
        return Cow::Borrowed(sql);
    }
    TABLE_PLACEHOLDER.replace_all(sql, |caps: &Captures<'_>| {
        if schema.is_empty() {
            caps[1].to_owned()
        } else {
            format!("{schema}.{}", &caps[1])
        }
    })
}

/// Rewrite each `?` into `marker`, numbering them left to right when `style` is
/// [`MarkerStyle::Numbered`]. A `marker` equal to `?` leaves the text unchanged.
/// ```rust
/// use datahelper_lite::translation::{MarkerStyle, replace_param_marker};
///
/// let sql = replace_param_marker("insert into t values (?, ?)", MarkerStyle::Numbered, "$");
/// assert_eq!(sql, "insert into t values ($1, $2)");
/// ```
#[must_use]
pub fn replace_param_marker<'a>(sql: &'a str, style: MarkerStyle, marker: &str) -> Cow<'a, str> {
    rewrite_markers(sql, style, marker, Literals::Counted)
}

/// [`replace_param_marker`] driven by [`MarkerOptions`], including the literal-aware mode.
#[must_use]
pub fn replace_param_marker_with<'a>(sql: &'a str, options: &MarkerOptions) -> Cow<'a, str> {
    let literals = match (options.skip_literals, options.bracket_identifiers) {
        (false, _) => Literals::Counted,
        (true, false) => Literals::Skipped,
        (true, true) => Literals::SkippedWithBrackets,
    };
    rewrite_markers(sql, options.style, &options.marker, literals)
}

/// Apply table interpolation (when enabled) and then marker rewriting.
#[must_use]
pub fn prepare_sql<'a>(sql: &'a str, settings: &TemplateSettings) -> Cow<'a, str> {
    let interpolated = if settings.interpolate_tables {
        interpolate_table(sql, settings.schema.as_deref().unwrap_or(""))
    } else {
        Cow::Borrowed(sql)
    };
    match interpolated {
        Cow::Borrowed(text) => replace_param_marker_with(text, &settings.marker),
        Cow::Owned(text) => {
            Cow::Owned(replace_param_marker_with(&text, &settings.marker).into_owned())
        }
    }
}

/// Which `?` occurrences count as parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Literals {
    Counted,
    Skipped,
    SkippedWithBrackets,
}

fn rewrite_markers<'a>(
    sql: &'a str,
    style: MarkerStyle,
    marker: &str,
    literals: Literals,
) -> Cow<'a, str> {
    if marker == DEFAULT_MARKER || !sql.contains('?') {
        return Cow::Borrowed(sql);
    }

    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut position = 0usize;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'?' => {
                    position += 1;
                    let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 16));
                    // '?' is ASCII, so idx is a char boundary
                    buf.push_str(&sql[copied..idx]);
                    buf.push_str(marker);
                    if style == MarkerStyle::Numbered {
                        buf.push_str(&position.to_string());
                    }
                    copied = idx + 1;
                }
                _ if literals == Literals::Counted => {}
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' if literals == Literals::SkippedWithBrackets => state = State::Bracketed,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, closing)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = closing;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if is_doubled(bytes, idx) {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if is_doubled(bytes, idx) {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    if is_doubled(bytes, idx) {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }
        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

/// Accept a bare SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Used for names spliced into statement text, such as savepoints and column names.
///
/// # Errors
/// Returns `DataHelperError::InvalidIdentifier` otherwise.
pub fn validate_identifier(name: &str) -> Result<&str, DataHelperError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(DataHelperError::InvalidIdentifier(name.to_owned()))
    }
}

/// Accept an identifier optionally qualified by one schema part (`schema.name`).
///
/// # Errors
/// Returns `DataHelperError::InvalidIdentifier` when either part is not an identifier.
pub fn validate_qualified_identifier(name: &str) -> Result<&str, DataHelperError> {
    let valid = match name.split_once('.') {
        Some((schema, object)) => IDENTIFIER.is_match(schema) && IDENTIFIER.is_match(object),
        None => IDENTIFIER.is_match(name),
    };
    if valid {
        Ok(name)
    } else {
        Err(DataHelperError::InvalidIdentifier(name.to_owned()))
    }
}

//! Route template compilation.
//!
//! A route template is literal text interleaved with placeholders:
//!
//! | Placeholder         | Matches                                   |
//! |---------------------|-------------------------------------------|
//! | `{<id>}`            | one or more characters other than `/`     |
//! | `{<id(int)>}`       | digits only                               |
//! | `{<slug(string)>}`  | word characters only                      |
//! | `{<ext(html\|xml)>}` | the given regular-expression fragment    |
//!
//! Literal text between placeholders is itself a regular-expression fragment,
//! so `/items/{<id(int)>}.(json|xml)` is a valid template. A template with no
//! placeholders at all never touches the regex engine and is matched by plain
//! string equality.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::http::Values;

/// Opening delimiter of a placeholder span.
const OPEN: &str = "{<";

/// Closing delimiter of a placeholder span.
const CLOSE: &str = ">}";

/// Sub-pattern used when a placeholder names no pattern.
pub const DEFAULT_SUBPATTERN: &str = "[^/]+";

/// `int` alias. ASCII only; the regex crate's `\d` would admit any Unicode digit.
const INT_SUBPATTERN: &str = "[0-9]+";

/// `string` alias, ASCII word characters.
const STRING_SUBPATTERN: &str = "[0-9A-Za-z_]+";

/// Upper bound on the compiled size of a single route matcher.
const MAX_REGEX_SIZE: usize = 1 << 20;

/// Errors produced while compiling a route template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("placeholder starting at byte {offset} in `{template}` is never closed")]
    Unterminated { template: String, offset: usize },

    #[error("placeholder `{span}` in `{template}` is not of the form {{<name>}} or {{<name(pattern)>}}")]
    MalformedPlaceholder { template: String, span: String },

    #[error("route `{template}` does not compile to a valid matcher: {reason}")]
    InvalidRegex { template: String, reason: String },
}

/// A placeholder name and the regular-expression fragment it captures with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamPair {
    pub name: String,
    pub pattern: String,
}

impl ParamPair {
    /// Decomposes the text between `{<` and `>}` into a name and sub-pattern.
    ///
    /// Reserved aliases are resolved here: `int` becomes `[0-9]+`, `string`
    /// becomes `[0-9A-Za-z_]+`, and a missing sub-pattern becomes [`DEFAULT_SUBPATTERN`].
    ///
    /// ```
    /// use rttp_route::router::pattern::ParamPair;
    ///
    /// let pair = ParamPair::parse("id(int)").unwrap();
    /// assert_eq!(pair.name, "id");
    /// assert_eq!(pair.pattern, "[0-9]+");
    ///
    /// assert!(ParamPair::parse("9lives").is_none());
    /// ```
    pub fn parse(inner: &str) -> Option<Self> {
        let name_len = inner
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
            .map_or(inner.len(), |(i, _)| i);
        if name_len == 0 {
            return None;
        }
        let (name, rest) = inner.split_at(name_len);

        let pattern = if rest.is_empty() {
            DEFAULT_SUBPATTERN.to_owned()
        } else {
            let sub = rest.strip_prefix('(')?.strip_suffix(')')?;
            if sub.is_empty() || sub.contains(['/', '<', '>']) {
                return None;
            }
            match sub {
                "int" => INT_SUBPATTERN.to_owned(),
                "string" => STRING_SUBPATTERN.to_owned(),
                other => other.to_owned(),
            }
        };

        Some(Self {
            name: name.to_owned(),
            pattern,
        })
    }
}

/// A regex matcher plus the placeholder name behind each capture group.
#[derive(Debug, Clone)]
pub struct RouteRegex {
    regex: Regex,
    // (capture group index, placeholder name), in template order.
    slots: Vec<(usize, String)>,
}

impl RouteRegex {
    /// Matches the whole of `path`, returning captures grouped by placeholder name.
    ///
    /// A placeholder that did not participate in the match still records an
    /// empty value so every declared name is present.
    pub fn captures(&self, path: &str) -> Option<Values> {
        let caps = self.regex.captures(path)?;
        let mut values = Values::new();
        for (index, name) in &self.slots {
            let value = caps.get(*index).map_or("", |m| m.as_str());
            values.add(name.as_str(), value);
        }
        Some(values)
    }

    /// Placeholder names in template order, repeats included.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(_, name)| name.as_str())
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// The compiled form of a route template. Exactly one representation exists.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// No placeholders: matched by byte-for-byte equality.
    Static(String),
    /// At least one placeholder: matched by an anchored regex.
    Regex(RouteRegex),
}

impl CompiledPattern {
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    /// The literal path for static patterns.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Self::Static(s) => Some(s),
            Self::Regex(_) => None,
        }
    }

    /// Matches `path` against the pattern. Static patterns capture nothing.
    pub fn matches(&self, path: &str) -> Option<Values> {
        match self {
            Self::Static(s) => (s.len() == path.len() && s == path).then(Values::new),
            Self::Regex(re) => re.captures(path),
        }
    }
}

/// Compiles a route template.
///
/// # Errors
///
/// - [`CompileError::Unterminated`] — a `{<` has no matching `>}`.
/// - [`CompileError::MalformedPlaceholder`] — a span is not `name` or `name(pattern)`.
/// - [`CompileError::InvalidRegex`] — the assembled matcher is not a valid regex.
///
/// # Examples
///
/// ```
/// use rttp_route::router::pattern::compile;
///
/// let pattern = compile("/items/{<id(int)>}").unwrap();
/// let params = pattern.matches("/items/42").unwrap();
/// assert_eq!(params.get("id"), Some("42"));
/// assert!(pattern.matches("/items/4a").is_none());
///
/// assert!(compile("/about").unwrap().is_static());
/// ```
pub fn compile(template: &str) -> Result<CompiledPattern, CompileError> {
    let mut source = String::with_capacity(template.len() + 16);
    let mut pairs = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let offset = template.len() - rest.len() + start;
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open.find(CLOSE).ok_or_else(|| CompileError::Unterminated {
            template: template.to_owned(),
            offset,
        })?;
        let inner = &after_open[..end];
        let pair = ParamPair::parse(inner).ok_or_else(|| CompileError::MalformedPlaceholder {
            template: template.to_owned(),
            span: format!("{OPEN}{inner}{CLOSE}"),
        })?;

        source.push_str(&rest[..start]);
        source.push_str(&format!("(?P<{}>{})", group_name(pairs.len()), pair.pattern));
        pairs.push(pair);
        rest = &after_open[end + CLOSE.len()..];
    }

    if pairs.is_empty() {
        return Ok(CompiledPattern::Static(template.to_owned()));
    }
    source.push_str(rest);

    let regex = RegexBuilder::new(&format!("^(?:{source})$"))
        .size_limit(MAX_REGEX_SIZE)
        .build()
        .map_err(|e| CompileError::InvalidRegex {
            template: template.to_owned(),
            reason: e.to_string(),
        })?;

    let slots = pairs
        .into_iter()
        .enumerate()
        .filter_map(|(i, pair)| {
            let wanted = group_name(i);
            regex
                .capture_names()
                .position(|n| n == Some(wanted.as_str()))
                .map(|index| (index, pair.name))
        })
        .collect();

    Ok(CompiledPattern::Regex(RouteRegex { regex, slots }))
}

// Capture group names are synthetic so one placeholder name may repeat.
fn group_name(i: usize) -> String {
    format!("__p{i}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(template: &str, path: &str) -> bool {
        compile(template).unwrap().matches(path).is_some()
    }

    #[test]
    fn template_without_placeholders_is_static() {
        let p = compile("/admin/index/ccc").unwrap();
        assert_eq!(p.literal(), Some("/admin/index/ccc"));
        assert!(p.matches("/admin/index/ccc").is_some());
    }

    #[test]
    fn static_match_is_exact() {
        let p = compile("/abc").unwrap();
        assert!(p.matches("/abd").is_none());
        assert!(p.matches("/abc/").is_none());
        assert!(p.matches("/ab").is_none());
    }

    #[test]
    fn static_literal_is_not_a_regex() {
        let p = compile("/a.b").unwrap();
        assert!(p.is_static());
        assert!(p.matches("/axb").is_none());
    }

    #[test]
    fn int_alias_is_digits_only() {
        assert!(hits("/items/{<id(int)>}", "/items/42"));
        assert!(!hits("/items/{<id(int)>}", "/items/ab"));
        assert!(!hits("/items/{<id(int)>}", "/items/4a"));
        assert!(!hits("/items/{<id(int)>}", "/items/\u{661}\u{662}"));
    }

    #[test]
    fn string_alias_is_word_characters() {
        assert!(hits("/u/{<name(string)>}", "/u/jane_doe"));
        assert!(!hits("/u/{<name(string)>}", "/u/jane-doe"));
        assert!(!hits("/u/{<name(string)>}", "/u/\u{e9}t\u{e9}"));
    }

    #[test]
    fn default_subpattern_stops_at_separator() {
        let p = compile("/a/{<x>}").unwrap();
        assert_eq!(p.matches("/a/foo").unwrap().get("x"), Some("foo"));
        assert!(p.matches("/a/foo/bar").is_none());
        assert!(p.matches("/a/").is_none());
    }

    #[test]
    fn repeated_name_keeps_both_captures_in_order() {
        let p = compile("/a/{<x>}/{<x>}").unwrap();
        let params = p.matches("/a/foo/bar").unwrap();
        assert_eq!(params.get_all("x"), ["foo", "bar"]);
    }

    #[test]
    fn match_is_anchored_at_both_ends() {
        assert!(!hits("/items/{<id(int)>}", "/items/42/extra"));
        assert!(!hits("/items/{<id(int)>}", "/v1/items/42"));
    }

    #[test]
    fn explicit_subpattern_may_span_separators() {
        let p = compile(r"/admin/index/{<id(\d+)>}/{<name>}/{<age(\d{1,3})>}/{<code>}/{<oth([^.]+\.xml)>}").unwrap();
        let params = p
            .matches("/admin/index/89/name_11111/77/code_111/bbb/rewrw/fsdfs.xml")
            .unwrap();
        assert_eq!(params.get("oth"), Some("bbb/rewrw/fsdfs.xml"));
        assert_eq!(params.get("age"), Some("77"));
    }

    #[test]
    fn literal_text_is_a_regex_fragment() {
        assert!(hits(r"/admin/index/{<id(\d+)>}.(html|xml)", "/admin/index/888.html"));
        assert!(hits(r"/admin/index/{<id(\d+)>}.{<ext((html|xml))>}", "/admin/index/888.xml"));
        assert!(hits(r"/admin/{<state>}/{<id(abc\d+cde)>}.(html|xml)", "/admin/中国/abc888cde.html"));
    }

    #[test]
    fn optional_subpattern_matches_empty_segment() {
        let p = compile(r"/admin/index/{<id(\d*)>}").unwrap();
        assert_eq!(p.matches("/admin/index/").unwrap().get("id"), Some(""));
    }

    #[test]
    fn repeated_group_records_last_iteration() {
        let p = compile(r"/parents(/{<pid((\d+))>})+").unwrap();
        assert_eq!(p.matches("/parents/34/45").unwrap().get("pid"), Some("45"));
    }

    #[test]
    fn trailing_literal_must_match() {
        let t = r"/admin/index/{<id(\d+)>}/{<name>}/{<name>}/{<a6767(\d{1,3})>}/{<code>}/ccc";
        let p = compile(t).unwrap();
        let params = p.matches("/admin/index/77/name1/name2/111/co778de/ccc").unwrap();
        assert_eq!(params.get_all("name"), ["name1", "name2"]);
        assert!(p.matches("/admin/index/77/name1/name2/111/co778de/").is_none());
    }

    #[test]
    fn param_pair_defaults_and_aliases() {
        assert_eq!(
            ParamPair::parse("code"),
            Some(ParamPair { name: "code".into(), pattern: DEFAULT_SUBPATTERN.into() })
        );
        assert_eq!(ParamPair::parse("n(string)").unwrap().pattern, STRING_SUBPATTERN);
        assert_eq!(ParamPair::parse("_a1(x+)").unwrap().pattern, "x+");
    }

    #[test]
    fn malformed_placeholders_are_errors() {
        for bad in ["/a/{<>}", "/a/{<1x>}", "/a/{<x()>}", "/a/{<x(a)b>}", "/a/{<x y>}"] {
            assert!(
                matches!(compile(bad), Err(CompileError::MalformedPlaceholder { .. })),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let err = compile("/a/{<x").unwrap_err();
        assert_eq!(
            err,
            CompileError::Unterminated { template: "/a/{<x".into(), offset: 3 }
        );
    }

    #[test]
    fn invalid_subpattern_is_an_error() {
        assert!(matches!(compile("/a/{<x([z-a])>}"), Err(CompileError::InvalidRegex { .. })));
    }

    #[test]
    fn param_names_follow_template_order() {
        let CompiledPattern::Regex(re) = compile("/{<b>}/{<a>}/{<b>}").unwrap() else {
            panic!("expected a regex pattern");
        };
        assert_eq!(re.param_names().collect::<Vec<_>>(), ["b", "a", "b"]);
    }
}

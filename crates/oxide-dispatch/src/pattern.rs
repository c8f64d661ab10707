//! Route pattern normalization and compilation.
//!
//! Patterns use `:name` placeholders. A placeholder whose name is registered
//! in the [`PlaceholderRegistry`] matches that entry's regex fragment; any
//! other placeholder matches one path segment. Patterns may also carry inline
//! regex groups such as `/archive/(\d{4})`, which capture positional
//! parameters.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::params::Params;

/// Fragment used for placeholders without a registry entry.
const SEGMENT_FRAGMENT: &str = "[^/]+";

/// Fragment used for host placeholders without a registry entry.
const LABEL_FRAGMENT: &str = "[^.]+";

/// Normalizes a route pattern or request path.
///
/// The result always starts with `/`, contains no repeated slashes and has
/// no trailing slash unless it is the root.
///
/// ```
/// use oxide_dispatch::pattern::normalize;
///
/// assert_eq!(normalize(""), "/");
/// assert_eq!(normalize("users//:id/"), "/users/:id");
/// ```
pub fn normalize(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 1);
    out.push('/');
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Collapses repeated slashes without touching anything else.
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// A piece of a tokenized pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param(String),
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits a pattern into literal text and `:name` placeholders.
///
/// A placeholder name is always the longest identifier following the colon,
/// so `:number` is never read as `:num` followed by `ber`. The `(?:` of a
/// non-capturing group is literal text.
fn tokenize(pattern: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    let mut prev = None;

    while let Some(c) = chars.next() {
        if c != ':' || prev == Some('?') {
            literal.push(c);
            prev = Some(c);
            continue;
        }

        let mut name = String::new();
        if chars.peek().copied().is_some_and(is_name_start) {
            while let Some(&next) = chars.peek() {
                if !is_name_char(next) {
                    break;
                }
                name.push(next);
                chars.next();
            }
        }
        if name.is_empty() {
            return Err(RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "':' must be followed by an alphanumeric placeholder name".to_string(),
            });
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        prev = name.chars().last();
        tokens.push(Token::Param(name));
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

/// Returns true when a pattern needs no regex evaluation.
pub fn is_static(pattern: &str) -> bool {
    !pattern.contains(':') && !pattern.contains('(')
}

/// Maps placeholder names to the regex fragments they match.
#[derive(Debug, Clone)]
pub struct PlaceholderRegistry {
    fragments: HashMap<String, String>,
}

impl Default for PlaceholderRegistry {
    fn default() -> Self {
        let mut fragments = HashMap::new();
        for (name, fragment) in [
            ("num", "[0-9]+"),
            ("alpha", "[A-Za-z]+"),
            ("alnum", "[A-Za-z0-9]+"),
            ("slug", "[a-z0-9]+(?:-[a-z0-9]+)*"),
            ("any", "[^/]+"),
            ("all", ".*"),
        ] {
            fragments.insert(name.to_string(), fragment.to_string());
        }
        Self { fragments }
    }
}

impl PlaceholderRegistry {
    /// Creates a registry with the built-in placeholders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry without any placeholders.
    pub fn empty() -> Self {
        Self {
            fragments: HashMap::new(),
        }
    }

    /// Registers (or replaces) the fragment matched by `:name`.
    ///
    /// The fragment must be a valid regex without capture groups.
    pub fn define(&mut self, name: &str, fragment: &str) -> Result<()> {
        let invalid = |reason: &str| RouterError::InvalidPattern {
            pattern: format!(":{name} => {fragment}"),
            reason: reason.to_string(),
        };

        let mut chars = name.chars();
        if !chars.next().is_some_and(is_name_start) || !chars.all(is_name_char) {
            return Err(invalid("placeholder names must be alphanumeric"));
        }
        let regex = Regex::new(fragment).map_err(|e| invalid(&e.to_string()))?;
        if regex.captures_len() > 1 {
            return Err(invalid("placeholder fragments must not contain capture groups"));
        }

        self.fragments.insert(name.to_string(), fragment.to_string());
        Ok(())
    }

    /// Returns the fragment registered for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fragments.get(name).map(String::as_str)
    }
}

/// An anchored regex together with the names of its capture groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompiledRegex {
    regex: Regex,
    names: Vec<Option<String>>,
}

impl CompiledRegex {
    fn new(source: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(source)?;
        let names = regex
            .capture_names()
            .skip(1)
            .map(|n| n.map(str::to_string))
            .collect();
        Ok(Self { regex, names })
    }

    /// Returns the regex source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns the capture group names in order; `None` for inline groups.
    pub fn param_names(&self) -> &[Option<String>] {
        &self.names
    }

    /// Matches `input`, returning the captured parameters.
    pub fn captures(&self, input: &str) -> Option<Params> {
        let caps = self.regex.captures(input)?;
        let mut params = Params::new();
        for (i, name) in self.names.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                match name {
                    Some(name) => params.insert(name.as_str(), m.as_str()),
                    None => params.push_positional(m.as_str()),
                }
            }
        }
        Some(params)
    }
}

impl TryFrom<String> for CompiledRegex {
    type Error = regex::Error;

    fn try_from(source: String) -> std::result::Result<Self, Self::Error> {
        // Host matchers carry their `(?i)` flag inline.
        Self::new(&source)
    }
}

impl From<CompiledRegex> for String {
    fn from(compiled: CompiledRegex) -> Self {
        compiled.regex.as_str().to_string()
    }
}

/// The compiled form of a route pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Matched by exact string comparison.
    Static(String),
    /// Matched by regex.
    Dynamic(CompiledRegex),
}

impl Matcher {
    /// Returns true for static matchers.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    /// Matches a normalized path.
    pub fn matches(&self, path: &str) -> Option<Params> {
        match self {
            Self::Static(key) => (key == path).then(Params::new),
            Self::Dynamic(regex) => regex.captures(path),
        }
    }
}

fn check_unique(pattern: &str, tokens: &[Token]) -> Result<()> {
    let mut seen = HashSet::new();
    for token in tokens {
        if let Token::Param(name) = token {
            if !seen.insert(name.as_str()) {
                return Err(RouterError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("parameter ':{name}' appears more than once"),
                });
            }
        }
    }
    Ok(())
}

/// Compiles a route pattern.
///
/// Patterns without placeholders and without inline groups are static.
/// In patterns without inline groups, literal text is matched literally;
/// once a pattern contains a `(`, its literal text is taken as regex.
pub fn compile(pattern: &str, registry: &PlaceholderRegistry) -> Result<Matcher> {
    let pattern = normalize(pattern);
    if is_static(&pattern) {
        return Ok(Matcher::Static(pattern));
    }

    let tokens = tokenize(&pattern)?;
    check_unique(&pattern, &tokens)?;
    let raw_literals = pattern.contains('(');

    let mut source = String::from("^");
    for token in &tokens {
        match token {
            Token::Literal(text) if raw_literals => source.push_str(text),
            Token::Literal(text) => source.push_str(&regex::escape(text)),
            Token::Param(name) => {
                let fragment = registry.get(name).unwrap_or(SEGMENT_FRAGMENT);
                source.push_str(&format!("(?P<{name}>{fragment})"));
            }
        }
    }
    source.push('$');

    CompiledRegex::new(&source)
        .map(Matcher::Dynamic)
        .map_err(|e| RouterError::InvalidPattern {
            pattern,
            reason: e.to_string(),
        })
}

/// Compiles a subdomain pattern such as `:account.example.com`.
///
/// Hosts are matched case-insensitively; placeholders without a registry
/// entry match one DNS label.
pub fn compile_host(pattern: &str, registry: &PlaceholderRegistry) -> Result<CompiledRegex> {
    let tokens = tokenize(pattern)?;
    check_unique(pattern, &tokens)?;

    let mut source = String::from("(?i)^");
    for token in &tokens {
        match token {
            Token::Literal(text) => source.push_str(&regex::escape(text)),
            Token::Param(name) => {
                let fragment = registry.get(name).unwrap_or(LABEL_FRAGMENT);
                source.push_str(&format!("(?P<{name}>{fragment})"));
            }
        }
    }
    source.push('$');

    CompiledRegex::new(&source).map_err(|e| RouterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Fills the placeholders of a route template.
///
/// Values come from `params` first, then from `defaults`. Repeated slashes
/// in the result are collapsed.
pub fn fill_template(
    route: &str,
    template: &str,
    params: &HashMap<String, String>,
    defaults: &HashMap<String, String>,
) -> Result<String> {
    let mut url = String::with_capacity(template.len());
    for token in tokenize(template)? {
        match token {
            Token::Literal(text) => url.push_str(&text),
            Token::Param(name) => {
                let value = params.get(&name).or_else(|| defaults.get(&name)).ok_or_else(|| {
                    RouterError::UrlParameterMissing {
                        route: route.to_string(),
                        param: name.clone(),
                    }
                })?;
                url.push_str(value);
            }
        }
    }
    Ok(collapse_slashes(&url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic(pattern: &str) -> CompiledRegex {
        match compile(pattern, &PlaceholderRegistry::new()).unwrap() {
            Matcher::Dynamic(regex) => regex,
            Matcher::Static(key) => panic!("expected dynamic matcher, got static {key}"),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("///"), "/");
        assert_eq!(normalize("users"), "/users");
        assert_eq!(normalize("/users/"), "/users");
        assert_eq!(normalize("//users///:id//edit/"), "/users/:id/edit");
    }

    #[test]
    fn test_normalize_idempotent() {
        for p in ["", "/", "a", "/a/", "//a//b//", "/:id/(\\d+)/", "x///y", "/ü//ö/"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once, "pattern {p:?}");
        }
    }

    #[test]
    fn test_static_classification() {
        let registry = PlaceholderRegistry::new();
        assert!(compile("/about/team", &registry).unwrap().is_static());
        assert!(!compile("/users/:id", &registry).unwrap().is_static());
        assert!(!compile("/archive/(\\d{4})", &registry).unwrap().is_static());
    }

    #[test]
    fn test_generic_placeholder() {
        let params = dynamic("/users/:name").captures("/users/jane").unwrap();
        assert_eq!(params.get_str("name"), Some("jane"));
        assert!(dynamic("/users/:name").captures("/users/jane/posts").is_none());
    }

    #[test]
    fn test_registered_placeholder() {
        let matcher = dynamic("/items/:num");
        assert_eq!(matcher.captures("/items/42").unwrap().get_str("num"), Some("42"));
        assert!(matcher.captures("/items/abc").is_none());
    }

    #[test]
    fn test_longest_name_wins() {
        let mut registry = PlaceholderRegistry::empty();
        registry.define("num", "[0-9]+").unwrap();
        let Matcher::Dynamic(regex) = compile("/n/:number", &registry).unwrap() else {
            panic!("expected dynamic matcher");
        };
        let params = regex.captures("/n/abc").unwrap();
        assert_eq!(params.get_str("number"), Some("abc"));
    }

    #[test]
    fn test_inline_group_is_positional() {
        let params = dynamic("/archive/(\\d{4})/:slug").captures("/archive/2024/hello-world").unwrap();
        assert_eq!(params.at(0).and_then(|v| v.as_str()), Some("2024"));
        assert_eq!(params.get_str("slug"), Some("hello-world"));
    }

    #[test]
    fn test_literal_text_is_escaped() {
        let matcher = dynamic("/files/:name.json");
        assert!(matcher.captures("/files/report.json").is_some());
        assert!(matcher.captures("/files/reportxjson").is_none());
    }

    #[test]
    fn test_non_capturing_group_is_literal() {
        let matcher = dynamic("/(?:en|fr)/:page");
        assert_eq!(matcher.captures("/fr/about").unwrap().get_str("page"), Some("about"));
        assert_eq!(matcher.param_names().len(), 1);
    }

    #[test]
    fn test_case_sensitive_and_unicode() {
        let matcher = dynamic("/Docs/:page");
        assert!(matcher.captures("/docs/intro").is_none());
        assert_eq!(
            matcher.captures("/Docs/café").unwrap().get_str("page"),
            Some("café")
        );
    }

    #[test]
    fn test_malformed_placeholder() {
        let registry = PlaceholderRegistry::new();
        assert!(matches!(
            compile("/users/:", &registry),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(compile("/users/:-id", &registry).is_err());
        assert!(compile("/users/:1d", &registry).is_err());
        assert!(compile("/a/:id/b/:id", &registry).is_err());
        assert!(compile("/broken/(", &registry).is_err());
    }

    #[test]
    fn test_define_validation() {
        let mut registry = PlaceholderRegistry::new();
        assert!(registry.define("year", "[0-9]{4}").is_ok());
        assert!(registry.define("bad name", "x").is_err());
        assert!(registry.define("grp", "(a|b)").is_err());
        assert!(registry.define("unclosed", "[a-").is_err());
        assert_eq!(registry.get("year"), Some("[0-9]{4}"));
    }

    #[test]
    fn test_compile_host() {
        let host = compile_host(":account.example.com", &PlaceholderRegistry::new()).unwrap();
        let params = host.captures("ACME.example.com").unwrap();
        assert_eq!(params.get_str("account"), Some("ACME"));
        assert!(host.captures("a.b.example.com").is_none());
        assert!(host.captures("acmexexample.com").is_none());
    }

    #[test]
    fn test_compiled_regex_serde() {
        let host = compile_host(":account.example.com", &PlaceholderRegistry::new()).unwrap();
        let json = serde_json::to_string(&host).unwrap();
        let restored: CompiledRegex = serde_json::from_str(&json).unwrap();
        assert!(restored.captures("Acme.Example.com").is_some());
    }

    #[test]
    fn test_fill_template() {
        let params: HashMap<String, String> =
            [("id".to_string(), "42".to_string())].into_iter().collect();
        let defaults: HashMap<String, String> =
            [("locale".to_string(), "en".to_string())].into_iter().collect();

        assert_eq!(
            fill_template("users.show", "/:locale/users/:id", &params, &defaults).unwrap(),
            "/en/users/42"
        );

        let slashy: HashMap<String, String> =
            [("path".to_string(), "/docs/".to_string())].into_iter().collect();
        assert_eq!(
            fill_template("files", "/files/:path/raw", &slashy, &HashMap::new()).unwrap(),
            "/files/docs/raw"
        );

        let err = fill_template("users.show", "/users/:id", &HashMap::new(), &defaults);
        assert!(matches!(err, Err(RouterError::UrlParameterMissing { param, .. }) if param == "id"));
    }
}

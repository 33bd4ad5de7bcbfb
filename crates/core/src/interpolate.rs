//! Read-time placeholder substitution for the interpolating view.
//!
//! - `%(name)s` resolves against the section, then `[DEFAULT]`, then the
//!   environment. Values found in the document are expanded recursively.
//! - `%%` is a literal `%`.
//! - `${NAME}` is replaced by environment variable `NAME`.
//!
//! Anything unresolved is an error; placeholders are never left in place.

use crate::ini::IniDocument;

/// Nesting limit for `%(name)s` references that point at other keys.
pub const MAX_DEPTH: usize = 10;

/// Look a variable up in the process environment.
///
/// The exact name wins; otherwise the first case-insensitive match is used,
/// since `%(name)s` references are lower-cased like keys.
pub fn env_lookup(name: &str) -> Option<String> {
    if let Ok(value) = std::env::var(name) {
        return Some(value);
    }
    let mut matches: Vec<(String, String)> = std::env::vars()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .collect();
    matches.sort();
    matches.into_iter().next().map(|(_, v)| v)
}

/// Expand `value`, a raw value read from `section`.
pub fn interpolate(
    doc: &IniDocument,
    section: &str,
    value: &str,
) -> Result<String, String> {
    interpolate_with(doc, section, value, env_lookup)
}

/// Same as [`interpolate`] with a custom environment lookup, so tests do not
/// have to mutate the process environment.
pub fn interpolate_with(
    doc: &IniDocument,
    section: &str,
    value: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, String> {
    Expander { doc, section, env }.expand(value, 1)
}

struct Expander<'a, F> {
    doc: &'a IniDocument,
    section: &'a str,
    env: F,
}

impl<F: Fn(&str) -> Option<String>> Expander<'_, F> {
    fn expand(&self, input: &str, depth: usize) -> Result<String, String> {
        if depth > MAX_DEPTH {
            return Err(format!("recursion limit of {MAX_DEPTH} exceeded"));
        }
        if !input.contains(['%', '$']) {
            return Ok(input.to_string());
        }

        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '%' => match chars.next() {
                    Some('%') => result.push('%'),
                    Some('(') => {
                        let name = take_until(&mut chars, ')')
                            .ok_or_else(|| format!("unterminated reference in {input:?}"))?;
                        if chars.next() != Some('s') {
                            return Err(format!("bad reference '%({name})' in {input:?}"));
                        }
                        result.push_str(&self.resolve(&name, depth)?);
                    },
                    _ => return Err(format!("'%' must be followed by '%' or '(' in {input:?}")),
                },
                '$' if chars.peek() == Some(&'{') => {
                    chars.next(); // consume '{'
                    let name = take_until(&mut chars, '}')
                        .ok_or_else(|| format!("unterminated reference in {input:?}"))?;
                    let value = (self.env)(&name)
                        .ok_or_else(|| format!("environment variable '{name}' is not set"))?;
                    result.push_str(&value);
                },
                ch => result.push(ch),
            }
        }

        Ok(result)
    }

    fn resolve(&self, name: &str, depth: usize) -> Result<String, String> {
        let key = name.to_lowercase();
        match self.doc.raw_value(self.section, &key) {
            Ok(Some(raw)) => return self.expand(raw, depth + 1),
            Ok(None) => return Err(format!("key '{key}' has no value")),
            Err(_) => {},
        }
        (self.env)(name)
            .ok_or_else(|| format!("'{key}' is neither a key nor an environment variable"))
    }
}

/// Collect characters up to `end` (consumed). `None` when `end` never shows up
/// or the name is empty.
fn take_until(chars: &mut impl Iterator<Item = char>, end: char) -> Option<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == end {
            return (!name.is_empty()).then_some(name);
        }
        name.push(c);
    }
    None
}

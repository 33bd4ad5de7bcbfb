//! INI document model and parser.
//!
//! Section names are case-sensitive; keys are lower-cased. Keys under
//! `[DEFAULT]` are inherited by every other section.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use crate::error::{Error, Result};

/// Name of the section whose keys every other section inherits.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Raw entries of one section. `None` marks a key written without a value.
pub type Entries = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    defaults: Entries,
    sections: BTreeMap<String, Entries>,
    order: Vec<String>,
}

impl IniDocument {
    /// Parse `text`; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let parse_error = |line: usize, message: &str| Error::Parse {
            path: path.to_path_buf(),
            line,
            message: message.to_string(),
        };

        let mut doc = Self::default();
        let mut current: Option<String> = None;
        // Key of the previous line and its indentation, while a continuation is possible.
        let mut last: Option<(String, usize)> = None;

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                last = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            let indent = line.len() - line.trim_start().len();

            if let Some((key, key_indent)) = &last
                && indent > *key_indent
                && let Some(section) = &current
            {
                let entries = doc.entries_mut(section);
                match entries.get_mut(key) {
                    Some(Some(value)) => {
                        value.push('\n');
                        value.push_str(trimmed);
                    },
                    _ => return Err(parse_error(lineno, "continuation of a key without a value")),
                }
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(parse_error(lineno, "unterminated section header"));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(parse_error(lineno, "empty section name"));
                }
                if name != DEFAULT_SECTION && !doc.sections.contains_key(name) {
                    doc.sections.insert(name.to_string(), Entries::new());
                    doc.order.push(name.to_string());
                }
                current = Some(name.to_string());
                last = None;
                continue;
            }

            let Some(section) = &current else {
                return Err(parse_error(lineno, "key outside of any section"));
            };

            let (key, value) = match trimmed.find(['=', ':']) {
                Some(at) => (&trimmed[..at], Some(trimmed[at + 1..].trim().to_string())),
                None => (trimmed, None),
            };
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(parse_error(lineno, "empty key"));
            }
            doc.entries_mut(section).insert(key.clone(), value);
            last = Some((key, indent));
        }

        Ok(doc)
    }

    fn entries_mut(&mut self, section: &str) -> &mut Entries {
        if section == DEFAULT_SECTION {
            &mut self.defaults
        } else {
            self.sections.entry(section.to_string()).or_default()
        }
    }

    /// Section names in order of first appearance, without `DEFAULT`.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn defaults(&self) -> &Entries {
        &self.defaults
    }

    /// Own entries of `section`, without inherited defaults.
    pub fn entries(&self, section: &str) -> Result<&Entries> {
        self.sections
            .get(section)
            .ok_or_else(|| Error::NoSuchSection(section.to_string()))
    }

    /// Raw value of `key`, falling back to `[DEFAULT]`.
    pub fn raw_value(&self, section: &str, key: &str) -> Result<Option<&str>> {
        let entries = self.entries(section)?;
        let key = key.to_lowercase();
        entries
            .get(&key)
            .or_else(|| self.defaults.get(&key))
            .map(Option::as_deref)
            .ok_or_else(|| Error::no_such_key(section, key))
    }

    /// Every key visible in `section`, own and inherited, each once.
    pub fn keys(&self, section: &str) -> Result<BTreeSet<String>> {
        let entries = self.entries(section)?;
        Ok(entries
            .keys()
            .chain(self.defaults.keys())
            .cloned()
            .collect())
    }
}

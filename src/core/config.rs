//! Model configuration parser
//!
//! Reads the INI-like model format:
//!
//! ```text
//! # comment
//! [request_definition]
//! r = sub, obj, act
//!
//! [matchers]
//! m = r.sub == p.sub && r.obj == p.obj   # trailing comment
//! ```
//!
//! The scanner makes a single forward pass. Entries that appear before any
//! `[section]` header are collected into the [`DEFAULT_SECTION`]. Values are
//! raw text up to end-of-line or `#`; there is no escaping.

use super::error::{ConfigSyntaxError, Position};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Name of the section holding entries that precede every header
pub const DEFAULT_SECTION: &str = "default";

/// A named, ordered list of key/value pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries in source order
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed configuration: sections in source order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    sections: Vec<Section>,
}

impl ConfigDocument {
    /// Parse configuration text
    ///
    /// Fails on the first syntax error; a document is only returned when the
    /// whole input is valid, including the uniqueness and non-emptiness rules.
    ///
    /// # Examples
    ///
    /// ```
    /// use enforcer_rs::core::config::ConfigDocument;
    ///
    /// let doc = ConfigDocument::parse("[matchers]\nm = r.sub == p.sub\n").unwrap();
    /// assert_eq!(doc.get("matchers", "m"), Some("r.sub == p.sub"));
    ///
    /// assert!(ConfigDocument::parse("[a]\nk = 1\nk = 2\n").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ConfigSyntaxError> {
        let mut scanner = Scanner::new(text);
        let mut sections: Vec<RawSection> = Vec::new();

        while let Some(c) = scanner.peek() {
            match c {
                '#' => scanner.skip_comment(),
                '[' => sections.push(scanner.header()?),
                c if c.is_whitespace() => {
                    scanner.bump();
                }
                c if is_key_start(c) => {
                    let entry = scanner.entry()?;
                    match sections.last_mut() {
                        Some(section) => section.entries.push(entry),
                        None => sections.push(RawSection {
                            name: DEFAULT_SECTION.to_string(),
                            position: entry.key_pos,
                            entries: vec![entry],
                        }),
                    }
                }
                other => {
                    return Err(ConfigSyntaxError::new(
                        format!("unexpected character '{}'", other),
                        scanner.position(),
                    ))
                }
            }
        }

        validate(sections)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Look up a single value
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }
}

impl FromStr for ConfigDocument {
    type Err = ConfigSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigDocument::parse(s)
    }
}

/// Renders text that parses back into an equal document
impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if !(i == 0 && section.name == DEFAULT_SECTION) {
                writeln!(f, "[{}]", section.name)?;
            }
            for (key, value) in &section.entries {
                writeln!(f, "{} = {}", key, value)?;
            }
        }
        Ok(())
    }
}

struct RawEntry {
    key: String,
    key_pos: Position,
    value: String,
    sep_pos: Position,
}

struct RawSection {
    name: String,
    position: Position,
    entries: Vec<RawEntry>,
}

fn is_key_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Scanner {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    col: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Scanner {
            chars: text.chars().collect(),
            idx: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.idx + 1).copied()
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_inline_space(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// `[name]` followed by nothing but whitespace or a comment
    fn header(&mut self) -> Result<RawSection, ConfigSyntaxError> {
        let position = self.position();
        self.bump();

        match self.peek() {
            Some(c) if c.is_ascii_lowercase() => {}
            Some(c) if c != '\n' => {
                return Err(ConfigSyntaxError::new(
                    format!("section name must start with a lowercase letter, found '{}'", c),
                    self.position(),
                ))
            }
            _ => {
                return Err(ConfigSyntaxError::new(
                    "unterminated section header",
                    self.position(),
                ))
            }
        }

        let mut name = String::new();
        loop {
            match self.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' => {
                    name.push(c);
                    self.bump();
                }
                Some('\n') | None => {
                    return Err(ConfigSyntaxError::new(
                        format!("unterminated section header '[{}'", name),
                        self.position(),
                    ))
                }
                Some(c) => {
                    return Err(ConfigSyntaxError::new(
                        format!("invalid character '{}' in section name", c),
                        self.position(),
                    ))
                }
            }
        }

        self.skip_inline_space();
        match self.peek() {
            None | Some('\n') | Some('#') => Ok(RawSection {
                name,
                position,
                entries: Vec::new(),
            }),
            Some(c) => Err(ConfigSyntaxError::new(
                format!("unexpected '{}' after section header [{}]", c, name),
                self.position(),
            )),
        }
    }

    /// `key = value`
    fn entry(&mut self) -> Result<RawEntry, ConfigSyntaxError> {
        let key_pos = self.position();
        let mut key = String::new();
        while let Some(c) = self.peek() {
            if !is_key_char(c) {
                break;
            }
            key.push(c);
            self.bump();
        }

        // The separator is still pending here. Two-character relational
        // lexemes must win over a lone '='.
        self.skip_inline_space();
        let sep_pos = self.position();
        match (self.peek(), self.peek_next()) {
            (Some(op @ ('=' | '!' | '<' | '>')), Some('=')) => {
                return Err(ConfigSyntaxError::new(
                    format!(
                        "relational operator '{}=' where '=' separator was expected after key '{}'",
                        op, key
                    ),
                    sep_pos,
                ))
            }
            (Some('='), _) => {
                self.bump();
            }
            (None, _) => {
                return Err(ConfigSyntaxError::new(
                    format!("end of input before '=' separator for key '{}'", key),
                    sep_pos,
                ))
            }
            (Some('\n'), _) | (Some('#'), _) => {
                return Err(ConfigSyntaxError::new(
                    format!("missing '=' separator after key '{}'", key),
                    sep_pos,
                ))
            }
            (Some(c), _) => {
                return Err(ConfigSyntaxError::new(
                    format!("unexpected '{}' after key '{}', expected '='", c, key),
                    sep_pos,
                ))
            }
        }

        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' || c == '#' {
                break;
            }
            value.push(c);
            self.bump();
        }

        Ok(RawEntry {
            key,
            key_pos,
            value: value.trim().to_string(),
            sep_pos,
        })
    }
}

fn validate(raw: Vec<RawSection>) -> Result<ConfigDocument, ConfigSyntaxError> {
    let mut names = HashSet::new();
    for section in &raw {
        if !names.insert(section.name.as_str()) {
            return Err(ConfigSyntaxError::new(
                format!("duplicate section [{}]", section.name),
                section.position,
            ));
        }
        if section.entries.is_empty() {
            return Err(ConfigSyntaxError::new(
                format!("section [{}] has no entries", section.name),
                section.position,
            ));
        }

        let mut keys = HashSet::new();
        for entry in &section.entries {
            if !keys.insert(entry.key.as_str()) {
                return Err(ConfigSyntaxError::new(
                    format!("duplicate key '{}' in section [{}]", entry.key, section.name),
                    entry.key_pos,
                ));
            }
            if entry.value.is_empty() {
                return Err(ConfigSyntaxError::new(
                    format!("empty value for key '{}'", entry.key),
                    entry.sep_pos,
                ));
            }
        }
    }

    let sections = raw
        .into_iter()
        .map(|section| Section {
            name: section.name,
            entries: section
                .entries
                .into_iter()
                .map(|e| (e.key, e.value))
                .collect(),
        })
        .collect();

    Ok(ConfigDocument { sections })
}

//! Identifier and value escaping for MySQL.

use crate::value::SqlValue;

/// Escaping capability the upsert builder depends on.
pub trait SqlEscaper {
    /// Escape a bare column identifier.
    fn escape_identifier(&self, name: &str) -> String;

    /// Quote a table reference. Never treats any part of `name` as an alias.
    fn protect_table(&self, name: &str) -> String;

    /// Render a literal for safe embedding in SQL text.
    fn escape_value(&self, value: &SqlValue) -> String;
}

/// How identifiers are quoted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierStyle {
    /// Quote only identifiers that need it (reserved words, special chars).
    #[default]
    Minimal,
    /// Quote every identifier.
    Always,
}

/// MySQL escaper using backtick identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlEscaper {
    style: IdentifierStyle,
}

impl MysqlEscaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style: IdentifierStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> IdentifierStyle {
        self.style
    }

    fn escape_segment(&self, segment: &str, force: bool) -> String {
        if !force && self.style == IdentifierStyle::Minimal && is_plain(segment) {
            return segment.to_string();
        }
        quote_backtick(segment)
    }

    /// Quoted and bare spellings of a name escape to the same text. A name
    /// that is not a well-formed dotted path becomes one quoted identifier.
    fn escape_path(&self, name: &str, force: bool) -> String {
        match split_path(name) {
            Some(segments) => segments
                .iter()
                .map(|segment| self.escape_segment(segment, force))
                .collect::<Vec<_>>()
                .join("."),
            None => quote_backtick(name),
        }
    }
}

impl SqlEscaper for MysqlEscaper {
    fn escape_identifier(&self, name: &str) -> String {
        self.escape_path(name, false)
    }

    fn protect_table(&self, name: &str) -> String {
        self.escape_path(name, true)
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
            SqlValue::Int(n) => n.to_string(),
            SqlValue::UInt(n) => n.to_string(),
            SqlValue::Float(n) if n.is_finite() => n.to_string(),
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::String(s) => format!("'{}'", escape_str(s)),
            SqlValue::Raw(expr) => expr.clone(),
        }
    }
}

/// Wrap in backticks, doubling any embedded backtick.
pub fn quote_backtick(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Backslash-escape the characters `mysql_real_escape_string` escapes.
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

/// Split `db.table` or `` `my.db`.`t``x` `` into unquoted segments.
///
/// Returns `None` for a stray backtick, an unterminated quote, text after a
/// closing quote, or an empty bare segment.
fn split_path(name: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut chars = name.chars().peekable();
    loop {
        let mut segment = String::new();
        if chars.peek() == Some(&'`') {
            chars.next();
            loop {
                match chars.next()? {
                    '`' if chars.peek() == Some(&'`') => {
                        chars.next();
                        segment.push('`');
                    }
                    '`' => break,
                    c => segment.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                match c {
                    '.' => break,
                    '`' => return None,
                    c => {
                        segment.push(c);
                        chars.next();
                    }
                }
            }
            if segment.is_empty() {
                return None;
            }
        }
        segments.push(segment);
        match chars.next() {
            None => return Some(segments),
            Some('.') => continue,
            Some(_) => return None,
        }
    }
}

fn is_plain(s: &str) -> bool {
    let mut chars = s.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !is_reserved(s)
}

// Reserved words most likely to collide with column names.
const RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN",
    "CONDITION", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME",
    "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT", "DELETE", "DESC", "DESCRIBE", "DISTINCT",
    "DROP", "DUAL", "ELSE", "EXISTS", "FALSE", "FOR", "FOREIGN", "FROM", "FULLTEXT", "GROUP",
    "HAVING", "IF", "IGNORE", "IN", "INDEX", "INNER", "INSERT", "INTERVAL", "INTO", "IS",
    "JOIN", "KEY", "KEYS", "LEFT", "LIKE", "LIMIT", "LOCK", "MATCH", "NOT", "NULL", "ON",
    "OPTION", "OR", "ORDER", "OUTER", "PRIMARY", "RANGE", "READ", "REFERENCES", "RENAME",
    "REPLACE", "RIGHT", "RANK", "ROW", "ROWS", "SELECT", "SET", "SHOW", "TABLE", "THEN",
    "TO", "TRUE", "UNION", "UNIQUE", "UPDATE", "USAGE", "USE", "USING", "VALUES", "WHEN",
    "WHERE", "WITH", "WRITE",
];

fn is_reserved(s: &str) -> bool {
    RESERVED.iter().any(|w| w.eq_ignore_ascii_case(s))
}

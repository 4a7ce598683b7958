#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Safety {
    Safe,
    Destructive,
}

/// One dialect-native statement, ready for a statement sink.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RenderedSql {
    pub safety: Safety,
    pub sql: String,
}

impl RenderedSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            safety: Safety::Safe,
        }
    }

    pub fn destructive(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            safety: Safety::Destructive,
        }
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."name"`; an already quoted name is kept as is.
pub fn quote_qualified(schema: &str, name: &str) -> String {
    let quoted = |s: &str| {
        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            s.to_string()
        } else {
            quote_ident(s)
        }
    };
    format!("{}.{}", quoted(schema), quoted(name))
}

pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Joins the quoted names with `", "`.
pub fn quoted_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn sql_texts(statements: &[RenderedSql]) -> Vec<&str> {
    statements.iter().map(|s| s.sql.as_str()).collect()
}

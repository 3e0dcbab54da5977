//! Query-string filter language used by list endpoints.
//!
//! ```text
//! filter = condition { ("AND" | "OR") condition }
//! condition = field op 'value'
//! op = eq | ne | gt | ge | lt | le | like
//! ```
//!
//! `AND` binds tighter than `OR`. A quote inside a value is written `''`.
//! Parsed filters are checked against a per-resource field list and rendered
//! as a single PostgREST logical-tree parameter.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Filtro vazio")]
    Empty,

    #[error("Campo '{0}' não pode ser filtrado")]
    UnknownField(String),

    #[error("Operador inválido '{0}'")]
    UnknownOperator(String),

    #[error("Esperado {expected} na posição {position}")]
    Unexpected { expected: &'static str, position: usize },

    #[error("Caractere inesperado '{0}'")]
    InvalidCharacter(char),
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

impl FilterOp {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "eq" => Some(FilterOp::Eq),
            "ne" => Some(FilterOp::Ne),
            "gt" => Some(FilterOp::Gt),
            "ge" => Some(FilterOp::Ge),
            "lt" => Some(FilterOp::Lt),
            "le" => Some(FilterOp::Le),
            "like" => Some(FilterOp::Like),
            _ => None,
        }
    }

    fn postgrest(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Ge => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Le => "lte",
            FilterOp::Like => "ilike",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self.op {
            FilterOp::Like => format!("*{}*", self.value),
            _ => self.value.clone(),
        };
        write!(f, "{}.{}.{}", self.field, self.op.postgrest(), quote(&value))
    }
}

/// Disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub groups: Vec<Vec<Condition>>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Value(String),
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\s*(?:'(?P<value>(?:[^']|'')*)'|(?P<word>[A-Za-z_][A-Za-z0-9_]*)|(?P<other>\S))")
            .expect("filter token pattern is valid")
    })
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    for captures in token_regex().captures_iter(input) {
        if let Some(value) = captures.name("value") {
            tokens.push(Token::Value(value.as_str().replace("''", "'")));
        } else if let Some(word) = captures.name("word") {
            tokens.push(Token::Word(word.as_str().to_string()));
        } else if let Some(other) = captures.name("other") {
            let c = other.as_str().chars().next().unwrap_or('?');
            return Err(FilterError::InvalidCharacter(c));
        }
    }
    Ok(tokens)
}

impl Filter {
    pub fn parse(input: &str, allowed_fields: &[&str]) -> Result<Self, FilterError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(FilterError::Empty);
        }

        let end = tokens.len();
        let mut groups: Vec<Vec<Condition>> = vec![Vec::new()];
        let mut iter = tokens.into_iter().enumerate();

        loop {
            let field = match iter.next() {
                Some((_, Token::Word(word))) => word,
                Some((position, _)) => return Err(FilterError::Unexpected { expected: "campo", position }),
                None => return Err(FilterError::Unexpected { expected: "campo", position: end }),
            };
            if !allowed_fields.contains(&field.as_str()) {
                return Err(FilterError::UnknownField(field));
            }

            let op = match iter.next() {
                Some((_, Token::Word(word))) => {
                    FilterOp::parse(&word).ok_or(FilterError::UnknownOperator(word))?
                }
                Some((position, _)) => return Err(FilterError::Unexpected { expected: "operador", position }),
                None => return Err(FilterError::Unexpected { expected: "operador", position: end }),
            };

            let value = match iter.next() {
                Some((_, Token::Value(value))) => value,
                Some((position, _)) => return Err(FilterError::Unexpected { expected: "valor entre aspas", position }),
                None => return Err(FilterError::Unexpected { expected: "valor entre aspas", position: end }),
            };

            if let Some(group) = groups.last_mut() {
                group.push(Condition { field, op, value });
            }

            match iter.next() {
                None => break,
                Some((_, Token::Word(word))) if word.eq_ignore_ascii_case("and") => {}
                Some((_, Token::Word(word))) if word.eq_ignore_ascii_case("or") => groups.push(Vec::new()),
                Some((position, _)) => return Err(FilterError::Unexpected { expected: "AND ou OR", position }),
            }
        }

        Ok(Self { groups })
    }

    /// Renders the filter as one `key=value` query pair for PostgREST.
    pub fn to_postgrest(&self) -> String {
        let (key, inner) = if self.groups.len() == 1 {
            ("and", join(&self.groups[0]))
        } else {
            let parts: Vec<String> = self.groups.iter()
                .map(|group| match group.as_slice() {
                    [single] => single.to_string(),
                    many => format!("and({})", join(many)),
                })
                .collect();
            ("or", parts.join(","))
        };

        format!("{}={}", key, urlencoding::encode(&format!("({})", inner)))
    }
}

/// Parses an optional `filter` parameter; absent or blank yields no clause.
pub fn parse_optional(raw: Option<&str>, allowed_fields: &[&str]) -> Result<Option<Filter>, FilterError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Filter::parse(text, allowed_fields).map(Some),
    }
}

fn join(conditions: &[Condition]) -> String {
    conditions.iter().map(Condition::to_string).collect::<Vec<_>>().join(",")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

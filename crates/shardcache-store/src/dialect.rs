//! Statement dialect for the `Person` table
//!
//! [`CacheAsideStore`](crate::CacheAsideStore) issues only the statements
//! defined here. The embedded backends recognize exactly this set through
//! [`parse`]; anything else is rejected as an unsupported statement.
//!
//! Result rows always carry the columns `login, first_name, last_name, age`
//! in that order.

use crate::session::{Query, Row, SessionError, Value};
use shardcache_common::{Error, Person, Result};
use shardcache_placement::split_routed;

pub const DROP_TABLE: &str = "DROP TABLE IF EXISTS Person";

pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS Person (\
login VARCHAR(256) NOT NULL, \
first_name VARCHAR(256) NOT NULL, \
last_name VARCHAR(256) NOT NULL, \
age BIGINT NOT NULL, \
PRIMARY KEY (login))";

pub const INSERT: &str =
    "INSERT INTO Person (login, first_name, last_name, age) VALUES (?, ?, ?, ?)";

pub const SELECT_BY_LOGIN: &str =
    "SELECT login, first_name, last_name, age FROM Person WHERE login = ?";

pub const SELECT_BY_NAME: &str = "SELECT login, first_name, last_name, age FROM Person \
WHERE first_name LIKE ? AND last_name LIKE ?";

pub const SELECT_ALL: &str = "SELECT login, first_name, last_name, age FROM Person";

/// Name of the table every statement targets
pub const TABLE: &str = "Person";

/// Decoded form of a dialect statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    DropTable,
    CreateTable,
    Insert(Person),
    SelectByLogin(String),
    SelectByName { first: String, last: String },
    SelectAll,
}

/// A command plus the shard its routing hint selects
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routed {
    pub shard: usize,
    pub command: Command,
}

/// Decode a routed statement against a topology of `shards` shards.
pub fn parse(query: &Query, shards: usize) -> std::result::Result<Routed, SessionError> {
    let (statement, hint) = split_routed(query.text());
    let hint = hint.ok_or_else(|| {
        SessionError::Statement(format!("statement has no routing hint: {statement}"))
    })?;
    if hint.shard() >= shards {
        return Err(SessionError::UnknownShard {
            shard: hint.shard(),
            shards,
        });
    }

    let params = query.params();
    let command = match statement {
        DROP_TABLE => {
            expect_params(params, 0)?;
            Command::DropTable
        }
        CREATE_TABLE => {
            expect_params(params, 0)?;
            Command::CreateTable
        }
        INSERT => {
            expect_params(params, 4)?;
            Command::Insert(Person {
                login: text_param(params, 0)?,
                first_name: text_param(params, 1)?,
                last_name: text_param(params, 2)?,
                age: int_param(params, 3)?,
            })
        }
        SELECT_BY_LOGIN => {
            expect_params(params, 1)?;
            Command::SelectByLogin(text_param(params, 0)?)
        }
        SELECT_BY_NAME => {
            expect_params(params, 2)?;
            Command::SelectByName {
                first: text_param(params, 0)?,
                last: text_param(params, 1)?,
            }
        }
        SELECT_ALL => {
            expect_params(params, 0)?;
            Command::SelectAll
        }
        other => {
            return Err(SessionError::Statement(format!(
                "unsupported statement: {other}"
            )));
        }
    };

    Ok(Routed {
        shard: hint.shard(),
        command,
    })
}

fn expect_params(params: &[Value], count: usize) -> std::result::Result<(), SessionError> {
    if params.len() == count {
        Ok(())
    } else {
        Err(SessionError::Statement(format!(
            "expected {count} parameters, got {}",
            params.len()
        )))
    }
}

fn text_param(params: &[Value], index: usize) -> std::result::Result<String, SessionError> {
    params[index]
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| SessionError::Statement(format!("parameter {index} must be text")))
}

fn int_param(params: &[Value], index: usize) -> std::result::Result<i64, SessionError> {
    params[index]
        .as_int()
        .ok_or_else(|| SessionError::Statement(format!("parameter {index} must be an integer")))
}

/// Render a record as a result row
#[must_use]
pub fn person_row(person: &Person) -> Row {
    vec![
        Value::Text(person.login.clone()),
        Value::Text(person.first_name.clone()),
        Value::Text(person.last_name.clone()),
        Value::Int(person.age),
    ]
}

/// Build a record from a result row by column position.
pub fn person_from_row(row: &Row) -> Result<Person> {
    let column = |index: usize, name: &str| {
        row.get(index)
            .ok_or_else(|| Error::malformed(format!("row is missing column `{name}`")))
    };
    let text = |index: usize, name: &str| {
        column(index, name)?
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| Error::malformed(format!("column `{name}` is not text")))
    };

    Ok(Person {
        login: text(0, "login")?,
        first_name: text(1, "first_name")?,
        last_name: text(2, "last_name")?,
        age: column(3, "age")?
            .as_int()
            .ok_or_else(|| Error::malformed("column `age` is not an integer"))?,
    })
}

/// LIKE pattern matching rows whose value starts with `prefix`.
///
/// `%`, `_` and `\` in the prefix are escaped so they match literally.
#[must_use]
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LikeToken {
    AnySequence,
    AnyChar,
    Literal(char),
}

/// Evaluate `text LIKE pattern` (case-sensitive, `\` escapes).
#[must_use]
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnySequence,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            c => LikeToken::Literal(c),
        });
    }
    let text: Vec<char> = text.chars().collect();
    match_tokens(&tokens, &text)
}

/// Two-pointer wildcard match. On a mismatch, resume after the most recent
/// `%` with one more text character consumed by it.
fn match_tokens(tokens: &[LikeToken], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // (token index after the last `%`, text index it currently resumes at)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnySequence) => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(LikeToken::AnyChar) => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((resume_p, resume_t)) => {
                    p = resume_p;
                    t = resume_t + 1;
                    backtrack = Some((resume_p, t));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == LikeToken::AnySequence)
}

/// Whether `person` satisfies a [`Command::SelectByName`] filter
#[must_use]
pub fn name_matches(first: &str, last: &str, person: &Person) -> bool {
    like_matches(first, &person.first_name) && like_matches(last, &person.last_name)
}

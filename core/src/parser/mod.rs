//! Single-step tokenizer.
//!
//! Source text is never parsed ahead: the interpreter asks for one token at
//! a time, starting at the cursor stored in the call frame of the string
//! being executed.

use crate::errors::{ErrorKind, Exception, Result};
use crate::values::Value;
use core::ops::Range;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "parser/tokens.pest"]
pub struct TokenParser;

/// One token and where it sits in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: Value,
    /// Byte range in the source text.
    pub span: Range<usize>,
}

impl Token {
    /// Byte offset right after the token.
    pub fn end(&self) -> usize {
        self.span.end
    }
}

/// Read the token following `cursor`, `None` when only blanks and comments
/// remain.
///
/// # Errors
///
/// - `undefinedresult` for an unterminated string.
/// - `limitcheck` for an integer literal that does not fit 64 bits.
pub fn next_token(source: &str, cursor: usize) -> Result<Option<Token>> {
    let rest = source.get(cursor..).ok_or_else(|| {
        Exception::internal(format!("cursor {} is not a token boundary", cursor))
    })?;
    let mut pairs = TokenParser::parse(Rule::next, rest).map_err(|error| {
        Exception::new(
            ErrorKind::UndefinedResult,
            format!("unterminated string at {}: {}", cursor, error.line()),
        )
    })?;
    let Some(next) = pairs.next() else {
        return Ok(None);
    };
    let Some(pair) = next.into_inner().find(|pair| pair.as_rule() != Rule::EOI) else {
        return Ok(None);
    };
    let span = pair.as_span();
    let range = cursor + span.start()..cursor + span.end();
    Ok(Some(Token {
        value: token_value(pair)?,
        span: range,
    }))
}

fn token_value(pair: Pair<Rule>) -> Result<Value> {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::integer => text.parse::<i64>().map(Value::integer).map_err(|_| {
            Exception::new(
                ErrorKind::LimitCheck,
                format!("integer literal {} is out of range", text),
            )
        }),
        Rule::string => {
            let content = pair
                .into_inner()
                .next()
                .map(|content| content.as_str())
                .unwrap_or_default();
            Ok(Value::string(unescape(content)))
        }
        Rule::literal_name => Ok(Value::literal_name(&text[1..])),
        Rule::delimiter | Rule::name => Ok(Value::name(text)),
        rule => Err(Exception::internal(format!("unexpected token rule {:?}", rule))),
    }
}

fn unescape(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// Every token of `source`, in order.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    while let Some(token) = next_token(source, cursor)? {
        cursor = token.end();
        tokens.push(token);
    }
    Ok(tokens)
}

//! Hand-rolled recursive-descent parser for the Google-style search
//! grammar: bare words, quoted phrases, `*` wildcards, parenthesised
//! `OR` groups, leading `-` negation, and reserved keywords.
//!
//! Reserved keywords (`table:`, `view:`, `column:`, `date:`) are global:
//! they never appear in the returned [`crate::ast::Node`] tree, they are
//! collected into [`Parser::keywords`] as a side effect of parsing.

use std::collections::HashMap;

use crate::error::{Result, SearchError};

/// One node of the boolean expression tree a query compiles against,
/// after reserved keywords have been stripped out into
/// [`Parser::keywords`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    /// A bare word, matched with `*` already present as a literal wildcard
    /// marker (translated to `%` at render time).
    Word(String),
    /// A double-quoted phrase, matched literally (no wildcard expansion).
    Phrase(String),
}

const RESERVED_KEYWORDS: [&str; 4] = ["table", "view", "column", "date"];

pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    /// `{"table": [...], "-column": [...], ...}`, lower-cased values,
    /// the key prefixed with `-` when the keyword itself was negated.
    pub keywords: HashMap<String, Vec<String>>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser { chars: source.chars().collect(), pos: 0, keywords: HashMap::new() }
    }

    /// Parses the whole query, returning `None` if it contained only
    /// reserved keywords (or was empty).
    pub fn parse(&mut self) -> Result<Option<Node>> {
        let node = self.parse_query()?;
        self.skip_ws();
        if !self.at_end() {
            return Err(SearchError::Unterminated { what: "group", offset: self.pos });
        }
        Ok(node)
    }

    fn parse_query(&mut self) -> Result<Option<Node>> {
        let mut parts = Vec::new();
        self.skip_ws();
        while !self.at_end() && self.peek() != Some(')') {
            if let Some(n) = self.parse_or_expr()? {
                parts.push(n);
            }
            self.skip_ws();
        }
        Ok(fold(parts, Node::And))
    }

    fn parse_or_expr(&mut self) -> Result<Option<Node>> {
        let mut parts = Vec::new();
        if let Some(n) = self.parse_atom()? {
            parts.push(n);
        }
        loop {
            let checkpoint = self.pos;
            self.skip_ws();
            if !self.consume_or_literal() {
                self.pos = checkpoint;
                break;
            }
            self.skip_ws();
            if let Some(n) = self.parse_atom()? {
                parts.push(n);
            }
        }
        Ok(fold(parts, Node::Or))
    }

    fn parse_atom(&mut self) -> Result<Option<Node>> {
        self.skip_ws();
        let negated = if self.peek() == Some('-') {
            self.advance();
            true
        } else {
            false
        };

        let node = match self.peek() {
            Some('(') => {
                let start = self.pos;
                self.advance();
                let inner = self.parse_query()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(SearchError::Unterminated { what: "group", offset: start });
                }
                self.advance();
                inner
            }
            Some('"') => Some(Node::Phrase(self.read_quoted()?)),
            Some(_) => {
                let mut word = self.read_word();
                if word.is_empty() {
                    return Ok(None);
                }
                if word.ends_with(':') && self.peek() == Some('"') {
                    word.push_str(&self.read_quoted()?);
                }
                match split_keyword(&word) {
                    Some((key, value)) => {
                        let full_key = if negated { format!("-{}", key.to_lowercase()) } else { key.to_lowercase() };
                        self.keywords.entry(full_key).or_default().push(value.to_lowercase());
                        return Ok(None);
                    }
                    None => Some(Node::Word(word)),
                }
            }
            None => None,
        };

        Ok(node.map(|n| if negated { Node::Not(Box::new(n)) } else { n }))
    }

    fn read_word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                break;
            }
            s.push(c);
            self.advance();
        }
        s
    }

    fn read_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return Ok(s);
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(SearchError::Unterminated { what: "quoted phrase", offset: start }),
            }
        }
    }

    fn consume_or_literal(&mut self) -> bool {
        if self.pos + 2 > self.chars.len() {
            return false;
        }
        let two: String = self.chars[self.pos..self.pos + 2].iter().collect();
        if !two.eq_ignore_ascii_case("or") {
            return false;
        }
        let boundary = self.chars.get(self.pos + 2).is_none_or(|c| c.is_whitespace() || *c == '(' || *c == ')');
        if boundary {
            self.pos += 2;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

fn fold(mut parts: Vec<Node>, wrap: impl FnOnce(Vec<Node>) -> Node) -> Option<Node> {
    match parts.len() {
        0 => None,
        1 => Some(parts.remove(0)),
        _ => Some(wrap(parts)),
    }
}

/// Splits `word` into `(key, value)` if it has the shape of one of the
/// reserved keywords; anything else (including an
/// unrecognised `foo:bar`) is left for the caller to treat as a literal
/// word, matching the original grammar's fallthrough.
fn split_keyword(word: &str) -> Option<(&str, &str)> {
    let (key, value) = word.split_once(':')?;
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !RESERVED_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
        return None;
    }
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(q: &str) -> (Option<Node>, HashMap<String, Vec<String>>) {
        let mut p = Parser::new(q);
        let node = p.parse().unwrap();
        (node, p.keywords)
    }

    #[test]
    fn bare_words_become_and() {
        let (node, _) = parse("foo bar");
        assert_eq!(node, Some(Node::And(vec![Node::Word("foo".into()), Node::Word("bar".into())])));
    }

    #[test]
    fn or_binds_within_a_group_of_atoms() {
        let (node, _) = parse("foo OR bar baz");
        assert_eq!(
            node,
            Some(Node::And(vec![
                Node::Or(vec![Node::Word("foo".into()), Node::Word("bar".into())]),
                Node::Word("baz".into()),
            ]))
        );
    }

    #[test]
    fn leading_dash_negates() {
        let (node, _) = parse("-foo");
        assert_eq!(node, Some(Node::Not(Box::new(Node::Word("foo".into())))));
    }

    #[test]
    fn quoted_phrase_is_literal() {
        let (node, _) = parse("\"hello world\"");
        assert_eq!(node, Some(Node::Phrase("hello world".into())));
    }

    #[test]
    fn parenthesised_group_can_be_negated() {
        let (node, _) = parse("-(foo bar)");
        assert_eq!(
            node,
            Some(Node::Not(Box::new(Node::And(vec![Node::Word("foo".into()), Node::Word("bar".into())]))))
        );
    }

    #[test]
    fn keywords_are_collected_and_excluded_from_the_tree() {
        let (node, keywords) = parse("date:2020..2021 -column:secret foo bar");
        assert_eq!(node, Some(Node::And(vec![Node::Word("foo".into()), Node::Word("bar".into())])));
        assert_eq!(keywords.get("date"), Some(&vec!["2020..2021".to_string()]));
        assert_eq!(keywords.get("-column"), Some(&vec!["secret".to_string()]));
    }

    #[test]
    fn unrecognised_prefix_is_a_literal_word() {
        let (node, keywords) = parse("foo:bar");
        assert_eq!(node, Some(Node::Word("foo:bar".into())));
        assert!(keywords.is_empty());
    }
}

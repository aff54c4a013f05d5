//! Recursive-descent parser over the [`Lexer`](crate::lexer::Lexer) token
//! stream, producing the tagged AST in [`crate::ast`].
//!
//! Expression-shaped regions (`DEFAULT`, `CHECK`, `WHERE`, `WHEN`, trigger
//! bodies, `SELECT` statements) are not parsed into sub-trees: they are
//! sliced verbatim out of the source text by byte span. This keeps the
//! grammar tractable while still round-tripping exactly, including any
//! comments inside those regions (see DESIGN.md).

use std::collections::HashMap;

use crate::ast::*;
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, thiserror::Error)]
#[error("parse error at byte {pos}: {message}")]
pub struct ParseError {
    pub pos: usize,
    pub message: String,
}

impl From<crate::lexer::LexError> for ParseError {
    fn from(e: crate::lexer::LexError) -> Self {
        ParseError {
            pos: e.pos,
            message: e.message,
        }
    }
}

/// Parses a single CREATE statement. `expected` restricts which category
/// is accepted, mirroring the `category` parameter on the source's
/// `Parser().parse(sql, category)`.
pub fn parse(sql: &str, expected: Option<Category>) -> Result<Stmt, ParseError> {
    let toks = Lexer::tokenize(sql)?;
    let mut p = Parser { src: sql, toks, pos: 0 };
    let stmt = p.parse_stmt()?;
    if let Some(want) = expected {
        if stmt.category() != want {
            return Err(p.err(format!(
                "expected {want} statement, found {}",
                stmt.category()
            )));
        }
    }
    Ok(stmt)
}

struct Parser<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Token {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            pos: self.cur().start,
            message: message.into(),
        }
    }

    fn ieq(&self, word: &str) -> bool {
        self.cur().ieq(word)
    }

    fn ieq_seq(&self, words: &[&str]) -> bool {
        words
            .iter()
            .enumerate()
            .all(|(i, w)| self.toks.get(self.pos + i).is_some_and(|t| t.ieq(w)))
    }

    fn eat_kw(&mut self, word: &str) -> bool {
        if self.ieq(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw_seq(&mut self, words: &[&str]) -> bool {
        if self.ieq_seq(words) {
            for _ in words {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_kw(word) {
            Ok(())
        } else {
            Err(self.err(format!("expected '{word}'")))
        }
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.cur().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.err(format!("expected {kind}, found {:?}", self.cur().kind)))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        if self.cur().is_ident_like() {
            Ok(self.advance().value())
        } else {
            Err(self.err("expected identifier"))
        }
    }

    /// Parses `[schema.]name`, returning `(schema, name)`.
    fn parse_qualified_name(&mut self) -> Result<(Option<String>, String), ParseError> {
        let first = self.expect_name()?;
        if self.cur().kind == TokenKind::Dot {
            self.advance();
            let second = self.expect_name()?;
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }

    /// Returns the token index just past the `RParen` matching the
    /// `LParen` at `open_idx`.
    fn balanced_paren_end(&self, open_idx: usize) -> Result<usize, ParseError> {
        let mut depth = 0i32;
        let mut i = open_idx;
        loop {
            match self.toks.get(i) {
                None => {
                    return Err(ParseError {
                        pos: self.toks[open_idx].start,
                        message: "unbalanced parentheses".into(),
                    })
                }
                Some(t) if t.kind == TokenKind::LParen => depth += 1,
                Some(t) if t.kind == TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
                Some(t) if t.kind == TokenKind::Eof => {
                    return Err(ParseError {
                        pos: t.start,
                        message: "unbalanced parentheses".into(),
                    })
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Raw source text spanning tokens `[from, to_excl)`, trimmed.
    fn raw_span(&self, from: usize, to_excl: usize) -> String {
        if from >= to_excl {
            return String::new();
        }
        let start = self.toks[from].start;
        let end = self.toks[to_excl - 1].end;
        self.src[start..end].trim().to_string()
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("CREATE")?;
        let unique = self.eat_kw("UNIQUE");
        let temporary = self.eat_kw("TEMP") || self.eat_kw("TEMPORARY");

        if self.eat_kw("TABLE") {
            self.parse_create_table(temporary)
        } else if self.eat_kw("INDEX") {
            self.parse_create_index(unique)
        } else if self.eat_kw("TRIGGER") {
            self.parse_create_trigger(temporary)
        } else if self.eat_kw("VIEW") {
            self.parse_create_view(temporary)
        } else if self.eat_kw("VIRTUAL") {
            self.expect_kw("TABLE")?;
            self.parse_create_virtual_table()
        } else {
            Err(self.err("expected TABLE, INDEX, TRIGGER, VIEW, or VIRTUAL TABLE"))
        }
    }

    fn parse_exists_clause(&mut self) -> bool {
        self.eat_kw_seq(&["IF", "NOT", "EXISTS"])
    }

    // -- CREATE TABLE ---------------------------------------------------

    fn parse_create_table(&mut self, temporary: bool) -> Result<Stmt, ParseError> {
        let exists = self.parse_exists_clause();
        let (schema, name) = self.parse_qualified_name()?;

        // CREATE TABLE AS SELECT is out of scope for the DDL subset; if no
        // paren follows, surface a clear parse error rather than guessing.
        self.expect_kind(TokenKind::LParen)?;

        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        loop {
            if self.cur().kind == TokenKind::RParen {
                break;
            }
            if self.is_table_constraint_start() {
                constraints.push(self.parse_table_constraint()?);
            } else {
                columns.push(self.parse_column_def()?);
            }
            if self.cur().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_kind(TokenKind::RParen)?;

        let mut without_rowid = false;
        if self.eat_kw("WITHOUT") {
            self.expect_kw("ROWID")?;
            without_rowid = true;
        }

        Ok(Stmt::CreateTable(CreateTable {
            name,
            schema,
            temporary,
            exists,
            without_rowid,
            columns,
            constraints,
        }))
    }

    fn is_table_constraint_start(&self) -> bool {
        self.cur().kind == TokenKind::Ident
            && (self.ieq("CONSTRAINT")
                || self.ieq("PRIMARY")
                || self.ieq("UNIQUE")
                || self.ieq("CHECK")
                || self.ieq("FOREIGN"))
    }

    fn parse_constraint_name(&mut self) -> Option<String> {
        if self.eat_kw("CONSTRAINT") {
            self.expect_name().ok()
        } else {
            None
        }
    }

    fn parse_table_constraint(&mut self) -> Result<TableConstraint, ParseError> {
        let name = self.parse_constraint_name();
        if self.eat_kw("PRIMARY") {
            self.expect_kw("KEY")?;
            let key = self.parse_indexed_column_list()?;
            let conflict = self.parse_optional_conflict_clause()?;
            Ok(TableConstraint::PrimaryKey { name, key, conflict })
        } else if self.eat_kw("UNIQUE") {
            let key = self.parse_indexed_column_list()?;
            let conflict = self.parse_optional_conflict_clause()?;
            Ok(TableConstraint::Unique { name, key, conflict })
        } else if self.eat_kw("CHECK") {
            let open = self.pos;
            self.expect_kind(TokenKind::LParen)?;
            let end = self.balanced_paren_end(open)?;
            let check = self.raw_span(open + 1, end - 1);
            self.pos = end;
            Ok(TableConstraint::Check { name, check })
        } else if self.eat_kw("FOREIGN") {
            self.expect_kw("KEY")?;
            let columns = self.parse_name_list()?;
            let (table, key, defer, action, r#match) = self.parse_references_clause()?;
            Ok(TableConstraint::ForeignKey {
                name,
                columns,
                table,
                key,
                defer,
                action,
                r#match,
            })
        } else {
            Err(self.err("expected table constraint"))
        }
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_kind(TokenKind::LParen)?;
        let mut names = Vec::new();
        loop {
            if self.cur().kind == TokenKind::RParen {
                break;
            }
            names.push(self.expect_name()?);
            if self.cur().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_kind(TokenKind::RParen)?;
        Ok(names)
    }

    fn parse_indexed_column_list(&mut self) -> Result<Vec<IndexedColumn>, ParseError> {
        self.expect_kind(TokenKind::LParen)?;
        let mut cols = Vec::new();
        loop {
            if self.cur().kind == TokenKind::RParen {
                break;
            }
            let name = self.expect_name()?;
            let collate = if self.eat_kw("COLLATE") {
                Some(self.expect_name()?)
            } else {
                None
            };
            let direction = self.parse_optional_direction();
            cols.push(IndexedColumn { name, collate, direction });
            if self.cur().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_kind(TokenKind::RParen)?;
        Ok(cols)
    }

    fn parse_optional_direction(&mut self) -> Option<Direction> {
        if self.eat_kw("ASC") {
            Some(Direction::Asc)
        } else if self.eat_kw("DESC") {
            Some(Direction::Desc)
        } else {
            None
        }
    }

    fn parse_optional_conflict_clause(&mut self) -> Result<Option<ConflictClause>, ParseError> {
        if self.eat_kw_seq(&["ON", "CONFLICT"]) {
            Ok(Some(self.parse_conflict_algorithm()?))
        } else {
            Ok(None)
        }
    }

    fn parse_conflict_algorithm(&mut self) -> Result<ConflictClause, ParseError> {
        for (word, value) in [
            ("ROLLBACK", ConflictClause::Rollback),
            ("ABORT", ConflictClause::Abort),
            ("FAIL", ConflictClause::Fail),
            ("IGNORE", ConflictClause::Ignore),
            ("REPLACE", ConflictClause::Replace),
        ] {
            if self.eat_kw(word) {
                return Ok(value);
            }
        }
        Err(self.err("expected conflict algorithm"))
    }

    fn parse_references_clause(
        &mut self,
    ) -> Result<
        (
            String,
            Vec<String>,
            Option<DeferClause>,
            HashMap<FkEvent, FkAction>,
            Option<String>,
        ),
        ParseError,
    > {
        self.expect_kw("REFERENCES")?;
        let (_, table) = self.parse_qualified_name()?;
        let key = if self.cur().kind == TokenKind::LParen {
            self.parse_name_list()?
        } else {
            Vec::new()
        };
        let mut action = HashMap::new();
        let mut r#match = None;
        loop {
            if self.eat_kw("ON") {
                let event = if self.eat_kw("DELETE") {
                    FkEvent::Delete
                } else if self.eat_kw("UPDATE") {
                    FkEvent::Update
                } else {
                    return Err(self.err("expected DELETE or UPDATE"));
                };
                let act = self.parse_fk_action()?;
                action.insert(event, act);
            } else if self.eat_kw("MATCH") {
                r#match = Some(self.expect_name()?);
            } else {
                break;
            }
        }
        let defer = self.parse_optional_defer_clause()?;
        Ok((table, key, defer, action, r#match))
    }

    fn parse_fk_action(&mut self) -> Result<FkAction, ParseError> {
        if self.eat_kw_seq(&["SET", "NULL"]) {
            Ok(FkAction::SetNull)
        } else if self.eat_kw_seq(&["SET", "DEFAULT"]) {
            Ok(FkAction::SetDefault)
        } else if self.eat_kw("CASCADE") {
            Ok(FkAction::Cascade)
        } else if self.eat_kw("RESTRICT") {
            Ok(FkAction::Restrict)
        } else if self.eat_kw_seq(&["NO", "ACTION"]) {
            Ok(FkAction::NoAction)
        } else {
            Err(self.err("expected foreign key action"))
        }
    }

    fn parse_optional_defer_clause(&mut self) -> Result<Option<DeferClause>, ParseError> {
        let not = self.eat_kw("NOT");
        if self.eat_kw("DEFERRABLE") {
            let initial = if self.eat_kw("INITIALLY") {
                if self.eat_kw("DEFERRED") {
                    Some(InitialMode::Deferred)
                } else if self.eat_kw("IMMEDIATE") {
                    Some(InitialMode::Immediate)
                } else {
                    return Err(self.err("expected DEFERRED or IMMEDIATE"));
                }
            } else {
                None
            };
            Ok(Some(DeferClause { not, initial }))
        } else if not {
            Err(self.err("expected DEFERRABLE after NOT"))
        } else {
            Ok(None)
        }
    }

    fn parse_column_def(&mut self) -> Result<Column, ParseError> {
        let name = self.expect_name()?;
        let r#type = self.parse_optional_type_name();

        let mut col = Column {
            name,
            r#type,
            ..Default::default()
        };

        loop {
            self.parse_constraint_name(); // per-column CONSTRAINT name: accepted but not retained
            if self.eat_kw("PRIMARY") {
                self.expect_kw("KEY")?;
                let direction = self.parse_optional_direction();
                let conflict = self.parse_optional_conflict_clause()?;
                let autoincrement = self.eat_kw("AUTOINCREMENT");
                col.pk = Some(PrimaryKeyColumn { autoincrement, direction, conflict });
            } else if self.eat_kw("NOT") {
                self.expect_kw("NULL")?;
                let conflict = self.parse_optional_conflict_clause()?;
                col.notnull = Some(NotNullConstraint { conflict });
            } else if self.eat_kw("UNIQUE") {
                let conflict = self.parse_optional_conflict_clause()?;
                col.unique = Some(UniqueConstraint { conflict });
            } else if self.eat_kw("DEFAULT") {
                col.default = Some(self.parse_default_expr()?);
            } else if self.eat_kw("CHECK") {
                let open = self.pos;
                self.expect_kind(TokenKind::LParen)?;
                let end = self.balanced_paren_end(open)?;
                col.check = Some(self.raw_span(open + 1, end - 1));
                self.pos = end;
            } else if self.eat_kw("COLLATE") {
                col.collate = Some(self.expect_name()?);
            } else if self.ieq("REFERENCES") {
                let (table, key, defer, action, r#match) = self.parse_references_clause()?;
                col.fk = Some(ForeignKey { table, key, defer, action, r#match });
            } else if self.eat_kw_seq(&["GENERATED", "ALWAYS", "AS"]) || self.ieq("AS") {
                self.eat_kw("AS");
                let open = self.pos;
                self.expect_kind(TokenKind::LParen)?;
                let end = self.balanced_paren_end(open)?;
                self.pos = end;
                let _ = self.eat_kw("STORED") || self.eat_kw("VIRTUAL");
            } else {
                break;
            }
        }
        Ok(col)
    }

    /// Captures the column type phrase (e.g. `VARCHAR(255)`, `DOUBLE
    /// PRECISION`, `UNSIGNED BIG INT`) as raw text, stopping at the first
    /// column-constraint keyword, comma, or closing paren.
    fn parse_optional_type_name(&mut self) -> Option<String> {
        const STOP_WORDS: &[&str] = &[
            "PRIMARY", "NOT", "NULL", "UNIQUE", "DEFAULT", "CHECK", "COLLATE", "REFERENCES",
            "CONSTRAINT", "GENERATED", "AS", "WITHOUT",
        ];
        let start = self.pos;
        loop {
            match self.cur().kind {
                TokenKind::Comma | TokenKind::RParen | TokenKind::Eof => break,
                TokenKind::LParen => {
                    let end = match self.balanced_paren_end(self.pos) {
                        Ok(e) => e,
                        Err(_) => break,
                    };
                    self.pos = end;
                }
                TokenKind::Ident
                    if STOP_WORDS.iter().any(|w| self.ieq(w)) && self.pos > start =>
                {
                    break
                }
                _ => {
                    self.advance();
                }
            }
        }
        if self.pos == start {
            None
        } else {
            Some(self.raw_span(start, self.pos))
        }
    }

    /// `DEFAULT` accepts a parenthesised expr, a signed literal, or a
    /// bare keyword like CURRENT_TIMESTAMP.
    fn parse_default_expr(&mut self) -> Result<String, ParseError> {
        if self.cur().kind == TokenKind::LParen {
            let open = self.pos;
            let end = self.balanced_paren_end(open)?;
            let text = self.raw_span(open, end);
            self.pos = end;
            return Ok(text);
        }
        let start = self.pos;
        if matches!(self.cur().text.as_str(), "+" | "-") {
            self.advance();
        }
        self.advance();
        Ok(self.raw_span(start, self.pos))
    }

    // -- CREATE INDEX ----------------------------------------------------

    fn parse_create_index(&mut self, unique: bool) -> Result<Stmt, ParseError> {
        let exists = self.parse_exists_clause();
        let (schema, name) = self.parse_qualified_name()?;
        self.expect_kw("ON")?;
        let table = self.expect_name()?;
        self.expect_kind(TokenKind::LParen)?;
        let mut columns = Vec::new();
        loop {
            if self.cur().kind == TokenKind::RParen {
                break;
            }
            columns.push(self.parse_index_key_column()?);
            if self.cur().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_kind(TokenKind::RParen)?;
        let r#where = if self.eat_kw("WHERE") {
            let start = self.pos;
            while !self.at_eof() && self.cur().kind != TokenKind::Semicolon {
                self.advance();
            }
            Some(self.raw_span(start, self.pos))
        } else {
            None
        };
        Ok(Stmt::CreateIndex(CreateIndex {
            name,
            table,
            schema,
            unique,
            exists,
            columns,
            r#where,
        }))
    }

    fn parse_index_key_column(&mut self) -> Result<IndexKeyColumn, ParseError> {
        let (name, expr) = if self.cur().is_ident_like()
            && !matches!(self.toks.get(self.pos + 1).map(|t| t.kind), Some(TokenKind::LParen))
        {
            (Some(self.advance().value()), None)
        } else {
            let start = self.pos;
            if self.cur().kind == TokenKind::LParen {
                let end = self.balanced_paren_end(self.pos)?;
                self.pos = end;
            } else {
                self.advance();
            }
            (None, Some(self.raw_span(start, self.pos)))
        };
        let collate = if self.eat_kw("COLLATE") {
            Some(self.expect_name()?)
        } else {
            None
        };
        let direction = self.parse_optional_direction();
        Ok(IndexKeyColumn { name, expr, collate, direction })
    }

    // -- CREATE TRIGGER ---------------------------------------------------

    fn parse_create_trigger(&mut self, temporary: bool) -> Result<Stmt, ParseError> {
        let exists = self.parse_exists_clause();
        let (schema, name) = self.parse_qualified_name()?;

        let upon = if self.eat_kw("BEFORE") {
            TriggerUpon::Before
        } else if self.eat_kw("AFTER") {
            TriggerUpon::After
        } else if self.eat_kw_seq(&["INSTEAD", "OF"]) {
            TriggerUpon::InsteadOf
        } else {
            TriggerUpon::Before
        };

        let mut columns = Vec::new();
        let action = if self.eat_kw("DELETE") {
            TriggerAction::Delete
        } else if self.eat_kw("INSERT") {
            TriggerAction::Insert
        } else if self.eat_kw("UPDATE") {
            if self.eat_kw("OF") {
                loop {
                    columns.push(self.expect_name()?);
                    if self.cur().kind == TokenKind::Comma {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            TriggerAction::Update
        } else {
            return Err(self.err("expected DELETE, INSERT, or UPDATE"));
        };

        self.expect_kw("ON")?;
        let table = self.expect_name()?;

        let for_each_row = self.eat_kw_seq(&["FOR", "EACH", "ROW"]);

        let when = if self.eat_kw("WHEN") {
            let start = self.pos;
            while !self.ieq("BEGIN") && !self.at_eof() {
                self.advance();
            }
            Some(self.raw_span(start, self.pos))
        } else {
            None
        };

        self.expect_kw("BEGIN")?;
        let body_start = self.pos;
        let mut depth = 1i32;
        loop {
            if self.at_eof() {
                return Err(self.err("unterminated trigger body, expected END"));
            }
            if self.ieq("BEGIN") {
                depth += 1;
            } else if self.ieq("END") {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            self.advance();
        }
        let body = self.raw_span(body_start, self.pos);
        self.expect_kw("END")?;

        Ok(Stmt::CreateTrigger(CreateTrigger {
            name,
            schema,
            temporary,
            exists,
            upon,
            action,
            columns,
            table,
            for_each_row,
            when,
            body,
        }))
    }

    // -- CREATE VIEW -------------------------------------------------------

    fn parse_create_view(&mut self, temporary: bool) -> Result<Stmt, ParseError> {
        let exists = self.parse_exists_clause();
        let (schema, name) = self.parse_qualified_name()?;
        let columns = if self.cur().kind == TokenKind::LParen {
            Some(self.parse_name_list()?)
        } else {
            None
        };
        self.expect_kw("AS")?;
        let start = self.pos;
        while !self.at_eof() && self.cur().kind != TokenKind::Semicolon {
            self.advance();
        }
        let select = self.raw_span(start, self.pos);
        Ok(Stmt::CreateView(CreateView {
            name,
            schema,
            temporary,
            exists,
            columns,
            select,
        }))
    }

    // -- CREATE VIRTUAL TABLE ----------------------------------------------

    fn parse_create_virtual_table(&mut self) -> Result<Stmt, ParseError> {
        let exists = self.parse_exists_clause();
        let (schema, name) = self.parse_qualified_name()?;
        self.expect_kw("USING")?;
        let module_name = self.expect_name()?;
        let mut arguments = Vec::new();
        if self.cur().kind == TokenKind::LParen {
            let open = self.pos;
            self.advance();
            let end = self.balanced_paren_end(open)?;
            loop {
                if self.pos + 1 >= end {
                    break;
                }
                let arg_start = self.pos;
                let mut depth = 0i32;
                loop {
                    if self.pos + 1 >= end {
                        break;
                    }
                    match self.cur().kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => depth -= 1,
                        TokenKind::Comma if depth == 0 => break,
                        _ => {}
                    }
                    self.advance();
                }
                arguments.push(self.raw_span(arg_start, self.pos));
                if self.cur().kind == TokenKind::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
            self.pos = end;
        }
        Ok(Stmt::CreateVirtualTable(CreateVirtualTable {
            name,
            schema,
            exists,
            module: ModuleClause { name: module_name, arguments },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_create_table() {
        let stmt = parse("CREATE TABLE t (a INT, b TEXT)", None).unwrap();
        let Stmt::CreateTable(t) = stmt else { panic!("wrong variant") };
        assert_eq!(t.name, "t");
        assert_eq!(t.columns.len(), 2);
        assert_eq!(t.columns[0].name, "a");
        assert_eq!(t.columns[0].r#type.as_deref(), Some("INT"));
    }

    #[test]
    fn parses_primary_key_and_fk() {
        let sql = "CREATE TABLE c (pid INTEGER REFERENCES p(id) ON DELETE CASCADE)";
        let stmt = parse(sql, None).unwrap();
        let Stmt::CreateTable(t) = stmt else { panic!() };
        let fk = t.columns[0].fk.as_ref().unwrap();
        assert_eq!(fk.table, "p");
        assert_eq!(fk.key, vec!["id".to_string()]);
        assert_eq!(fk.action.get(&FkEvent::Delete), Some(&FkAction::Cascade));
    }

    #[test]
    fn parses_table_constraint_and_without_rowid() {
        let sql = "CREATE TABLE t (a INT, b INT, PRIMARY KEY (a, b)) WITHOUT ROWID";
        let stmt = parse(sql, None).unwrap();
        let Stmt::CreateTable(t) = stmt else { panic!() };
        assert!(t.without_rowid);
        assert_eq!(t.constraints.len(), 1);
        match &t.constraints[0] {
            TableConstraint::PrimaryKey { key, .. } => assert_eq!(key.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_create_index_with_where() {
        let sql = "CREATE UNIQUE INDEX ix ON t (a, b DESC) WHERE a IS NOT NULL";
        let stmt = parse(sql, None).unwrap();
        let Stmt::CreateIndex(i) = stmt else { panic!() };
        assert!(i.unique);
        assert_eq!(i.columns.len(), 2);
        assert_eq!(i.columns[1].direction, Some(Direction::Desc));
        assert_eq!(i.r#where.as_deref(), Some("a IS NOT NULL"));
    }

    #[test]
    fn parses_create_view() {
        let stmt = parse("CREATE VIEW v AS SELECT a FROM t", None).unwrap();
        let Stmt::CreateView(v) = stmt else { panic!() };
        assert_eq!(v.select, "SELECT a FROM t");
    }

    #[test]
    fn parses_create_trigger_with_update_of() {
        let sql = "CREATE TRIGGER tr AFTER UPDATE OF a, b ON t FOR EACH ROW BEGIN SELECT 1; END";
        let stmt = parse(sql, None).unwrap();
        let Stmt::CreateTrigger(t) = stmt else { panic!() };
        assert_eq!(t.columns, vec!["a", "b"]);
        assert!(t.for_each_row);
        assert_eq!(t.body.trim(), "SELECT 1;");
    }

    #[test]
    fn parses_create_virtual_table() {
        let stmt = parse("CREATE VIRTUAL TABLE t USING fts5(a, b)", None).unwrap();
        let Stmt::CreateVirtualTable(v) = stmt else { panic!() };
        assert_eq!(v.module.name, "fts5");
        assert_eq!(v.module.arguments, vec!["a", "b"]);
    }

    #[test]
    fn quoted_identifiers_unquote_in_name() {
        let stmt = parse("CREATE TABLE \"my table\" (a INT)", None).unwrap();
        assert_eq!(stmt.name(), "my table");
    }

    #[test]
    fn category_mismatch_is_an_error() {
        let err = parse("CREATE TABLE t (a INT)", Some(Category::View)).unwrap_err();
        assert!(err.message.contains("expected view"));
    }
}

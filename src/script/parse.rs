//! Line-level parsing of build scripts.
//!
//! The scanner hands single lines to this module. A line outside a rule
//! block is classified as a comment, an assignment, a call or a rule header;
//! a line inside a block becomes an [`ActionStmt`]. Calls are recognised by
//! an identifier immediately followed by `(`, so `echo (x)` inside a rule
//! body is a shell command.

use std::sync::LazyLock;

use regex::Regex;

use super::ast::{ActionStmt, Call, Expr, HostStmt};
use crate::expand::{Template, expand};

#[expect(clippy::expect_used, reason = "patterns are compile-time constants")]
static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*([A-Za-z_][A-Za-z0-9_]*)[ \t]*(\+?=)(.*)$").expect("assign pattern")
});

#[expect(clippy::expect_used, reason = "patterns are compile-time constants")]
static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\(").expect("call pattern"));

#[expect(clippy::expect_used, reason = "patterns are compile-time constants")]
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)(.*):(.*)$").expect("header pattern"));

/// A parse failure inside one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    /// Byte offset from the start of the line.
    pub offset: usize,
    pub message: String,
}

/// A rule header `targets: sources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub indent: String,
    pub targets: Template,
    pub sources: Template,
}

/// Classification of a line read outside a rule block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostLine {
    /// Blank or comment line.
    Ignored,
    Stmt(HostStmt),
    Header(Header),
}

/// Number of leading space and tab characters.
pub(crate) fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| matches!(c, ' ' | '\t')).count()
}

fn indent_bytes(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

pub(crate) fn parse_host_line(line: &str) -> Result<HostLine, SyntaxError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(HostLine::Ignored);
    }
    if let Some(caps) = ASSIGN_RE.captures(line)
        && let (Some(name), Some(op), Some(rhs)) = (caps.get(1), caps.get(2), caps.get(3))
    {
        let value = parse_value(line, rhs.start())?;
        return Ok(HostLine::Stmt(HostStmt::Assign {
            name: name.as_str().to_owned(),
            append: op.as_str() == "+=",
            value,
        }));
    }
    let start = indent_bytes(line);
    if line.get(start..).is_some_and(|rest| CALL_RE.is_match(rest)) {
        return parse_statement_call(line, start).map(|call| HostLine::Stmt(HostStmt::Call(call)));
    }
    if let Some(caps) = HEADER_RE.captures(line)
        && let (Some(indent), Some(targets), Some(sources)) = (caps.get(1), caps.get(2), caps.get(3))
    {
        return Ok(HostLine::Header(Header {
            indent: indent.as_str().to_owned(),
            targets: expand(targets.as_str().trim()),
            sources: expand(sources.as_str().trim()),
        }));
    }
    Err(SyntaxError {
        offset: start,
        message: "expected an assignment, a function call or a rule header".into(),
    })
}

/// Parse a rule body line; comments yield `None`.
pub(crate) fn parse_action_line(line: &str) -> Result<Option<ActionStmt>, SyntaxError> {
    let start = indent_bytes(line);
    let body = line.get(start..).unwrap_or_default().trim_end();
    if body.is_empty() || body.starts_with('#') {
        return Ok(None);
    }
    if CALL_RE.is_match(body) {
        return parse_statement_call(line, start).map(|call| Some(ActionStmt::Call(call)));
    }
    Ok(Some(ActionStmt::Command(expand(body))))
}

fn parse_statement_call(line: &str, start: usize) -> Result<Call, SyntaxError> {
    let mut cursor = Cursor::new(line, start);
    let call = cursor.call()?;
    cursor.skip_ws();
    if !cursor.at_end() && cursor.peek() != Some('#') {
        return Err(cursor.error("unexpected text after call"));
    }
    Ok(call)
}

/// Parse the right-hand side of an assignment starting at byte `start`.
fn parse_value(line: &str, start: usize) -> Result<Expr, SyntaxError> {
    let mut cursor = Cursor::new(line, start);
    cursor.skip_ws();
    let rest = cursor.rest().trim_end();
    if rest.starts_with('"') || CALL_RE.is_match(rest) {
        let expr = cursor.expr()?;
        cursor.skip_ws();
        if !cursor.at_end() {
            return Err(cursor.error("unexpected text after value"));
        }
        return Ok(expr);
    }
    Ok(Expr::Text(expand(rest)))
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(text: &'a str, pos: usize) -> Self {
        Self { text, pos }
    }

    fn rest(&self) -> &'a str {
        self.text.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.rest().trim_end().is_empty()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> SyntaxError {
        SyntaxError {
            offset: self.pos,
            message: message.to_owned(),
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(idx, ch)| {
                !(ch.is_ascii_alphabetic() || *ch == '_' || (*idx > 0 && ch.is_ascii_digit()))
            })
            .map_or(rest.len(), |(idx, _)| idx);
        if len == 0 {
            return None;
        }
        self.pos += len;
        rest.get(..len)
    }

    fn call(&mut self) -> Result<Call, SyntaxError> {
        let name = self
            .ident()
            .ok_or_else(|| self.error("expected a function name"))?
            .to_owned();
        if self.bump() != Some('(') {
            return Err(self.error("expected `(`"));
        }
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Call { name, args });
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            let at = self.pos;
            match self.bump() {
                Some(',') => {}
                Some(')') => return Ok(Call { name, args }),
                Some(_) => {
                    return Err(SyntaxError {
                        offset: at,
                        message: "expected `,` or `)`".into(),
                    });
                }
                None => return Err(self.error(&format!("unclosed `(` in call to `{name}`"))),
            }
        }
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.string().map(|text| Expr::Text(expand(&text))),
            Some(_) if CALL_RE.is_match(self.rest()) => self.call().map(Expr::Call),
            _ => self.word(),
        }
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let open = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(ch @ ('"' | '\\')) => out.push(ch),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                Some(ch) => out.push(ch),
                None => break,
            }
        }
        Err(SyntaxError {
            offset: open,
            message: "unterminated string".into(),
        })
    }

    /// Bare text up to a top-level `,` or `)`; `$( … )` is kept whole.
    fn word(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut prev = None;
        while let Some(ch) = self.peek() {
            match ch {
                '(' if prev == Some('$') => depth += 1,
                ')' if depth > 0 => depth -= 1,
                ',' | ')' | '"' if depth == 0 => break,
                _ => {}
            }
            prev = Some(ch);
            self.bump();
        }
        let word = self.text.get(start..self.pos).unwrap_or_default().trim();
        if word.is_empty() {
            return Err(SyntaxError {
                offset: start,
                message: "expected an expression".into(),
            });
        }
        Ok(Expr::Text(expand(word)))
    }
}

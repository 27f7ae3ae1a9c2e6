//! Lowering of build scripts into numbered programs.
//!
//! The scanner has two states. In the normal state each line is host code
//! or a rule header. A header switches to the in-rule state, where lines
//! indented deeper than the header form the rule body. The first line that
//! is blank or not indented deeper ends the block and is then scanned again
//! in the normal state.
//!
//! Every script line becomes one program line. Ending a block injects a
//! `pass` line when the body was empty and a `register(...)` line that binds
//! the rule; the number of each injected line is recorded in the program's
//! [`RemapTable`].

use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use super::ast::{HostStmt, Step};
use super::diagnostics::TranslationError;
use super::parse::{HostLine, SyntaxError, indent_width, parse_action_line, parse_host_line};
use crate::expand::Template;
use crate::remap::{Location, RemapTable};

/// A rule binding injected at the end of a rule block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Target list, rendered when the registration runs.
    pub targets: Template,
    /// Source list, rendered when the registration runs.
    pub sources: Template,
    /// Script line of the rule header.
    pub header_line: usize,
    /// Body statements.
    pub steps: Arc<[Step]>,
}

/// What one program line does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Host code; `stmt` is `None` for blanks and comments.
    Host {
        /// Line as written.
        text: String,
        /// Parsed statement.
        stmt: Option<HostStmt>,
    },
    /// Placeholder for a rule header.
    Header {
        /// Indentation of the header.
        indent: String,
        /// Targets as written.
        targets: Template,
        /// Sources as written.
        sources: Template,
    },
    /// A rule body line.
    Body {
        /// Line as written.
        text: String,
    },
    /// Injected no-op for an empty rule body.
    Pass {
        /// Indentation of the header.
        indent: String,
    },
    /// Injected rule registration.
    Register {
        /// Indentation of the header.
        indent: String,
        /// The rule to bind.
        registration: Registration,
    },
}

impl LineKind {
    /// Whether the line was added by the translator.
    #[must_use]
    pub const fn is_injected(&self) -> bool {
        matches!(self, Self::Pass { .. } | Self::Register { .. })
    }
}

/// A numbered program line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    /// 1-based line number in the program.
    pub number: usize,
    /// Content of the line.
    pub kind: LineKind,
}

/// The translated form of one build script.
#[derive(Debug, Clone)]
pub struct Program {
    file: Utf8PathBuf,
    lines: Vec<ProgramLine>,
    remap: RemapTable,
}

impl Program {
    /// Script the program was translated from.
    #[must_use]
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    /// Program lines in order.
    #[must_use]
    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    /// Injected-line boundaries.
    #[must_use]
    pub const fn remap(&self) -> &RemapTable {
        &self.remap
    }

    /// Location of program line `number`.
    #[must_use]
    pub fn location(&self, number: usize) -> Location {
        Location::generated(self.file.clone(), number)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            write!(f, "{:>5}  ", line.number)?;
            match &line.kind {
                LineKind::Host { text, .. } | LineKind::Body { text } => writeln!(f, "{text}")?,
                LineKind::Header {
                    indent,
                    targets,
                    sources,
                } => writeln!(f, "{indent}rule {targets} : {sources}")?,
                LineKind::Pass { indent } => writeln!(f, "{indent}\tpass")?,
                LineKind::Register {
                    indent,
                    registration,
                } => writeln!(
                    f,
                    "{indent}register([{}], [{}], \"{}\", {})",
                    registration.targets, registration.sources, self.file, registration.header_line
                )?,
            }
        }
        Ok(())
    }
}

struct OpenRule {
    indent: String,
    width: usize,
    header_line: usize,
    targets: Template,
    sources: Template,
    steps: Vec<Step>,
    body_lines: usize,
}

struct Translator<'a> {
    file: &'a Utf8Path,
    source: &'a str,
    lines: Vec<ProgramLine>,
    remap: RemapTable,
    open: Option<OpenRule>,
}

/// Translate `source`, the text of `file`.
///
/// # Errors
///
/// Returns [`TranslationError`] for the first malformed line.
pub fn translate(file: &Utf8Path, source: &str) -> Result<Program, Box<TranslationError>> {
    let mut translator = Translator {
        file,
        source,
        lines: Vec::new(),
        remap: RemapTable::default(),
        open: None,
    };
    let mut offset = 0;
    for (index, raw) in source.split_inclusive('\n').enumerate() {
        let text = raw.trim_end_matches(['\n', '\r']);
        translator.line(index + 1, offset, text)?;
        offset += raw.len();
    }
    translator.close_rule();
    Ok(Program {
        file: file.to_path_buf(),
        lines: translator.lines,
        remap: translator.remap,
    })
}

impl Translator<'_> {
    fn next_number(&self) -> usize {
        self.lines.len() + 1
    }

    fn push(&mut self, kind: LineKind) {
        let number = self.next_number();
        if kind.is_injected() {
            self.remap.record(number);
        }
        self.lines.push(ProgramLine { number, kind });
    }

    fn error(
        &self,
        line: usize,
        offset: usize,
        text: &str,
        err: SyntaxError,
    ) -> Box<TranslationError> {
        let len = text.len().saturating_sub(err.offset).max(1);
        Box::new(TranslationError::new(
            self.file,
            self.source,
            line,
            offset + err.offset,
            len,
            err.message,
        ))
    }

    fn line(
        &mut self,
        line: usize,
        offset: usize,
        text: &str,
    ) -> Result<(), Box<TranslationError>> {
        let in_body = self
            .open
            .as_ref()
            .is_some_and(|rule| !text.trim().is_empty() && indent_width(text) > rule.width);
        if in_body {
            let stmt = parse_action_line(text).map_err(|err| self.error(line, offset, text, err))?;
            let location = self.location(self.next_number());
            if let Some(rule) = self.open.as_mut() {
                rule.body_lines += 1;
                if let Some(stmt) = stmt {
                    rule.steps.push(Step { stmt, location });
                }
            }
            self.push(LineKind::Body {
                text: text.to_owned(),
            });
            return Ok(());
        }
        self.close_rule();
        match parse_host_line(text).map_err(|err| self.error(line, offset, text, err))? {
            HostLine::Ignored => self.push(LineKind::Host {
                text: text.to_owned(),
                stmt: None,
            }),
            HostLine::Stmt(stmt) => self.push(LineKind::Host {
                text: text.to_owned(),
                stmt: Some(stmt),
            }),
            HostLine::Header(header) => {
                if let Some(var) = header
                    .targets
                    .vars()
                    .chain(header.sources.vars())
                    .find(|var| var.is_automatic())
                {
                    let err = SyntaxError {
                        offset: 0,
                        message: format!("automatic variable `{var}` used in a rule header"),
                    };
                    return Err(self.error(line, offset, text, err));
                }
                self.push(LineKind::Header {
                    indent: header.indent.clone(),
                    targets: header.targets.clone(),
                    sources: header.sources.clone(),
                });
                self.open = Some(OpenRule {
                    width: indent_width(&header.indent),
                    indent: header.indent,
                    header_line: line,
                    targets: header.targets,
                    sources: header.sources,
                    steps: Vec::new(),
                    body_lines: 0,
                });
            }
        }
        Ok(())
    }

    fn location(&self, number: usize) -> Location {
        Location::generated(self.file, number)
    }

    fn close_rule(&mut self) {
        let Some(rule) = self.open.take() else {
            return;
        };
        if rule.body_lines == 0 {
            self.push(LineKind::Pass {
                indent: rule.indent.clone(),
            });
        }
        self.push(LineKind::Register {
            indent: rule.indent,
            registration: Registration {
                targets: rule.targets,
                sources: rule.sources,
                header_line: rule.header_line,
                steps: Arc::from(rule.steps),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ast::ActionStmt;
    use rstest::rstest;

    fn program(source: &str) -> Program {
        translate(Utf8Path::new("make.maat"), source).expect("translates")
    }

    fn registrations(program: &Program) -> Vec<(usize, &Registration)> {
        program
            .lines()
            .iter()
            .filter_map(|line| match &line.kind {
                LineKind::Register { registration, .. } => Some((line.number, registration)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rule_block_is_followed_by_registration() {
        let program = program("CC = gcc\n\nout: in\n\tcopy($<, $@)\n");
        let regs = registrations(&program);
        assert_eq!(regs.len(), 1);
        let (number, reg) = regs.first().copied().expect("one registration");
        assert_eq!(number, 5);
        assert_eq!(reg.header_line, 3);
        assert_eq!(reg.targets.to_string(), "out");
        assert_eq!(reg.sources.to_string(), "in");
        assert_eq!(program.remap().boundaries(), &[5]);
        let step = reg.steps.first().expect("one step");
        assert!(matches!(step.stmt, ActionStmt::Call(_)));
        assert_eq!(step.location, Location::generated("make.maat", 4));
    }

    #[test]
    fn empty_body_gets_pass() {
        let program = program("all: out\nout: in\n\ttouch($@)\n");
        let kinds: Vec<_> = program.lines().iter().map(|l| &l.kind).collect();
        assert!(matches!(kinds.get(1), Some(LineKind::Pass { .. })));
        assert!(matches!(kinds.get(2), Some(LineKind::Register { .. })));
        assert_eq!(program.remap().boundaries(), &[2, 3, 6]);
        let headers: Vec<_> = registrations(&program)
            .iter()
            .map(|(_, r)| r.header_line)
            .collect();
        assert_eq!(headers, vec![1, 2]);
    }

    #[test]
    fn blank_line_ends_block() {
        let program = program("out: in\n\techo(a)\n\n\techo(b)\n");
        let regs = registrations(&program);
        let (_, reg) = regs.first().copied().expect("registration");
        assert_eq!(reg.steps.len(), 1);
        // The indented line after the blank is host code and parses as a call.
        assert!(matches!(
            program.lines().last().map(|l| &l.kind),
            Some(LineKind::Host { stmt: Some(HostStmt::Call(_)), .. })
        ));
    }

    #[test]
    fn nested_indentation_uses_header_level() {
        let program = program("  out: in\n    cc -c $<\n  echo(done)\n");
        let regs = registrations(&program);
        assert_eq!(regs.len(), 1);
        assert_eq!(regs.first().map(|(n, _)| *n), Some(3));
    }

    #[test]
    fn comment_only_body_is_not_empty() {
        let program = program("out:\n\t# nothing yet\n");
        assert!(!program
            .lines()
            .iter()
            .any(|l| matches!(l.kind, LineKind::Pass { .. })));
        let regs = registrations(&program);
        assert_eq!(regs.first().map(|(_, r)| r.steps.len()), Some(0));
    }

    #[test]
    fn generated_lines_map_back_to_script() {
        let source = "A = 1\nB = 2\n\n# build\nout: in\n\techo(one)\n\tfalse\nX = 3\n";
        let program = program(source);
        let regs = registrations(&program);
        assert_eq!(regs.first().map(|(n, _)| *n), Some(8));
        let table = program.remap();
        assert_eq!(table.to_script(7), 7);
        assert_eq!(table.to_script(9), 8);
    }

    #[rstest]
    #[case("junk words\n", 1, "expected an assignment")]
    #[case("ok: x\n\tcopy($<, $@\n", 2, "unclosed `(`")]
    #[case("$@: in\n", 1, "automatic variable `$@`")]
    fn malformed_lines_are_located(
        #[case] source: &str,
        #[case] line: usize,
        #[case] message: &str,
    ) {
        let err = translate(Utf8Path::new("make.maat"), source).expect_err("malformed");
        assert_eq!(err.location, Location::script("make.maat", line));
        assert!(err.message.contains(message), "{}", err.message);
    }

    #[test]
    fn listing_shows_injected_lines() {
        let listing = program("out:\n").to_string();
        assert_eq!(
            listing,
            "    1  rule out : \n    2  \tpass\n    3  register([out], [], \"make.maat\", 1)\n"
        );
    }
}

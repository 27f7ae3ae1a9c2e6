//! Evaluation of expressions against the variable environment.
//!
//! Host statements are evaluated with no rule in scope; rule actions see
//! their rule, so the automatic variables `$@`, `$<` and `$^` resolve.

use camino::Utf8Path;
use shell_quote::{QuoteRefExt, Sh};
use thiserror::Error;

use super::ast::{Call, Expr};
use crate::expand::{Template, VarRef};
use crate::monitor::Monitor;
use crate::rule::Rule;
use crate::stdlib::{BuiltinError, CallContext, Stdlib};
use crate::value::{Env, Value};

/// Errors raised while evaluating a statement.
#[derive(Debug, Error)]
pub enum EvalError {
    /// `$(name)` named a variable that was never bound.
    #[error("undefined variable `{name}`")]
    Undefined {
        /// Variable name.
        name: String,
    },
    /// An automatic variable was used outside a rule action.
    #[error("`{var}` is only available inside rule actions")]
    NoRule {
        /// The variable as written.
        var: String,
    },
    /// `$@` or `$<` on a rule with an empty list.
    #[error("`{var}` used in a rule without {what}")]
    Missing {
        /// The variable as written.
        var: String,
        /// `"targets"` or `"sources"`.
        what: &'static str,
    },
    /// The called function is not registered.
    #[error("unknown function `{name}`")]
    UnknownFunction {
        /// Function name.
        name: String,
    },
    /// A built-in reported a failure.
    #[error("{name}(): {source}")]
    Builtin {
        /// Function name.
        name: String,
        /// Failure reported by the function.
        #[source]
        source: BuiltinError,
    },
    /// A command line cannot be split into words.
    #[error("invalid command `{snippet}`: unbalanced quotes or backticks")]
    InvalidCommand {
        /// Leading part of the rendered command.
        snippet: String,
    },
}

/// What an expression can see while it is evaluated.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    /// Host variables.
    pub env: &'a Env,
    /// Rule whose action is running, if any.
    pub rule: Option<&'a Rule>,
    /// Callable functions.
    pub stdlib: &'a Stdlib,
    /// Directory relative paths resolve against.
    pub root: &'a Utf8Path,
    /// Destination of `echo` output and command echoes.
    pub monitor: &'a dyn Monitor,
}

impl Scope<'_> {
    const fn call_context(&self) -> CallContext<'_> {
        CallContext {
            root: self.root,
            monitor: self.monitor,
        }
    }

    /// Resolve a single variable reference.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] for unbound names, automatic variables outside a
    /// rule, or automatic variables on empty target/source lists.
    pub fn resolve(&self, var: &VarRef) -> Result<Value, EvalError> {
        if let VarRef::Named(name) = var {
            return self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Undefined { name: name.clone() });
        }
        let rule = self.rule.ok_or_else(|| EvalError::NoRule {
            var: var.to_string(),
        })?;
        let first = |items: &[String], what| {
            items
                .first()
                .map(|item| Value::Text(item.clone()))
                .ok_or_else(|| EvalError::Missing {
                    var: var.to_string(),
                    what,
                })
        };
        match var {
            VarRef::FirstTarget => first(&rule.targets, "targets"),
            VarRef::FirstSource => first(&rule.sources, "sources"),
            VarRef::AllSources | VarRef::Named(_) => Ok(Value::List(rule.sources.clone())),
        }
    }

    /// Evaluate a template to a value; a lone reference keeps its kind.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures.
    pub fn template_value(&self, template: &Template) -> Result<Value, EvalError> {
        if let Some(var) = template.as_single_var() {
            return self.resolve(var);
        }
        self.render(template).map(Value::Text)
    }

    /// Render a template to text, joining lists with spaces.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures.
    pub fn render(&self, template: &Template) -> Result<String, EvalError> {
        template.render_with(|var| self.resolve(var).map(|value| value.to_string()))
    }

    /// Render a shell command line.
    ///
    /// Paths substituted for automatic variables are shell-quoted; named
    /// variables are inserted verbatim so flag lists split into words.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidCommand`] when the result cannot be split
    /// into shell words, plus any resolution failure.
    pub fn render_command(&self, template: &Template) -> Result<String, EvalError> {
        let command = template.render_with(|var| {
            let value = self.resolve(var)?;
            if var.is_automatic() {
                Ok(value.words().iter().map(|w| quote(w)).collect::<Vec<_>>().join(" "))
            } else {
                Ok(value.to_string())
            }
        })?;
        if has_unmatched_backticks(&command) || shlex::split(&command).is_none() {
            return Err(EvalError::InvalidCommand {
                snippet: command.chars().take(160).collect(),
            });
        }
        Ok(command)
    }

    /// Evaluate an expression.
    ///
    /// # Errors
    ///
    /// Propagates resolution and function failures.
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Text(template) => self.template_value(template),
            Expr::Call(call) => self.call(call),
        }
    }

    /// Evaluate the arguments of `call` and invoke the function.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownFunction`] for unregistered names and
    /// [`EvalError::Builtin`] when the function fails.
    pub fn call(&self, call: &Call) -> Result<Value, EvalError> {
        let function = self
            .stdlib
            .function(&call.name)
            .ok_or_else(|| EvalError::UnknownFunction {
                name: call.name.clone(),
            })?;
        let args = call
            .args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        function(&self.call_context(), &args).map_err(|source| EvalError::Builtin {
            name: call.name.clone(),
            source,
        })
    }
}

fn quote(word: &str) -> String {
    let bytes: Vec<u8> = word.quoted(Sh);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug_assert!(false, "shell quoting produced non UTF-8 bytes: {err}");
            String::from_utf8_lossy(&err.into_bytes()).into_owned()
        }
    }
}

/// Whether a command substitution is left open. Backticks inside single
/// quotes or after a backslash are literal.
fn has_unmatched_backticks(s: &str) -> bool {
    let mut open = false;
    let mut single = false;
    let mut double = false;
    let mut escaped = false;
    for c in s.chars() {
        if single {
            single = c != '\'';
            continue;
        }
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\'' if !double => single = true,
            '"' => double = !double,
            '`' => open = !open,
            _ => {}
        }
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::monitor::RecordingMonitor;
    use crate::remap::Location;
    use crate::rule::{Action, Rule};
    use rstest::rstest;

    fn rule(targets: &[&str], sources: &[&str]) -> Rule {
        Rule::new(
            targets.iter().map(ToString::to_string).collect(),
            sources.iter().map(ToString::to_string).collect(),
            Location::script("make.maat", 1),
            Action::empty(),
        )
    }

    fn with_scope<T>(rule: Option<&Rule>, env: &Env, f: impl FnOnce(&Scope<'_>) -> T) -> T {
        let stdlib = Stdlib::new();
        let monitor = RecordingMonitor::new();
        let scope = Scope {
            env,
            rule,
            stdlib: &stdlib,
            root: Utf8Path::new("."),
            monitor: &monitor,
        };
        f(&scope)
    }

    #[test]
    fn automatic_variables_expand_in_order() {
        let rule = rule(&["a"], &["b", "c"]);
        let rendered = with_scope(Some(&rule), &Env::default(), |scope| {
            scope.render(&expand("$@ $< $^"))
        })
        .expect("render");
        assert_eq!(rendered, "a b b c");
    }

    #[test]
    fn lone_all_sources_stays_a_list() {
        let rule = rule(&["a"], &["b", "c"]);
        let value = with_scope(Some(&rule), &Env::default(), |scope| {
            scope.template_value(&expand("$^"))
        })
        .expect("value");
        assert_eq!(value.words(), vec!["b", "c"]);
        assert!(matches!(value, Value::List(_)));
    }

    #[test]
    fn automatic_variables_need_a_rule() {
        let err = with_scope(None, &Env::default(), |scope| scope.render(&expand("$@")))
            .expect_err("no rule");
        assert!(matches!(err, EvalError::NoRule { .. }));
    }

    #[test]
    fn first_source_of_sourceless_rule_fails() {
        let rule = rule(&["a"], &[]);
        let err = with_scope(Some(&rule), &Env::default(), |scope| {
            scope.render(&expand("$<"))
        })
        .expect_err("no sources");
        assert_eq!(err.to_string(), "`$<` used in a rule without sources");
    }

    #[test]
    fn named_variables_come_from_env() {
        let mut env = Env::default();
        env.set("CFLAGS", Value::from("-O2 -Wall"));
        let rule = rule(&["my prog"], &["main.c"]);
        let command = with_scope(Some(&rule), &env, |scope| {
            scope.render_command(&expand("cc $(CFLAGS) -o $@ $^"))
        })
        .expect("command");
        assert_eq!(
            shlex::split(&command).expect("split"),
            vec!["cc", "-O2", "-Wall", "-o", "my prog", "main.c"]
        );
    }

    #[test]
    fn undefined_variable_is_reported() {
        let err = with_scope(None, &Env::default(), |scope| scope.render(&expand("$(NOPE)")))
            .expect_err("undefined");
        assert_eq!(err.to_string(), "undefined variable `NOPE`");
    }

    #[test]
    fn unbalanced_command_is_rejected() {
        let rule = rule(&["a"], &["b"]);
        let err = with_scope(Some(&rule), &Env::default(), |scope| {
            scope.render_command(&expand("echo `date"))
        })
        .expect_err("invalid");
        assert!(matches!(err, EvalError::InvalidCommand { .. }));
    }

    #[rstest]
    #[case("echo `date`", false)]
    #[case("echo `date", true)]
    #[case("printf '%s\\n' 'a`b'", false)]
    #[case("echo \\`", false)]
    #[case("echo \"`date\"", true)]
    fn backticks_in_literal_spans_do_not_count(#[case] command: &str, #[case] open: bool) {
        assert_eq!(has_unmatched_backticks(command), open);
    }

    #[test]
    fn single_quoted_backtick_is_a_valid_command() {
        let command = with_scope(None, &Env::default(), |scope| {
            scope.render_command(&expand("printf '%s\\n' 'a`b'"))
        });
        assert_eq!(command.expect("valid"), "printf '%s\\n' 'a`b'");
    }

    #[test]
    fn unknown_function_is_reported() {
        let call = Call {
            name: "nope".into(),
            args: Vec::new(),
        };
        let err = with_scope(None, &Env::default(), |scope| scope.call(&call))
            .expect_err("unknown");
        assert_eq!(err.to_string(), "unknown function `nope`");
    }
}

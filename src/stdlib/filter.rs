//! Filter constructors.
//!
//! Arguments of the combinators are coerced the same way as every filter
//! argument: text compiles to a glob pattern, a list to an exact set.

use super::{BuiltinError, Stdlib, arity, filter_arg, text_arg, words_from};
use crate::filter::Predicate;
use crate::value::Value;

pub(super) fn register(lib: &mut Stdlib) {
    lib.add_function("pattern", |_, args| {
        arity(args, 1, Some(1), "1 argument")?;
        Ok(Predicate::glob(&text_arg(args, 0)?)?.into())
    });
    lib.add_function("regex", |_, args| {
        arity(args, 1, Some(1), "1 argument")?;
        Ok(Predicate::regex(&text_arg(args, 0)?)?.into())
    });
    lib.add_function("one_of", |_, args| {
        Ok(Predicate::one_of(words_from(args, 0)).into())
    });
    lib.add_function("always", |_, args| {
        arity(args, 0, Some(0), "no arguments")?;
        Ok(Predicate::Always.into())
    });
    lib.add_function("never", |_, args| {
        arity(args, 0, Some(0), "no arguments")?;
        Ok(Predicate::Never.into())
    });
    lib.add_function("not", |_, args| {
        arity(args, 1, Some(1), "1 argument")?;
        Ok(filter_arg(args, 0)?.negate().into())
    });
    lib.add_function("and", |_, args| Ok(Predicate::And(filters(args)?).into()));
    lib.add_function("or", |_, args| Ok(Predicate::Or(filters(args)?).into()));
}

fn filters(args: &[Value]) -> Result<Vec<Predicate>, BuiltinError> {
    (0..args.len()).map(|index| filter_arg(args, index)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::RecordingMonitor;
    use crate::stdlib::CallContext;
    use camino::Utf8Path;
    use rstest::rstest;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, BuiltinError> {
        let monitor = RecordingMonitor::new();
        let ctx = CallContext {
            root: Utf8Path::new("."),
            monitor: &monitor,
        };
        Stdlib::new().call(&ctx, name, &args)
    }

    fn build(name: &str, args: Vec<Value>) -> Predicate {
        match call(name, args) {
            Ok(Value::Filter(predicate)) => predicate,
            other => panic!("expected a filter, got {other:?}"),
        }
    }

    #[rstest]
    #[case("main.c", true)]
    #[case("test_main.c", false)]
    #[case("main.h", false)]
    fn combinators_coerce_their_arguments(#[case] path: &str, #[case] expected: bool) {
        let tests = build("regex", vec![Value::from("test_")]);
        let predicate = build("and", vec![Value::from("*.c"), Value::Filter(tests.negate())]);
        assert_eq!(predicate.accept(Utf8Path::new(path)), expected);
    }

    #[test]
    fn or_of_lists_is_a_union() {
        let predicate = build(
            "or",
            vec![
                Value::List(vec!["a".into()]),
                Value::List(vec!["b".into()]),
            ],
        );
        assert!(predicate.accept(Utf8Path::new("b")));
        assert!(!predicate.accept(Utf8Path::new("c")));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = call("pattern", vec![Value::from("[")]).expect_err("invalid");
        assert!(matches!(err, BuiltinError::Filter(_)));
    }

    #[test]
    fn not_of_text_negates_a_glob() {
        let predicate = build("not", vec![Value::from("*.o")]);
        assert!(predicate.accept(Utf8Path::new("a.c")));
        assert!(!predicate.accept(Utf8Path::new("a.o")));
    }
}

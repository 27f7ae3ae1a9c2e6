//! Path manipulation and file-set helpers.

use camino::{Utf8Path, Utf8PathBuf};

use super::{BuiltinError, CallContext, Stdlib, arity, filter_arg, text_arg, words_from};
use crate::filter::Predicate;
use crate::path::BuildPath;
use crate::value::Value;

pub(super) fn register(lib: &mut Stdlib) {
    lib.add_function("join", |_, args| {
        arity(args, 1, None, "at least 1 argument")?;
        let mut path = Utf8PathBuf::new();
        for part in words_from(args, 0) {
            path.push(part);
        }
        Ok(Value::Text(path.into_string()))
    });
    lib.add_function("basename", |_, args| {
        arity(args, 1, Some(1), "1 argument")?;
        let path = BuildPath::from(text_arg(args, 0)?);
        Ok(Value::from(path.file_name().unwrap_or_default()))
    });
    lib.add_function("dirname", |_, args| {
        arity(args, 1, Some(1), "1 argument")?;
        let parent = BuildPath::from(text_arg(args, 0)?).parent();
        let parent = if parent.as_str().is_empty() {
            ".".to_owned()
        } else {
            parent.to_string()
        };
        Ok(Value::Text(parent))
    });
    lib.add_function("with_suffix", |_, args| {
        arity(args, 2, Some(2), "2 arguments")?;
        let path = BuildPath::from(text_arg(args, 0)?);
        Ok(Value::Text(path.with_suffix(&text_arg(args, 1)?).to_string()))
    });
    lib.add_function("glob", glob_files);
    lib.add_function("files", files);
    lib.add_function("select", |_, args| {
        arity(args, 2, Some(2), "2 arguments")?;
        let filter = filter_arg(args, 1)?;
        let items = args.first().map(Value::words).unwrap_or_default();
        Ok(Value::List(
            items
                .into_iter()
                .filter(|item| filter.accept(Utf8Path::new(item)))
                .collect(),
        ))
    });
}

/// `glob(pattern, ...)`: root-relative matches, sorted, without duplicates.
fn glob_files(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    arity(args, 1, None, "at least 1 argument")?;
    let mut found = Vec::new();
    let root = Utf8PathBuf::from(glob::Pattern::escape(ctx.root.as_str()));
    for pattern in words_from(args, 0) {
        let absolute = root.join(&pattern);
        let paths = glob::glob(absolute.as_str()).map_err(|source| {
            crate::filter::FilterError::Glob {
                pattern: pattern.clone(),
                source,
            }
        })?;
        for entry in paths {
            let path = entry.map_err(|err| {
                let path = Utf8PathBuf::from(err.path().to_string_lossy().into_owned());
                BuiltinError::io(path, err.into_error())
            })?;
            let path = Utf8PathBuf::try_from(path).map_err(|err| {
                BuiltinError::io(absolute.clone(), err.into_io_error())
            })?;
            found.push(BuildPath::from(path).relative_to(ctx.root).to_string());
        }
    }
    found.sort();
    found.dedup();
    Ok(Value::List(found))
}

/// `files(dir[, filter])`: files below `dir`, as `dir/...` paths.
fn files(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    arity(args, 1, Some(2), "1 or 2 arguments")?;
    let dir = text_arg(args, 0)?;
    let filter = if args.len() == 2 {
        filter_arg(args, 1)?
    } else {
        Predicate::Always
    };
    let base = BuildPath::from(ctx.resolve(&dir));
    let walked = base
        .walk(&Predicate::Always)
        .map_err(|err| BuiltinError::io(base.as_path(), err))?;
    Ok(Value::List(
        walked
            .into_iter()
            .map(|rel| Utf8Path::new(&dir).join(rel.as_path()))
            .filter(|path| filter.accept(path))
            .map(Utf8PathBuf::into_string)
            .collect(),
    ))
}

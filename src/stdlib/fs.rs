//! Filesystem helpers for rule actions.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::time::SystemTime;

use camino::Utf8Path;

use super::{BuiltinError, CallContext, Stdlib, arity, text_arg, words_from};
use crate::path::BuildPath;
use crate::value::Value;

pub(super) fn register(lib: &mut Stdlib) {
    lib.add_function("copy", copy);
    lib.add_function("mkdir", |ctx, args| {
        for dir in words_from(args, 0) {
            let path = BuildPath::from(ctx.resolve(&dir));
            path.make_dir().map_err(|err| BuiltinError::io(path.as_path(), err))?;
        }
        Ok(Value::unit())
    });
    lib.add_function("remove", |ctx, args| {
        for item in words_from(args, 0) {
            remove(&ctx.resolve(&item))?;
        }
        Ok(Value::unit())
    });
    lib.add_function("touch", |ctx, args| {
        for item in words_from(args, 0) {
            touch(&ctx.resolve(&item))?;
        }
        Ok(Value::unit())
    });
    lib.add_function("write", write);
}

fn copy(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    arity(args, 2, Some(2), "2 arguments")?;
    let from = ctx.resolve(&text_arg(args, 0)?);
    let mut to = ctx.resolve(&text_arg(args, 1)?);
    if to.is_dir()
        && let Some(name) = from.file_name()
    {
        to.push(name);
    }
    ensure_parent(&to)?;
    fs::copy(&from, &to).map_err(|err| BuiltinError::io(&from, err))?;
    Ok(Value::unit())
}

fn write(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    arity(args, 1, None, "at least 1 argument")?;
    let path = ctx.resolve(&text_arg(args, 0)?);
    let text = args
        .iter()
        .skip(1)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    ensure_parent(&path)?;
    fs::write(&path, text).map_err(|err| BuiltinError::io(&path, err))?;
    Ok(Value::unit())
}

fn remove(path: &Utf8Path) -> Result<(), BuiltinError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(BuiltinError::io(path, err)),
        _ => Ok(()),
    }
}

fn touch(path: &Utf8Path) -> Result<(), BuiltinError> {
    ensure_parent(path)?;
    let file: io::Result<File> = OpenOptions::new().create(true).append(true).open(path);
    file.and_then(|file| file.set_modified(SystemTime::now()))
        .map_err(|err| BuiltinError::io(path, err))
}

fn ensure_parent(path: &Utf8Path) -> Result<(), BuiltinError> {
    let parent = BuildPath::from(path.to_path_buf()).parent();
    parent
        .make_dir()
        .map_err(|err| BuiltinError::io(parent.as_path(), err))
}

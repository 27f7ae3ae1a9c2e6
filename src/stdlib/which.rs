//! Executable lookup.
//!
//! `which(name, ...)` searches `PATH`; `lookup_prog(progs, dirs)` searches
//! the given directories. Both try every program in the first directory
//! before moving to the next and return the first executable match, or an
//! empty text when nothing matches. A program containing `/` is checked
//! directly against the run root instead of being searched.

use std::env;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::{CallContext, Stdlib, arity, words_from};
use crate::value::Value;

pub(super) fn register(lib: &mut Stdlib) {
    lib.add_function("which", |ctx, args| {
        arity(args, 1, None, "at least 1 argument")?;
        let progs = words_from(args, 0);
        Ok(found(lookup(ctx, &progs, &search_path())))
    });
    lib.add_function("lookup_prog", |ctx, args| {
        arity(args, 2, Some(2), "2 arguments")?;
        let progs = args.first().map(Value::words).unwrap_or_default();
        let dirs: Vec<Utf8PathBuf> = args
            .get(1)
            .map(Value::words)
            .unwrap_or_default()
            .iter()
            .map(|dir| ctx.resolve(dir))
            .collect();
        Ok(found(lookup(ctx, &progs, &dirs)))
    });
}

fn found(path: Option<Utf8PathBuf>) -> Value {
    Value::Text(path.map(Utf8PathBuf::into_string).unwrap_or_default())
}

fn lookup(ctx: &CallContext<'_>, progs: &[String], dirs: &[Utf8PathBuf]) -> Option<Utf8PathBuf> {
    let (direct, bare): (Vec<&String>, Vec<&String>) =
        progs.iter().partition(|prog| prog.contains('/'));
    let direct = direct.into_iter().map(|prog| ctx.resolve(prog));
    let searched = dirs
        .iter()
        .flat_map(|dir| bare.iter().map(move |prog| dir.join(prog.as_str())));
    let hit = direct.chain(searched).find(|path| is_executable(path));
    debug!(?progs, found = ?hit, "program lookup");
    hit
}

fn search_path() -> Vec<Utf8PathBuf> {
    env::var_os("PATH")
        .map(|paths| {
            env::split_paths(&paths)
                .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
                .filter(|dir| !dir.as_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn is_executable(path: &Utf8Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_file() && has_execute_permission(&metadata))
}

#[cfg(unix)]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    metadata.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::monitor::RecordingMonitor;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct Bins {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Bins {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("temp dir");
            let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir");
            Self { _dir: dir, root }
        }

        fn program(&self, path: &str, mode: u32) -> &Self {
            let path = self.root.join(path);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(&path, "#!/bin/sh\n").expect("write");
            fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
            self
        }

        fn call(&self, name: &str, args: Vec<Value>) -> String {
            let monitor = RecordingMonitor::new();
            let ctx = CallContext {
                root: &self.root,
                monitor: &monitor,
            };
            Stdlib::new()
                .call(&ctx, name, &args)
                .expect("lookup succeeds")
                .to_string()
        }

        fn path(&self, rel: &str) -> String {
            self.root.join(rel).into_string()
        }
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|&item| item.to_owned()).collect())
    }

    #[test]
    fn first_directory_wins_over_program_order() {
        let bins = Bins::new();
        bins.program("one/cc", 0o755).program("two/gcc", 0o755);
        let found = bins.call("lookup_prog", vec![list(&["gcc", "cc"]), list(&["one", "two"])]);
        assert_eq!(found, bins.path("one/cc"));
    }

    #[test]
    fn files_without_execute_permission_are_skipped() {
        let bins = Bins::new();
        bins.program("bin/gcc", 0o644).program("bin/cc", 0o755);
        let found = bins.call("lookup_prog", vec![list(&["gcc", "cc"]), list(&["bin"])]);
        assert_eq!(found, bins.path("bin/cc"));
    }

    #[test]
    fn missing_program_is_empty_text() {
        let bins = Bins::new();
        let found = bins.call("lookup_prog", vec![Value::from("clang"), Value::from("bin")]);
        assert!(found.is_empty());
    }

    #[test]
    fn which_checks_paths_directly() {
        let bins = Bins::new();
        bins.program("tools/gen", 0o755);
        assert_eq!(bins.call("which", vec![Value::from("tools/gen")]), bins.path("tools/gen"));
        assert!(bins.call("which", vec![Value::from("tools/nope")]).is_empty());
    }

    #[test]
    fn search_path_skips_empty_entries() {
        assert!(search_path().iter().all(|dir| !dir.as_str().is_empty()));
    }
}

//! Path value type used by the resolver and the standard library.

use std::fmt;
use std::fs;
use std::io;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};

use crate::filter::Predicate;

/// A UTF-8 path with the filesystem queries a build needs.
///
/// # Examples
///
/// ```
/// use maat::path::BuildPath;
///
/// let obj = BuildPath::from("src/main.c").with_suffix(".o");
/// assert_eq!(obj.as_str(), "src/main.o");
/// assert_eq!(obj.file_name(), Some("main.o"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildPath(Utf8PathBuf);

impl BuildPath {
    /// Wrap an owned path.
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self(path)
    }

    /// Borrow the underlying path.
    #[must_use]
    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    /// Borrow the path as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Consume the wrapper.
    #[must_use]
    pub fn into_inner(self) -> Utf8PathBuf {
        self.0
    }

    /// Append `other`; absolute `other` replaces `self`.
    #[must_use]
    pub fn join(&self, other: impl AsRef<Utf8Path>) -> Self {
        Self(self.0.join(other))
    }

    /// Whether the path names an existing file or directory.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    /// Whether the path is an existing directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    /// Whether the path can be opened for reading.
    #[must_use]
    pub fn can_read(&self) -> bool {
        if self.0.is_dir() {
            fs::read_dir(&self.0).is_ok()
        } else {
            fs::File::open(&self.0).is_ok()
        }
    }

    /// Modification time, or `None` when nothing exists at the path.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than "not found".
    pub fn modified(&self) -> io::Result<Option<SystemTime>> {
        match fs::metadata(&self.0) {
            Ok(meta) => meta.modified().map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Parent directory; empty for single-component relative paths.
    #[must_use]
    pub fn parent(&self) -> Self {
        Self(self.0.parent().map(Utf8Path::to_path_buf).unwrap_or_default())
    }

    /// Final component, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Extension including the leading dot, or an empty string.
    #[must_use]
    pub fn extension(&self) -> String {
        self.0.extension().map(|ext| format!(".{ext}")).unwrap_or_default()
    }

    /// The path with its last extension replaced by `suffix`.
    ///
    /// `suffix` should include its leading dot; an empty suffix strips the
    /// extension.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let stem = self.0.file_stem().unwrap_or_default();
        let file = format!("{stem}{suffix}");
        match self.0.parent() {
            Some(parent) if !parent.as_str().is_empty() => Self(parent.join(file)),
            _ => Self(Utf8PathBuf::from(file)),
        }
    }

    /// Express `self` relative to `base` when `base` is a prefix.
    #[must_use]
    pub fn relative_to(&self, base: &Utf8Path) -> Self {
        self.0
            .strip_prefix(base)
            .map_or_else(|_| self.clone(), |rel| Self(rel.to_path_buf()))
    }

    /// Direct children of the directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be read or contains a
    /// non-UTF-8 name.
    pub fn list(&self) -> io::Result<Vec<Self>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.0)? {
            let path = Utf8PathBuf::try_from(entry?.path())
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
            entries.push(Self(path));
        }
        entries.sort();
        Ok(entries)
    }

    /// Files below the directory accepted by `filter`, recursively.
    ///
    /// Paths are returned relative to `self` and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error when the walk fails or meets a non-UTF-8 name.
    pub fn walk(&self, filter: &Predicate) -> io::Result<Vec<Self>> {
        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(&self.0).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non UTF-8 path {}", entry.path().display()),
                )
            })?;
            let rel = path.strip_prefix(&self.0).unwrap_or(path);
            if filter.accept(rel) {
                found.push(Self(rel.to_path_buf()));
            }
        }
        Ok(found)
    }

    /// Create the directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn make_dir(&self) -> io::Result<()> {
        if self.0.as_str().is_empty() || self.0.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.0)
    }
}

impl From<&str> for BuildPath {
    fn from(value: &str) -> Self {
        Self(Utf8PathBuf::from(value))
    }
}

impl From<String> for BuildPath {
    fn from(value: String) -> Self {
        Self(Utf8PathBuf::from(value))
    }
}

impl From<Utf8PathBuf> for BuildPath {
    fn from(value: Utf8PathBuf) -> Self {
        Self(value)
    }
}

impl AsRef<Utf8Path> for BuildPath {
    fn as_ref(&self) -> &Utf8Path {
        &self.0
    }
}

impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case("a/b.c", ".o", "a/b.o")]
    #[case("b.c", ".o", "b.o")]
    #[case("b", ".o", "b.o")]
    #[case("a/b.tar.gz", "", "a/b.tar")]
    fn with_suffix_replaces_extension(
        #[case] path: &str,
        #[case] suffix: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(BuildPath::from(path).with_suffix(suffix).as_str(), expected);
    }

    #[test]
    fn relative_to_strips_prefix() {
        let path = BuildPath::from("/top/src/a.c");
        assert_eq!(path.relative_to(Utf8Path::new("/top")).as_str(), "src/a.c");
        assert_eq!(path.relative_to(Utf8Path::new("/other")), path);
    }

    #[test]
    fn modified_is_none_for_missing_files() {
        let dir = tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        let path = BuildPath::new(root.join("missing"));
        assert!(path.modified().expect("stat").is_none());
        assert!(!path.can_read());
    }

    #[rstest]
    #[case("a/b.c", ".c")]
    #[case("b.tar.gz", ".gz")]
    #[case("Makefile", "")]
    fn extension_keeps_the_dot(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(BuildPath::from(path).extension(), expected);
    }

    #[test]
    fn list_returns_sorted_children() {
        let dir = tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        fs::create_dir(root.join("sub")).expect("mkdir");
        fs::write(root.join("b.txt"), "").expect("write");
        fs::write(root.join("a.txt"), "").expect("write");
        let children = BuildPath::new(root.clone()).list().expect("list");
        let names: Vec<_> = children.iter().filter_map(BuildPath::file_name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert!(children.iter().all(|child| child.as_path().starts_with(&root)));
    }

    #[test]
    fn walk_filters_and_sorts() {
        let dir = tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        fs::create_dir_all(root.join("src/sub")).expect("mkdir");
        for name in ["src/b.c", "src/a.c", "src/sub/c.c", "src/a.h"] {
            fs::write(root.join(name), "").expect("write");
        }
        let found = BuildPath::new(root.join("src"))
            .walk(&Predicate::glob("*.c").expect("glob"))
            .expect("walk");
        let names: Vec<_> = found.iter().map(BuildPath::as_str).collect();
        assert_eq!(names, vec!["a.c", "b.c", "sub/c.c"]);
    }
}

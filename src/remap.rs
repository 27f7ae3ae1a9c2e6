//! Mapping locations in translated programs back to build script lines.
//!
//! Translation injects lines into the generated program (a `pass` for empty
//! rule bodies and a `register(...)` at the end of every rule block). Each
//! injected line is recorded in the script's [`RemapTable`]; converting a
//! generated line back to a script line subtracts the number of injected
//! lines at or before it.
//!
//! Locations carry the [`LineSpace`] they are expressed in, so remapping a
//! location that already points into the script is a no-op.
//!
//! # Examples
//!
//! ```
//! use maat::remap::RemapTable;
//!
//! let mut table = RemapTable::default();
//! table.record(9);
//! assert_eq!(table.to_script(7), 7);
//! assert_eq!(table.to_script(10), 9);
//! ```

use std::collections::HashMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// The numbering a [`Location`] line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSpace {
    /// A line of the translated program listing.
    Generated,
    /// A line of the original build script.
    Script,
}

/// A `file:line` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// Build script the location belongs to.
    pub file: Utf8PathBuf,
    /// 1-based line number in [`Location::space`].
    pub line: usize,
    /// Numbering used by [`Location::line`].
    pub space: LineSpace,
}

impl Location {
    /// Location of a line in the original script.
    #[must_use]
    pub fn script(file: impl Into<Utf8PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            space: LineSpace::Script,
        }
    }

    /// Location of a line in the translated program of `file`.
    #[must_use]
    pub fn generated(file: impl Into<Utf8PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            space: LineSpace::Generated,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Injected-line boundaries for one translated script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    boundaries: Vec<usize>,
}

impl RemapTable {
    /// Record that generated line `line` was injected by the translator.
    ///
    /// Lines are recorded in increasing order while the listing is built.
    pub fn record(&mut self, line: usize) {
        debug_assert!(
            self.boundaries.last().is_none_or(|last| *last < line),
            "boundaries must be recorded in increasing order",
        );
        self.boundaries.push(line);
    }

    /// Injected line numbers recorded so far.
    #[must_use]
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Convert a generated line number to the matching script line.
    #[must_use]
    pub fn to_script(&self, line: usize) -> usize {
        let injected = self.boundaries.partition_point(|b| *b <= line);
        line.saturating_sub(injected)
    }
}

/// Remap tables for every translated script in a run.
#[derive(Debug, Clone, Default)]
pub struct Remapper {
    tables: HashMap<Utf8PathBuf, RemapTable>,
}

impl Remapper {
    /// Register the table of `file`, replacing any previous one.
    pub fn insert(&mut self, file: impl Into<Utf8PathBuf>, table: RemapTable) {
        self.tables.insert(file.into(), table);
    }

    /// Table registered for `file`, if any.
    #[must_use]
    pub fn table(&self, file: &Utf8Path) -> Option<&RemapTable> {
        self.tables.get(file)
    }

    /// Express `location` in script coordinates.
    ///
    /// Script locations and locations in files without a table are returned
    /// unchanged.
    #[must_use]
    pub fn remap(&self, location: &Location) -> Location {
        if location.space == LineSpace::Script {
            return location.clone();
        }
        match self.tables.get(&location.file) {
            Some(table) => Location::script(location.file.clone(), table.to_script(location.line)),
            None => location.clone(),
        }
    }

    /// Remap every frame of a trace, preserving order.
    #[must_use]
    pub fn remap_trace(&self, trace: &[Location]) -> Vec<Location> {
        trace.iter().map(|loc| self.remap(loc)).collect()
    }
}

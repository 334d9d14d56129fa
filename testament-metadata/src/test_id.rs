// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::SourceLocationParseError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, str::FromStr};

/// A location in source code: a file, a 1-based line and a 1-based column.
///
/// Source locations are totally ordered by `(file, line, column)`. The runner
/// uses this order to schedule sibling tests deterministically when
/// parallelization is disabled.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// The path to the file.
    pub file: Utf8PathBuf,

    /// The line number, starting at 1.
    pub line: u32,

    /// The column number, starting at 1.
    pub column: u32,
}

impl SourceLocation {
    /// Creates a new source location.
    pub fn new(file: impl Into<Utf8PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Returns the file name component of the path, or the whole path if it has none.
    pub fn file_name(&self) -> &str {
        self.file.file_name().unwrap_or(self.file.as_str())
    }

    /// Returns the path to the file.
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

impl FromStr for SourceLocation {
    type Err = SourceLocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split from the right, since file paths may contain colons (e.g. on
        // Windows).
        let mut parts = s.rsplitn(3, ':');
        let column = parts
            .next()
            .ok_or_else(|| SourceLocationParseError::new(s, "missing column"))?;
        let line = parts
            .next()
            .ok_or_else(|| SourceLocationParseError::new(s, "missing line"))?;
        let file = parts
            .next()
            .filter(|file| !file.is_empty())
            .ok_or_else(|| SourceLocationParseError::new(s, "missing file"))?;

        let line = line
            .parse()
            .map_err(|_| SourceLocationParseError::new(s, "line is not a number"))?;
        let column = column
            .parse()
            .map_err(|_| SourceLocationParseError::new(s, "column is not a number"))?;

        Ok(Self::new(file, line, column))
    }
}

/// The stable, hierarchical identifier of a test or suite.
///
/// An ID consists of the module the test was declared in, a sequence of name
/// components (enclosing suites followed by the test's own name), and, for test
/// functions, the source location of the declaration. The location
/// disambiguates functions that share a name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestId {
    /// The name of the module the test was declared in.
    pub module: SmolStr,

    /// Name components, outermost first.
    pub components: Vec<SmolStr>,

    /// The source location, used as a disambiguator for test functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
}

impl TestId {
    /// Creates a new ID without a source location.
    pub fn new<I, S>(module: impl Into<SmolStr>, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            module: module.into(),
            components: components.into_iter().map(Into::into).collect(),
            source_location: None,
        }
    }

    /// Sets the source location used to disambiguate this ID.
    pub fn with_source_location(mut self, source_location: SourceLocation) -> Self {
        self.source_location = Some(source_location);
        self
    }

    /// Reconstructs an ID from a key path that carries no source location.
    ///
    /// Returns `None` if the key path is empty.
    pub fn from_key_path(key_path: &[SmolStr]) -> Option<Self> {
        let (module, components) = key_path.split_first()?;
        Some(Self {
            module: module.clone(),
            components: components.to_vec(),
            source_location: None,
        })
    }

    /// Returns the key path for this ID: the module, the name components and,
    /// if present, the display form of the source location.
    pub fn key_path(&self) -> Vec<SmolStr> {
        let mut key_path = Vec::with_capacity(self.components.len() + 2);
        key_path.push(self.module.clone());
        key_path.extend(self.components.iter().cloned());
        if let Some(source_location) = &self.source_location {
            key_path.push(SmolStr::new(source_location.to_string()));
        }
        key_path
    }

    /// Returns the last name component, if any.
    pub fn name(&self) -> Option<&SmolStr> {
        self.components.last()
    }

    /// Returns the ID of the enclosing suite or module.
    ///
    /// The parent of a test function is the suite it was declared in, without a
    /// source location. Returns `None` for a module-level ID.
    pub fn parent(&self) -> Option<TestId> {
        let (_, rest) = self.components.split_last()?;
        Some(Self {
            module: self.module.clone(),
            components: rest.to_vec(),
            source_location: None,
        })
    }

    /// Returns true if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &TestId) -> bool {
        let own = self.key_path();
        let other = other.key_path();
        own.len() < other.len() && other.starts_with(&own)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module)?;
        for component in &self.components {
            write!(f, ".{component}")?;
        }
        Ok(())
    }
}

/// A tag that can be applied to tests and suites to group them.
///
/// Tags are inherited: a test carries the tags of all of its enclosing suites.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(SmolStr);

impl Tag {
    /// Creates a new tag.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    /// Returns the name of this tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.0)
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

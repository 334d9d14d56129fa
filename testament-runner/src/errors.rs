// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testament.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::io;
use testament_metadata::TestId;
use thiserror::Error;

/// An error that occurred while loading a configuration file.
#[derive(Debug, Error)]
#[error("failed to parse testament config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the path to the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// A configuration value that was deserialized successfully but is semantically invalid.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigValidationError {
    /// The repetition count was zero.
    #[error("[repetition] count must be greater than zero")]
    ZeroRepetitionCount,

    /// The maximum number of parallel test cases was zero.
    #[error("[run] max-parallel-test-cases must be greater than zero")]
    ZeroParallelism,

    /// A filter pattern in the config could not be compiled.
    #[error("invalid filter in config")]
    Filter(#[from] TestFilterBuildError),
}

/// An error that occurs while loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The file could not be read or deserialized.
    #[error(transparent)]
    Parse(#[from] ConfigParseError),

    /// The file was read, but contained invalid values.
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),
}

/// An error that occurs while constructing a [`TestFilter`](crate::test_filter::TestFilter).
#[derive(Debug, Error)]
#[error("invalid test filter pattern `{pattern}`")]
pub struct TestFilterBuildError {
    pattern: String,
    #[source]
    err: Box<regex::Error>,
}

impl TestFilterBuildError {
    pub(crate) fn new(pattern: impl Into<String>, err: regex::Error) -> Self {
        Self {
            pattern: pattern.into(),
            err: Box::new(err),
        }
    }

    /// Returns the pattern that failed to compile.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// An error returned by a predicate-based test filter while it was being evaluated.
#[derive(Debug, Error)]
#[error("test filter failed while evaluating `{test_id}`: {message}")]
pub struct TestFilterError {
    test_id: TestId,
    message: String,
}

impl TestFilterError {
    pub(crate) fn new(test_id: TestId, message: impl Into<String>) -> Self {
        Self {
            test_id,
            message: message.into(),
        }
    }

    /// Returns the ID of the test the filter failed on.
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }
}

/// An error that occurs while building a [`Plan`](crate::plan::Plan).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanError {
    /// The test filter could not be evaluated.
    #[error("error applying test filter")]
    Filter(#[from] TestFilterError),
}

/// An error that occurs while creating the runtime for a [`Runner`](crate::runner::Runner).
#[derive(Debug, Error)]
#[error("error creating tokio runtime for the test runner")]
pub struct RunnerBuildError {
    #[source]
    err: io::Error,
}

impl RunnerBuildError {
    pub(crate) fn new(err: io::Error) -> Self {
        Self { err }
    }
}

/// An error that occurs while writing JUnit XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JunitWriteError {
    /// The XML writer failed.
    #[error("error serializing JUnit XML")]
    Xml(#[from] quick_xml::Error),

    /// Writing the serialized XML failed.
    #[error("error writing JUnit XML output")]
    Io(#[from] io::Error),
}

/// An error that occurs while a recorder writes output for an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing to the output stream.
    #[error("error writing to output")]
    Io(#[from] io::Error),

    /// An error occurred while producing JUnit XML.
    #[error("error producing JUnit report")]
    Junit(#[from] JunitWriteError),
}

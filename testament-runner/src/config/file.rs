// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Configuration, Continuation, RepetitionPolicy, TimeLimits};
use crate::{
    errors::{ConfigParseError, ConfigValidationError},
    test_filter::{CombinationOperator, TestFilter},
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{num::NonZeroUsize, time::Duration};
use testament_metadata::Tag;
use tracing::debug;

/// Settings loaded from a TOML configuration file.
///
/// Loading merges, in increasing order of precedence: the built-in defaults, the file itself,
/// and `TESTAMENT_`-prefixed environment variables (for example `TESTAMENT_RUN__VERBOSITY=1`).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    run: RunSection,
    repetition: RepetitionSection,
    time_limits: TimeLimitsSection,
    filter: FilterSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct RunSection {
    parallel: bool,
    #[serde(default)]
    max_parallel_test_cases: Option<usize>,
    verbosity: i32,
    expectation_checked_events: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct RepetitionSection {
    count: usize,
    continuation: Continuation,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct TimeLimitsSection {
    #[serde(default, with = "humantime_serde")]
    default: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    maximum: Option<Duration>,
    #[serde(with = "humantime_serde")]
    granularity: Duration,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct FilterSection {
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    include_tags: Vec<String>,
    exclude_tags: Vec<String>,
    include_hidden: bool,
}

impl ConfigFile {
    /// The default configuration, also available as a template.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The environment variable prefix for configuration overrides.
    pub const ENV_PREFIX: &'static str = "TESTAMENT";

    /// Loads the configuration at `path`, layered over the defaults and under environment
    /// overrides.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigParseError> {
        debug!(%path, "loading testament config");
        Self::build(
            Self::default_builder()
                .add_source(File::new(path.as_str(), FileFormat::Toml))
                .add_source(Self::environment()),
            path,
        )
    }

    /// Parses a configuration from a TOML string, layered over the defaults.
    ///
    /// Environment overrides are not applied.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigParseError> {
        Self::build(
            Self::default_builder().add_source(File::from_str(contents, FileFormat::Toml)),
            Utf8Path::new("<string>"),
        )
    }

    /// Returns the built-in default configuration.
    pub fn default_config() -> Result<Self, ConfigParseError> {
        Self::build(Self::default_builder(), Utf8Path::new("<default config>"))
    }

    fn default_builder() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn environment() -> Environment {
        Environment::with_prefix(Self::ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn build(
        builder: ConfigBuilder<DefaultState>,
        config_file: &Utf8Path,
    ) -> Result<Self, ConfigParseError> {
        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new(config_file, err))
    }

    /// Applies these settings on top of `configuration`.
    ///
    /// Fails if any value is semantically invalid, such as a zero repetition count or a filter
    /// pattern that is not a valid regular expression.
    pub fn apply(
        &self,
        configuration: Configuration,
    ) -> Result<Configuration, ConfigValidationError> {
        let count = NonZeroUsize::new(self.repetition.count)
            .ok_or(ConfigValidationError::ZeroRepetitionCount)?;
        let mut configuration = configuration
            .with_parallelization(self.run.parallel)
            .with_verbosity(self.run.verbosity)
            .with_expectation_checked_events(self.run.expectation_checked_events)
            .with_repetition_policy(RepetitionPolicy::repeating(
                self.repetition.continuation,
                count,
            ))
            .with_time_limits(TimeLimits {
                default: self.time_limits.default,
                maximum: self.time_limits.maximum,
                granularity: self.time_limits.granularity,
            });
        if let Some(width) = self.run.max_parallel_test_cases {
            let width = NonZeroUsize::new(width).ok_or(ConfigValidationError::ZeroParallelism)?;
            configuration = configuration.with_maximum_parallelization_width(width);
        }

        let filter = self.filter.to_test_filter()?;
        Ok(configuration.with_test_filter(filter))
    }
}

impl FilterSection {
    fn to_test_filter(&self) -> Result<TestFilter, ConfigValidationError> {
        let mut filters = Vec::new();
        if !self.include_patterns.is_empty() {
            filters.push(TestFilter::including_patterns(&self.include_patterns)?);
        }
        if !self.exclude_patterns.is_empty() {
            filters.push(TestFilter::excluding_patterns(&self.exclude_patterns)?);
        }
        if !self.include_tags.is_empty() {
            filters.push(TestFilter::including_any_of(
                self.include_tags.iter().map(Tag::new),
            ));
        }
        if !self.exclude_tags.is_empty() {
            filters.push(TestFilter::excluding_any_of(
                self.exclude_tags.iter().map(Tag::new),
            ));
        }

        let filter = filters
            .into_iter()
            .reduce(|lhs, rhs| lhs.combining(rhs, CombinationOperator::And))
            .unwrap_or_else(TestFilter::unfiltered);
        Ok(filter.with_include_hidden_tests(self.include_hidden))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        let config = ConfigFile::default_config().expect("default config is valid");
        let configuration = config
            .apply(Configuration::default())
            .expect("default config applies");
        let defaults = Configuration::default();

        assert_eq!(
            configuration.is_parallelization_enabled,
            defaults.is_parallelization_enabled
        );
        assert_eq!(configuration.repetition_policy, RepetitionPolicy::ONCE);
        assert_eq!(configuration.time_limits, TimeLimits::default());
        assert_eq!(configuration.maximum_parallelization_width, None);
        assert!(configuration.test_filter.is_unfiltered());
    }

    #[test]
    fn overrides_apply() {
        let config = ConfigFile::from_toml_str(indoc! {r#"
            [run]
            parallel = false
            max-parallel-test-cases = 4
            verbosity = -1

            [repetition]
            count = 5
            continuation = "until-issue-recorded"

            [time-limits]
            default = "30s"
            maximum = "10m"
            granularity = "1s"

            [filter]
            include-patterns = ["^Net\\."]
            exclude-tags = ["flaky"]
        "#})
        .expect("config parses");
        let configuration = config.apply(Configuration::default()).expect("valid");

        assert!(!configuration.is_parallelization_enabled);
        assert_eq!(configuration.maximum_parallelization_width, NonZeroUsize::new(4));
        assert_eq!(configuration.verbosity, -1);
        assert_eq!(
            configuration.repetition_policy,
            RepetitionPolicy::repeating(
                Continuation::UntilIssueRecorded,
                NonZeroUsize::new(5).unwrap()
            )
        );
        assert_eq!(
            configuration.time_limits,
            TimeLimits {
                default: Some(Duration::from_secs(30)),
                maximum: Some(Duration::from_secs(600)),
                granularity: Duration::from_secs(1),
            }
        );
        assert!(!configuration.test_filter.is_unfiltered());
    }

    #[test]
    fn invalid_values_fail_eagerly() {
        let zero = ConfigFile::from_toml_str("[repetition]\ncount = 0\n").expect("parses");
        assert!(matches!(
            zero.apply(Configuration::default()),
            Err(ConfigValidationError::ZeroRepetitionCount)
        ));

        let zero_width =
            ConfigFile::from_toml_str("[run]\nmax-parallel-test-cases = 0\n").expect("parses");
        assert!(matches!(
            zero_width.apply(Configuration::default()),
            Err(ConfigValidationError::ZeroParallelism)
        ));

        let bad_pattern =
            ConfigFile::from_toml_str("[filter]\ninclude-patterns = [\"(unclosed\"]\n")
                .expect("parses");
        match bad_pattern.apply(Configuration::default()) {
            Err(ConfigValidationError::Filter(err)) => assert_eq!(err.pattern(), "(unclosed"),
            other => panic!("expected filter error, got {other:?}"),
        }

        let unknown_continuation =
            ConfigFile::from_toml_str("[repetition]\ncontinuation = \"sometimes\"\n");
        assert!(unknown_continuation.is_err());
    }
}

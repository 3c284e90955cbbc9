/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::{Path, PathBuf};

use crate::types::{MeasurementPolicy, TimeBudget, UploadStrategy};

/// Configuration for a [`Harness`](crate::harness::Harness)
///
/// Everything the harness needs is injected here at construction time; the
/// harness itself never reads ambient environment state.
#[derive(Debug, Clone)]
pub struct Config {
    bucket: String,
    staging_path: PathBuf,
    strategies: Vec<UploadStrategy>,
    measurement_policy: MeasurementPolicy,
    time_budget: TimeBudget,
    client: aws_sdk_s3::Client,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The bucket all transfers run against.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Path of the local staging file.
    ///
    /// The file is truncated on every download and re-opened read-only for
    /// each upload attempt. Concurrent invocations must each use an isolated
    /// path; per-invocation isolation is the hosting environment's job.
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// The upload strategies to benchmark, in canonical order.
    pub fn strategies(&self) -> &[UploadStrategy] {
        &self.strategies
    }

    /// The warm-up/measure policy applied to every strategy.
    pub fn measurement_policy(&self) -> &MeasurementPolicy {
        &self.measurement_policy
    }

    /// How the invocation deadline is treated.
    pub fn time_budget(&self) -> TimeBudget {
        self.time_budget
    }

    /// The Amazon S3 client instance that will be used to send requests to S3.
    pub fn client(&self) -> &aws_sdk_s3::Client {
        &self.client
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    bucket: Option<String>,
    staging_path: Option<PathBuf>,
    strategies: Vec<UploadStrategy>,
    measurement_policy: MeasurementPolicy,
    time_budget: TimeBudget,
    client: Option<aws_sdk_s3::Client>,
}

impl Builder {
    /// Set the bucket all transfers run against.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set the path of the local staging file.
    pub fn staging_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_path = Some(path.into());
        self
    }

    /// Add a single upload strategy to benchmark.
    pub fn strategy(mut self, strategy: UploadStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Set the upload strategies to benchmark.
    ///
    /// Strategies are normalized to canonical order and de-duplicated when
    /// the config is built. When none are given, all strategies are
    /// benchmarked.
    pub fn strategies(mut self, strategies: impl IntoIterator<Item = UploadStrategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    /// Set the warm-up/measure policy.
    ///
    /// Default is a discarded warm-up attempt followed by
    /// [`DEFAULT_REPETITIONS`](crate::types::DEFAULT_REPETITIONS) measured
    /// repetitions.
    pub fn measurement_policy(mut self, policy: MeasurementPolicy) -> Self {
        self.measurement_policy = policy;
        self
    }

    /// Set how the invocation deadline is treated.
    ///
    /// Default is [TimeBudget::Observe].
    pub fn time_budget(mut self, time_budget: TimeBudget) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Set an explicit S3 client to use.
    pub fn client(mut self, client: aws_sdk_s3::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Consumes the builder and constructs a [`Config`](crate::config::Config)
    pub fn build(self) -> Config {
        let mut strategies = if self.strategies.is_empty() {
            UploadStrategy::ALL.to_vec()
        } else {
            self.strategies
        };
        strategies.sort_unstable();
        strategies.dedup();

        Config {
            bucket: self.bucket.expect("bucket set"),
            staging_path: self.staging_path.expect("staging path set"),
            strategies,
            measurement_policy: self.measurement_policy,
            time_budget: self.time_budget,
            client: self.client.expect("client set"),
        }
    }
}

#[cfg(test)]
mod test {
    use aws_sdk_s3::operation::get_object::GetObjectOutput;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};

    use super::Config;
    use crate::types::UploadStrategy;

    fn test_client() -> aws_sdk_s3::Client {
        let get = mock!(aws_sdk_s3::Client::get_object)
            .then_output(|| GetObjectOutput::builder().build());
        mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&get])
    }

    #[test]
    fn test_strategies_normalized_to_canonical_order() {
        let config = Config::builder()
            .bucket("test-bucket")
            .staging_path("/tmp/staging")
            .strategies([
                UploadStrategy::Stream,
                UploadStrategy::Put,
                UploadStrategy::Stream,
                UploadStrategy::Multipart,
            ])
            .client(test_client())
            .build();

        assert_eq!(UploadStrategy::ALL.as_slice(), config.strategies());
    }

    #[test]
    fn test_empty_strategy_set_defaults_to_all() {
        let config = Config::builder()
            .bucket("test-bucket")
            .staging_path("/tmp/staging")
            .client(test_client())
            .build();

        assert_eq!(UploadStrategy::ALL.as_slice(), config.strategies());
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::time::Duration;

/// Default number of measured repetitions per strategy.
pub const DEFAULT_REPETITIONS: u32 = 3;

/// A distinct method of re-uploading the staging file to the object store.
///
/// The declaration order is the canonical measurement order; strategies are
/// always benchmarked in this order regardless of how they were configured so
/// results stay comparable run-to-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum UploadStrategy {
    /// Upload the staging file as a single `PutObject` request.
    Put,

    /// Upload the staging file in `part_size`-sized parts via the multipart
    /// upload API.
    Multipart,

    /// Open a fresh read handle to the staging file and upload it as a raw
    /// stream, without going through any file-path based API.
    Stream,
}

impl UploadStrategy {
    /// All strategies, in canonical measurement order.
    pub const ALL: [UploadStrategy; 3] = [
        UploadStrategy::Put,
        UploadStrategy::Multipart,
        UploadStrategy::Stream,
    ];

    /// The key this strategy's mean elapsed time is reported under.
    pub fn metric_name(&self) -> &'static str {
        match self {
            UploadStrategy::Put => "PutUploadTime",
            UploadStrategy::Multipart => "FileUploadTime",
            UploadStrategy::Stream => "StreamUploadTime",
        }
    }
}

impl fmt::Display for UploadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStrategy::Put => "put-object",
            UploadStrategy::Multipart => "multipart-upload",
            UploadStrategy::Stream => "stream-upload",
        };
        write!(f, "{name}")
    }
}

/// The warm-up/measure discipline applied to every strategy.
///
/// With `warmup` enabled each strategy is executed once with the timing
/// discarded (connection pools and caches are primed so first-call overhead
/// does not pollute the measurement), then `repetitions` times with the mean
/// elapsed time reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementPolicy {
    warmup: bool,
    repetitions: u32,
}

impl MeasurementPolicy {
    /// Create a policy with an explicit warm-up setting and repetition count.
    pub fn new(warmup: bool, repetitions: u32) -> Self {
        Self {
            warmup,
            repetitions,
        }
    }

    /// Whether a discarded warm-up attempt precedes the measured repetitions.
    pub fn warmup(&self) -> bool {
        self.warmup
    }

    /// Number of measured repetitions per strategy.
    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }
}

impl Default for MeasurementPolicy {
    fn default() -> Self {
        Self::new(true, DEFAULT_REPETITIONS)
    }
}

/// How the invocation's remaining execution budget is treated.
///
/// By default a run that would overshoot its budget is not pre-empted (the
/// host environment terminates it instead); pre-emption is an explicit
/// opt-in rather than a silent default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeBudget {
    /// Report the remaining budget but never act on it.
    #[default]
    Observe,

    /// Fail with [`ErrorKind::BudgetExhausted`](crate::error::ErrorKind) before
    /// starting any step once the deadline has passed. Transfers already in
    /// flight are never cancelled.
    Enforce,
}

/// Identifies the timed step an observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedStep {
    /// The initial download of the source object into the staging file.
    Download,

    /// One measured upload strategy.
    Upload(UploadStrategy),
}

impl TimedStep {
    /// The key this step is reported under.
    pub fn label(&self) -> &'static str {
        match self {
            TimedStep::Download => "DownloadTime",
            TimedStep::Upload(strategy) => strategy.metric_name(),
        }
    }
}

/// A single named interval measured by the harness.
///
/// Warm-up attempts never produce an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingObservation {
    step: TimedStep,
    elapsed: Duration,
}

impl TimingObservation {
    pub(crate) fn new(step: TimedStep, elapsed: Duration) -> Self {
        Self { step, elapsed }
    }

    /// The step this observation measured.
    pub fn step(&self) -> TimedStep {
        self.step
    }

    /// Elapsed wall-clock time (for upload strategies, the mean over the
    /// measured repetitions).
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Elapsed time in whole milliseconds.
    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Ordered timings produced by a completed harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    observations: Vec<TimingObservation>,
    part_size: Option<u64>,
}

impl Timings {
    pub(crate) fn new(observations: Vec<TimingObservation>, part_size: Option<u64>) -> Self {
        Self {
            observations,
            part_size,
        }
    }

    /// Observations in measurement order: the download first, then each
    /// strategy in canonical order.
    pub fn observations(&self) -> &[TimingObservation] {
        &self.observations
    }

    /// The part size used by the multipart strategy, if it was measured.
    pub fn part_size(&self) -> Option<u64> {
        self.part_size
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use aws_sdk_s3::error::ProvideErrorMetadata;

use crate::types::UploadStrategy;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// NOTE: Use [`aws_smithy_types::error::display::DisplayErrorContext`] or similar to display
/// the entire error cause/source chain.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// General categories of harness errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Invocation event failed validation (e.g. source and target name the same object)
    InvalidRequest,

    /// The requested object (or bucket) does not exist
    NotFound,

    /// A request against the object store failed in transit
    Transport,

    /// The local staging file could not be written or read
    LocalStorage,

    /// An upload attempt for the named strategy failed; the whole run is aborted
    StrategyFailed(UploadStrategy),

    /// The invocation's remaining execution budget was exhausted before the
    /// run completed (only raised under [`TimeBudget::Enforce`](crate::types::TimeBudget))
    BudgetExhausted,
}

impl Error {
    /// Creates a new harness [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InvalidRequest => write!(f, "invalid transfer request"),
            ErrorKind::NotFound => write!(f, "object not found"),
            ErrorKind::Transport => write!(f, "object store request failed"),
            ErrorKind::LocalStorage => write!(f, "staging file I/O failed"),
            ErrorKind::StrategyFailed(strategy) => {
                write!(f, "upload strategy {strategy} failed")
            }
            ErrorKind::BudgetExhausted => write!(f, "execution time budget exhausted"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::LocalStorage, value)
    }
}

impl<E, R> From<aws_sdk_s3::error::SdkError<E, R>> for Error
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
    R: Send + Sync + fmt::Debug + 'static,
{
    fn from(value: aws_sdk_s3::error::SdkError<E, R>) -> Self {
        let kind = match value.code() {
            Some("NotFound" | "NoSuchKey" | "NoSuchUpload" | "NoSuchBucket") => ErrorKind::NotFound,
            _ => ErrorKind::Transport,
        };

        Error::new(kind, value)
    }
}

pub(crate) fn invalid_request<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InvalidRequest, err)
}

pub(crate) fn strategy_failed(strategy: UploadStrategy, err: Error) -> Error {
    Error::new(ErrorKind::StrategyFailed(strategy), err)
}

pub(crate) fn from_kind<E>(kind: ErrorKind) -> impl FnOnce(E) -> Error
where
    E: Into<BoxError>,
{
    |err| Error::new(kind, err)
}

static BUDGET_EXHAUSTED: &str =
    "invocation deadline passed before the run completed, aborting remaining steps";

pub(crate) fn budget_exhausted() -> Error {
    Error::new(ErrorKind::BudgetExhausted, BUDGET_EXHAUSTED)
}

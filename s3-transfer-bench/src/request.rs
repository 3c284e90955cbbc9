/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::Deserialize;

use crate::error::{self, Error};
use crate::types::UploadStrategy;

/// Invocation event describing a single benchmark run.
///
/// The wire field names (`remoteFileDir`, `remoteSourceFileName`,
/// `remoteTargetFileName`, `partSize`) are the event contract the harness has
/// always been invoked with and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "remoteFileDir")]
    source_dir: String,

    #[serde(rename = "remoteSourceFileName")]
    source_key: String,

    #[serde(rename = "remoteTargetFileName")]
    target_key: String,

    #[serde(rename = "partSize", default)]
    part_size: Option<u64>,
}

impl TransferRequest {
    /// Create a new `TransferRequest` builder
    pub fn builder() -> TransferRequestBuilder {
        TransferRequestBuilder::default()
    }

    /// Logical path prefix within the bucket.
    pub fn source_dir(&self) -> &str {
        &self.source_dir
    }

    /// Name of the object to download.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Name the object is re-uploaded under.
    pub fn target_key(&self) -> &str {
        &self.target_key
    }

    /// Chunk size in bytes for the multipart strategy.
    pub fn part_size(&self) -> Option<u64> {
        self.part_size
    }

    /// Full key of the object to download.
    pub(crate) fn source_object(&self) -> String {
        format!("{}/{}", self.source_dir, self.source_key)
    }

    /// Full key the object is re-uploaded under.
    pub(crate) fn target_object(&self) -> String {
        format!("{}/{}", self.source_dir, self.target_key)
    }

    /// Validate the request against the configured strategy set.
    ///
    /// Runs before any network I/O; a failure here guarantees no partial side
    /// effects.
    pub(crate) fn validate(&self, strategies: &[UploadStrategy]) -> Result<(), Error> {
        if self.source_key.is_empty() || self.target_key.is_empty() {
            return Err(error::invalid_request(
                "source and target object names must be non-empty",
            ));
        }

        if self.source_key == self.target_key {
            return Err(error::invalid_request(
                "source and target must name different objects",
            ));
        }

        if strategies.contains(&UploadStrategy::Multipart) {
            match self.part_size {
                None => {
                    return Err(error::invalid_request(
                        "partSize is required when the multipart strategy is benchmarked",
                    ))
                }
                Some(0) => return Err(error::invalid_request("partSize must be non-zero")),
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Fluent style builder for [TransferRequest]
#[derive(Debug, Clone, Default)]
pub struct TransferRequestBuilder {
    source_dir: Option<String>,
    source_key: Option<String>,
    target_key: Option<String>,
    part_size: Option<u64>,
}

impl TransferRequestBuilder {
    /// Set the logical path prefix within the bucket.
    pub fn source_dir(mut self, source_dir: impl Into<String>) -> Self {
        self.source_dir = Some(source_dir.into());
        self
    }

    /// Set the name of the object to download.
    pub fn source_key(mut self, source_key: impl Into<String>) -> Self {
        self.source_key = Some(source_key.into());
        self
    }

    /// Set the name the object is re-uploaded under.
    pub fn target_key(mut self, target_key: impl Into<String>) -> Self {
        self.target_key = Some(target_key.into());
        self
    }

    /// Set the chunk size in bytes for the multipart strategy.
    pub fn part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Consumes the builder and constructs a [`TransferRequest`]
    pub fn build(self) -> TransferRequest {
        TransferRequest {
            source_dir: self.source_dir.expect("source_dir set"),
            source_key: self.source_key.expect("source_key set"),
            target_key: self.target_key.expect("target_key set"),
            part_size: self.part_size,
        }
    }
}

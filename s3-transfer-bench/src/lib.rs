/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */

//! S3 transfer strategy latency harness.
//!
//! Downloads a source object to local scratch storage, then re-uploads it
//! under a new key with up to three distinct strategies (single `PutObject`,
//! multipart upload, raw stream upload), timing each one with a
//! warm-up-then-average protocol. Intended to run inside a short-lived
//! invocation environment such as AWS Lambda.

#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

/// Error types emitted by `s3-transfer-bench`
pub mod error;

/// Common types used by `s3-transfer-bench`
pub mod types;

/// Harness configuration
pub mod config;

/// Invocation event describing a single benchmark run
pub mod request;

/// The transfer harness itself
pub mod harness;

/// Shaping of timings into the invocation response
pub mod report;

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Lambda entry point for the transfer latency harness.
//!
//! Configuration (bucket name, credentials, region) is sourced from the
//! execution environment exactly once, here; the harness itself only ever
//! sees an explicit [`Config`].

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

use s3_transfer_bench::config::Config;
use s3_transfer_bench::harness::Harness;
use s3_transfer_bench::report::TransferReport;
use s3_transfer_bench::request::TransferRequest;

/// Staging file inside the Lambda scratch volume. `/tmp` is the only
/// writable path and is private to one execution environment at a time.
const STAGING_PATH: &str = "/tmp/temp_download";

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(false)
        .init();

    let bucket = std::env::var("BUCKET_NAME")
        .map_err(|_| "the BUCKET_NAME environment variable must be set")?;
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = aws_sdk_s3::Client::new(&sdk_config);

    run(service_fn(move |event| {
        handle(event, client.clone(), bucket.clone())
    }))
    .await
}

async fn handle(
    event: LambdaEvent<TransferRequest>,
    client: aws_sdk_s3::Client,
    bucket: String,
) -> Result<TransferReport, Error> {
    let (request, context) = event.into_parts();
    tracing::debug!(?request, "benchmark invocation received");

    let config = Config::builder()
        .bucket(bucket)
        .staging_path(STAGING_PATH)
        .client(client)
        .build();
    let harness = Harness::new(config);

    let deadline = deadline_instant(context.deadline);
    let timings = harness.run(&request, deadline).await?;

    // queried after the last transfer so the report reflects their cost
    let remaining = remaining_budget(context.deadline);
    Ok(TransferReport::assemble(&timings, remaining))
}

/// Remaining execution budget, derived from the runtime's deadline
/// (milliseconds since the epoch). `None` once the deadline has passed.
fn remaining_budget(deadline_ms: u64) -> Option<Duration> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    Duration::from_millis(deadline_ms).checked_sub(now)
}

fn deadline_instant(deadline_ms: u64) -> Option<Instant> {
    remaining_budget(deadline_ms).map(|remaining| Instant::now() + remaining)
}

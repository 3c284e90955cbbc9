/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::Duration;

use serde::Serialize;

use crate::types::{TimedStep, Timings, UploadStrategy};

/// The single structured output of a successful run.
///
/// Field names are the response contract consumers already parse; times are
/// integer milliseconds (means over the measured repetitions) and
/// `RemainingTime` is the invocation's remaining execution budget formatted
/// as `HH:MM:SS.mmm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    #[serde(rename = "DownloadTime")]
    download_time: u64,

    #[serde(rename = "PutUploadTime", skip_serializing_if = "Option::is_none")]
    put_upload_time: Option<u64>,

    #[serde(rename = "FileUploadTime", skip_serializing_if = "Option::is_none")]
    file_upload_time: Option<u64>,

    #[serde(rename = "StreamUploadTime", skip_serializing_if = "Option::is_none")]
    stream_upload_time: Option<u64>,

    #[serde(rename = "PartSize", skip_serializing_if = "Option::is_none")]
    part_size: Option<u64>,

    #[serde(rename = "RemainingTime", skip_serializing_if = "Option::is_none")]
    remaining_time: Option<String>,
}

impl TransferReport {
    /// Shape a completed run's timings into the response payload.
    ///
    /// Pure function of its inputs. `remaining` must be queried from the
    /// invocation environment at assembly time (after all transfers) so the
    /// report reflects their cost.
    pub fn assemble(timings: &Timings, remaining: Option<Duration>) -> TransferReport {
        let mut report = TransferReport {
            download_time: 0,
            put_upload_time: None,
            file_upload_time: None,
            stream_upload_time: None,
            part_size: timings.part_size(),
            remaining_time: remaining.map(format_remaining),
        };

        for obs in timings.observations() {
            let millis = obs.elapsed_millis();
            match obs.step() {
                TimedStep::Download => report.download_time = millis,
                TimedStep::Upload(UploadStrategy::Put) => report.put_upload_time = Some(millis),
                TimedStep::Upload(UploadStrategy::Multipart) => {
                    report.file_upload_time = Some(millis)
                }
                TimedStep::Upload(UploadStrategy::Stream) => {
                    report.stream_upload_time = Some(millis)
                }
            }
        }

        report
    }

    /// Download elapsed time in milliseconds.
    pub fn download_time_millis(&self) -> u64 {
        self.download_time
    }

    /// Mean elapsed time of the single-shot put strategy, if measured.
    pub fn put_upload_time_millis(&self) -> Option<u64> {
        self.put_upload_time
    }

    /// Mean elapsed time of the multipart strategy, if measured.
    pub fn file_upload_time_millis(&self) -> Option<u64> {
        self.file_upload_time
    }

    /// Mean elapsed time of the stream strategy, if measured.
    pub fn stream_upload_time_millis(&self) -> Option<u64> {
        self.stream_upload_time
    }

    /// The part size echoed back for the multipart strategy.
    pub fn part_size(&self) -> Option<u64> {
        self.part_size
    }

    /// Remaining execution budget at assembly time, formatted.
    pub fn remaining_time(&self) -> Option<&str> {
        self.remaining_time.as_deref()
    }
}

fn format_remaining(remaining: Duration) -> String {
    let total_secs = remaining.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = remaining.subsec_millis();
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

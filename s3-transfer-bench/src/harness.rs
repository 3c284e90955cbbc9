/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::{Duration, Instant};

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::Length;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::Config;
use crate::error::{self, Error, ErrorKind};
use crate::request::TransferRequest;
use crate::types::{TimeBudget, TimedStep, TimingObservation, Timings, UploadStrategy};

/// Transfer harness: one download, then each configured upload strategy
/// measured with the warm-up/repetition protocol.
///
/// Steps execute strictly sequentially; a strategy is fully measured
/// (warm-up plus every repetition) before the next one starts so that no
/// timed step contends with another.
#[derive(Debug, Clone)]
pub struct Harness {
    config: Config,
}

impl Harness {
    /// Create a harness from an explicit [`Config`].
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns a reference to the harness configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one full benchmark: validate, download the source object into the
    /// staging file, then measure every configured strategy in canonical
    /// order.
    ///
    /// `deadline` is the invocation's termination point; it is only consulted
    /// when the config's [`TimeBudget`] is `Enforce`. Any failure aborts the
    /// entire run; partial timings are never returned.
    pub async fn run(
        &self,
        request: &TransferRequest,
        deadline: Option<Instant>,
    ) -> Result<Timings, Error> {
        request.validate(self.config.strategies())?;

        let mut observations = Vec::with_capacity(1 + self.config.strategies().len());

        self.check_budget(deadline)?;
        let elapsed = self.download(request).await?;
        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "download complete");
        observations.push(TimingObservation::new(TimedStep::Download, elapsed));

        for strategy in self.config.strategies() {
            self.check_budget(deadline)?;
            let elapsed = self.measure(*strategy, request).await?;
            tracing::debug!(
                %strategy,
                elapsed_ms = elapsed.as_millis() as u64,
                "strategy measured"
            );
            observations.push(TimingObservation::new(TimedStep::Upload(*strategy), elapsed));
        }

        let part_size = if self.config.strategies().contains(&UploadStrategy::Multipart) {
            request.part_size()
        } else {
            None
        };

        Ok(Timings::new(observations, part_size))
    }

    fn check_budget(&self, deadline: Option<Instant>) -> Result<(), Error> {
        match (self.config.time_budget(), deadline) {
            (TimeBudget::Enforce, Some(deadline)) if Instant::now() >= deadline => {
                Err(error::budget_exhausted())
            }
            _ => Ok(()),
        }
    }

    /// Download the source object into the staging file, truncating any
    /// previous contents, and return the elapsed wall-clock time.
    async fn download(&self, request: &TransferRequest) -> Result<Duration, Error> {
        let start = Instant::now();

        let resp = self
            .config
            .client()
            .get_object()
            .bucket(self.config.bucket())
            .key(request.source_object())
            .send()
            .await?;

        let mut file = tokio::fs::File::create(self.config.staging_path()).await?;
        let mut body = resp.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(error::from_kind(ErrorKind::Transport))?
        {
            tracing::trace!(len = chunk.len(), "staging chunk");
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(start.elapsed())
    }

    /// Apply the warm-up/measure protocol to a single strategy and return the
    /// mean elapsed time over the measured repetitions.
    async fn measure(
        &self,
        strategy: UploadStrategy,
        request: &TransferRequest,
    ) -> Result<Duration, Error> {
        let policy = self.config.measurement_policy();

        if policy.warmup() {
            tracing::trace!(%strategy, "warm-up attempt");
            self.attempt(strategy, request)
                .await
                .map_err(|err| error::strategy_failed(strategy, err))?;
        }

        let repetitions = policy.repetitions().max(1);
        let start = Instant::now();
        for _ in 0..repetitions {
            self.attempt(strategy, request)
                .await
                .map_err(|err| error::strategy_failed(strategy, err))?;
        }

        Ok(start.elapsed() / repetitions)
    }

    async fn attempt(
        &self,
        strategy: UploadStrategy,
        request: &TransferRequest,
    ) -> Result<(), Error> {
        match strategy {
            UploadStrategy::Put => self.put_upload(request).await,
            UploadStrategy::Multipart => self.multipart_upload(request).await,
            UploadStrategy::Stream => self.stream_upload(request).await,
        }
    }

    /// Upload the staging file as a single `PutObject` request.
    async fn put_upload(&self, request: &TransferRequest) -> Result<(), Error> {
        let len = tokio::fs::metadata(self.config.staging_path()).await?.len();
        let content_length: i64 = len
            .try_into()
            .map_err(error::from_kind(ErrorKind::LocalStorage))?;
        let body = ByteStream::from_path(self.config.staging_path())
            .await
            .map_err(error::from_kind(ErrorKind::LocalStorage))?;

        self.config
            .client()
            .put_object()
            .bucket(self.config.bucket())
            .key(request.target_object())
            .content_length(content_length)
            .body(body)
            .send()
            .await?;

        Ok(())
    }

    /// Upload the staging file in `part_size`-sized parts through the
    /// multipart upload API. Parts upload sequentially; the benchmark's
    /// validity depends on timed steps not contending with each other.
    async fn multipart_upload(&self, request: &TransferRequest) -> Result<(), Error> {
        let part_size = request
            .part_size()
            .ok_or_else(|| error::invalid_request("partSize is required for multipart uploads"))?;
        let key = request.target_object();
        let client = self.config.client();

        let mpu = client
            .create_multipart_upload()
            .bucket(self.config.bucket())
            .key(&key)
            .send()
            .await?;
        let upload_id = mpu
            .upload_id()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Transport,
                    "CreateMultipartUpload response missing upload id",
                )
            })?
            .to_string();

        match self.upload_parts(&key, &upload_id, part_size).await {
            Ok(parts) => {
                client
                    .complete_multipart_upload()
                    .bucket(self.config.bucket())
                    .key(&key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await?;
                Ok(())
            }
            Err(err) => {
                // best-effort cleanup; the part failure is what surfaces
                if let Err(abort_err) = client
                    .abort_multipart_upload()
                    .bucket(self.config.bucket())
                    .key(&key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        error = %DisplayErrorContext(&abort_err),
                        "failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        part_size: u64,
    ) -> Result<Vec<CompletedPart>, Error> {
        let mut file = tokio::fs::File::open(self.config.staging_path()).await?;
        let mut parts = Vec::new();
        let mut part_number = 1i32;

        loop {
            let mut buf = BytesMut::with_capacity(part_size as usize);
            let mut handle = (&mut file).take(part_size);
            while handle.limit() > 0 {
                let read = handle.read_buf(&mut buf).await?;
                if read == 0 {
                    break;
                }
            }

            let len = buf.len() as u64;
            if len == 0 && !parts.is_empty() {
                break;
            }

            // an empty staging file still uploads one (empty) part
            tracing::trace!(part_number, len, "uploading part");
            let resp = self
                .config
                .client()
                .upload_part()
                .bucket(self.config.bucket())
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(len as i64)
                .body(ByteStream::from(buf.freeze()))
                .send()
                .await?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag)
                    .part_number(part_number)
                    .build(),
            );

            if len < part_size {
                break;
            }
            part_number += 1;
        }

        Ok(parts)
    }

    /// Upload the staging file from a freshly opened read handle, bypassing
    /// any file-path based API.
    async fn stream_upload(&self, request: &TransferRequest) -> Result<(), Error> {
        let file = tokio::fs::File::open(self.config.staging_path()).await?;
        let len = file.metadata().await?.len();
        let body = ByteStream::read_from()
            .file(file)
            .length(Length::Exact(len))
            .build()
            .await
            .map_err(error::from_kind(ErrorKind::LocalStorage))?;

        self.config
            .client()
            .put_object()
            .bucket(self.config.bucket())
            .key(request.target_object())
            .body(body)
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadOutput;
    use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadOutput;
    use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
    use aws_sdk_s3::operation::put_object::{PutObjectError, PutObjectOutput};
    use aws_sdk_s3::operation::upload_part::UploadPartOutput;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use aws_smithy_types::error::ErrorMetadata;

    use super::Harness;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::request::TransferRequest;
    use crate::types::{MeasurementPolicy, TimeBudget, TimedStep, UploadStrategy};

    const BODY: &[u8] = b"every adolescent dog goes bonkers early";
    const PART_SIZE: u64 = 16;

    fn test_request() -> TransferRequest {
        TransferRequest::builder()
            .source_dir("bench")
            .source_key("source.dat")
            .target_key("target.dat")
            .part_size(PART_SIZE)
            .build()
    }

    fn test_config(
        client: aws_sdk_s3::Client,
        staging: &Path,
        strategies: &[UploadStrategy],
        policy: MeasurementPolicy,
    ) -> Config {
        Config::builder()
            .bucket("test-bucket")
            .staging_path(staging)
            .strategies(strategies.iter().copied())
            .measurement_policy(policy)
            .client(client)
            .build()
    }

    fn get_object_rule() -> aws_smithy_mocks::Rule {
        mock!(aws_sdk_s3::Client::get_object).then_output(|| {
            GetObjectOutput::builder()
                .content_length(BODY.len() as i64)
                .body(ByteStream::from_static(BODY))
                .build()
        })
    }

    #[tokio::test]
    async fn test_identical_source_and_target_rejected_before_any_io() {
        let calls = Arc::new(AtomicUsize::new(0));
        let get = {
            let calls = calls.clone();
            mock!(aws_sdk_s3::Client::get_object).then_output(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                GetObjectOutput::builder().build()
            })
        };
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&get]);

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(
            client,
            &tmp.path().join("staging"),
            &[UploadStrategy::Put],
            MeasurementPolicy::default(),
        );
        let harness = Harness::new(config);

        let request = TransferRequest::builder()
            .source_dir("bench")
            .source_key("same.dat")
            .target_key("same.dat")
            .build();

        let err = harness
            .run(&request, None)
            .await
            .expect_err("identical source and target must fail validation");
        assert_eq!(&ErrorKind::InvalidRequest, err.kind());
        assert_eq!(0, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_download_failure_skips_all_uploads() {
        let get = mock!(aws_sdk_s3::Client::get_object).then_error(|| {
            GetObjectError::generic(ErrorMetadata::builder().code("NoSuchKey").build())
        });
        let uploads = Arc::new(AtomicUsize::new(0));
        let put = {
            let uploads = uploads.clone();
            mock!(aws_sdk_s3::Client::put_object).then_output(move || {
                uploads.fetch_add(1, Ordering::SeqCst);
                PutObjectOutput::builder().build()
            })
        };
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&get, &put]);

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(
            client,
            &tmp.path().join("staging"),
            &[UploadStrategy::Put, UploadStrategy::Stream],
            MeasurementPolicy::default(),
        );
        let harness = Harness::new(config);

        let err = harness
            .run(&test_request(), None)
            .await
            .expect_err("missing source object must fail the run");
        assert_eq!(&ErrorKind::NotFound, err.kind());
        assert_eq!(0, uploads.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_strategies_measured_in_canonical_order() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let record = |label: &'static str| {
            let log = log.clone();
            move || log.lock().unwrap().push(label)
        };

        let get = {
            let record = record("get");
            mock!(aws_sdk_s3::Client::get_object).then_output(move || {
                record();
                GetObjectOutput::builder()
                    .content_length(BODY.len() as i64)
                    .body(ByteStream::from_static(BODY))
                    .build()
            })
        };
        let put = {
            let record = record("put");
            mock!(aws_sdk_s3::Client::put_object)
                .match_requests(|r| r.content_length.is_some())
                .then_output(move || {
                    record();
                    PutObjectOutput::builder().build()
                })
        };
        let create_mpu = {
            let record = record("create-mpu");
            mock!(aws_sdk_s3::Client::create_multipart_upload).then_output(move || {
                record();
                CreateMultipartUploadOutput::builder()
                    .upload_id("test-upload-id")
                    .build()
            })
        };
        let upload_part = {
            let record = record("part");
            mock!(aws_sdk_s3::Client::upload_part)
                .match_requests(|r| r.upload_id.as_deref() == Some("test-upload-id"))
                .then_output(move || {
                    record();
                    UploadPartOutput::builder().e_tag("test-e-tag").build()
                })
        };
        let complete_mpu = {
            let record = record("complete-mpu");
            mock!(aws_sdk_s3::Client::complete_multipart_upload)
                .match_requests(|r| {
                    r.multipart_upload
                        .as_ref()
                        .and_then(|mpu| mpu.parts.as_ref())
                        .map(|parts| parts.len())
                        == Some(3)
                })
                .then_output(move || {
                    record();
                    CompleteMultipartUploadOutput::builder().build()
                })
        };
        let stream_put = {
            let record = record("stream");
            mock!(aws_sdk_s3::Client::put_object)
                .match_requests(|r| r.content_length.is_none())
                .then_output(move || {
                    record();
                    PutObjectOutput::builder().build()
                })
        };

        let client = mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            &[&get, &put, &create_mpu, &upload_part, &complete_mpu, &stream_put]
        );

        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("staging");
        // strategies deliberately configured out of order
        let config = test_config(
            client,
            &staging,
            &[
                UploadStrategy::Stream,
                UploadStrategy::Multipart,
                UploadStrategy::Put,
            ],
            MeasurementPolicy::new(false, 1),
        );
        let harness = Harness::new(config);

        let timings = harness.run(&test_request(), None).await.unwrap();

        // BODY is 39 bytes, so a 16-byte part size yields 3 parts
        let expected = vec![
            "get",
            "put",
            "create-mpu",
            "part",
            "part",
            "part",
            "complete-mpu",
            "stream",
        ];
        assert_eq!(expected, *log.lock().unwrap());

        let labels: Vec<&str> = timings
            .observations()
            .iter()
            .map(|obs| obs.step().label())
            .collect();
        assert_eq!(
            vec![
                "DownloadTime",
                "PutUploadTime",
                "FileUploadTime",
                "StreamUploadTime"
            ],
            labels
        );
        assert_eq!(Some(PART_SIZE), timings.part_size());

        // download used overwrite semantics into the staging file
        assert_eq!(BODY, std::fs::read(&staging).unwrap().as_slice());
    }

    #[tokio::test]
    async fn test_warmup_latency_excluded_from_reported_mean() {
        let warm_put = mock!(aws_sdk_s3::Client::put_object).then_output(|| {
            std::thread::sleep(Duration::from_millis(240));
            PutObjectOutput::builder().build()
        });
        let measured_put = || {
            mock!(aws_sdk_s3::Client::put_object).then_output(|| {
                std::thread::sleep(Duration::from_millis(10));
                PutObjectOutput::builder().build()
            })
        };
        let get = get_object_rule();
        let (put_1, put_2, put_3) = (measured_put(), measured_put(), measured_put());
        let client = mock_client!(
            aws_sdk_s3,
            RuleMode::Sequential,
            &[&get, &warm_put, &put_1, &put_2, &put_3]
        );

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(
            client,
            &tmp.path().join("staging"),
            &[UploadStrategy::Put],
            MeasurementPolicy::new(true, 3),
        );
        let harness = Harness::new(config);

        let timings = harness.run(&test_request(), None).await.unwrap();
        let put_time = timings
            .observations()
            .iter()
            .find(|obs| obs.step() == TimedStep::Upload(UploadStrategy::Put))
            .expect("put strategy measured");

        // the mean reflects only the three 10ms measured calls; had the 240ms
        // warm-up leaked into the sum the mean would exceed 80ms
        assert!(put_time.elapsed() >= Duration::from_millis(10));
        assert!(put_time.elapsed() < Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_failed_repetition_aborts_the_run() {
        let get = get_object_rule();
        let put_ok = mock!(aws_sdk_s3::Client::put_object)
            .then_output(|| PutObjectOutput::builder().build());
        let put_err = mock!(aws_sdk_s3::Client::put_object).then_error(|| {
            PutObjectError::generic(ErrorMetadata::builder().code("InternalError").build())
        });
        let client = mock_client!(aws_sdk_s3, RuleMode::Sequential, &[&get, &put_ok, &put_err]);

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(
            client,
            &tmp.path().join("staging"),
            &[UploadStrategy::Put],
            MeasurementPolicy::new(false, 3),
        );
        let harness = Harness::new(config);

        let err = harness
            .run(&test_request(), None)
            .await
            .expect_err("second repetition fails, the run must abort");
        assert_eq!(
            &ErrorKind::StrategyFailed(UploadStrategy::Put),
            err.kind()
        );
    }

    #[tokio::test]
    async fn test_empty_object_still_uploads_one_part() {
        let get = mock!(aws_sdk_s3::Client::get_object).then_output(|| {
            GetObjectOutput::builder()
                .content_length(0)
                .body(ByteStream::from_static(b""))
                .build()
        });
        let create_mpu = mock!(aws_sdk_s3::Client::create_multipart_upload).then_output(|| {
            CreateMultipartUploadOutput::builder()
                .upload_id("test-upload-id")
                .build()
        });
        let parts = Arc::new(AtomicUsize::new(0));
        let upload_part = {
            let parts = parts.clone();
            mock!(aws_sdk_s3::Client::upload_part)
                .match_requests(|r| r.content_length == Some(0))
                .then_output(move || {
                    parts.fetch_add(1, Ordering::SeqCst);
                    UploadPartOutput::builder().build()
                })
        };
        let complete_mpu = mock!(aws_sdk_s3::Client::complete_multipart_upload)
            .then_output(|| CompleteMultipartUploadOutput::builder().build());
        let client = mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            &[&get, &create_mpu, &upload_part, &complete_mpu]
        );

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(
            client,
            &tmp.path().join("staging"),
            &[UploadStrategy::Multipart],
            MeasurementPolicy::new(false, 1),
        );
        let harness = Harness::new(config);

        harness.run(&test_request(), None).await.unwrap();
        assert_eq!(1, parts.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_enforced_budget_preempts_before_any_io() {
        let calls = Arc::new(AtomicUsize::new(0));
        let get = {
            let calls = calls.clone();
            mock!(aws_sdk_s3::Client::get_object).then_output(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                GetObjectOutput::builder().build()
            })
        };
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&get]);

        let tmp = tempfile::tempdir().unwrap();
        let config = Config::builder()
            .bucket("test-bucket")
            .staging_path(tmp.path().join("staging"))
            .strategies([UploadStrategy::Put])
            .time_budget(TimeBudget::Enforce)
            .client(client)
            .build();
        let harness = Harness::new(config);

        let err = harness
            .run(&test_request(), Some(Instant::now()))
            .await
            .expect_err("expired deadline must pre-empt the run");
        assert_eq!(&ErrorKind::BudgetExhausted, err.kind());
        assert_eq!(0, calls.load(Ordering::SeqCst));
    }
}

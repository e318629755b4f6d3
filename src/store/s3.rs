//! S3-compatible backend.
//!
//! The SDK is async; this store owns a small tokio runtime and blocks on
//! each request so the rewriter pipeline stays a plain sequence of calls.
//! Request timeouts and connection failures are reported as
//! [`StoreError::Transient`].

use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;
use tracing::debug;

use super::{ObjectStore, StoreError};
use crate::config::BucketConfig;

const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
    endpoint: String,
}

impl S3Store {
    pub fn new(cfg: &BucketConfig) -> Result<Self, StoreError> {
        let access_key = cfg
            .access_key
            .clone()
            .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok());
        let secret_key = cfg
            .secret_key
            .clone()
            .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok());
        let (access_key, secret_key) = match (access_key, secret_key) {
            (Some(a), Some(s)) => (a, s),
            _ => {
                return Err(StoreError::AccessDenied {
                    key: String::new(),
                    message: format!("no credentials configured for bucket {}", cfg.bucket),
                })
            }
        };

        let region = if cfg.region.is_empty() { DEFAULT_REGION } else { cfg.region.as_str() };
        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .credentials_provider(Credentials::new(access_key, secret_key, None, None, "clipshift"))
            .force_path_style(cfg.force_path_style);
        if !cfg.endpoint.is_empty() {
            builder = builder.endpoint_url(&cfg.endpoint);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| StoreError::Backend { key: String::new(), message: e.to_string() })?;

        Ok(Self {
            runtime,
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            endpoint: cfg.endpoint.clone(),
        })
    }

    fn get(&self, key: &str, range: Option<(u64, u64)>) -> Result<Vec<u8>, StoreError> {
        self.runtime.block_on(async {
            let mut req = self.client.get_object().bucket(&self.bucket).key(key);
            if let Some((start, end)) = range {
                req = req.range(format!("bytes={start}-{end}"));
            }
            let resp = req.send().await.map_err(|e| classify(key, range, e))?;
            let body = resp.body.collect().await.map_err(|e| StoreError::Transient {
                key: key.to_owned(),
                message: e.to_string(),
            })?;
            Ok(body.into_bytes().to_vec())
        })
    }
}

fn classify<E>(key: &str, range: Option<(u64, u64)>, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let key = key.to_owned();
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transient { key, message }
        }
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            match (ctx.err().code(), status) {
                (Some("NoSuchKey" | "NotFound" | "NoSuchBucket"), _) | (None, 404) => {
                    StoreError::NotFound { key }
                }
                (Some("AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"), _)
                | (None, 401 | 403) => StoreError::AccessDenied { key, message },
                (Some("InvalidRange"), _) | (_, 416) => {
                    let (start, end) = range.unwrap_or((0, 0));
                    StoreError::InvalidRange { key, start, end }
                }
                (Some("SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout"), _)
                | (_, 429 | 500..=599) => StoreError::Transient { key, message },
                _ => StoreError::Backend { key, message },
            }
        }
        _ => StoreError::Backend { key, message },
    }
}

impl ObjectStore for S3Store {
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
        if start > end {
            return Err(StoreError::InvalidRange { key: key.to_owned(), start, end });
        }
        debug!(bucket = %self.bucket, key, start, end, "s3 ranged get");
        self.get(key, Some((start, end)))
    }

    fn get_full(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        debug!(bucket = %self.bucket, key, "s3 get");
        self.get(key, None)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        debug!(bucket = %self.bucket, key, bytes = data.len(), "s3 put");
        self.runtime.block_on(async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(data.to_vec()))
                .send()
                .await
                .map_err(|e| classify(key, None, e))?;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("s3://{} ({})", self.bucket, self.endpoint)
    }
}

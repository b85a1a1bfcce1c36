//! Transport for Amazon S3 and S3-compatible services.

use std::fmt;
use std::time::Duration;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::StatusCode;

use super::common::{ObjectStream, Transport, USER_AGENT};
use crate::error::{Error, Result};

/// Validity of the presigned URLs used to stream object contents.
const PRESIGN_EXPIRY: Duration = Duration::from_secs(60);

/// Connection settings for an S3-compatible service.
#[derive(Clone)]
pub struct S3Config {
    /// Endpoint URL, for example `http://127.0.0.1:9000` for a local MinIO.
    pub endpoint: String,
    /// Signing region.
    pub region: String,
    /// Access key used to sign requests.
    pub access_key: String,
    /// Secret key used to sign requests.
    pub secret_key: String,
    /// Maximum number of idle keep-alive connections to retain.
    pub max_connections: usize,
    /// Timeout for establishing a new TCP connection.
    pub connection_timeout: Duration,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .field("max_connections", &self.max_connections)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

/// A [`Transport`] for Amazon S3 and S3-compatible services like MinIO.
///
/// Bucket and metadata requests are signed and sent through the AWS SDK. Object
/// contents are fetched through presigned URLs on a shared `reqwest` client, so
/// the body is streamed and its connection stays busy until the stream is
/// drained or dropped.
pub struct S3Transport {
    endpoint: String,
    client: Client,
    http: reqwest::Client,
}

impl S3Transport {
    /// Creates a new transport talking to the configured endpoint with path-style addressing.
    pub fn new(config: S3Config) -> Result<Self> {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "s3lab",
        );

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(config.connection_timeout)
            .build();

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .build();

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(config.max_connections)
            .connect_timeout(config.connection_timeout)
            .build()
            .map_err(|cause| Error::Reqwest {
                context: "failed to build HTTP client".to_owned(),
                cause,
            })?;

        Ok(Self {
            endpoint: config.endpoint,
            client: Client::from_conf(sdk_config),
            http,
        })
    }
}

impl fmt::Debug for S3Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Transport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn s3_error<E>(context: impl Into<String>) -> impl FnOnce(E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let context = context.into();
    move |cause| Error::S3 {
        context,
        cause: Box::new(cause),
    }
}

/// Returns `true` if the service answered with 404, whether or not the SDK models the error.
fn is_not_found<E>(error: &SdkError<E, HttpResponse>) -> bool {
    error
        .raw_response()
        .is_some_and(|response| response.status().as_u16() == 404)
}

fn check_status(status: u16, context: impl FnOnce() -> String) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(Error::Status {
            status,
            context: context(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for S3Transport {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(error) if is_not_found(&error) => Ok(false),
            Err(cause) => Err(s3_error(format!("failed to look up bucket `{bucket}`"))(cause)),
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(s3_error(format!("failed to create bucket `{bucket}`")))?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(error) if is_not_found(&error) => Ok(false),
            Err(cause) => Err(s3_error(format!("failed to look up `{key}`"))(cause)),
        }
    }

    #[tracing::instrument(level = "trace", skip(self, payload), fields(len = payload.len()))]
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(s3_error(format!("failed to upload `{key}`")))?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        let presigning =
            PresigningConfig::expires_in(PRESIGN_EXPIRY).map_err(|cause| Error::Generic {
                context: "invalid presigning expiry".to_owned(),
                cause: Some(Box::new(cause)),
            })?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(s3_error(format!("failed to presign `{key}`")))?;

        let response = self
            .http
            .get(request.uri())
            .send()
            .await
            .map_err(|cause| Error::Reqwest {
                context: format!("failed to fetch `{key}`"),
                cause,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("Object not found");
            return Err(Error::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        }
        check_status(status.as_u16(), || format!("failed to fetch `{key}`"))?;

        let key = key.to_owned();
        let stream = response
            .bytes_stream()
            .map_err(move |cause| Error::Reqwest {
                context: format!("failed to read body of `{key}`"),
                cause,
            })
            .boxed();

        Ok(stream)
    }
}

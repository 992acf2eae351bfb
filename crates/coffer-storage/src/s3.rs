use crate::keys::validate_bucket_name;
use crate::traits::{BucketHandle, Connector, ObjectAcl, ServiceError, StorageService};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use coffer_core::{ClientConfig, DEFAULT_REGION};
use http::{Method, Uri};
use std::time::Duration;

const CREDENTIALS_PROVIDER_NAME: &str = "coffer-static";

/// Error codes S3-compatible services use when the credentials themselves are bad.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "InvalidToken",
    "ExpiredToken",
];

/// Opens sessions against S3 or any S3-compatible endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

/// S3 session
#[derive(Clone)]
pub struct S3Service {
    client: Client,
    region: String,
}

/// Object operations on one S3 bucket
#[derive(Clone)]
pub struct S3Bucket {
    client: Client,
    name: String,
}

/// Turn a configured endpoint into an absolute URL.
///
/// Endpoints are often given as a bare host ("oss.example.com"); those are
/// assumed to be HTTPS.
pub fn normalize_endpoint(endpoint: &str) -> Result<String, ServiceError> {
    let endpoint = endpoint.trim();
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let uri: Uri = candidate.parse().map_err(|e| {
        ServiceError::InvalidRequest(format!("malformed endpoint '{}': {}", endpoint, e))
    })?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        other => {
            return Err(ServiceError::InvalidRequest(format!(
                "unsupported endpoint scheme {:?}",
                other
            )))
        }
    }

    if uri.host().map_or(true, str::is_empty) {
        return Err(ServiceError::InvalidRequest(format!(
            "endpoint '{}' has no host",
            endpoint
        )));
    }

    Ok(candidate.trim_end_matches('/').to_string())
}

/// Map an SDK failure onto the service error taxonomy.
fn classify<E>(err: &SdkError<E, HttpResponse>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(err).to_string();

    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            return ServiceError::Unreachable(message)
        }
        SdkError::ConstructionFailure(_) => return ServiceError::InvalidRequest(message),
        _ => {}
    }

    let status = err.raw_response().map(|response| response.status().as_u16());

    match (err.code(), status) {
        (Some(code), _) if CREDENTIAL_ERROR_CODES.contains(&code) => {
            ServiceError::Unauthorized(message)
        }
        (Some("BucketAlreadyOwnedByYou"), _) => ServiceError::BucketAlreadyOwnedByYou(message),
        (Some("BucketAlreadyExists"), _) => ServiceError::BucketAlreadyExists(message),
        (Some("NoSuchBucket"), _) => ServiceError::NoSuchBucket(message),
        (Some("AccessDenied"), _) | (_, Some(403)) => ServiceError::AccessDenied(message),
        (_, Some(401)) => ServiceError::Unauthorized(message),
        (_, Some(400)) | (_, Some(411)) | (_, Some(413)) => ServiceError::InvalidRequest(message),
        _ => ServiceError::Backend(message),
    }
}

#[async_trait]
impl Connector for S3Connector {
    type Service = S3Service;

    async fn connect(&self, config: &ClientConfig) -> Result<S3Service, ServiceError> {
        Self::open(config, aws_config::defaults(BehaviorVersion::latest())).await
    }
}

impl S3Connector {
    async fn open(config: &ClientConfig, loader: ConfigLoader) -> Result<S3Service, ServiceError> {
        let endpoint = normalize_endpoint(config.endpoint())?;

        let credentials = Credentials::new(
            config.access_key_id(),
            config.access_key_secret().expose(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        // No retries at this layer.
        let sdk_config = loader
            .region(Region::new(config.region().to_string()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .endpoint_url(endpoint.clone())
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style())
            .build();

        tracing::debug!(
            endpoint = %endpoint,
            region = %config.region(),
            path_style = config.force_path_style(),
            "S3 client configured"
        );

        Ok(S3Service {
            client: Client::from_conf(s3_config),
            region: config.region().to_string(),
        })
    }
}

#[async_trait]
impl StorageService for S3Service {
    type Bucket = S3Bucket;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ServiceError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e.as_service_error().is_some_and(|se| se.is_not_found())
                    || e.raw_response()
                        .is_some_and(|response| response.status().as_u16() == 404);
                if not_found {
                    return Ok(false);
                }

                // HEAD responses have no body. A bare 403 covers both rejected
                // credentials and buckets of other accounts, so it stays
                // AccessDenied.
                match classify(&e) {
                    ServiceError::NoSuchBucket(_) => Ok(false),
                    other => Err(other),
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), ServiceError> {
        validate_bucket_name(bucket).map_err(ServiceError::InvalidRequest)?;

        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint.
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request.send().await.map_err(|e| {
            if let Some(se) = e.as_service_error() {
                if se.is_bucket_already_owned_by_you() {
                    return ServiceError::BucketAlreadyOwnedByYou(bucket.to_string());
                }
                if se.is_bucket_already_exists() {
                    return ServiceError::BucketAlreadyExists(bucket.to_string());
                }
            }
            classify(&e)
        })?;

        Ok(())
    }

    fn bucket(&self, bucket: &str) -> Result<S3Bucket, ServiceError> {
        validate_bucket_name(bucket).map_err(ServiceError::InvalidRequest)?;

        Ok(S3Bucket {
            client: self.client.clone(),
            name: bucket.to_string(),
        })
    }
}

fn canned_acl(acl: ObjectAcl) -> ObjectCannedAcl {
    match acl {
        ObjectAcl::Private => ObjectCannedAcl::Private,
    }
}

#[async_trait]
impl BucketHandle for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        acl: ObjectAcl,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let size = payload.len() as i64;

        self.client
            .put_object()
            .bucket(&self.name)
            .key(key)
            .acl(canned_acl(acl))
            .content_type(content_type)
            .content_length(size)
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(|e| classify(&e))?;

        Ok(())
    }

    async fn sign_url(
        &self,
        key: &str,
        method: Method,
        expires_in: Duration,
    ) -> Result<String, ServiceError> {
        if method != Method::GET {
            return Err(ServiceError::InvalidRequest(format!(
                "cannot presign {} requests",
                method
            )));
        }

        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.name)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| classify(&e))?;

        Ok(presigned_request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_types::body::SdkBody;

    const REPLAY_ENDPOINT: &str = "http://localhost:9000";

    fn s3_error(code: &str, message: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Error><Code>{}</Code><Message>{}</Message>\
             <BucketName>assets-test</BucketName><RequestId>4442587FB7D0A2F9</RequestId></Error>",
            code, message
        )
    }

    /// Session whose single request is answered with `status` and `body`.
    async fn replay_service(status: u16, body: String) -> S3Service {
        let http_client = StaticReplayClient::new(vec![ReplayEvent::new(
            http::Request::builder()
                .uri(format!("{}/assets-test", REPLAY_ENDPOINT))
                .body(SdkBody::empty())
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(body))
                .unwrap(),
        )]);

        let config = ClientConfig::new(
            REPLAY_ENDPOINT,
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI",
            "assets-test",
        );
        let loader = aws_config::defaults(BehaviorVersion::latest()).http_client(http_client);
        S3Connector::open(&config, loader).await.unwrap()
    }

    #[tokio::test]
    async fn test_head_bucket_found() {
        let service = replay_service(200, String::new()).await;
        assert_eq!(service.bucket_exists("assets-test").await, Ok(true));
    }

    #[tokio::test]
    async fn test_head_bucket_404_is_missing() {
        let service = replay_service(404, String::new()).await;
        assert_eq!(service.bucket_exists("assets-test").await, Ok(false));
    }

    #[tokio::test]
    async fn test_head_bucket_bare_403_is_access_denied() {
        let service = replay_service(403, String::new()).await;
        assert!(matches!(
            service.bucket_exists("assets-test").await,
            Err(ServiceError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_head_bucket_401_is_unauthorized() {
        let service = replay_service(401, String::new()).await;
        assert!(matches!(
            service.bucket_exists("assets-test").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_create_bucket_taken_by_other_account() {
        let body = s3_error(
            "BucketAlreadyExists",
            "The requested bucket name is not available.",
        );
        let service = replay_service(409, body).await;
        assert_eq!(
            service.create_bucket("assets-test").await,
            Err(ServiceError::BucketAlreadyExists("assets-test".to_string()))
        );
    }

    #[tokio::test]
    async fn test_create_bucket_already_owned() {
        let body = s3_error(
            "BucketAlreadyOwnedByYou",
            "Your previous request to create the named bucket succeeded.",
        );
        let service = replay_service(409, body).await;
        assert_eq!(
            service.create_bucket("assets-test").await,
            Err(ServiceError::BucketAlreadyOwnedByYou("assets-test".to_string()))
        );
    }

    #[tokio::test]
    async fn test_create_bucket_with_unknown_key_is_unauthorized() {
        let body = s3_error(
            "InvalidAccessKeyId",
            "The AWS Access Key Id you provided does not exist in our records.",
        );
        let service = replay_service(403, body).await;
        let err = service.create_bucket("assets-test").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert!(!err.to_string().contains("wJalrXUtnFEMI"));
    }

    #[tokio::test]
    async fn test_create_bucket_access_denied() {
        let service = replay_service(403, s3_error("AccessDenied", "Access Denied")).await;
        assert!(matches!(
            service.create_bucket("assets-test").await,
            Err(ServiceError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Nothing listens on port 1.
        let config = ClientConfig::new("http://127.0.0.1:1", "id", "secret", "assets-test");
        let service = S3Connector.connect(&config).await.unwrap();

        assert!(matches!(
            service.bucket_exists("assets-test").await,
            Err(ServiceError::Unreachable(_))
        ));
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("store.example.com").unwrap(),
            "https://store.example.com"
        );
        assert_eq!(
            normalize_endpoint("http://localhost:9000/").unwrap(),
            "http://localhost:9000"
        );
        assert!(matches!(
            normalize_endpoint("ftp://store.example.com"),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(normalize_endpoint("not a host").is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_endpoint() {
        let config = ClientConfig::new("exa mple", "id", "secret", "assets-test");
        let result = S3Connector.connect(&config).await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_presigned_url_is_offline_and_scoped() {
        let config = ClientConfig::new(
            "http://localhost:9000",
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI",
            "assets-test",
        );
        let service = S3Connector.connect(&config).await.unwrap();
        let bucket = service.bucket("assets-test").unwrap();

        let url = bucket
            .sign_url("report.pdf", Method::GET, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/assets-test/report.pdf?"));
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(!url.contains("wJalrXUtnFEMI"));
    }

    #[tokio::test]
    async fn test_presign_rejects_over_a_week() {
        let config = ClientConfig::new("http://localhost:9000", "id", "secret", "assets-test");
        let service = S3Connector.connect(&config).await.unwrap();
        let bucket = service.bucket("assets-test").unwrap();

        let result = bucket
            .sign_url(
                "report.pdf",
                Method::GET,
                Duration::from_secs(7 * 24 * 60 * 60 + 1),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));

        for method in [Method::HEAD, Method::DELETE] {
            let result = bucket
                .sign_url("report.pdf", method, Duration::from_secs(60))
                .await;
            assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
        }
    }

    #[test]
    fn test_bucket_handle_requires_valid_name() {
        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new(DEFAULT_REGION))
                .build(),
        );
        let service = S3Service {
            client,
            region: DEFAULT_REGION.to_string(),
        };

        assert!(matches!(
            service.bucket("Bad_Bucket"),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert_eq!(service.bucket("assets-test").unwrap().name(), "assets-test");
    }
}

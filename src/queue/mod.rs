use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::error::{ConfigError, CredentialError, RuntimeError, UpstreamError};
use crate::core::traits::{CredentialStore, MediaAdapter};
use crate::core::types::{
    AdapterContext, GenerationParams, JobHandle, JobStatus, JobSubmission, MediaResult,
    StatusSnapshot,
};
use crate::credentials::{CredentialResolver, DEFAULT_API_KEY_FIELD, DEFAULT_CREDENTIAL_NAME};
use crate::normalize::has_result_fields;
use crate::routing::derive_status_base_path;
use crate::transport::http::{AUTH_KEY_TOKEN_KEY, CUSTOM_HEADER_PREFIX, HttpTransport, RetryPolicy};

pub const DEFAULT_QUEUE_BASE_URL: &str = "https://queue.fal.run";
pub const DEFAULT_SYNC_BASE_URL: &str = "https://fal.run";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
const NOT_READY_STATUS_CODES: [u16; 2] = [404, 422];

/// Spacing and optional upper bound of the status poll loop.
///
/// `max_wait = None` polls until the job reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl PollPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidPollPolicy {
                reason: "interval must be > 0".to_string(),
            });
        }
        if self.max_wait.is_some_and(|max_wait| max_wait.is_zero()) {
            return Err(ConfigError::InvalidPollPolicy {
                reason: "max_wait must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_wait: None,
        }
    }
}

/// Client for the upstream queue and synchronous run endpoints.
///
/// Cheap to clone; holds no per-job state. Each call builds a fresh
/// [`JobExecutor`] so credentials are resolved once per invocation.
#[derive(Clone)]
pub struct QueueClient {
    transport: HttpTransport,
    queue_base_url: String,
    sync_base_url: String,
    poll_policy: PollPolicy,
    credential_store: Arc<dyn CredentialStore>,
    credential_name: String,
    api_key_field: String,
    headers: Vec<(String, String)>,
}

pub struct QueueClientBuilder {
    credential_store: Arc<dyn CredentialStore>,
    queue_base_url: String,
    sync_base_url: String,
    poll_policy: PollPolicy,
    default_timeout_ms: Option<u64>,
    retry_policy: RetryPolicy,
    credential_name: String,
    api_key_field: String,
    headers: Vec<(String, String)>,
}

impl QueueClient {
    pub fn builder(credential_store: Arc<dyn CredentialStore>) -> QueueClientBuilder {
        QueueClientBuilder {
            credential_store,
            queue_base_url: DEFAULT_QUEUE_BASE_URL.to_string(),
            sync_base_url: DEFAULT_SYNC_BASE_URL.to_string(),
            poll_policy: PollPolicy::default(),
            default_timeout_ms: None,
            retry_policy: RetryPolicy::default(),
            credential_name: DEFAULT_CREDENTIAL_NAME.to_string(),
            api_key_field: DEFAULT_API_KEY_FIELD.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }

    pub(crate) fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Creates an executor with its own, not yet resolved, credential cache.
    pub fn executor(&self) -> JobExecutor<'_> {
        JobExecutor {
            client: self,
            credentials: CredentialResolver::with_names(
                Arc::clone(&self.credential_store),
                self.credential_name.clone(),
                self.api_key_field.clone(),
            ),
        }
    }

    pub async fn execute_async(
        &self,
        adapter: &dyn MediaAdapter,
        params: &GenerationParams,
    ) -> Result<MediaResult, RuntimeError> {
        self.executor().execute_async(adapter, params).await
    }

    pub async fn execute_sync(
        &self,
        adapter: &dyn MediaAdapter,
        params: &GenerationParams,
    ) -> Result<MediaResult, RuntimeError> {
        self.executor().execute_sync(adapter, params).await
    }
}

impl QueueClientBuilder {
    pub fn with_credential_store(mut self, credential_store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = credential_store;
        self
    }

    pub fn with_queue_base_url(mut self, url: impl Into<String>) -> Self {
        self.queue_base_url = url.into();
        self
    }

    pub fn with_sync_base_url(mut self, url: impl Into<String>) -> Self {
        self.sync_base_url = url.into();
        self
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_credential_names(
        mut self,
        credential_name: impl Into<String>,
        api_key_field: impl Into<String>,
    ) -> Self {
        self.credential_name = credential_name.into();
        self.api_key_field = api_key_field.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<QueueClient, ConfigError> {
        self.poll_policy.validate()?;
        let transport = HttpTransport::new(self.default_timeout_ms, self.retry_policy)?;

        Ok(QueueClient {
            transport,
            queue_base_url: normalize_base_url(&self.queue_base_url)?,
            sync_base_url: normalize_base_url(&self.sync_base_url)?,
            poll_policy: self.poll_policy,
            credential_store: self.credential_store,
            credential_name: self.credential_name,
            api_key_field: self.api_key_field,
            headers: self.headers,
        })
    }
}

/// Runs submit/poll/fetch for one invocation.
pub struct JobExecutor<'a> {
    client: &'a QueueClient,
    credentials: CredentialResolver,
}

struct JobUrls {
    status: String,
    result: String,
}

impl JobUrls {
    fn new(queue_base_url: &str, status_base_path: &str, handle: &JobHandle) -> Self {
        let result = format!(
            "{queue_base_url}{status_base_path}/requests/{}",
            handle.request_id
        );
        Self {
            status: format!("{result}/status"),
            result,
        }
    }
}

enum PollOutcome {
    Ready(Value),
    Pending,
}

impl JobExecutor<'_> {
    pub async fn execute_async(
        &mut self,
        adapter: &dyn MediaAdapter,
        params: &GenerationParams,
    ) -> Result<MediaResult, RuntimeError> {
        let model = adapter.model_id().to_string();
        if !adapter.capabilities().supports_async {
            return Err(ConfigError::AsyncUnsupported { model }.into());
        }

        let ctx = self.request_context().await?;
        let submission = JobSubmission::post(adapter.endpoint(), adapter.build_payload(params)?);
        let handle = self.submit(&model, &submission, &ctx).await?;

        let status_base_path = derive_status_base_path(&submission.endpoint);
        let urls = JobUrls::new(&self.client.queue_base_url, &status_base_path, &handle);

        let raw = self.poll_until_complete(&model, &handle, &urls, &ctx).await?;
        let mut result = adapter.normalize(&raw)?;
        result.request_id = Some(handle.request_id);

        info!(model = %model, request_id = ?result.request_id, "generation job completed");
        Ok(result)
    }

    pub async fn execute_sync(
        &mut self,
        adapter: &dyn MediaAdapter,
        params: &GenerationParams,
    ) -> Result<MediaResult, RuntimeError> {
        let model = adapter.model_id().to_string();
        if !adapter.capabilities().supports_sync {
            return Err(ConfigError::SyncUnsupported { model }.into());
        }

        let ctx = self.request_context().await?;
        let payload = Value::Object(adapter.build_payload(params)?);
        let url = format!("{}{}", self.client.sync_base_url, adapter.endpoint());

        let raw = self
            .client
            .transport
            .post_json(Some(&model), &url, &payload, &ctx)
            .await?;

        Ok(adapter.normalize(&raw)?)
    }

    async fn request_context(&mut self) -> Result<AdapterContext, CredentialError> {
        let api_key = self.credentials.ensure_api_key().await?.to_string();

        let mut ctx = AdapterContext::default();
        ctx.metadata.insert(AUTH_KEY_TOKEN_KEY.to_string(), api_key);
        for (name, value) in &self.client.headers {
            ctx.metadata
                .insert(format!("{CUSTOM_HEADER_PREFIX}{name}"), value.clone());
        }
        Ok(ctx)
    }

    async fn submit(
        &self,
        model: &str,
        submission: &JobSubmission,
        ctx: &AdapterContext,
    ) -> Result<JobHandle, UpstreamError> {
        let url = format!("{}{}", self.client.queue_base_url, submission.endpoint);
        let body = Value::Object(submission.payload.clone());
        let response = self
            .client
            .transport
            .request(Some(model), submission.method.clone(), &url, Some(&body), None, ctx)
            .await?;

        let handle = JobHandle::from_submission_response(&response).ok_or_else(|| {
            UpstreamError::MissingRequestId {
                model: model.to_string(),
                endpoint: submission.endpoint.clone(),
            }
        })?;

        info!(model, request_id = %handle.request_id, "submitted generation job");
        Ok(handle)
    }

    async fn poll_until_complete(
        &self,
        model: &str,
        handle: &JobHandle,
        urls: &JobUrls,
        ctx: &AdapterContext,
    ) -> Result<Value, UpstreamError> {
        let policy = self.client.poll_policy;
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(model, request_id = %handle.request_id, attempt, "polling job status");

            match self.poll_once(model, handle, urls, ctx).await? {
                PollOutcome::Ready(raw) => return Ok(raw),
                PollOutcome::Pending => {
                    let waited = started.elapsed();
                    if let Some(max_wait) = policy.max_wait
                        && waited + policy.interval > max_wait
                    {
                        return Err(UpstreamError::PollTimeout {
                            model: model.to_string(),
                            request_id: handle.request_id.clone(),
                            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                        });
                    }

                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    async fn poll_once(
        &self,
        model: &str,
        handle: &JobHandle,
        urls: &JobUrls,
        ctx: &AdapterContext,
    ) -> Result<PollOutcome, UpstreamError> {
        let body = match self
            .client
            .transport
            .get_json(Some(model), &urls.status, ctx)
            .await
        {
            Ok(body) => body,
            Err(error) if error.has_status(&[STATUS_METHOD_NOT_ALLOWED]) => {
                warn!(
                    model,
                    request_id = %handle.request_id,
                    "status endpoint rejected request; probing result endpoint"
                );
                return self.probe_result(model, urls, ctx).await;
            }
            Err(error) => return Err(error),
        };

        let snapshot = StatusSnapshot::from_value(body);
        match snapshot.status {
            JobStatus::Completed => self
                .completed_result(model, handle, urls, snapshot, ctx)
                .await
                .map(PollOutcome::Ready),
            JobStatus::Failed => Err(UpstreamError::JobFailed {
                model: model.to_string(),
                request_id: handle.request_id.clone(),
                message: snapshot
                    .error
                    .unwrap_or_else(|| "generation job failed without an error message".to_string()),
            }),
            status => {
                debug!(model, request_id = %handle.request_id, ?status, "job still pending");
                Ok(PollOutcome::Pending)
            }
        }
    }

    /// Fetches the result endpoint directly for families without a status
    /// endpoint. Not-ready responses keep the job pending.
    async fn probe_result(
        &self,
        model: &str,
        urls: &JobUrls,
        ctx: &AdapterContext,
    ) -> Result<PollOutcome, UpstreamError> {
        match self
            .client
            .transport
            .get_json(Some(model), &urls.result, ctx)
            .await
        {
            Ok(raw) if has_result_fields(&raw) => Ok(PollOutcome::Ready(raw)),
            Ok(_) => Ok(PollOutcome::Pending),
            Err(error) if error.has_status(&NOT_READY_STATUS_CODES) => Ok(PollOutcome::Pending),
            Err(error) => Err(error),
        }
    }

    async fn completed_result(
        &self,
        model: &str,
        handle: &JobHandle,
        urls: &JobUrls,
        snapshot: StatusSnapshot,
        ctx: &AdapterContext,
    ) -> Result<Value, UpstreamError> {
        if has_result_fields(&snapshot.raw) {
            return Ok(snapshot.raw);
        }

        match self
            .client
            .transport
            .get_json(Some(model), &urls.result, ctx)
            .await
        {
            Ok(raw) => Ok(raw),
            Err(error) if error.has_status(&NOT_READY_STATUS_CODES) => {
                warn!(
                    model,
                    request_id = %handle.request_id,
                    status_code = ?error.status_code(),
                    "result endpoint unavailable; using status payload"
                );
                Ok(snapshot.raw)
            }
            Err(error) => Err(error),
        }
    }
}

fn normalize_base_url(base_url: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
        });
    }

    Ok(trimmed.to_string())
}

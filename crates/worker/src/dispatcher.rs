//! Single-job dispatch: validate, route, then run a helper or forward.
//!
//! [`Dispatcher::dispatch`] never fails and never panics outward. Every
//! outcome, including a panic inside the pipeline, becomes a
//! [`DispatchResult`]. Panic sites are logged by [`crate::panic::install_hook`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::Instrument;
use uuid::Uuid;

use sdrelay_a1111::api::A1111Api;
use sdrelay_a1111::readiness::{HttpProbe, ReadinessProber};
use sdrelay_a1111::retry::{FixedRetry, TransportRetry};
use sdrelay_core::catalog::Catalog;
use sdrelay_core::endpoints::Route;
use sdrelay_core::error::CoreError;
use sdrelay_core::job::{DispatchResult, Job};
use sdrelay_core::sampler::SamplerNormalizer;
use sdrelay_core::validation::{FieldType, FieldViolation, ValidationErrors, ViolationKind};
use sdrelay_helpers::download::Downloader;
use sdrelay_helpers::registry::ModelRegistry;
use sdrelay_helpers::HelperRouter;

use crate::config::WorkerConfig;
use crate::error::DispatchError;

/// Process-wide dispatch service. Cheap to clone; all clones share one
/// connection pool.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    api: A1111Api,
    prober: ReadinessProber,
    helpers: HelperRouter,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        api: A1111Api,
        prober: ReadinessProber,
        helpers: HelperRouter,
    ) -> Self {
        Self {
            catalog,
            api,
            prober,
            helpers,
        }
    }

    /// Wire every collaborator from configuration around one shared client.
    pub fn from_config(config: &WorkerConfig, client: reqwest::Client) -> Result<Self, CoreError> {
        let normalizer = SamplerNormalizer::new(&config.scheduler_keywords)?;
        let catalog = Arc::new(Catalog::builtin(normalizer)?);

        let api = A1111Api::with_client(client.clone(), &config.a1111_base_uri)
            .with_timeout(config.request_timeout)
            .with_transport_retry(TransportRetry {
                max_attempts: config.transport_retries,
                backoff_factor: config.transport_backoff,
            })
            .with_post_retry(FixedRetry {
                attempts: config.post_retries,
                delay: config.post_retry_delay,
            });

        let prober = ReadinessProber::new(Arc::new(HttpProbe::new(
            client.clone(),
            config.ready_url(),
        )))
        .with_interval(config.probe_interval)
        .with_log_every(config.probe_log_every);

        let helpers = HelperRouter::new(
            Downloader::new(client.clone()).with_chunk_bytes(config.download_chunk_bytes),
            ModelRegistry::new(client, &config.registry_url),
        );

        Ok(Self::new(catalog, api, prober, helpers))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Handle one inbound job document.
    pub async fn dispatch(&self, document: &Value) -> DispatchResult {
        let job_id = document
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!(
            "dispatch",
            job_id = %job_id,
            endpoint = tracing::field::Empty
        );

        let outcome = AssertUnwindSafe(self.run(document, job_id))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        span.in_scope(|| match outcome {
            Ok(Ok(output)) => DispatchResult::Output(output),
            Ok(Err(e)) => {
                match &e {
                    DispatchError::Core(_) => {
                        tracing::warn!(kind = e.kind(), error = %e, "Job rejected")
                    }
                    _ => tracing::error!(kind = e.kind(), error = %e, "Job failed"),
                }
                DispatchResult::error(e.to_string())
            }
            Err(payload) => {
                // The panic hook has already logged the site and backtrace.
                let message = crate::panic::message(payload.as_ref());
                tracing::error!(panic = %message, "Dispatch aborted by panic");
                DispatchResult::error(DispatchError::Unexpected(message).to_string())
            }
        })
    }

    async fn run(&self, document: &Value, job_id: String) -> Result<Value, DispatchError> {
        let job = self.parse_job(document, job_id)?;
        tracing::Span::current().record("endpoint", job.api.endpoint.as_str());
        self.execute(job).await
    }

    /// Validate the envelope and API descriptor into a [`Job`].
    pub fn parse_job(&self, document: &Value, job_id: String) -> Result<Job, DispatchError> {
        let input = match document.get("input") {
            Some(Value::Object(input)) => input,
            other => return Err(input_violation(other).into()),
        };

        let envelope = self.catalog.validate_envelope(input)?;
        let api = object_field(&envelope, "api")?;
        let payload = object_field(&envelope, "payload")?.clone();
        let api = self.catalog.validate_api(api)?;

        Ok(Job {
            id: Some(job_id),
            api,
            payload,
        })
    }

    /// Route a validated job and run it to completion.
    pub async fn execute(&self, job: Job) -> Result<Value, DispatchError> {
        let (entry, route) = self.catalog.resolve(&job.api)?;
        let payload = self.catalog.validate_payload(entry, &job.payload)?;

        match route {
            Route::Helper(kind) => {
                let outcome = self.helpers.run(kind, &payload).await;
                serde_json::to_value(outcome).map_err(|e| DispatchError::Unexpected(e.to_string()))
            }
            Route::Forward => {
                self.prober.wait_until_ready().await;
                let output = self
                    .api
                    .forward(job.api.method, &job.api.endpoint, &payload)
                    .await?;
                Ok(output)
            }
        }
    }
}

// ---- private helpers ----

fn input_violation(found: Option<&Value>) -> ValidationErrors {
    let kind = match found {
        None | Some(Value::Null) => ViolationKind::Missing,
        Some(_) => ViolationKind::WrongType {
            expected: FieldType::Object,
        },
    };
    ValidationErrors(vec![FieldViolation {
        field: "input".to_string(),
        kind,
        value: found.filter(|v| !v.is_null()).cloned(),
    }])
}

/// Fetch a field the envelope schema has already checked to be an object.
fn object_field<'a>(
    envelope: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Map<String, Value>, DispatchError> {
    envelope
        .get(field)
        .and_then(Value::as_object)
        .ok_or_else(|| DispatchError::Unexpected(format!("envelope field '{field}' is not an object")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let config = WorkerConfig::from_lookup(|_| None).unwrap();
        Dispatcher::from_config(&config, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn missing_input_is_a_validation_error() {
        let err = dispatcher()
            .parse_job(&json!({"id": "job-1"}), "job-1".into())
            .unwrap_err();
        assert_matches!(err, DispatchError::Core(CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation failed: input: is required");
    }

    #[test]
    fn non_object_input_is_a_type_error() {
        let err = dispatcher()
            .parse_job(&json!({"input": "txt2img"}), "j".into())
            .unwrap_err();
        assert_matches!(
            err,
            DispatchError::Core(CoreError::Validation(ref v))
                if matches!(v.violations()[0].kind, ViolationKind::WrongType { .. })
        );
    }

    #[test]
    fn parse_job_strips_leading_slash() {
        let job = dispatcher()
            .parse_job(
                &json!({"input": {"api": {"method": "GET", "endpoint": "/sdapi/v1/samplers"}, "payload": {}}}),
                "j".into(),
            )
            .unwrap();
        assert_eq!(job.api.endpoint, "sdapi/v1/samplers");
        assert_eq!(job.id.as_deref(), Some("j"));
    }

    #[test]
    fn bad_scheduler_keyword_fails_wiring() {
        let config = WorkerConfig::from_lookup(|key| {
            (key == "SCHEDULER_KEYWORDS").then(|| "karras,sgm uniform".to_string())
        })
        .unwrap();
        assert_matches!(
            Dispatcher::from_config(&config, reqwest::Client::new()),
            Err(CoreError::Config(_))
        );
    }
}

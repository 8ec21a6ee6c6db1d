//! Built-in schemas and the endpoint allow-list.
//!
//! [`Catalog`] is parsed once at startup from the JSON documents under
//! `schemas/` and shared read-only afterwards. It owns every validation
//! step the dispatcher runs before a request leaves the process.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::endpoints::{normalize_endpoint, route_for, ApiDescriptor, EndpointEntry, Method, Route};
use crate::error::CoreError;
use crate::sampler::SamplerNormalizer;
use crate::validation::{validate, Schema, ValidationErrors};

const ENVELOPE_SCHEMA: &str = include_str!("../schemas/envelope.json");
const API_SCHEMA: &str = include_str!("../schemas/api.json");
const ENDPOINTS: &str = include_str!("../schemas/endpoints.json");

const PAYLOAD_SCHEMAS: &[&str] = &[
    include_str!("../schemas/txt2img.json"),
    include_str!("../schemas/img2img.json"),
    include_str!("../schemas/interrogate.json"),
    include_str!("../schemas/download.json"),
    include_str!("../schemas/sync.json"),
];

/// Schemas, allow-list, and sampler normalizer.
#[derive(Debug, Clone)]
pub struct Catalog {
    envelope: Schema,
    api: Schema,
    payloads: HashMap<String, Schema>,
    endpoints: Vec<EndpointEntry>,
    normalizer: SamplerNormalizer,
}

impl Catalog {
    /// Load the compiled-in schemas and allow-list.
    pub fn builtin(normalizer: SamplerNormalizer) -> Result<Self, CoreError> {
        let envelope = parse_schema(ENVELOPE_SCHEMA)?;
        let api = parse_schema(API_SCHEMA)?;

        let mut payloads = HashMap::new();
        for raw in PAYLOAD_SCHEMAS {
            let schema = parse_schema(raw)?;
            payloads.insert(schema.name.clone(), schema);
        }

        let endpoints: Vec<EndpointEntry> = serde_json::from_str(ENDPOINTS)
            .map_err(|e| CoreError::Config(format!("endpoint allow-list: {e}")))?;

        Self::new(envelope, api, payloads, endpoints, normalizer)
    }

    /// Assemble a catalog, checking that every allow-list entry names a
    /// known schema and that every helper path maps to a helper.
    pub fn new(
        envelope: Schema,
        api: Schema,
        payloads: HashMap<String, Schema>,
        endpoints: Vec<EndpointEntry>,
        normalizer: SamplerNormalizer,
    ) -> Result<Self, CoreError> {
        for entry in &endpoints {
            if let Some(name) = &entry.schema {
                if !payloads.contains_key(name) {
                    return Err(CoreError::Config(format!(
                        "endpoint {} {} references unknown schema '{name}'",
                        entry.method, entry.path
                    )));
                }
            }
            route_for(entry.method, &entry.path)
                .map_err(|e| CoreError::Config(format!("allow-list entry rejected: {e}")))?;
        }

        Ok(Self {
            envelope,
            api,
            payloads,
            endpoints,
            normalizer,
        })
    }

    pub fn endpoints(&self) -> &[EndpointEntry] {
        &self.endpoints
    }

    pub fn normalizer(&self) -> &SamplerNormalizer {
        &self.normalizer
    }

    /// Check the job envelope for `api` and `payload`.
    pub fn validate_envelope(
        &self,
        input: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        validate(&self.envelope, input)
    }

    /// Validate the API descriptor and strip the endpoint's leading `/`.
    ///
    /// A descriptor the `api` schema accepts but that still does not name a
    /// supported method and a string endpoint means the schema data is wrong,
    /// and is reported as [`CoreError::Config`].
    pub fn validate_api(&self, api: &Map<String, Value>) -> Result<ApiDescriptor, CoreError> {
        let normalized = validate(&self.api, api)?;

        let method = normalized
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Config("api schema admitted a non-string method".into()))?
            .parse::<Method>()
            .map_err(|e| CoreError::Config(format!("api schema admitted an unsupported method: {e}")))?;
        let endpoint = normalized
            .get("endpoint")
            .and_then(Value::as_str)
            .map(normalize_endpoint)
            .ok_or_else(|| CoreError::Config("api schema admitted a non-string endpoint".into()))?
            .to_string();

        Ok(ApiDescriptor { method, endpoint })
    }

    /// Look an API descriptor up in the allow-list and route it.
    pub fn resolve(&self, api: &ApiDescriptor) -> Result<(&EndpointEntry, Route), CoreError> {
        let entry = self
            .endpoints
            .iter()
            .find(|e| e.method == api.method && e.path == api.endpoint)
            .ok_or_else(|| CoreError::UnknownEndpoint {
                method: api.method.to_string(),
                endpoint: api.endpoint.clone(),
            })?;
        let route = route_for(entry.method, &entry.path)?;
        Ok((entry, route))
    }

    /// Validate a payload against the endpoint's schema, if it has one, and
    /// derive the scheduler from the sampler name where the schema asks.
    pub fn validate_payload(
        &self,
        entry: &EndpointEntry,
        payload: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        let Some(schema) = entry.schema.as_ref().and_then(|name| self.payloads.get(name)) else {
            return Ok(payload.clone());
        };

        let mut normalized = validate(schema, payload)?;
        if let Some(field) = &schema.sampler_field {
            self.normalizer.apply(&mut normalized, field);
        }
        Ok(normalized)
    }
}

fn parse_schema(raw: &str) -> Result<Schema, CoreError> {
    serde_json::from_str(raw).map_err(|e| CoreError::Config(format!("schema document: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::HelperKind;
    use crate::validation::ViolationKind;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::builtin(SamplerNormalizer::default()).unwrap()
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn api_violations(c: &Catalog, api: Value) -> ValidationErrors {
        match c.validate_api(&obj(api)) {
            Err(CoreError::Validation(v)) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn entry<'a>(c: &'a Catalog, method: Method, path: &str) -> &'a EndpointEntry {
        let api = ApiDescriptor {
            method,
            endpoint: path.to_string(),
        };
        c.resolve(&api).unwrap().0
    }

    #[test]
    fn builtin_catalog_loads() {
        let c = catalog();
        assert!(c.endpoints().len() > 5);
        assert_eq!(c.normalizer().keywords().len(), 4);
    }

    #[test]
    fn envelope_requires_api_and_payload() {
        let err = catalog().validate_envelope(&obj(json!({}))).unwrap_err();
        let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, ["api", "payload"]);
    }

    #[test]
    fn envelope_rejects_non_object_api() {
        let err = catalog()
            .validate_envelope(&obj(json!({"api": "txt2img", "payload": {}})))
            .unwrap_err();
        assert_matches!(err.violations()[0].kind, ViolationKind::WrongType { .. });
    }

    #[test]
    fn api_missing_endpoint_rejected() {
        let err = api_violations(&catalog(), json!({"method": "POST"}));
        assert_eq!(err.violations()[0].field, "endpoint");
        assert_matches!(err.violations()[0].kind, ViolationKind::Missing);
    }

    #[test]
    fn api_rejects_unknown_method() {
        let err = api_violations(&catalog(), json!({"method": "DELETE", "endpoint": "x"}));
        assert_matches!(err.violations()[0].kind, ViolationKind::NotAllowed { .. });
    }

    #[test]
    fn api_strips_leading_slash() {
        let api = catalog()
            .validate_api(&obj(json!({"method": "POST", "endpoint": "/sdapi/v1/txt2img"})))
            .unwrap();
        assert_eq!(api.method, Method::Post);
        assert_eq!(api.endpoint, "sdapi/v1/txt2img");
    }

    #[test]
    fn api_schema_is_closed() {
        let err = api_violations(&catalog(), json!({"method": "GET", "endpoint": "x", "verb": "GET"}));
        assert_matches!(err.violations()[0].kind, ViolationKind::UnknownField);
    }

    /// A method the schema lets through but the router cannot parse must
    /// not fall back to some other method.
    #[test]
    fn api_schema_admitting_unknown_method_is_config_error() {
        let c = catalog();
        let api: Schema = serde_json::from_value(json!({
            "name": "api",
            "closed": true,
            "fields": [
                {"name": "method", "type": "string", "required": true,
                 "allowed": ["GET", "POST", "PUT"]},
                {"name": "endpoint", "type": "string", "required": true}
            ]
        }))
        .unwrap();
        let c = Catalog::new(
            c.envelope.clone(),
            api,
            c.payloads.clone(),
            c.endpoints.clone(),
            SamplerNormalizer::default(),
        )
        .unwrap();

        let result = c.validate_api(&obj(json!({"method": "PUT", "endpoint": "sdapi/v1/options"})));
        assert_matches!(result, Err(CoreError::Config(ref msg)) if msg.contains("PUT"));
    }

    #[test]
    fn resolve_rejects_unlisted_endpoint() {
        let api = ApiDescriptor {
            method: Method::Post,
            endpoint: "invalid/endpoint".to_string(),
        };
        assert_matches!(catalog().resolve(&api), Err(CoreError::UnknownEndpoint { .. }));
    }

    #[test]
    fn resolve_checks_method_too() {
        let api = ApiDescriptor {
            method: Method::Get,
            endpoint: "sdapi/v1/txt2img".to_string(),
        };
        assert_matches!(catalog().resolve(&api), Err(CoreError::UnknownEndpoint { .. }));
    }

    #[test]
    fn resolve_routes_helpers() {
        let c = catalog();
        let api = ApiDescriptor {
            method: Method::Post,
            endpoint: "v1/sync".to_string(),
        };
        let (_, route) = c.resolve(&api).unwrap();
        assert_eq!(route, Route::Helper(HelperKind::Sync));
    }

    #[test]
    fn txt2img_fills_defaults_and_derives_scheduler() {
        let c = catalog();
        let e = entry(&c, Method::Post, "sdapi/v1/txt2img");
        let out = c
            .validate_payload(
                e,
                &obj(json!({"prompt": "a beautiful landscape", "sampler_name": "DPM++ 2M Karras"})),
            )
            .unwrap();
        assert_eq!(out["steps"], 20);
        assert_eq!(out["width"], 512);
        assert_eq!(out["scheduler"], "karras");
        assert_eq!(out["sampler_name"], "DPM++ 2M");
    }

    #[test]
    fn txt2img_explicit_scheduler_wins() {
        let c = catalog();
        let e = entry(&c, Method::Post, "sdapi/v1/txt2img");
        let out = c
            .validate_payload(
                e,
                &obj(json!({"sampler_name": "DPM++ 2M Karras", "scheduler": "automatic"})),
            )
            .unwrap();
        assert_eq!(out["scheduler"], "automatic");
    }

    #[test]
    fn txt2img_range_violation() {
        let c = catalog();
        let e = entry(&c, Method::Post, "sdapi/v1/txt2img");
        let err = c.validate_payload(e, &obj(json!({"steps": 500}))).unwrap_err();
        assert_matches!(err.violations()[0].kind, ViolationKind::AboveMaximum { .. });
    }

    #[test]
    fn img2img_requires_init_images() {
        let c = catalog();
        let e = entry(&c, Method::Post, "sdapi/v1/img2img");
        let err = c.validate_payload(e, &obj(json!({"prompt": "x"}))).unwrap_err();
        assert_eq!(err.violations()[0].field, "init_images");
    }

    #[test]
    fn interrogate_defaults_model() {
        let c = catalog();
        let e = entry(&c, Method::Post, "sdapi/v1/interrogate");
        let out = c.validate_payload(e, &obj(json!({"image": "aGVsbG8="}))).unwrap();
        assert_eq!(out["model"], "clip");
    }

    #[test]
    fn schemaless_endpoint_passes_payload_through() {
        let c = catalog();
        let e = entry(&c, Method::Post, "sdapi/v1/options");
        let payload = obj(json!({"sd_model_checkpoint": "v1-5-pruned.safetensors"}));
        assert_eq!(c.validate_payload(e, &payload).unwrap(), payload);
    }

    #[test]
    fn unknown_schema_reference_rejected() {
        let c = catalog();
        let endpoints = vec![EndpointEntry {
            method: Method::Post,
            path: "sdapi/v1/extra".to_string(),
            schema: Some("missing".to_string()),
        }];
        let result = Catalog::new(
            c.envelope.clone(),
            c.api.clone(),
            c.payloads.clone(),
            endpoints,
            SamplerNormalizer::default(),
        );
        assert_matches!(result, Err(CoreError::Config(_)));
    }
}

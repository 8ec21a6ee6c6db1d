//! Sampler-name normalization.
//!
//! Older clients encode the scheduler as the trailing word of the sampler
//! name (`"DPM++ 2M Karras"`). The backing service now takes the two as
//! separate fields, so the trailing keyword is split off into `scheduler`.

use serde_json::{Map, Value};

use crate::error::CoreError;

/// Field the derived scheduler is written to.
pub const SCHEDULER_FIELD: &str = "scheduler";

/// Scheduler keywords recognised when no configuration overrides them.
pub const DEFAULT_SCHEDULER_KEYWORDS: &[&str] =
    &["karras", "exponential", "uniform", "polyexponential"];

/// A sampler name split into its scheduler suffix and base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerSpec {
    /// Lowercased scheduler keyword, empty when none was recognised.
    pub scheduler: String,
    pub base_sampler_name: String,
}

/// Splits sampler names using a configurable set of scheduler keywords.
#[derive(Debug, Clone)]
pub struct SamplerNormalizer {
    keywords: Vec<String>,
}

impl SamplerNormalizer {
    /// Build a normalizer from keywords. Keywords are lowercased; blank ones
    /// are dropped. Keywords containing whitespace can never match a single
    /// trailing token and are rejected.
    pub fn new<I, S>(keywords: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for kw in keywords {
            let kw = kw.as_ref().trim();
            if kw.is_empty() {
                continue;
            }
            if kw.chars().any(char::is_whitespace) {
                return Err(CoreError::Config(format!(
                    "scheduler keyword '{kw}' must be a single word"
                )));
            }
            out.push(kw.to_lowercase());
        }
        Ok(Self { keywords: out })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Split `raw` into scheduler and base sampler name.
    pub fn split(&self, raw: &str) -> SamplerSpec {
        let tokens: Vec<&str> = raw.split_whitespace().collect();

        if let Some((last, rest)) = tokens.split_last() {
            let last = last.to_lowercase();
            if self.keywords.iter().any(|kw| *kw == last) {
                return SamplerSpec {
                    scheduler: last,
                    base_sampler_name: rest.join(" "),
                };
            }
        }

        SamplerSpec {
            scheduler: String::new(),
            base_sampler_name: raw.to_string(),
        }
    }

    /// Derive `scheduler` from `sampler_field` in a validated payload.
    ///
    /// A caller-supplied `scheduler` key is left alone, as is the sampler
    /// name in that case. Returns whether the payload was changed.
    pub fn apply(&self, payload: &mut Map<String, Value>, sampler_field: &str) -> bool {
        if payload.contains_key(SCHEDULER_FIELD) {
            return false;
        }
        let Some(raw) = payload.get(sampler_field).and_then(Value::as_str) else {
            return false;
        };

        let parts = self.split(raw);
        if parts.scheduler.is_empty() {
            return false;
        }

        payload.insert(
            sampler_field.to_string(),
            Value::String(parts.base_sampler_name),
        );
        payload.insert(SCHEDULER_FIELD.to_string(), Value::String(parts.scheduler));
        true
    }
}

impl Default for SamplerNormalizer {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_SCHEDULER_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn split(raw: &str) -> (String, String) {
        let parts = SamplerNormalizer::default().split(raw);
        (parts.scheduler, parts.base_sampler_name)
    }

    #[test]
    fn trailing_keyword_is_split_off() {
        assert_eq!(split("DPM++ 2M Karras"), ("karras".into(), "DPM++ 2M".into()));
        assert_eq!(
            split("DPM++ SDE Exponential"),
            ("exponential".into(), "DPM++ SDE".into())
        );
        assert_eq!(split("DPM2 a uniform"), ("uniform".into(), "DPM2 a".into()));
    }

    #[test]
    fn no_keyword_leaves_name_unchanged() {
        assert_eq!(split("Euler a"), (String::new(), "Euler a".into()));
        assert_eq!(split("LMS"), (String::new(), "LMS".into()));
        assert_eq!(split("  Euler   a "), (String::new(), "  Euler   a ".into()));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert_eq!(split("DPM++ 2M KARRAS"), ("karras".into(), "DPM++ 2M".into()));
    }

    #[test]
    fn keyword_must_be_whole_trailing_word() {
        assert_eq!(split("Karras DPM"), (String::new(), "Karras DPM".into()));
        assert_eq!(split("DPM++ 2MKarras"), (String::new(), "DPM++ 2MKarras".into()));
    }

    #[test]
    fn keyword_alone_yields_empty_base() {
        assert_eq!(split("Karras"), ("karras".into(), String::new()));
    }

    #[test]
    fn whitespace_collapses_in_rebuilt_base() {
        assert_eq!(
            split("  DPM++   2M \t Karras  "),
            ("karras".into(), "DPM++ 2M".into())
        );
    }

    #[test]
    fn empty_input_is_unchanged() {
        assert_eq!(split(""), (String::new(), String::new()));
    }

    #[test]
    fn keywords_are_configurable() {
        let n = SamplerNormalizer::new(["Beta", " ", "simple"]).unwrap();
        assert_eq!(n.keywords(), ["beta", "simple"]);
        assert_eq!(n.split("Euler Beta").scheduler, "beta");
        assert_eq!(n.split("DPM++ 2M Karras").scheduler, "");
    }

    #[test]
    fn multi_word_keyword_rejected() {
        assert!(SamplerNormalizer::new(["sgm uniform"]).is_err());
    }

    #[test]
    fn apply_injects_scheduler_and_rewrites_sampler() {
        let mut payload = json!({"sampler_name": "DPM++ 2M Karras"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(SamplerNormalizer::default().apply(&mut payload, "sampler_name"));
        assert_eq!(payload["scheduler"], "karras");
        assert_eq!(payload["sampler_name"], "DPM++ 2M");
    }

    #[test]
    fn apply_never_overrides_explicit_scheduler() {
        let mut payload = json!({"sampler_name": "DPM++ 2M Karras", "scheduler": "automatic"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(!SamplerNormalizer::default().apply(&mut payload, "sampler_name"));
        assert_eq!(payload["scheduler"], "automatic");
        assert_eq!(payload["sampler_name"], "DPM++ 2M Karras");
    }

    #[test]
    fn apply_without_keyword_adds_nothing() {
        let mut payload = json!({"sampler_name": "Euler a"}).as_object().cloned().unwrap();
        assert!(!SamplerNormalizer::default().apply(&mut payload, "sampler_name"));
        assert!(!payload.contains_key("scheduler"));
    }
}

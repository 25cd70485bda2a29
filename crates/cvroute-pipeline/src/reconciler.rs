//! Attribute reconciler: fills the province, derives two independent
//! language estimates and reconciles them into one final value.
//!
//! Sub-call failures never escape. A failed call degrades to the failure
//! sentinel (province, estimates) and is logged at WARN; a failed estimate
//! is treated as absent when reconciling.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use cvroute_core::defaults::FAILURE_SENTINEL;
use cvroute_core::fields;
use cvroute_core::{
    canonical_province, is_placeholder, is_usable_province, Assessment, CandidateRecord,
    DerivedAttributes, GenerationBackend, Language, LanguageSignal,
};

use crate::prompts;

/// A record after reconciliation, with its derived columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledRecord {
    pub record: CandidateRecord,
    pub derived: DerivedAttributes,
}

/// Derives province and native-language attributes through inference calls.
pub struct AttributeReconciler {
    backend: Arc<dyn GenerationBackend>,
}

impl AttributeReconciler {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Annotate a record. Never fails.
    #[instrument(skip(self, record), fields(subsystem = "pipeline", component = "reconciler", op = "reconcile"))]
    pub async fn reconcile(&self, record: CandidateRecord) -> ReconciledRecord {
        let province = self.resolve_province(&record).await;
        let record = record.with(fields::PROVINCE, province.clone());

        let name = record.get(fields::NAME).map(str::to_string);
        let name_language = match name.as_deref() {
            Some(n) => self.estimate(prompts::NAME_LANGUAGE_SYSTEM, &prompts::name_language_prompt(n), "name").await,
            None => LanguageSignal::Unknown,
        };

        let province_language = if is_usable_province(province.as_deref()) {
            let p = province.as_deref().unwrap_or_default();
            self.estimate(
                prompts::PROVINCE_LANGUAGE_SYSTEM,
                &prompts::province_language_prompt(p),
                "province",
            )
            .await
        } else {
            LanguageSignal::Unknown
        };

        let (native_language, assessment) = match (name_language.present(), province_language.present()) {
            (Some(a), Some(b)) if a == b => (LanguageSignal::Known(a), Assessment::Aligned(a)),
            (Some(a), Some(b)) => {
                let result = self
                    .arbitrate(name.as_deref(), province.as_deref(), a, b)
                    .await;
                (
                    result,
                    Assessment::Arbitrated {
                        name: a,
                        province: b,
                        result,
                    },
                )
            }
            (Some(a), None) => (LanguageSignal::Known(a), Assessment::NameOnly(a)),
            (None, Some(b)) => (LanguageSignal::Known(b), Assessment::ProvinceOnly(b)),
            (None, None) => (LanguageSignal::Unknown, Assessment::Insufficient),
        };

        debug!(
            name_language = %name_language,
            province_language = %province_language,
            native_language = %native_language,
            "Language reconciled"
        );

        ReconciledRecord {
            record,
            derived: DerivedAttributes {
                province,
                name_language,
                province_language,
                native_language,
                assessment,
            },
        }
    }

    /// Step 1: the extracted province (normalised), or one derived from the
    /// narrowest available locality field.
    async fn resolve_province(&self, record: &CandidateRecord) -> Option<String> {
        if let Some(existing) = record.get(fields::PROVINCE) {
            return Some(normalise_province(existing));
        }

        let location = fields::LOCALITY_PREFERENCE
            .iter()
            .find_map(|key| record.get(key))?;

        match self
            .backend
            .generate_with_system(prompts::PROVINCE_SYSTEM, &prompts::province_prompt(location))
            .await
        {
            Ok(answer) => {
                let cleaned = answer.trim().trim_matches(|c: char| c == '"' || c == '.');
                if is_placeholder(cleaned) {
                    debug!(location, "Province could not be derived from location");
                    None
                } else {
                    Some(normalise_province(cleaned))
                }
            }
            Err(e) => {
                warn!(signal = "province", error = %e, "Province derivation failed, storing failure sentinel");
                Some(FAILURE_SENTINEL.to_string())
            }
        }
    }

    /// Steps 2 and 3: one constrained language estimate.
    async fn estimate(&self, system: &str, prompt: &str, signal: &str) -> LanguageSignal {
        match self.backend.generate_with_system(system, prompt).await {
            Ok(answer) => {
                let parsed = LanguageSignal::from_response(&answer);
                if parsed.is_failed() {
                    warn!(signal, answer = %answer.trim(), "Language estimate named no recognised language");
                }
                parsed
            }
            Err(e) => {
                warn!(signal, error = %e, "Language estimate failed");
                LanguageSignal::Failed
            }
        }
    }

    /// Step 4 on disagreement: exactly one tie-break call.
    async fn arbitrate(
        &self,
        name: Option<&str>,
        province: Option<&str>,
        name_estimate: Language,
        province_estimate: Language,
    ) -> LanguageSignal {
        let prompt = prompts::arbitration_prompt(name, province, name_estimate, province_estimate);
        match self
            .backend
            .generate_with_system(prompts::ARBITRATION_SYSTEM, &prompt)
            .await
        {
            Ok(answer) => match LanguageSignal::from_response(&answer) {
                LanguageSignal::Known(l) => LanguageSignal::Known(l),
                _ => {
                    warn!(signal = "arbitration", answer = %answer.trim(), "Arbitration named no recognised language");
                    LanguageSignal::Failed
                }
            },
            Err(e) => {
                warn!(signal = "arbitration", error = %e, "Arbitration failed");
                LanguageSignal::Failed
            }
        }
    }
}

/// Canonical province name when recognisable, otherwise the text as given.
fn normalise_province(text: &str) -> String {
    canonical_province(text)
        .map(str::to_string)
        .unwrap_or_else(|| text.trim().to_string())
}

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, warn};

use super::extractors::{default_extractors, NameFilter};
use super::{
    normalize, CompletenessGate, ExtractionContext, ExtractionResult, FieldExtractionProvider,
    FieldExtractor, FieldMap, FieldValue, Normalized,
};
use crate::config::SalonConfig;
use crate::models::{BookingRecord, Field, Role, Session, Turn};
use crate::services::memory::ConversationMemory;

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(8);

/// Folds a conversation window into a [`BookingRecord`].
pub struct ExtractionOrchestrator {
    extractors: Vec<Box<dyn FieldExtractor>>,
    gate: CompletenessGate,
    names: NameFilter,
    window: usize,
    llm_timeout: Duration,
}

impl ExtractionOrchestrator {
    pub fn new(salon: &SalonConfig) -> anyhow::Result<Self> {
        Ok(Self {
            extractors: default_extractors(salon)?,
            gate: CompletenessGate::from_salon(salon),
            names: NameFilter::new(salon),
            window: salon.context_window.max(1),
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        })
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    /// Adds a strategy after the built-in ones. For a given field the first
    /// registered strategy that matches wins.
    pub fn register(&mut self, extractor: Box<dyn FieldExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn gate(&self) -> &CompletenessGate {
        &self.gate
    }

    pub fn window_size(&self) -> usize {
        self.window
    }

    /// Runs every strategy over one utterance.
    pub fn extract(&self, text: &Normalized, ctx: &ExtractionContext<'_>) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        for extractor in &self.extractors {
            if result.get(extractor.field()).is_some() {
                continue;
            }
            if let Some(value) = extractor.extract(text, ctx) {
                debug!(extractor = extractor.name(), field = %value.field(), "field candidate");
                result.insert(value);
            }
        }
        result
    }

    /// Heuristic pass over the last N turns. User turns are replayed oldest
    /// to newest so a later correction overwrites an earlier value; fields
    /// without a candidate keep what `current` had.
    pub fn accumulate_window(&self, current: &BookingRecord, turns: &[Turn]) -> BookingRecord {
        let start = turns.len().saturating_sub(self.window);
        let mut record = current.clone();
        let mut previous_assistant: Option<&str> = None;

        for turn in &turns[start..] {
            match turn.role {
                Role::Assistant => previous_assistant = Some(turn.text.as_str()),
                Role::User => {
                    let ctx = ExtractionContext {
                        previous_assistant,
                        name_known: record.customer_name.is_some(),
                    };
                    let result = self.extract(&normalize(&turn.text), &ctx);
                    let changed = result.merge_into(&mut record);
                    if !changed.is_empty() {
                        debug!(fields = ?changed, "record updated from turn");
                    }
                    previous_assistant = None;
                }
            }
        }
        record
    }

    /// Heuristic pass, then an optional language-model pass that may only
    /// fill fields still unset. The model call is bounded by a timeout and
    /// its failure leaves the heuristic record untouched.
    pub async fn accumulate(
        &self,
        current: &BookingRecord,
        turns: &[Turn],
        llm: Option<&dyn FieldExtractionProvider>,
    ) -> BookingRecord {
        let mut record = self.accumulate_window(current, turns);
        let Some(llm) = llm else {
            return record;
        };

        let wanted: BTreeSet<Field> = self
            .gate
            .missing_fields(&record)
            .into_iter()
            .filter(|f| !record.is_set(*f))
            .collect();
        if wanted.is_empty() {
            return record;
        }

        let start = turns.len().saturating_sub(self.window);
        let text = turns[start..]
            .iter()
            .filter(|t| t.is_user())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return record;
        }

        match tokio::time::timeout(self.llm_timeout, llm.extract_fields(&text, &record)).await {
            Ok(map) => {
                let filled = self.validate(map, &wanted).fill_gaps(&mut record);
                if !filled.is_empty() {
                    debug!(fields = ?filled, "record gaps filled by language model");
                }
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.llm_timeout.as_millis() as u64,
                    "LLM field extraction timed out, keeping heuristic fields"
                );
            }
        }
        record
    }

    /// Reads the session's window from memory and accumulates it. A booked
    /// session is frozen: its record comes back unchanged.
    pub async fn accumulate_session(
        &self,
        memory: &dyn ConversationMemory,
        session: &Session,
        llm: Option<&dyn FieldExtractionProvider>,
    ) -> anyhow::Result<BookingRecord> {
        if session.is_booked() {
            return Ok(session.record.clone());
        }
        let turns = memory.recent_turns(&session.id, self.window)?;
        Ok(self.accumulate(&session.record, &turns, llm).await)
    }

    /// Model output goes through the same strategies as user text, so only
    /// values they would accept themselves reach the record.
    fn validate(&self, map: FieldMap, wanted: &BTreeSet<Field>) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        let ctx = ExtractionContext::default();
        for (field, raw) in map {
            if !wanted.contains(&field) || raw.trim().is_empty() {
                continue;
            }
            let text = normalize(&raw);
            let value = self
                .extractors
                .iter()
                .filter(|e| e.field() == field)
                .find_map(|e| e.extract(&text, &ctx))
                .or_else(|| match field {
                    Field::CustomerName => self.names.clean(&text.text).map(FieldValue::CustomerName),
                    _ => None,
                });
            match value {
                Some(value) => result.insert(value),
                None => debug!(field = %field, raw = %raw, "discarding unusable model value"),
            }
        }
        result
    }
}

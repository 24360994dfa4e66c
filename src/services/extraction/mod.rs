//! Incremental extraction of booking details from a conversation.
//!
//! Each user turn is normalized, run through an ordered list of
//! [`FieldExtractor`] strategies, and the candidates are merged into the
//! session's [`BookingRecord`] with a per-field last-write-wins rule. The
//! [`CompletenessGate`] then decides whether the record can be booked.

pub mod email;
pub mod extractors;
pub mod gate;
pub mod normalize;
pub mod orchestrator;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveTime;

use crate::models::{BookingRecord, DateToken, Field};

pub use gate::CompletenessGate;
pub use normalize::{normalize, Normalized};
pub use orchestrator::ExtractionOrchestrator;

/// A candidate value for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    CustomerName(String),
    Service(String),
    Stylist(String),
    Date(DateToken),
    Time(NaiveTime),
    Email(String),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::CustomerName(_) => Field::CustomerName,
            FieldValue::Service(_) => Field::Service,
            FieldValue::Stylist(_) => Field::Stylist,
            FieldValue::Date(_) => Field::Date,
            FieldValue::Time(_) => Field::Time,
            FieldValue::Email(_) => Field::Email,
        }
    }

    /// Writes the value into its slot of `record`. Returns whether the
    /// record changed.
    pub fn apply_to(self, record: &mut BookingRecord) -> bool {
        match self {
            FieldValue::CustomerName(v) => replace(&mut record.customer_name, v),
            FieldValue::Service(v) => replace(&mut record.service, v),
            FieldValue::Stylist(v) => replace(&mut record.stylist, v),
            FieldValue::Date(v) => replace(&mut record.date, v),
            FieldValue::Time(v) => replace(&mut record.time, v),
            FieldValue::Email(v) => replace(&mut record.email, v),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

/// The fields found in one pass over one utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    values: BTreeMap<Field, FieldValue>,
}

impl ExtractionResult {
    pub fn insert(&mut self, value: FieldValue) {
        self.values.insert(value.field(), value);
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.values.keys().copied()
    }

    /// Every candidate overwrites the record; fields without a candidate
    /// keep their current value. Returns the fields that changed.
    pub fn merge_into(self, record: &mut BookingRecord) -> Vec<Field> {
        let mut changed = Vec::new();
        for (field, value) in self.values {
            if value.apply_to(record) {
                changed.push(field);
            }
        }
        changed
    }

    /// Only fills fields the record does not have yet.
    pub fn fill_gaps(self, record: &mut BookingRecord) -> Vec<Field> {
        let mut filled = Vec::new();
        for (field, value) in self.values {
            if !record.is_set(field) && value.apply_to(record) {
                filled.push(field);
            }
        }
        filled
    }
}

/// What the extractors may look at besides the utterance itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionContext<'a> {
    /// The assistant turn the user is answering, if any.
    pub previous_assistant: Option<&'a str>,
    /// The record already carries a customer name.
    pub name_known: bool,
}

/// One named extraction strategy. Absence of a match is `None`, never an error.
pub trait FieldExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn field(&self) -> Field;

    fn extract(&self, text: &Normalized, ctx: &ExtractionContext<'_>) -> Option<FieldValue>;
}

/// Raw field values as returned by a secondary extractor.
pub type FieldMap = HashMap<Field, String>;

/// Secondary extraction pass (typically a language model). Implementations
/// fail closed: any error yields an empty map.
#[async_trait]
pub trait FieldExtractionProvider: Send + Sync {
    async fn extract_fields(&self, text: &str, known: &BookingRecord) -> FieldMap;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites_only_present_fields() {
        let mut record = BookingRecord {
            service: Some("Haircut".to_string()),
            stylist: Some("Riya".to_string()),
            ..Default::default()
        };
        let mut result = ExtractionResult::default();
        result.insert(FieldValue::Stylist("Maya".to_string()));

        let changed = result.merge_into(&mut record);
        assert_eq!(changed, vec![Field::Stylist]);
        assert_eq!(record.stylist.as_deref(), Some("Maya"));
        assert_eq!(record.service.as_deref(), Some("Haircut"));
    }

    #[test]
    fn test_merge_same_value_reports_no_change() {
        let mut record = BookingRecord {
            email: Some("a@b.com".to_string()),
            ..Default::default()
        };
        let mut result = ExtractionResult::default();
        result.insert(FieldValue::Email("a@b.com".to_string()));
        assert!(result.merge_into(&mut record).is_empty());
    }

    #[test]
    fn test_fill_gaps_never_overrides() {
        let mut record = BookingRecord {
            stylist: Some("Riya".to_string()),
            ..Default::default()
        };
        let mut result = ExtractionResult::default();
        result.insert(FieldValue::Stylist("Alex".to_string()));
        result.insert(FieldValue::Service("Styling".to_string()));

        let filled = result.fill_gaps(&mut record);
        assert_eq!(filled, vec![Field::Service]);
        assert_eq!(record.stylist.as_deref(), Some("Riya"));
        assert_eq!(record.service.as_deref(), Some("Styling"));
    }
}

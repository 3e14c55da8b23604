// ==============================================================================
// metrics/record.rs - Metric Record
// ==============================================================================
// Description: Field-name keyed metric values governed by a policy registry
// Author: Matt Barham
// Created: 2026-09-29
// Modified: 2026-10-16
// Version: 0.2.0
// ==============================================================================

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::policy::{FieldPolicy, PolicyRegistry};
use super::MetricsError;

/// Value of one metric field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(u64),
    Integer(i64),
    Real(f64),
    Flag(bool),
    Text(String),
    Timestamp(NaiveDateTime),
    /// Result of a zero-denominator rate
    Undefined,
}

impl FieldValue {
    /// Bit-level equality; two NaN reals compare equal here
    pub fn same_as(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Real(a), FieldValue::Real(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            FieldValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{}", n),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Real(v) if v.is_finite() => write!(f, "{:.6}", v),
            FieldValue::Real(_) | FieldValue::Undefined => write!(f, "?"),
            FieldValue::Flag(true) => write!(f, "Y"),
            FieldValue::Flag(false) => write!(f, "N"),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Metric values for one record, keyed by registered field name
///
/// Additive fields start at zero. Invariant fields start unset and can be
/// set once. Derived fields are never stored here; asking for one yields
/// [`MetricsError::NotYetComputed`].
#[derive(Debug, Clone)]
pub struct MetricRecord {
    registry: Arc<PolicyRegistry>,
    values: BTreeMap<&'static str, FieldValue>,
}

impl PartialEq for MetricRecord {
    fn eq(&self, other: &Self) -> bool {
        self.registry.name() == other.registry.name() && self.values == other.values
    }
}

impl MetricRecord {
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        let values = registry
            .fields_with(FieldPolicy::Sum)
            .map(|field| (field, FieldValue::Count(0)))
            .collect();

        Self { registry, values }
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    fn expect_policy(&self, field: &str, expected: FieldPolicy) -> Result<&'static str, MetricsError> {
        let (name, actual) = self.registry.entry(field)?;
        if actual != expected {
            return Err(MetricsError::PolicyMismatch {
                field: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(name)
    }

    /// Add to an additive counter
    pub fn increment(&mut self, field: &str, by: u64) -> Result<(), MetricsError> {
        let name = self.expect_policy(field, FieldPolicy::Sum)?;
        let current = self.count(name)?;
        let updated = current
            .checked_add(by)
            .ok_or_else(|| MetricsError::CounterOverflow(name.to_string()))?;
        self.values.insert(name, FieldValue::Count(updated));
        Ok(())
    }

    /// Current value of an additive counter
    pub fn count(&self, field: &str) -> Result<u64, MetricsError> {
        let name = self.expect_policy(field, FieldPolicy::Sum)?;
        Ok(self.values.get(name).and_then(FieldValue::as_count).unwrap_or(0))
    }

    /// Set an invariant field; re-setting the same value is a no-op
    pub fn set_invariant(&mut self, field: &str, value: FieldValue) -> Result<(), MetricsError> {
        let name = self.expect_policy(field, FieldPolicy::AssertEqual)?;

        match self.values.get(name) {
            Some(existing) if existing.same_as(&value) => Ok(()),
            Some(existing) => Err(MetricsError::Conflict {
                scope: format!("{} record", self.registry.name()),
                field: name.to_string(),
                left: existing.to_string(),
                right: value.to_string(),
            }),
            None => {
                self.values.insert(name, value);
                Ok(())
            }
        }
    }

    /// Read an additive or invariant field
    ///
    /// Returns `Ok(None)` for an invariant that was never set.
    pub fn get(&self, field: &str) -> Result<Option<&FieldValue>, MetricsError> {
        let (name, policy) = self.registry.entry(field)?;
        if policy == FieldPolicy::Derived {
            return Err(MetricsError::NotYetComputed(name.to_string()));
        }
        Ok(self.values.get(name))
    }

    pub fn text(&self, field: &str) -> Result<Option<&str>, MetricsError> {
        Ok(self.get(field)?.and_then(FieldValue::as_text))
    }

    /// Stored values in field-name order
    pub fn values(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> + '_ {
        self.values.iter().map(|(&name, value)| (name, value))
    }

    pub(crate) fn insert_merged(&mut self, field: &'static str, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub(crate) fn raw(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<PolicyRegistry> {
        Arc::new(
            PolicyRegistry::builder("test")
                .field("CALLS", FieldPolicy::Sum)
                .field("CHIP", FieldPolicy::AssertEqual)
                .field("RATE", FieldPolicy::Derived)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_counters_start_at_zero() {
        let mut record = MetricRecord::new(registry());
        assert_eq!(record.count("CALLS").unwrap(), 0);

        record.increment("CALLS", 3).unwrap();
        record.increment("CALLS", 2).unwrap();
        assert_eq!(record.count("CALLS").unwrap(), 5);
    }

    #[test]
    fn test_invariant_set_once() {
        let mut record = MetricRecord::new(registry());
        assert_eq!(record.get("CHIP").unwrap(), None);

        record.set_invariant("CHIP", FieldValue::Text("GSA".into())).unwrap();
        record.set_invariant("CHIP", FieldValue::Text("GSA".into())).unwrap();

        let err = record
            .set_invariant("CHIP", FieldValue::Text("MEGA".into()))
            .unwrap_err();
        assert!(err.is_data_integrity());
        assert_eq!(record.text("CHIP").unwrap(), Some("GSA"));
    }

    #[test]
    fn test_derived_fields_not_readable() {
        let record = MetricRecord::new(registry());
        assert_eq!(
            record.get("RATE").unwrap_err(),
            MetricsError::NotYetComputed("RATE".to_string())
        );
    }

    #[test]
    fn test_policy_misuse_rejected() {
        let mut record = MetricRecord::new(registry());
        assert!(matches!(
            record.increment("CHIP", 1),
            Err(MetricsError::PolicyMismatch { .. })
        ));
        assert!(matches!(
            record.set_invariant("CALLS", FieldValue::Count(1)),
            Err(MetricsError::PolicyMismatch { .. })
        ));
        assert!(matches!(
            record.increment("UNKNOWN", 1),
            Err(MetricsError::UnregisteredField { .. })
        ));
    }

    #[test]
    fn test_display_rendering() {
        assert_eq!(FieldValue::Count(7).to_string(), "7");
        assert_eq!(FieldValue::Real(0.5).to_string(), "0.500000");
        assert_eq!(FieldValue::Real(f64::NAN).to_string(), "?");
        assert_eq!(FieldValue::Undefined.to_string(), "?");
        assert_eq!(FieldValue::Flag(true).to_string(), "Y");
        assert!(FieldValue::Real(f64::NAN).same_as(&FieldValue::Real(f64::NAN)));
    }
}

// ==============================================================================
// metrics/mod.rs - Metric Accumulation and Merge Engine
// ==============================================================================
// Description: Per-shard accumulation, policy-driven merge, derived fields
// Author: Matt Barham
// Created: 2026-09-29
// Modified: 2026-10-16
// Version: 0.3.0
// ==============================================================================
// Flow:
//   header → CallingMetricAccumulator (one per shard) → PartialResult
//   PartialResult × N → merge_all → PartialResult → resolve → ResolvedMetrics
// ==============================================================================

pub mod accumulator;
pub mod derived;
pub mod fields;
pub mod merge;
pub mod partial;
pub mod policy;
pub mod record;
pub mod sex;

pub use accumulator::{CallingMetricAccumulator, MembershipIndex};
pub use derived::{resolve, validate_rules, DerivedParams, ResolvedMetrics, ResolvedRecord, ResolvedSample};
pub use merge::{merge, merge_all};
pub use partial::{PartialResult, SampleRecord};
pub use policy::{FieldPolicy, MetricSchema, PolicyRegistry};
pub use record::{FieldValue, MetricRecord};
pub use sex::sex_concordance;

use thiserror::Error;

use crate::parsers::header::HeaderError;

/// Broad category of a metrics failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad registry or rule setup; raised before any record is read
    Configuration,
    /// Inputs that must agree do not; the run is aborted
    DataIntegrity,
    /// API misuse, e.g. reading a derived field too early
    Usage,
}

/// Errors raised by the accumulation and merge engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Field '{field}' has no registered merge policy in the {registry} registry")]
    UnregisteredField { registry: &'static str, field: String },

    #[error("Field '{field}' registered more than once in the {registry} registry")]
    DuplicateField { registry: &'static str, field: &'static str },

    #[error("Field '{field}' is registered as {actual:?}, not {expected:?}")]
    PolicyMismatch {
        field: String,
        expected: FieldPolicy,
        actual: FieldPolicy,
    },

    #[error("Derived field '{0}' has no resolution rule")]
    MissingRule(String),

    #[error("Resolution rule targets '{0}', which is not a registered derived field")]
    OrphanRule(String),

    #[error("Call rate threshold {0} is outside (0, 1]")]
    InvalidThreshold(f64),

    #[error("Cannot combine records from the {left} and {right} registries")]
    RegistryMismatch { left: &'static str, right: &'static str },

    #[error("Conflicting values for {field} in {scope}: '{left}' vs '{right}'")]
    Conflict {
        scope: String,
        field: String,
        left: String,
        right: String,
    },

    #[error("Sample '{0}' is not declared in the VCF header")]
    UnknownSample(String),

    #[error("Sample '{0}' is declared more than once")]
    DuplicateSample(String),

    #[error("Counter {0} overflowed")]
    CounterOverflow(String),

    #[error("Inconsistent counters: {0}")]
    InconsistentCounters(String),

    #[error("Derived field '{0}' has not been computed yet")]
    NotYetComputed(String),

    #[error(transparent)]
    Header(#[from] HeaderError),
}

impl MetricsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::UnregisteredField { .. }
            | MetricsError::DuplicateField { .. }
            | MetricsError::PolicyMismatch { .. }
            | MetricsError::MissingRule(_)
            | MetricsError::OrphanRule(_)
            | MetricsError::InvalidThreshold(_)
            | MetricsError::RegistryMismatch { .. } => ErrorKind::Configuration,
            MetricsError::Conflict { .. }
            | MetricsError::UnknownSample(_)
            | MetricsError::DuplicateSample(_)
            | MetricsError::CounterOverflow(_)
            | MetricsError::InconsistentCounters(_)
            | MetricsError::Header(_) => ErrorKind::DataIntegrity,
            MetricsError::NotYetComputed(_) => ErrorKind::Usage,
        }
    }

    pub fn is_data_integrity(&self) -> bool {
        self.kind() == ErrorKind::DataIntegrity
    }
}

// ==============================================================================
// metrics/partial.rs - Partial Results
// ==============================================================================
// Description: Per-sample records and the immutable per-shard snapshot
// Author: Matt Barham
// Created: 2026-09-30
// Modified: 2026-10-09
// Version: 0.2.0
// ==============================================================================

use std::collections::BTreeMap;

use super::fields;
use super::policy::MetricSchema;
use super::record::{FieldValue, MetricRecord};
use super::MetricsError;
use crate::models::SampleIdentity;

/// Metrics for one sample
///
/// Embeds a summary-shaped record (same fields and registry as the
/// aggregate) next to the sample-only fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    identity: SampleIdentity,
    metrics: MetricRecord,
    attributes: MetricRecord,
}

impl SampleRecord {
    /// Create a zeroed record; identity fields are set as invariants
    pub fn new(identity: SampleIdentity, schema: &MetricSchema) -> Result<Self, MetricsError> {
        let mut attributes = MetricRecord::new(schema.sample.clone());
        attributes.set_invariant(
            fields::CHIP_WELL_BARCODE,
            FieldValue::Text(identity.chip_well_barcode.clone()),
        )?;
        attributes.set_invariant(fields::SAMPLE_ALIAS, FieldValue::Text(identity.sample_alias.clone()))?;
        attributes.set_invariant(fields::ANALYSIS_VERSION, FieldValue::Integer(identity.analysis_version))?;
        attributes.set_invariant(fields::CHIP_TYPE, FieldValue::Text(identity.chip_type.clone()))?;

        Ok(Self {
            identity,
            metrics: MetricRecord::new(schema.summary.clone()),
            attributes,
        })
    }

    pub fn identity(&self) -> &SampleIdentity {
        &self.identity
    }

    /// Summary-shaped counters for this sample
    pub fn metrics(&self) -> &MetricRecord {
        &self.metrics
    }

    /// Sample-only fields (identity, header attributes, hidden counters)
    pub fn attributes(&self) -> &MetricRecord {
        &self.attributes
    }

    pub fn metrics_mut(&mut self) -> &mut MetricRecord {
        &mut self.metrics
    }

    pub fn attributes_mut(&mut self) -> &mut MetricRecord {
        &mut self.attributes
    }

    pub(crate) fn into_parts(self) -> (SampleIdentity, MetricRecord, MetricRecord) {
        (self.identity, self.metrics, self.attributes)
    }
}

/// Immutable snapshot of one shard's counters
///
/// Produced by `CallingMetricAccumulator::finish` or by merging two
/// partials. Derived fields are not reachable from here.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
    schema: MetricSchema,
    summary: MetricRecord,
    samples: BTreeMap<SampleIdentity, SampleRecord>,
}

impl PartialResult {
    /// A partial with zeroed summary counters and no samples
    pub fn empty(schema: &MetricSchema) -> Self {
        Self {
            schema: schema.clone(),
            summary: MetricRecord::new(schema.summary.clone()),
            samples: BTreeMap::new(),
        }
    }

    /// Assemble a partial from finished records
    pub fn new<I>(schema: &MetricSchema, summary: MetricRecord, samples: I) -> Result<Self, MetricsError>
    where
        I: IntoIterator<Item = SampleRecord>,
    {
        if summary.registry().name() != schema.summary.name() {
            return Err(MetricsError::RegistryMismatch {
                left: schema.summary.name(),
                right: summary.registry().name(),
            });
        }

        let mut map = BTreeMap::new();
        for sample in samples {
            if map.contains_key(sample.identity()) {
                return Err(MetricsError::DuplicateSample(sample.identity().to_string()));
            }
            map.insert(sample.identity().clone(), sample);
        }

        Ok(Self {
            schema: schema.clone(),
            summary,
            samples: map,
        })
    }

    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    pub fn summary(&self) -> &MetricRecord {
        &self.summary
    }

    pub fn samples(&self) -> impl Iterator<Item = &SampleRecord> + '_ {
        self.samples.values()
    }

    pub fn sample(&self, identity: &SampleIdentity) -> Option<&SampleRecord> {
        self.samples.get(identity)
    }

    pub fn sample_identities(&self) -> impl Iterator<Item = &SampleIdentity> + '_ {
        self.samples.keys()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn into_parts(self) -> (MetricSchema, MetricRecord, BTreeMap<SampleIdentity, SampleRecord>) {
        (self.schema, self.summary, self.samples)
    }

    pub(crate) fn from_parts(
        schema: MetricSchema,
        summary: MetricRecord,
        samples: BTreeMap<SampleIdentity, SampleRecord>,
    ) -> Self {
        Self {
            schema,
            summary,
            samples,
        }
    }
}

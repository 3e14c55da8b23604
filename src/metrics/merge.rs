// ==============================================================================
// metrics/merge.rs - Merge Engine
// ==============================================================================
// Description: Combines partial results field by field using the registry
// Author: Matt Barham
// Created: 2026-09-30
// Modified: 2026-10-12
// Version: 0.3.0
// ==============================================================================
// Rules:
//   Sum          → a + b
//   AssertEqual  → a == b, or the set side when the other is unset
//   Derived      → skipped (never present before resolution)
//   Sample maps  → full outer join on SampleIdentity, recursive per key
// Both rules are associative and commutative, so fold order is irrelevant.
// ==============================================================================

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::fields;
use super::partial::{PartialResult, SampleRecord};
use super::policy::{FieldPolicy, MetricSchema};
use super::record::{FieldValue, MetricRecord};
use super::MetricsError;
use crate::models::SampleIdentity;

/// Merge two partial results into one
pub fn merge(a: PartialResult, b: PartialResult) -> Result<PartialResult, MetricsError> {
    if a.schema() != b.schema() {
        return Err(MetricsError::RegistryMismatch {
            left: a.schema().summary.name(),
            right: b.schema().summary.name(),
        });
    }

    let (schema, mut summary, mut samples) = a.into_parts();
    let (_, other_summary, other_samples) = b.into_parts();

    merge_records(&mut summary, &other_summary, "summary")?;

    for (identity, other) in other_samples {
        match samples.entry(identity) {
            Entry::Vacant(slot) => {
                slot.insert(other);
            }
            Entry::Occupied(mut slot) => {
                merge_sample(slot.get_mut(), other)?;
            }
        }
    }

    check_barcodes(&samples)?;

    Ok(PartialResult::from_parts(schema, summary, samples))
}

/// Fold any number of partials; an empty input yields an empty partial
pub fn merge_all<I>(schema: &MetricSchema, partials: I) -> Result<PartialResult, MetricsError>
where
    I: IntoIterator<Item = PartialResult>,
{
    partials
        .into_iter()
        .try_fold(PartialResult::empty(schema), merge)
}

fn merge_sample(target: &mut SampleRecord, other: SampleRecord) -> Result<(), MetricsError> {
    let (identity, metrics, attributes) = other.into_parts();
    let scope = format!("sample {}", identity.chip_well_barcode);

    merge_records(target.metrics_mut(), &metrics, &scope)?;
    merge_records(target.attributes_mut(), &attributes, &scope)
}

/// Apply `other` onto `target` following the target's registry
pub(crate) fn merge_records(
    target: &mut MetricRecord,
    other: &MetricRecord,
    scope: &str,
) -> Result<(), MetricsError> {
    let registry = target.registry().clone();
    if registry.name() != other.registry().name() {
        return Err(MetricsError::RegistryMismatch {
            left: registry.name(),
            right: other.registry().name(),
        });
    }

    for (field, value) in other.values() {
        match registry.policy_for(field)? {
            FieldPolicy::Sum => {
                let left = target.raw(field).and_then(FieldValue::as_count).unwrap_or(0);
                let right = value.as_count().unwrap_or(0);
                let sum = left
                    .checked_add(right)
                    .ok_or_else(|| MetricsError::CounterOverflow(field.to_string()))?;
                target.insert_merged(field, FieldValue::Count(sum));
            }
            FieldPolicy::AssertEqual => match target.raw(field) {
                None => target.insert_merged(field, value.clone()),
                Some(existing) if existing.same_as(value) => {}
                Some(existing) => {
                    return Err(MetricsError::Conflict {
                        scope: scope.to_string(),
                        field: field.to_string(),
                        left: existing.to_string(),
                        right: value.to_string(),
                    });
                }
            },
            FieldPolicy::Derived => {}
        }
    }

    Ok(())
}

/// A chip well is one physical sample; it may not appear under two identities
fn check_barcodes(samples: &BTreeMap<SampleIdentity, SampleRecord>) -> Result<(), MetricsError> {
    let mut seen: BTreeMap<&str, &SampleIdentity> = BTreeMap::new();

    for identity in samples.keys() {
        let Some(previous) = seen.insert(identity.chip_well_barcode.as_str(), identity) else {
            continue;
        };

        let (field, left, right) = if previous.sample_alias != identity.sample_alias {
            (fields::SAMPLE_ALIAS, previous.sample_alias.clone(), identity.sample_alias.clone())
        } else if previous.analysis_version != identity.analysis_version {
            (
                fields::ANALYSIS_VERSION,
                previous.analysis_version.to_string(),
                identity.analysis_version.to_string(),
            )
        } else {
            (fields::CHIP_TYPE, previous.chip_type.clone(), identity.chip_type.clone())
        };

        return Err(MetricsError::Conflict {
            scope: format!("sample {}", identity.chip_well_barcode),
            field: field.to_string(),
            left,
            right,
        });
    }

    Ok(())
}

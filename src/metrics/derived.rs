// ==============================================================================
// metrics/derived.rs - Derived Field Resolver
// ==============================================================================
// Description: Computes rates, ratios and pass flags after the final merge
// Author: Matt Barham
// Created: 2026-10-01
// Modified: 2026-10-16
// Version: 0.3.0
// ==============================================================================
// Order (a rule may read counters, invariants, or rules listed above it):
//   summary-shaped: NOVEL_SNPS, PCT_DBSNP, CALL_RATE, AUTOCALL_CALL_RATE
//   sample-only:    HET_PCT, HET_HOMVAR_RATIO, GENDER_CONCORDANCE_PF,
//                   IS_ZCALLED, AUTOCALL_PF
// ==============================================================================

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::fields::*;
use super::partial::PartialResult;
use super::policy::{FieldPolicy, MetricSchema};
use super::record::{FieldValue, MetricRecord};
use super::sex::sex_concordance_from_labels;
use super::MetricsError;
use crate::models::SampleIdentity;

/// Run-wide inputs to derived fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedParams {
    /// A sample passes when its call rate is strictly above this value
    pub call_rate_pf_threshold: f64,
}

impl DerivedParams {
    /// Threshold must lie in (0, 1]
    pub fn new(call_rate_pf_threshold: f64) -> Result<Self, MetricsError> {
        let params = Self { call_rate_pf_threshold };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        let t = self.call_rate_pf_threshold;
        if !t.is_finite() || t <= 0.0 || t > 1.0 {
            return Err(MetricsError::InvalidThreshold(t));
        }
        Ok(())
    }
}

type Rule = fn(&Resolution<'_>, &DerivedParams) -> Result<FieldValue, MetricsError>;

struct DerivedStep {
    field: &'static str,
    rule: Rule,
}

const SUMMARY_STEPS: &[DerivedStep] = &[
    DerivedStep { field: NOVEL_SNPS, rule: novel_snps },
    DerivedStep { field: PCT_DBSNP, rule: pct_dbsnp },
    DerivedStep { field: CALL_RATE, rule: call_rate },
    DerivedStep { field: AUTOCALL_CALL_RATE, rule: autocall_call_rate },
];

const SAMPLE_STEPS: &[DerivedStep] = &[
    DerivedStep { field: HET_PCT, rule: het_pct },
    DerivedStep { field: HET_HOMVAR_RATIO, rule: het_homvar_ratio },
    DerivedStep { field: GENDER_CONCORDANCE_PF, rule: gender_concordance },
    DerivedStep { field: IS_ZCALLED, rule: is_zcalled },
    DerivedStep { field: AUTOCALL_PF, rule: autocall_pf },
];

/// Read view handed to each rule
struct Resolution<'a> {
    metrics: &'a MetricRecord,
    attributes: Option<&'a MetricRecord>,
    resolved: &'a BTreeMap<&'static str, FieldValue>,
}

impl Resolution<'_> {
    fn record_for(&self, field: &str) -> &MetricRecord {
        match self.attributes {
            Some(attributes) if !self.metrics.registry().contains(field) => attributes,
            _ => self.metrics,
        }
    }

    fn count(&self, field: &str) -> Result<u64, MetricsError> {
        self.record_for(field).count(field)
    }

    fn text(&self, field: &str) -> Result<Option<&str>, MetricsError> {
        self.record_for(field).text(field)
    }

    /// A derived value resolved by an earlier step
    fn derived(&self, field: &str) -> Result<&FieldValue, MetricsError> {
        self.resolved
            .get(field)
            .ok_or_else(|| MetricsError::NotYetComputed(field.to_string()))
    }
}

fn ratio(numerator: u64, denominator: u64) -> FieldValue {
    if denominator == 0 {
        FieldValue::Undefined
    } else {
        FieldValue::Real(numerator as f64 / denominator as f64)
    }
}

fn novel_snps(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    let snps = r.count(NUM_SNPS)?;
    let in_db = r.count(NUM_IN_DB_SNP)?;
    snps.checked_sub(in_db)
        .map(FieldValue::Count)
        .ok_or_else(|| {
            MetricsError::InconsistentCounters(format!("{NUM_IN_DB_SNP} ({in_db}) exceeds {NUM_SNPS} ({snps})"))
        })
}

fn pct_dbsnp(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    Ok(ratio(r.count(NUM_IN_DB_SNP)?, r.count(NUM_SNPS)?))
}

fn call_rate(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    Ok(ratio(r.count(NUM_CALLS)?, r.count(NUM_NON_FILTERED_ASSAYS)?))
}

fn autocall_call_rate(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    Ok(ratio(r.count(NUM_AUTOCALL_CALLS)?, r.count(NUM_NON_FILTERED_ASSAYS)?))
}

fn het_pct(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    Ok(ratio(r.count(NUM_HETS)?, r.count(NUM_CALLS)?))
}

fn het_homvar_ratio(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    Ok(ratio(r.count(NUM_HETS)?, r.count(NUM_HOM_VAR)?))
}

fn gender_concordance(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    Ok(FieldValue::Flag(sex_concordance_from_labels(
        r.text(REPORTED_GENDER)?,
        r.text(FP_GENDER)?,
        r.text(AUTOCALL_GENDER)?,
    )))
}

fn is_zcalled(r: &Resolution<'_>, _: &DerivedParams) -> Result<FieldValue, MetricsError> {
    let thresholds = r.text(ZCALL_THRESHOLDS_FILE)?;
    Ok(FieldValue::Flag(thresholds.is_some_and(|t| !t.trim().is_empty())))
}

// An undefined call rate never passes
fn autocall_pf(r: &Resolution<'_>, params: &DerivedParams) -> Result<FieldValue, MetricsError> {
    let passes = r
        .derived(CALL_RATE)?
        .as_real()
        .is_some_and(|rate| rate > params.call_rate_pf_threshold);
    Ok(FieldValue::Flag(passes))
}

fn run_steps(
    steps: &[DerivedStep],
    metrics: &MetricRecord,
    attributes: Option<&MetricRecord>,
    params: &DerivedParams,
    resolved: &mut BTreeMap<&'static str, FieldValue>,
) -> Result<(), MetricsError> {
    for step in steps {
        let value = {
            let view = Resolution {
                metrics,
                attributes,
                resolved: &*resolved,
            };
            (step.rule)(&view, params)?
        };
        resolved.insert(step.field, value);
    }
    Ok(())
}

/// Check that rules and registries describe the same derived fields
pub fn validate_rules(schema: &MetricSchema) -> Result<(), MetricsError> {
    for (steps, registry) in [(SUMMARY_STEPS, &schema.summary), (SAMPLE_STEPS, &schema.sample)] {
        let ruled: HashSet<&str> = steps.iter().map(|s| s.field).collect();

        for step in steps {
            if registry.policy_for(step.field)? != FieldPolicy::Derived {
                return Err(MetricsError::OrphanRule(step.field.to_string()));
            }
        }

        if let Some(missing) = registry
            .fields_with(FieldPolicy::Derived)
            .find(|f| !ruled.contains(f))
        {
            return Err(MetricsError::MissingRule(missing.to_string()));
        }
    }

    Ok(())
}

/// A record with every derived field computed
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    metrics: MetricRecord,
    attributes: Option<MetricRecord>,
    derived: BTreeMap<&'static str, FieldValue>,
}

impl ResolvedRecord {
    /// Value of any registered field; `None` for an invariant never set
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        if let Some(value) = self.derived.get(field) {
            return Some(value);
        }
        if let Some(value) = self.metrics.raw(field) {
            return Some(value);
        }
        self.attributes.as_ref().and_then(|a| a.raw(field))
    }

    pub fn count(&self, field: &str) -> Option<u64> {
        self.value(field).and_then(FieldValue::as_count)
    }

    pub fn rate(&self, field: &str) -> Option<f64> {
        self.value(field).and_then(FieldValue::as_real)
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        self.value(field).and_then(FieldValue::as_flag)
    }

    /// Values keyed by field name for the given column layout
    pub fn row(&self, columns: &[&'static str]) -> BTreeMap<&'static str, FieldValue> {
        columns
            .iter()
            .map(|&c| (c, self.value(c).cloned().unwrap_or(FieldValue::Undefined)))
            .collect()
    }
}

impl Serialize for ResolvedRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.metrics.values() {
            map.serialize_entry(field, value)?;
        }
        if let Some(attributes) = &self.attributes {
            for (field, value) in attributes.values() {
                map.serialize_entry(field, value)?;
            }
        }
        for (field, value) in &self.derived {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSample {
    pub identity: SampleIdentity,
    pub record: ResolvedRecord,
}

/// Final metrics: one summary row plus one row per sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMetrics {
    pub summary: ResolvedRecord,
    pub samples: Vec<ResolvedSample>,
}

impl ResolvedMetrics {
    pub fn sample(&self, chip_well_barcode: &str) -> Option<&ResolvedSample> {
        self.samples
            .iter()
            .find(|s| s.identity.chip_well_barcode == chip_well_barcode)
    }
}

/// Compute derived fields once, consuming the final merged partial
pub fn resolve(partial: PartialResult, params: &DerivedParams) -> Result<ResolvedMetrics, MetricsError> {
    let (_, summary, samples) = partial.into_parts();

    let mut summary_derived = BTreeMap::new();
    run_steps(SUMMARY_STEPS, &summary, None, params, &mut summary_derived)?;

    let mut resolved_samples = Vec::with_capacity(samples.len());
    for (_, sample) in samples {
        let (identity, metrics, attributes) = sample.into_parts();

        let mut derived = BTreeMap::new();
        run_steps(SUMMARY_STEPS, &metrics, Some(&attributes), params, &mut derived)?;
        run_steps(SAMPLE_STEPS, &metrics, Some(&attributes), params, &mut derived)?;

        resolved_samples.push(ResolvedSample {
            identity,
            record: ResolvedRecord {
                metrics,
                attributes: Some(attributes),
                derived,
            },
        });
    }

    Ok(ResolvedMetrics {
        summary: ResolvedRecord {
            metrics: summary,
            attributes: None,
            derived: summary_derived,
        },
        samples: resolved_samples,
    })
}

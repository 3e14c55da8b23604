// ==============================================================================
// metrics/accumulator.rs - Per-Shard Calling Metric Accumulator
// ==============================================================================
// Description: Counts genotype outcomes for one shard of variant records
// Author: Matt Barham
// Created: 2026-10-02
// Modified: 2026-10-16
// Version: 0.3.0
// ==============================================================================
// Per genotype (applied to the sample record and the aggregate alike):
//   NUM_ASSAYS                   always
//   filtered                     → NUM_FILTERED_ASSAYS (+ NUM_ZEROED_OUT_ASSAYS)
//   otherwise                    → NUM_NON_FILTERED_ASSAYS, then
//     no-call / called           → NUM_NO_CALLS / NUM_CALLS
//     autocall (GTA, else GT)    → NUM_AUTOCALL_CALLS
//     variant at SNP site        → NUM_SNPS (+ NUM_IN_DB_SNP when indexed)
//     variant at indel site      → NUM_INDELS
//     Het / HomVar               → NUM_HETS / NUM_HOM_VAR (sample only)
// Per record: exactly one Het and no HomVar → NUM_SINGLETONS for that sample
// ==============================================================================

use std::collections::HashMap;
#[cfg(test)]
use std::collections::HashSet;
use tracing::{debug, warn};

use super::fields::*;
use super::partial::{PartialResult, SampleRecord};
use super::policy::MetricSchema;
use super::record::MetricRecord;
use super::MetricsError;
use crate::genotype::{classify_genotype, parse_genotype, GenotypeCall};
use crate::models::{FilterStatus, VariantKind, VariantRecord};
use crate::parsers::header::ArraysHeader;

/// Read-only "is this site known" lookup shared by all workers
pub trait MembershipIndex: Sync {
    fn contains(&self, chromosome: &str, position: u64, kind: VariantKind) -> bool;
}

#[cfg(test)]
impl MembershipIndex for HashSet<(String, u64)> {
    fn contains(&self, chromosome: &str, position: u64, _kind: VariantKind) -> bool {
        self.contains(&(chromosome.to_string(), position))
    }
}

/// Accumulates one shard's counters
///
/// Owned by exactly one worker. `finish` consumes it, so a finished
/// accumulator cannot be fed more records.
pub struct CallingMetricAccumulator<'i, I: MembershipIndex + ?Sized> {
    index: &'i I,
    schema: MetricSchema,
    summary: MetricRecord,
    samples: Vec<SampleRecord>,
    columns: HashMap<String, usize>,
    records: u64,
    malformed: u64,
}

impl<'i, I: MembershipIndex + ?Sized> CallingMetricAccumulator<'i, I> {
    /// One zeroed sample record per header sample, with header attributes set
    pub fn initialize(header: &ArraysHeader, index: &'i I, schema: &MetricSchema) -> Result<Self, MetricsError> {
        let attributes = header.sample_attributes()?;

        let mut samples = Vec::with_capacity(header.sample_names().len());
        let mut columns = HashMap::with_capacity(header.sample_names().len());

        for name in header.sample_names() {
            if columns.contains_key(name) {
                return Err(MetricsError::DuplicateSample(name.clone()));
            }

            let mut sample = SampleRecord::new(header.sample_identity(name)?, schema)?;
            for (field, value) in &attributes {
                sample.attributes_mut().set_invariant(field, value.clone())?;
            }

            columns.insert(name.clone(), samples.len());
            samples.push(sample);
        }

        Ok(Self {
            index,
            schema: schema.clone(),
            summary: MetricRecord::new(schema.summary.clone()),
            samples,
            columns,
            records: 0,
            malformed: 0,
        })
    }

    /// Count every genotype of one record
    pub fn accept(&mut self, record: &VariantRecord) -> Result<(), MetricsError> {
        let kind = record.kind();
        let in_db_snp =
            kind == VariantKind::Snp && self.index.contains(&record.chromosome, record.position, kind);

        let mut het_slot = None;
        let mut het_count = 0u32;
        let mut hom_var_count = 0u32;

        for genotype in &record.genotypes {
            let slot = *self
                .columns
                .get(&genotype.sample)
                .ok_or_else(|| MetricsError::UnknownSample(genotype.sample.clone()))?;

            let call = match parse_genotype(&genotype.genotype) {
                Ok(call) => call,
                Err(e) => {
                    self.malformed += 1;
                    debug!(
                        "{}:{} sample {}: {}; counted as no-call",
                        record.chromosome, record.position, genotype.sample, e
                    );
                    GenotypeCall::NoCall
                }
            };
            let autocall = genotype
                .autocall_genotype
                .as_deref()
                .map(classify_genotype)
                .unwrap_or(call);

            let assay = Assay {
                filter: record.filter,
                kind,
                in_db_snp,
                call,
                autocall,
            };

            let sample = &mut self.samples[slot];
            for field in assay.counters() {
                sample.metrics_mut().increment(field, 1)?;
                self.summary.increment(field, 1)?;
            }

            if record.filter.is_filtered() {
                continue;
            }

            match call {
                GenotypeCall::Het => {
                    sample.attributes_mut().increment(NUM_HETS, 1)?;
                    het_count += 1;
                    het_slot = Some(slot);
                }
                GenotypeCall::HomVar => {
                    sample.attributes_mut().increment(NUM_HOM_VAR, 1)?;
                    hom_var_count += 1;
                }
                _ => {}
            }
        }

        if let (1, 0, Some(slot)) = (het_count, hom_var_count, het_slot) {
            self.samples[slot].metrics_mut().increment(NUM_SINGLETONS, 1)?;
            self.summary.increment(NUM_SINGLETONS, 1)?;
        }

        self.records += 1;
        Ok(())
    }

    /// Records accepted so far
    pub fn records_seen(&self) -> u64 {
        self.records
    }

    /// Genotypes that failed to parse and were counted as no-calls
    pub fn malformed_genotypes(&self) -> u64 {
        self.malformed
    }

    /// Freeze into an immutable partial result
    pub fn finish(self) -> Result<PartialResult, MetricsError> {
        if self.malformed > 0 {
            warn!("{} malformed genotypes counted as no-calls", self.malformed);
        }
        debug!(
            "Accumulator finished: {} records, {} samples",
            self.records,
            self.samples.len()
        );

        PartialResult::new(&self.schema, self.summary, self.samples)
    }
}

/// Classification of one genotype at one site
#[derive(Debug, Clone, Copy)]
struct Assay {
    filter: FilterStatus,
    kind: VariantKind,
    in_db_snp: bool,
    call: GenotypeCall,
    autocall: GenotypeCall,
}

impl Assay {
    /// Summary-shaped counters this genotype bumps by one
    fn counters(&self) -> Vec<&'static str> {
        let mut fields = vec![NUM_ASSAYS];

        match self.filter {
            FilterStatus::ZeroedOut => {
                fields.extend([NUM_FILTERED_ASSAYS, NUM_ZEROED_OUT_ASSAYS]);
                return fields;
            }
            FilterStatus::Filtered => {
                fields.push(NUM_FILTERED_ASSAYS);
                return fields;
            }
            FilterStatus::Pass => fields.push(NUM_NON_FILTERED_ASSAYS),
        }

        fields.push(if self.call.is_called() { NUM_CALLS } else { NUM_NO_CALLS });

        if self.autocall.is_called() {
            fields.push(NUM_AUTOCALL_CALLS);
        }

        if self.call.is_variant() {
            match self.kind {
                VariantKind::Snp => {
                    fields.push(NUM_SNPS);
                    if self.in_db_snp {
                        fields.push(NUM_IN_DB_SNP);
                    }
                }
                VariantKind::Indel => fields.push(NUM_INDELS),
                VariantKind::Other => {}
            }
        }

        fields
    }
}

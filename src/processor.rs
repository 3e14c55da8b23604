// ==============================================================================
// processor.rs - Parallel Metrics Driver and Pipeline
// ==============================================================================
// Description: Runs one accumulator per shard on a rayon pool, merges the
//              partials and resolves derived fields; wires the CLI pipeline
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-16
// Version: 3.0.0
// ==============================================================================
// Pipeline:
//   1. Open input VCF, read header and control intensities
//   2. Load dbSNP bitsets (sequence dictionary from flag or input header)
//   3. Accumulate shards in parallel → PartialResult per shard
//   4. Merge all partials, resolve derived fields once
//   5. Write reports (all or nothing)
// ==============================================================================

use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::metrics::{
    merge_all, resolve, validate_rules, CallingMetricAccumulator, DerivedParams, MembershipIndex, MetricSchema,
    MetricsError, PartialResult, ResolvedMetrics,
};
use crate::output::{MetricsReport, ReportWriter};
use crate::parsers::{ShardSpec, VariantSource, VcfSource, VcfSourceError};
use crate::reference_index::{DbSnpIndex, SequenceDictionary};

/// Driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to build worker pool: {0}")]
    Pool(String),

    #[error("Shard {shard}: {source}")]
    Source {
        shard: usize,
        #[source]
        source: VcfSourceError,
    },

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Accumulates shards on a fixed-size pool and merges the results
#[derive(Debug, Clone)]
pub struct ParallelDriver {
    schema: MetricSchema,
    params: DerivedParams,
    worker_count: usize,
}

impl ParallelDriver {
    /// Driver over the standard arrays registries
    pub fn new(worker_count: usize, params: DerivedParams) -> Result<Self, MetricsError> {
        Self::with_schema(MetricSchema::standard()?, worker_count, params)
    }

    /// Registries, report columns, rules and the threshold are checked
    /// here, before any record is read
    pub fn with_schema(schema: MetricSchema, worker_count: usize, params: DerivedParams) -> Result<Self, MetricsError> {
        params.validate()?;
        schema.validate_columns()?;
        validate_rules(&schema)?;

        Ok(Self {
            schema,
            params,
            worker_count: worker_count.max(1),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    /// Accumulate every shard and merge; no derived fields yet
    pub fn accumulate<S, I>(&self, source: &S, index: &I) -> Result<PartialResult, DriverError>
    where
        S: VariantSource + ?Sized,
        I: MembershipIndex + ?Sized,
    {
        let shards = ShardSpec::all(self.worker_count);
        info!(
            "Accumulating {} shards on {} workers",
            shards.len(),
            self.worker_count
        );

        let partials: Vec<PartialResult> = if self.worker_count == 1 {
            shards
                .iter()
                .map(|&shard| accumulate_shard(source, index, &self.schema, shard))
                .collect::<Result<_, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.worker_count)
                .thread_name(|i| format!("metrics-worker-{}", i))
                .build()
                .map_err(|e| DriverError::Pool(e.to_string()))?;

            pool.install(|| {
                shards
                    .par_iter()
                    .map(|&shard| accumulate_shard(source, index, &self.schema, shard))
                    .collect::<Result<_, _>>()
            })?
        };

        info!("Merging {} partial results", partials.len());
        Ok(merge_all(&self.schema, partials)?)
    }

    /// Accumulate, merge and resolve
    pub fn run<S, I>(&self, source: &S, index: &I) -> Result<ResolvedMetrics, DriverError>
    where
        S: VariantSource + ?Sized,
        I: MembershipIndex + ?Sized,
    {
        let merged = self.accumulate(source, index)?;
        Ok(resolve(merged, &self.params)?)
    }
}

fn accumulate_shard<S, I>(
    source: &S,
    index: &I,
    schema: &MetricSchema,
    shard: ShardSpec,
) -> Result<PartialResult, DriverError>
where
    S: VariantSource + ?Sized,
    I: MembershipIndex + ?Sized,
{
    let start = Instant::now();
    let source_error = |e: VcfSourceError| DriverError::Source {
        shard: shard.index,
        source: e,
    };

    let mut accumulator = CallingMetricAccumulator::initialize(source.header(), index, schema)?;
    for record in source.records(shard).map_err(source_error)? {
        accumulator.accept(&record.map_err(source_error)?)?;
    }

    info!(
        "Shard {}/{} finished: {} records in {:.2?}",
        shard.index + 1,
        shard.count,
        accumulator.records_seen(),
        start.elapsed()
    );

    Ok(accumulator.finish()?)
}

/// Outcome of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub metrics: ResolvedMetrics,
    pub reports: Vec<PathBuf>,
}

/// End-to-end arrays metrics run for one input file
pub struct ArraysMetricsProcessor {
    run_id: Uuid,
    config: RunConfig,
}

impl ArraysMetricsProcessor {
    pub fn new(run_id: Uuid, config: RunConfig) -> Self {
        Self { run_id, config }
    }

    /// Main processing pipeline
    pub fn process(&self) -> Result<RunOutcome> {
        let span = info_span!("run", run_id = %self.run_id);
        let _guard = span.enter();
        let started = Utc::now();

        // 1. Input header
        info!("Opening input VCF: {:?}", self.config.input);
        let source = VcfSource::open(&self.config.input).context("Failed to open input VCF")?;
        let controls = source
            .header()
            .control_infos()
            .context("Input VCF header is missing control intensities")?;
        info!(
            "Input has {} samples, {} control probes",
            source.header().sample_names().len(),
            controls.len()
        );

        // 2. dbSNP
        let dictionary = match &self.config.sequence_dictionary {
            Some(path) => SequenceDictionary::from_vcf(path).context("Failed to read sequence dictionary")?,
            None => source.header().sequence_dictionary(),
        };
        if dictionary.is_empty() {
            anyhow::bail!("No contigs with lengths found; pass --sequence-dictionary");
        }
        debug!("Sequence dictionary has {} contigs", dictionary.len());

        let index = DbSnpIndex::build(&self.config.dbsnp, &dictionary).context("Failed to load dbSNP")?;

        // 3-4. Accumulate, merge, resolve
        let driver = ParallelDriver::new(self.config.worker_count, self.config.params)
            .context("Invalid metric registry setup")?;
        let metrics = driver
            .run(&source, &index)
            .context("Failed to collect arrays variant calling metrics")?;

        // 5. Reports
        let writer = ReportWriter::new(&self.config.output_prefix, self.config.format);
        let reports = writer
            .write(&MetricsReport {
                run_id: self.run_id,
                generated_at: started,
                input: &self.config.input,
                params: self.config.params,
                metrics: &metrics,
                controls: &controls,
            })
            .context("Failed to write metrics reports")?;

        info!(
            "Run complete: {} samples, {} reports",
            metrics.samples.len(),
            reports.len()
        );

        Ok(RunOutcome {
            run_id: self.run_id,
            metrics,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fields::*;
    use crate::metrics::{FieldPolicy, PolicyRegistry};
    use crate::models::{FilterStatus, SampleGenotype, VariantRecord};
    use crate::parsers::{ArraysHeader, InMemorySource};
    use std::collections::HashSet;

    const PARAMS: DerivedParams = DerivedParams {
        call_rate_pf_threshold: 0.5,
    };

    fn source() -> InMemorySource {
        let header = ArraysHeader::new(vec!["A".to_string(), "B".to_string()]).with_contig("1", Some(10_000));
        let records = (1..=20)
            .map(|i| VariantRecord {
                chromosome: "1".to_string(),
                position: i * 10,
                reference_allele: "A".to_string(),
                alternate_alleles: vec!["G".to_string()],
                filter: if i % 7 == 0 { FilterStatus::Filtered } else { FilterStatus::Pass },
                genotypes: vec![
                    SampleGenotype {
                        sample: "A".to_string(),
                        genotype: if i % 2 == 0 { "0/1" } else { "0/0" }.to_string(),
                        autocall_genotype: None,
                    },
                    SampleGenotype {
                        sample: "B".to_string(),
                        genotype: if i % 5 == 0 { "./." } else { "1/1" }.to_string(),
                        autocall_genotype: None,
                    },
                ],
            })
            .collect();
        InMemorySource::new(header, records)
    }

    fn index() -> HashSet<(String, u64)> {
        (1..=5).map(|i| ("1".to_string(), i * 20)).collect()
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let source = source();
        let index = index();

        let single = ParallelDriver::new(1, PARAMS).unwrap().run(&source, &index).unwrap();
        for workers in [2, 3, 8] {
            let parallel = ParallelDriver::new(workers, PARAMS).unwrap().run(&source, &index).unwrap();
            assert_eq!(single, parallel, "{} workers", workers);
        }

        assert_eq!(single.summary.count(NUM_ASSAYS), Some(40));
        assert_eq!(single.summary.count(NUM_FILTERED_ASSAYS), Some(4));
        assert_eq!(single.samples.len(), 2);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let driver = ParallelDriver::new(0, PARAMS).unwrap();
        assert_eq!(driver.worker_count(), 1);
    }

    #[test]
    fn test_missing_rule_fails_before_reading() {
        let summary = PolicyRegistry::builder("summary")
            .fields(SUMMARY_COUNTERS, FieldPolicy::Sum)
            .fields(SUMMARY_DERIVED, FieldPolicy::Derived)
            .field("MEAN_GC", FieldPolicy::Derived)
            .build()
            .unwrap();
        let schema = MetricSchema::new(summary, sample_registry().unwrap());

        let err = ParallelDriver::with_schema(schema, 2, PARAMS).unwrap_err();
        assert_eq!(err, MetricsError::MissingRule("MEAN_GC".to_string()));
    }

    #[test]
    fn test_unregistered_report_column_fails_at_startup() {
        let sample = PolicyRegistry::builder("sample")
            .fields(
                &SAMPLE_INVARIANTS
                    .iter()
                    .copied()
                    .filter(|&f| f != CHIP_TYPE)
                    .collect::<Vec<_>>(),
                FieldPolicy::AssertEqual,
            )
            .fields(SAMPLE_COUNTERS, FieldPolicy::Sum)
            .fields(SAMPLE_DERIVED, FieldPolicy::Derived)
            .build()
            .unwrap();
        let schema = MetricSchema::new(summary_registry().unwrap(), sample);

        let err = ParallelDriver::with_schema(schema, 2, PARAMS).unwrap_err();
        assert_eq!(
            err,
            MetricsError::UnregisteredField {
                registry: "sample",
                field: CHIP_TYPE.to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_threshold_rejected_by_driver() {
        for threshold in [f64::NAN, 0.0, -0.1, 1.5, f64::INFINITY] {
            let params = DerivedParams {
                call_rate_pf_threshold: threshold,
            };
            let err = ParallelDriver::new(2, params).unwrap_err();
            assert!(matches!(err, MetricsError::InvalidThreshold(_)), "{}", threshold);
            assert_eq!(err.kind(), crate::metrics::ErrorKind::Configuration);
        }

        assert!(ParallelDriver::new(2, DerivedParams::new(1.0).unwrap()).is_ok());
    }

    #[test]
    fn test_unknown_sample_aborts_run() {
        let header = ArraysHeader::new(vec!["A".to_string()]);
        let record = VariantRecord {
            chromosome: "1".to_string(),
            position: 1,
            reference_allele: "A".to_string(),
            alternate_alleles: vec!["G".to_string()],
            filter: FilterStatus::Pass,
            genotypes: vec![SampleGenotype {
                sample: "Z".to_string(),
                genotype: "0/1".to_string(),
                autocall_genotype: None,
            }],
        };
        let source = InMemorySource::new(header, vec![record]);

        let err = ParallelDriver::new(2, PARAMS).unwrap().run(&source, &index()).unwrap_err();
        assert!(matches!(err, DriverError::Metrics(MetricsError::UnknownSample(_))));
    }
}

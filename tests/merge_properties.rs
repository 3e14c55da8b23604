use std::collections::HashSet;

use arrays_metrics::metrics::fields::*;
use arrays_metrics::metrics::{
    merge, merge_all, resolve, CallingMetricAccumulator, DerivedParams, MembershipIndex, MetricSchema,
    PartialResult,
};
use arrays_metrics::models::{FilterStatus, SampleGenotype, VariantKind, VariantRecord};
use arrays_metrics::parsers::ArraysHeader;
use proptest::prelude::*;

const SAMPLES: [&str; 3] = ["R01C01", "R02C01", "R03C01"];

const PARAMS: DerivedParams = DerivedParams {
    call_rate_pf_threshold: 0.98,
};

fn header(samples: &[&str]) -> ArraysHeader {
    ArraysHeader::new(samples.iter().map(|s| s.to_string()).collect())
        .with_metadata("chipType", "GSA-24v3-0_A1")
        .with_metadata("reportedGender", "F")
        .with_metadata("fingerprintGender", "F")
        .with_metadata("autocallGender", "F")
}

/// Known sites on chromosome 1
struct KnownSites(HashSet<u64>);

impl MembershipIndex for KnownSites {
    fn contains(&self, chromosome: &str, position: u64, _kind: VariantKind) -> bool {
        chromosome == "1" && self.0.contains(&position)
    }
}

fn index() -> KnownSites {
    KnownSites((0..500).step_by(3).collect())
}

fn accumulate(header: &ArraysHeader, records: &[VariantRecord]) -> PartialResult {
    let schema = MetricSchema::standard().unwrap();
    let index = index();
    let mut accumulator = CallingMetricAccumulator::initialize(header, &index, &schema).unwrap();
    for record in records {
        accumulator.accept(record).unwrap();
    }
    accumulator.finish().unwrap()
}

fn record_strategy() -> impl Strategy<Value = VariantRecord> {
    let genotype = prop::sample::select(vec!["0/0", "0/1", "1/1", "./.", "0|1", "1|1", "bad"]);
    (
        1u64..500,
        prop::sample::select(vec!["G", "AT", "C"]),
        prop::sample::select(vec![FilterStatus::Pass, FilterStatus::Pass, FilterStatus::Filtered, FilterStatus::ZeroedOut]),
        prop::collection::vec(genotype, SAMPLES.len()),
        prop::option::of(prop::sample::select(vec!["0/0", "0/1", "./."])),
    )
        .prop_map(|(position, alt, filter, genotypes, autocall)| VariantRecord {
            chromosome: "1".to_string(),
            position,
            reference_allele: "A".to_string(),
            alternate_alleles: vec![alt.to_string()],
            filter,
            genotypes: SAMPLES
                .iter()
                .zip(genotypes)
                .map(|(sample, gt)| SampleGenotype {
                    sample: sample.to_string(),
                    genotype: gt.to_string(),
                    autocall_genotype: autocall.map(str::to_string),
                })
                .collect(),
        })
}

proptest! {
    #[test]
    fn partitioning_and_merge_order_do_not_matter(
        records in prop::collection::vec(record_strategy(), 0..40),
        assignment in prop::collection::vec(0usize..4, 40),
        order in Just((0usize..4).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let header = header(&SAMPLES);
        let whole = accumulate(&header, &records);

        let mut shards: Vec<Vec<VariantRecord>> = vec![Vec::new(); 4];
        for (record, &shard) in records.iter().zip(&assignment) {
            shards[shard].push(record.clone());
        }
        let partials: Vec<PartialResult> = shards.iter().map(|s| accumulate(&header, s)).collect();

        let schema = MetricSchema::standard().unwrap();
        let forward = merge_all(&schema, partials.clone()).unwrap();
        let shuffled = merge_all(&schema, order.iter().map(|&i| partials[i].clone())).unwrap();

        prop_assert_eq!(&forward, &whole);
        prop_assert_eq!(&shuffled, &whole);
        prop_assert_eq!(resolve(forward, &PARAMS).unwrap(), resolve(whole, &PARAMS).unwrap());
    }

    #[test]
    fn merge_is_associative_and_commutative(
        a in prop::collection::vec(record_strategy(), 0..15),
        b in prop::collection::vec(record_strategy(), 0..15),
        c in prop::collection::vec(record_strategy(), 0..15),
    ) {
        let header = header(&SAMPLES);
        let (pa, pb, pc) = (accumulate(&header, &a), accumulate(&header, &b), accumulate(&header, &c));

        let left = merge(merge(pa.clone(), pb.clone()).unwrap(), pc.clone()).unwrap();
        let right = merge(pa.clone(), merge(pb.clone(), pc).unwrap()).unwrap();
        prop_assert_eq!(&left, &right);

        prop_assert_eq!(merge(pa.clone(), pb.clone()).unwrap(), merge(pb, pa).unwrap());
    }

    #[test]
    fn summary_equals_sum_of_samples(records in prop::collection::vec(record_strategy(), 0..30)) {
        let partial = accumulate(&header(&SAMPLES), &records);

        for field in SUMMARY_COUNTERS {
            let total: u64 = partial.samples().map(|s| s.metrics().count(field).unwrap()).sum();
            prop_assert_eq!(partial.summary().count(field).unwrap(), total, "{}", field);
        }
        prop_assert_eq!(
            partial.summary().count(NUM_ASSAYS).unwrap(),
            (records.len() * SAMPLES.len()) as u64
        );
    }
}

#[test]
fn outer_join_of_overlapping_sample_sets() {
    let record = |samples: &[&str], genotype: &str| VariantRecord {
        chromosome: "1".to_string(),
        position: 42,
        reference_allele: "A".to_string(),
        alternate_alleles: vec!["G".to_string()],
        filter: FilterStatus::Pass,
        genotypes: samples
            .iter()
            .map(|s| SampleGenotype {
                sample: s.to_string(),
                genotype: genotype.to_string(),
                autocall_genotype: None,
            })
            .collect(),
    };

    let ab = accumulate(&header(&["A", "B"]), &[record(&["A", "B"], "0/1"), record(&["A", "B"], "0/0")]);
    let bc = accumulate(&header(&["B", "C"]), &[record(&["B", "C"], "1/1")]);

    let schema = MetricSchema::standard().unwrap();
    let merged = merge_all(&schema, [ab, bc]).unwrap();
    let resolved = resolve(merged, &PARAMS).unwrap();

    let barcodes: Vec<&str> = resolved
        .samples
        .iter()
        .map(|s| s.identity.chip_well_barcode.as_str())
        .collect();
    assert_eq!(barcodes, vec!["A", "B", "C"]);

    let a = &resolved.sample("A").unwrap().record;
    let b = &resolved.sample("B").unwrap().record;
    let c = &resolved.sample("C").unwrap().record;
    assert_eq!(a.count(NUM_CALLS), Some(2));
    assert_eq!(b.count(NUM_CALLS), Some(3));
    assert_eq!(c.count(NUM_CALLS), Some(1));
    assert_eq!(b.rate(HET_HOMVAR_RATIO), Some(1.0));
    assert_eq!(b.flag(GENDER_CONCORDANCE_PF), Some(true));

    assert_eq!(resolved.summary.count(NUM_CALLS), Some(6));
    assert_eq!(resolved.summary.count(NUM_ASSAYS), Some(6));
}

#[test]
fn empty_cohort_reports_undefined_call_rate() {
    let schema = MetricSchema::standard().unwrap();
    let resolved = resolve(merge_all(&schema, Vec::<PartialResult>::new()).unwrap(), &PARAMS).unwrap();

    assert!(resolved.samples.is_empty());
    assert_eq!(resolved.summary.value(CALL_RATE).unwrap().to_string(), "?");
}

#[test]
fn classification_is_idempotent() {
    let records: Vec<VariantRecord> = (1..=10)
        .map(|p| VariantRecord {
            chromosome: "1".to_string(),
            position: p * 3,
            reference_allele: "A".to_string(),
            alternate_alleles: vec!["G".to_string()],
            filter: FilterStatus::Pass,
            genotypes: SAMPLES
                .iter()
                .map(|s| SampleGenotype {
                    sample: s.to_string(),
                    genotype: "0/1".to_string(),
                    autocall_genotype: None,
                })
                .collect(),
        })
        .collect();

    let header = header(&SAMPLES);
    assert_eq!(accumulate(&header, &records), accumulate(&header, &records));
}

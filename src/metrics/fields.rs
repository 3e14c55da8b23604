// ==============================================================================
// metrics/fields.rs - Metric Field Names and Registries
// ==============================================================================
// Description: Field names, merge policies and report column layouts
// Author: Matt Barham
// Created: 2026-09-29
// Modified: 2026-10-06
// Version: 0.2.0
// ==============================================================================

use super::policy::{FieldPolicy, PolicyRegistry};
use super::MetricsError;

// Summary-shaped counters (aggregate record and every sample record)
pub const NUM_ASSAYS: &str = "NUM_ASSAYS";
pub const NUM_NON_FILTERED_ASSAYS: &str = "NUM_NON_FILTERED_ASSAYS";
pub const NUM_FILTERED_ASSAYS: &str = "NUM_FILTERED_ASSAYS";
pub const NUM_ZEROED_OUT_ASSAYS: &str = "NUM_ZEROED_OUT_ASSAYS";
pub const NUM_SNPS: &str = "NUM_SNPS";
pub const NUM_INDELS: &str = "NUM_INDELS";
pub const NUM_CALLS: &str = "NUM_CALLS";
pub const NUM_AUTOCALL_CALLS: &str = "NUM_AUTOCALL_CALLS";
pub const NUM_NO_CALLS: &str = "NUM_NO_CALLS";
pub const NUM_IN_DB_SNP: &str = "NUM_IN_DB_SNP";
pub const NUM_SINGLETONS: &str = "NUM_SINGLETONS";

// Summary-shaped derived fields
pub const NOVEL_SNPS: &str = "NOVEL_SNPS";
pub const PCT_DBSNP: &str = "PCT_DBSNP";
pub const CALL_RATE: &str = "CALL_RATE";
pub const AUTOCALL_CALL_RATE: &str = "AUTOCALL_CALL_RATE";

// Sample identity
pub const CHIP_WELL_BARCODE: &str = "CHIP_WELL_BARCODE";
pub const SAMPLE_ALIAS: &str = "SAMPLE_ALIAS";
pub const ANALYSIS_VERSION: &str = "ANALYSIS_VERSION";
pub const CHIP_TYPE: &str = "CHIP_TYPE";

// Sample attributes from the header
pub const AUTOCALL_DATE: &str = "AUTOCALL_DATE";
pub const IMAGING_DATE: &str = "IMAGING_DATE";
pub const GTC_CALL_RATE: &str = "GTC_CALL_RATE";
pub const AUTOCALL_GENDER: &str = "AUTOCALL_GENDER";
pub const FP_GENDER: &str = "FP_GENDER";
pub const REPORTED_GENDER: &str = "REPORTED_GENDER";
pub const CLUSTER_FILE_NAME: &str = "CLUSTER_FILE_NAME";
pub const P95_GREEN: &str = "P95_GREEN";
pub const P95_RED: &str = "P95_RED";
pub const AUTOCALL_VERSION: &str = "AUTOCALL_VERSION";
pub const ZCALL_VERSION: &str = "ZCALL_VERSION";
pub const EXTENDED_MANIFEST_VERSION: &str = "EXTENDED_MANIFEST_VERSION";
pub const SCANNER_NAME: &str = "SCANNER_NAME";
pub const PIPELINE_VERSION: &str = "PIPELINE_VERSION";

// Hidden: merged but never written to reports
pub const ZCALL_THRESHOLDS_FILE: &str = "ZCALL_THRESHOLDS_FILE";
pub const NUM_HETS: &str = "NUM_HETS";
pub const NUM_HOM_VAR: &str = "NUM_HOM_VAR";

// Sample-only derived fields
pub const AUTOCALL_PF: &str = "AUTOCALL_PF";
pub const IS_ZCALLED: &str = "IS_ZCALLED";
pub const HET_PCT: &str = "HET_PCT";
pub const HET_HOMVAR_RATIO: &str = "HET_HOMVAR_RATIO";
pub const GENDER_CONCORDANCE_PF: &str = "GENDER_CONCORDANCE_PF";

pub const SUMMARY_COUNTERS: &[&str] = &[
    NUM_ASSAYS,
    NUM_NON_FILTERED_ASSAYS,
    NUM_FILTERED_ASSAYS,
    NUM_ZEROED_OUT_ASSAYS,
    NUM_SNPS,
    NUM_INDELS,
    NUM_CALLS,
    NUM_AUTOCALL_CALLS,
    NUM_NO_CALLS,
    NUM_IN_DB_SNP,
    NUM_SINGLETONS,
];

pub const SUMMARY_DERIVED: &[&str] = &[NOVEL_SNPS, PCT_DBSNP, CALL_RATE, AUTOCALL_CALL_RATE];

pub const SAMPLE_INVARIANTS: &[&str] = &[
    CHIP_WELL_BARCODE,
    SAMPLE_ALIAS,
    ANALYSIS_VERSION,
    CHIP_TYPE,
    AUTOCALL_DATE,
    IMAGING_DATE,
    GTC_CALL_RATE,
    AUTOCALL_GENDER,
    FP_GENDER,
    REPORTED_GENDER,
    CLUSTER_FILE_NAME,
    P95_GREEN,
    P95_RED,
    AUTOCALL_VERSION,
    ZCALL_VERSION,
    EXTENDED_MANIFEST_VERSION,
    SCANNER_NAME,
    PIPELINE_VERSION,
    ZCALL_THRESHOLDS_FILE,
];

pub const SAMPLE_COUNTERS: &[&str] = &[NUM_HETS, NUM_HOM_VAR];

pub const SAMPLE_DERIVED: &[&str] = &[
    HET_PCT,
    HET_HOMVAR_RATIO,
    GENDER_CONCORDANCE_PF,
    IS_ZCALLED,
    AUTOCALL_PF,
];

/// Column order of the summary report
pub const SUMMARY_COLUMNS: &[&str] = &[
    NUM_ASSAYS,
    NUM_NON_FILTERED_ASSAYS,
    NUM_FILTERED_ASSAYS,
    NUM_ZEROED_OUT_ASSAYS,
    NUM_SNPS,
    NUM_INDELS,
    NUM_CALLS,
    NUM_AUTOCALL_CALLS,
    NUM_NO_CALLS,
    NUM_IN_DB_SNP,
    NOVEL_SNPS,
    PCT_DBSNP,
    CALL_RATE,
    AUTOCALL_CALL_RATE,
    NUM_SINGLETONS,
];

/// Column order of the per-sample detail report
pub const DETAIL_COLUMNS: &[&str] = &[
    CHIP_WELL_BARCODE,
    SAMPLE_ALIAS,
    ANALYSIS_VERSION,
    CHIP_TYPE,
    AUTOCALL_PF,
    AUTOCALL_DATE,
    IMAGING_DATE,
    IS_ZCALLED,
    GTC_CALL_RATE,
    AUTOCALL_GENDER,
    FP_GENDER,
    REPORTED_GENDER,
    GENDER_CONCORDANCE_PF,
    HET_PCT,
    CLUSTER_FILE_NAME,
    P95_GREEN,
    P95_RED,
    AUTOCALL_VERSION,
    ZCALL_VERSION,
    EXTENDED_MANIFEST_VERSION,
    HET_HOMVAR_RATIO,
    SCANNER_NAME,
    PIPELINE_VERSION,
    NUM_ASSAYS,
    NUM_NON_FILTERED_ASSAYS,
    NUM_FILTERED_ASSAYS,
    NUM_ZEROED_OUT_ASSAYS,
    NUM_SNPS,
    NUM_INDELS,
    NUM_CALLS,
    NUM_AUTOCALL_CALLS,
    NUM_NO_CALLS,
    NUM_IN_DB_SNP,
    NOVEL_SNPS,
    PCT_DBSNP,
    CALL_RATE,
    AUTOCALL_CALL_RATE,
    NUM_SINGLETONS,
];

pub const CONTROL_COLUMNS: &[&str] = &["CONTROL", "CATEGORY", "RED", "GREEN"];

pub fn summary_registry() -> Result<PolicyRegistry, MetricsError> {
    PolicyRegistry::builder("summary")
        .fields(SUMMARY_COUNTERS, FieldPolicy::Sum)
        .fields(SUMMARY_DERIVED, FieldPolicy::Derived)
        .build()
}

pub fn sample_registry() -> Result<PolicyRegistry, MetricsError> {
    PolicyRegistry::builder("sample")
        .fields(SAMPLE_INVARIANTS, FieldPolicy::AssertEqual)
        .fields(SAMPLE_COUNTERS, FieldPolicy::Sum)
        .fields(SAMPLE_DERIVED, FieldPolicy::Derived)
        .build()
}

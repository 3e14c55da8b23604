// ==============================================================================
// models.rs - Variant and Sample Data Models
// ==============================================================================
// Description: Read-only input records and sample identity for arrays metrics
// Author: Matt Barham
// Created: 2026-09-28
// Modified: 2026-10-16
// Version: 0.3.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// VCF filter applied to assays Illumina removed at chip design time
pub const ZEROED_OUT_ASSAY_FILTER: &str = "ZEROED_OUT_ASSAY";

/// Filter status of one assay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterStatus {
    /// PASS or no filter applied
    Pass,
    /// Filtered for any reason other than zeroing out
    Filtered,
    /// Zeroed out at design time (also counts as filtered)
    ZeroedOut,
}

impl FilterStatus {
    /// Classify from the record's FILTER column values
    ///
    /// An empty list, `.` and `PASS` all mean the assay passed.
    pub fn from_filters<'a, I>(filters: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut status = FilterStatus::Pass;

        for filter in filters {
            match filter {
                "" | "." | "PASS" => {}
                ZEROED_OUT_ASSAY_FILTER => return FilterStatus::ZeroedOut,
                _ => status = FilterStatus::Filtered,
            }
        }

        status
    }

    pub fn is_filtered(&self) -> bool {
        !matches!(self, FilterStatus::Pass)
    }
}

/// Site type used for counting and reference lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    /// Bi-allelic single-base substitution
    Snp,
    /// REF and ALT lengths differ
    Indel,
    /// MNPs, multi-allelic substitutions, symbolic alleles
    Other,
}

impl VariantKind {
    pub fn classify(reference_allele: &str, alternate_alleles: &[String]) -> Self {
        let alts: Vec<&str> = alternate_alleles
            .iter()
            .map(String::as_str)
            .filter(|alt| !alt.is_empty() && *alt != ".")
            .collect();

        if alts.is_empty() || alts.iter().any(|alt| alt.starts_with('<') || alt.contains('[') || alt.contains(']')) {
            return VariantKind::Other;
        }

        if alts.len() == 1 && reference_allele.len() == 1 && alts[0].len() == 1 {
            return VariantKind::Snp;
        }

        if alts.iter().any(|alt| alt.len() != reference_allele.len()) {
            return VariantKind::Indel;
        }

        VariantKind::Other
    }
}

/// One sample's genotype at a variant, as read from the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleGenotype {
    /// Sample column name (the chip well barcode)
    pub sample: String,

    /// Raw GT value (e.g., "0/1", "./.")
    pub genotype: String,

    /// Raw autocall GTA value, when the file carries one
    pub autocall_genotype: Option<String>,
}

/// Variant record handed to accumulators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Contig name as written in the file (e.g., "1", "chrX")
    pub chromosome: String,

    /// 1-based position
    pub position: u64,

    pub reference_allele: String,

    pub alternate_alleles: Vec<String>,

    pub filter: FilterStatus,

    /// Genotypes in sample-column order
    pub genotypes: Vec<SampleGenotype>,
}

impl VariantRecord {
    pub fn kind(&self) -> VariantKind {
        VariantKind::classify(&self.reference_allele, &self.alternate_alleles)
    }
}

/// Merge key for per-sample metrics
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleIdentity {
    pub chip_well_barcode: String,
    pub sample_alias: String,
    pub analysis_version: i64,
    pub chip_type: String,
}

impl fmt::Display for SampleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, v{}, {})",
            self.chip_well_barcode, self.sample_alias, self.analysis_version, self.chip_type
        )
    }
}

/// Sex classification used for concordance checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Unknown,
    NotReported,
}

impl Sex {
    pub const ALL: [Sex; 4] = [Sex::Male, Sex::Female, Sex::Unknown, Sex::NotReported];

    /// Normalize a free-text sex label
    ///
    /// Missing or blank labels are `NotReported`; anything unrecognized is
    /// `Unknown`.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
            return Sex::NotReported;
        };

        match label.to_ascii_lowercase().as_str() {
            "m" | "male" => Sex::Male,
            "f" | "female" => Sex::Female,
            "n" | "notreported" | "not_reported" | "not reported" => Sex::NotReported,
            _ => Sex::Unknown,
        }
    }
}

/// Static control intensity read from the VCF header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub control: String,
    pub category: String,
    pub red: i32,
    pub green: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_status() {
        assert_eq!(FilterStatus::from_filters(Vec::<&str>::new()), FilterStatus::Pass);
        assert_eq!(FilterStatus::from_filters(["PASS"]), FilterStatus::Pass);
        assert_eq!(FilterStatus::from_filters(["DUPE"]), FilterStatus::Filtered);
        assert_eq!(
            FilterStatus::from_filters(["DUPE", ZEROED_OUT_ASSAY_FILTER]),
            FilterStatus::ZeroedOut
        );
        assert!(FilterStatus::ZeroedOut.is_filtered());
        assert!(!FilterStatus::Pass.is_filtered());
    }

    #[test]
    fn test_variant_kind() {
        let alts = |a: &[&str]| a.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(VariantKind::classify("A", &alts(&["G"])), VariantKind::Snp);
        assert_eq!(VariantKind::classify("A", &alts(&["AT"])), VariantKind::Indel);
        assert_eq!(VariantKind::classify("AT", &alts(&["A"])), VariantKind::Indel);
        assert_eq!(VariantKind::classify("A", &alts(&["G", "T"])), VariantKind::Other);
        assert_eq!(VariantKind::classify("AC", &alts(&["GT"])), VariantKind::Other);
        assert_eq!(VariantKind::classify("A", &alts(&["."])), VariantKind::Other);
        assert_eq!(VariantKind::classify("A", &alts(&["<DEL>"])), VariantKind::Other);
    }

    #[test]
    fn test_sex_from_label() {
        assert_eq!(Sex::from_label(Some("Female")), Sex::Female);
        assert_eq!(Sex::from_label(Some("M")), Sex::Male);
        assert_eq!(Sex::from_label(Some("  ")), Sex::NotReported);
        assert_eq!(Sex::from_label(None), Sex::NotReported);
        assert_eq!(Sex::from_label(Some("NotReported")), Sex::NotReported);
        assert_eq!(Sex::from_label(Some("U")), Sex::Unknown);
        assert_eq!(Sex::from_label(Some("ambiguous")), Sex::Unknown);
    }
}

// ==============================================================================
// parsers/header.rs - Arrays VCF Header Metadata
// ==============================================================================
// Description: Sample identity, sample attributes and control intensities
//              taken from the unstructured ##key=value lines of an arrays VCF
// Author: Matt Barham
// Created: 2026-10-02
// Modified: 2026-10-13
// Version: 0.2.0
// ==============================================================================
// Header lines used (as written by GtcToVcf-style converters):
//   ##sampleAlias=NA12878
//   ##analysisVersionNumber=1
//   ##chipType=GSA-24v3-0_A1
//   ##autocallDate=2026-03-04T11:22:00
//   ##DNP(High)=DNP(High)|Staining|1234|5678
// ==============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::metrics::fields;
use crate::metrics::FieldValue;
use crate::models::{ControlInfo, SampleIdentity};
use crate::reference_index::SequenceDictionary;

pub const SAMPLE_ALIAS_KEY: &str = "sampleAlias";
pub const ANALYSIS_VERSION_KEY: &str = "analysisVersionNumber";
pub const CHIP_TYPE_KEY: &str = "chipType";

/// Infinium control probes and their report category
pub const CONTROL_PROBES: &[(&str, &str)] = &[
    ("DNP(High)", "Staining"),
    ("DNP(Bgnd)", "Staining"),
    ("Biotin(High)", "Staining"),
    ("Biotin(Bgnd)", "Staining"),
    ("Extension(A)", "Extension"),
    ("Extension(T)", "Extension"),
    ("Extension(C)", "Extension"),
    ("Extension(G)", "Extension"),
    ("Target Removal", "Target Removal"),
    ("Hyb(High)", "Hybridization"),
    ("Hyb(Medium)", "Hybridization"),
    ("Hyb(Low)", "Hybridization"),
    ("String(PM)", "Stringency"),
    ("String(MM)", "Stringency"),
    ("NSB(Bgnd)Red", "Non-Specific Binding"),
    ("NSB(Bgnd)Purple", "Non-Specific Binding"),
    ("NSB(Bgnd)Blue", "Non-Specific Binding"),
    ("NSB(Bgnd)Green", "Non-Specific Binding"),
    ("NP(A)", "Non-Polymorphic"),
    ("NP(T)", "Non-Polymorphic"),
    ("NP(C)", "Non-Polymorphic"),
    ("NP(G)", "Non-Polymorphic"),
    ("Restore", "Restoration"),
];

#[derive(Debug, Clone, Copy)]
enum AttributeKind {
    Text,
    Integer,
    Real,
    Timestamp,
}

/// Header key → sample field
const SAMPLE_ATTRIBUTES: &[(&str, &str, AttributeKind)] = &[
    ("autocallDate", fields::AUTOCALL_DATE, AttributeKind::Timestamp),
    ("imagingDate", fields::IMAGING_DATE, AttributeKind::Timestamp),
    ("gtcCallRate", fields::GTC_CALL_RATE, AttributeKind::Real),
    ("autocallGender", fields::AUTOCALL_GENDER, AttributeKind::Text),
    ("fingerprintGender", fields::FP_GENDER, AttributeKind::Text),
    ("reportedGender", fields::REPORTED_GENDER, AttributeKind::Text),
    ("clusterFile", fields::CLUSTER_FILE_NAME, AttributeKind::Text),
    ("p95Green", fields::P95_GREEN, AttributeKind::Integer),
    ("p95Red", fields::P95_RED, AttributeKind::Integer),
    ("autocallVersion", fields::AUTOCALL_VERSION, AttributeKind::Text),
    ("zcallVersion", fields::ZCALL_VERSION, AttributeKind::Text),
    ("extendedIlluminaManifestVersion", fields::EXTENDED_MANIFEST_VERSION, AttributeKind::Text),
    ("scannerName", fields::SCANNER_NAME, AttributeKind::Text),
    ("arraysVersion", fields::PIPELINE_VERSION, AttributeKind::Text),
    ("zcallThresholds", fields::ZCALL_THRESHOLDS_FILE, AttributeKind::Text),
];

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %I:%M %p", "%m/%d/%Y %H:%M"];

/// Header metadata errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeaderError {
    #[error("Input VCF file is missing header line of type '{0}'")]
    MissingControl(String),

    #[error("Malformed control header line '{key}': {value}")]
    InvalidControl { key: String, value: String },

    #[error("Invalid value for header line '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("Sample '{0}' is not present in the VCF header")]
    UnknownSample(String),
}

/// Header information needed by accumulators
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArraysHeader {
    sample_names: Vec<String>,
    metadata: BTreeMap<String, String>,
    contigs: Vec<(String, Option<usize>)>,
}

impl ArraysHeader {
    pub fn new(sample_names: Vec<String>) -> Self {
        Self {
            sample_names,
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_metadata(key, value);
        self
    }

    pub fn with_contig(mut self, name: impl Into<String>, length: Option<usize>) -> Self {
        self.contigs.push((name.into(), length));
        self
    }

    /// First value wins, matching how VCF readers expose repeated keys
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Contigs in header order
    pub fn contigs(&self) -> &[(String, Option<usize>)] {
        &self.contigs
    }

    pub fn contig_index(&self, name: &str) -> Option<usize> {
        self.contigs.iter().position(|(contig, _)| contig == name)
    }

    pub fn sequence_dictionary(&self) -> SequenceDictionary {
        self.contigs
            .iter()
            .filter_map(|(name, length)| length.map(|l| (name.clone(), l)))
            .collect()
    }

    /// Merge key for a sample column
    ///
    /// The column name is the chip well barcode. Alias falls back to the
    /// barcode, analysis version to 1 and chip type to an empty string.
    pub fn sample_identity(&self, sample: &str) -> Result<SampleIdentity, HeaderError> {
        if !self.sample_names.iter().any(|s| s == sample) {
            return Err(HeaderError::UnknownSample(sample.to_string()));
        }

        let analysis_version = match self.metadata(ANALYSIS_VERSION_KEY) {
            Some(raw) => raw.parse::<i64>().map_err(|_| HeaderError::InvalidValue {
                key: ANALYSIS_VERSION_KEY.to_string(),
                value: raw.to_string(),
            })?,
            None => 1,
        };

        Ok(SampleIdentity {
            chip_well_barcode: sample.to_string(),
            sample_alias: self.metadata(SAMPLE_ALIAS_KEY).unwrap_or(sample).to_string(),
            analysis_version,
            chip_type: self.metadata(CHIP_TYPE_KEY).unwrap_or_default().to_string(),
        })
    }

    /// Invariant sample fields present in the header
    pub fn sample_attributes(&self) -> Result<Vec<(&'static str, FieldValue)>, HeaderError> {
        let mut attributes = Vec::new();

        for &(key, field, kind) in SAMPLE_ATTRIBUTES {
            let Some(raw) = self.metadata(key) else {
                continue;
            };

            let invalid = || HeaderError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
            };

            let value = match kind {
                AttributeKind::Text => FieldValue::Text(raw.to_string()),
                AttributeKind::Integer => FieldValue::Integer(raw.parse().map_err(|_| invalid())?),
                AttributeKind::Real => FieldValue::Real(raw.parse().map_err(|_| invalid())?),
                AttributeKind::Timestamp => parse_timestamp(raw)
                    .map(FieldValue::Timestamp)
                    .unwrap_or_else(|| FieldValue::Text(raw.to_string())),
            };

            attributes.push((field, value));
        }

        Ok(attributes)
    }

    /// Control intensities, one per known probe, in probe order
    pub fn control_infos(&self) -> Result<Vec<ControlInfo>, HeaderError> {
        CONTROL_PROBES
            .iter()
            .map(|&(control, _)| {
                let raw = self
                    .metadata(control)
                    .ok_or_else(|| HeaderError::MissingControl(control.to_string()))?;
                parse_control(control, raw)
            })
            .collect()
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse `control|category|red|green`
pub fn parse_control(key: &str, raw: &str) -> Result<ControlInfo, HeaderError> {
    let invalid = || HeaderError::InvalidControl {
        key: key.to_string(),
        value: raw.to_string(),
    };

    let tokens: Vec<&str> = raw.split('|').map(str::trim).collect();
    if tokens.len() != 4 {
        return Err(invalid());
    }

    Ok(ControlInfo {
        control: tokens[0].to_string(),
        category: tokens[1].to_string(),
        red: tokens[2].parse().map_err(|_| invalid())?,
        green: tokens[3].parse().map_err(|_| invalid())?,
    })
}

// ==============================================================================
// genotype.rs - Genotype Call Classification
// ==============================================================================
// Description: Classifies raw VCF genotype strings into call categories
// Author: Matt Barham
// Created: 2026-09-29
// Modified: 2026-10-02
// Version: 0.2.0
// ==============================================================================
// Algorithm:
//   Split GT on '/' or '|' into allele indices:
//   - any '.' allele            → NoCall
//   - all alleles == 0          → HomRef
//   - all alleles equal, != 0   → HomVar
//   - otherwise                 → Het
//   Anything that does not parse (empty, letters, stray separators) is
//   reported as an error by `parse_genotype`; `classify_genotype` downgrades
//   it to NoCall.
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while parsing a genotype string
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenotypeParseError {
    #[error("Empty genotype")]
    Empty,

    #[error("Invalid allele '{allele}' in genotype '{genotype}'")]
    InvalidAllele { genotype: String, allele: String },
}

/// Call category of one sample at one assay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenotypeCall {
    NoCall,
    HomRef,
    Het,
    HomVar,
}

impl GenotypeCall {
    pub fn is_called(&self) -> bool {
        !matches!(self, GenotypeCall::NoCall)
    }

    /// Called and carrying at least one non-reference allele
    pub fn is_variant(&self) -> bool {
        matches!(self, GenotypeCall::Het | GenotypeCall::HomVar)
    }
}

/// Parse a GT string strictly
///
/// # Examples
/// ```
/// use arrays_metrics::genotype::{parse_genotype, GenotypeCall};
///
/// assert_eq!(parse_genotype("0/1").unwrap(), GenotypeCall::Het);
/// assert_eq!(parse_genotype("1|1").unwrap(), GenotypeCall::HomVar);
/// assert_eq!(parse_genotype("./.").unwrap(), GenotypeCall::NoCall);
/// assert!(parse_genotype("A/G").is_err());
/// ```
pub fn parse_genotype(genotype: &str) -> Result<GenotypeCall, GenotypeParseError> {
    let genotype = genotype.trim();
    if genotype.is_empty() {
        return Err(GenotypeParseError::Empty);
    }

    let mut alleles = Vec::with_capacity(2);
    let mut missing = false;

    for allele in genotype.split(['/', '|']) {
        match allele {
            "." => missing = true,
            _ => {
                let index = allele.parse::<u32>().map_err(|_| GenotypeParseError::InvalidAllele {
                    genotype: genotype.to_string(),
                    allele: allele.to_string(),
                })?;
                alleles.push(index);
            }
        }
    }

    if missing {
        return Ok(GenotypeCall::NoCall);
    }

    let first = alleles[0];
    if alleles.iter().all(|&a| a == first) {
        if first == 0 {
            Ok(GenotypeCall::HomRef)
        } else {
            Ok(GenotypeCall::HomVar)
        }
    } else {
        Ok(GenotypeCall::Het)
    }
}

/// Classify a GT string, treating anything malformed as a no-call
pub fn classify_genotype(genotype: &str) -> GenotypeCall {
    parse_genotype(genotype).unwrap_or(GenotypeCall::NoCall)
}

// ==============================================================================
// reference_index.rs - dbSNP Membership Index
// ==============================================================================
// Description: Per-contig SNP and indel bitsets loaded from a dbSNP VCF
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-16
// Version: 2.0.0
// ==============================================================================
// Layout:
//   contig → { snps: Vec<u64>, indels: Vec<u64> }, bit i = 1-based position i
// Indel sites mark the deleted bases after the anchor; insertions mark the
// anchor base. Built once before workers start, then only read.
// ==============================================================================

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::metrics::MembershipIndex;
use crate::models::VariantKind;
use crate::parsers::vcf::{ShardSpec, VariantSource, VcfSource, VcfSourceError};

/// dbSNP loading errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Sequence dictionary is empty: {0}")]
    EmptyDictionary(String),

    #[error("Failed to read dbSNP file: {0}")]
    Source(#[from] VcfSourceError),
}

/// Contig names and lengths, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceDictionary {
    contigs: Vec<(String, usize)>,
}

impl SequenceDictionary {
    /// Read `##contig` lines from a VCF header
    pub fn from_vcf(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let dictionary = VcfSource::open(path)?.header().sequence_dictionary();

        if dictionary.is_empty() {
            return Err(IndexError::EmptyDictionary(path.display().to_string()));
        }
        Ok(dictionary)
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.contigs.iter().map(|(name, length)| (name.as_str(), *length))
    }
}

impl FromIterator<(String, usize)> for SequenceDictionary {
    fn from_iter<T: IntoIterator<Item = (String, usize)>>(iter: T) -> Self {
        Self {
            contigs: iter.into_iter().collect(),
        }
    }
}

/// Fixed-size bitset over 1-based positions
#[derive(Debug, Clone)]
struct PositionBits {
    words: Vec<u64>,
    length: usize,
}

impl PositionBits {
    fn new(length: usize) -> Self {
        Self {
            words: vec![0; length / 64 + 1],
            length,
        }
    }

    /// Returns false when the position is off the end of the contig
    fn set(&mut self, position: u64) -> bool {
        let Ok(i) = usize::try_from(position) else {
            return false;
        };
        if i == 0 || i > self.length {
            return false;
        }
        self.words[i / 64] |= 1 << (i % 64);
        true
    }

    fn get(&self, position: u64) -> bool {
        usize::try_from(position)
            .ok()
            .and_then(|i| self.words.get(i / 64).map(|w| w & (1 << (i % 64)) != 0))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
struct ContigBits {
    snps: PositionBits,
    indels: PositionBits,
}

/// Known SNP and indel sites
#[derive(Debug, Clone, Default)]
pub struct DbSnpIndex {
    contigs: HashMap<String, ContigBits>,
    snp_count: u64,
    indel_count: u64,
}

impl DbSnpIndex {
    /// Empty index with one zeroed bitset pair per dictionary contig
    pub fn new(dictionary: &SequenceDictionary) -> Self {
        let contigs = dictionary
            .iter()
            .map(|(name, length)| {
                (
                    name.to_string(),
                    ContigBits {
                        snps: PositionBits::new(length),
                        indels: PositionBits::new(length),
                    },
                )
            })
            .collect();

        Self {
            contigs,
            snp_count: 0,
            indel_count: 0,
        }
    }

    /// Load every site of a dbSNP VCF (.vcf or .vcf.gz)
    pub fn build(path: impl AsRef<Path>, dictionary: &SequenceDictionary) -> Result<Self, IndexError> {
        let path = path.as_ref();
        info!("Loading dbSNP sites from {:?}", path);

        let source = VcfSource::open(path)?;
        let mut index = Self::new(dictionary);
        let mut skipped = 0u64;

        for record in source.records(ShardSpec::whole())? {
            let record = record?;
            if !index.insert(&record.chromosome, record.position, &record.reference_allele, &record.alternate_alleles) {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!("{} dbSNP sites fall outside the sequence dictionary and were skipped", skipped);
        }
        info!(
            "Loaded dbSNP index: {} SNP sites, {} indel sites",
            index.snp_count, index.indel_count
        );

        Ok(index)
    }

    /// Record one site; returns false if the contig or position is unknown
    ///
    /// A multi-allelic site may be both a SNP and an indel.
    pub fn insert(&mut self, chromosome: &str, position: u64, reference: &str, alternates: &[String]) -> bool {
        let Some(bits) = self.contigs.get_mut(chromosome) else {
            return false;
        };

        let alts = alternates.iter().filter(|a| !a.is_empty() && *a != "." && !a.starts_with('<'));
        let mut is_snp = false;
        let mut is_indel = false;
        for alt in alts {
            if alt.len() == 1 && reference.len() == 1 {
                is_snp = true;
            } else if alt.len() != reference.len() {
                is_indel = true;
            }
        }

        let mut stored = false;
        if is_snp && bits.snps.set(position) {
            self.snp_count += 1;
            stored = true;
        }
        if is_indel {
            let span = reference.len().saturating_sub(1) as u64;
            let (start, end) = if span == 0 {
                (position, position)
            } else {
                (position + 1, position + span)
            };
            let mut any = false;
            for p in start..=end {
                any |= bits.indels.set(p);
            }
            if any {
                self.indel_count += 1;
                stored = true;
            }
        }

        stored || !(is_snp || is_indel)
    }
}

impl MembershipIndex for DbSnpIndex {
    fn contains(&self, chromosome: &str, position: u64, kind: VariantKind) -> bool {
        let Some(bits) = self.contigs.get(chromosome) else {
            return false;
        };

        match kind {
            VariantKind::Snp => bits.snps.get(position),
            VariantKind::Indel => bits.indels.get(position),
            VariantKind::Other => false,
        }
    }
}

// ==============================================================================
// parsers/vcf.rs - Arrays VCF Variant Source
// ==============================================================================
// Description: Sharded variant record sources backed by noodles-vcf or memory
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-14
// Version: 2.0.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// - noodles-vcf: https://docs.rs/noodles-vcf/0.81.0/noodles_vcf/
// ==============================================================================
// Sharding:
//   A record belongs to shard (contig header index % shard count). Contigs
//   missing from the header are placed by a stable hash of their name.
//   Each worker opens its own reader and skips records of other shards.
// ==============================================================================

use noodles_vcf as vcf;
use noodles_vcf::header::record::value::Collection;
use noodles_vcf::variant::record::AlternateBases;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{FilterStatus, SampleGenotype, VariantRecord};
use crate::parsers::header::ArraysHeader;

const GENOTYPE_KEY: &str = "GT";
const AUTOCALL_GENOTYPE_KEY: &str = "GTA";

/// Variant source errors
#[derive(Error, Debug)]
pub enum VcfSourceError {
    #[error("Failed to open VCF file: {0}")]
    FileOpenError(String),

    #[error("Failed to read VCF header: {0}")]
    HeaderError(String),

    #[error("Failed to parse VCF record at {location}: {message}")]
    RecordError { location: String, message: String },

    #[error("Invalid shard {index} of {count}")]
    InvalidShard { index: usize, count: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One worker's slice of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub index: usize,
    pub count: usize,
}

impl ShardSpec {
    pub fn new(index: usize, count: usize) -> Result<Self, VcfSourceError> {
        if count == 0 || index >= count {
            return Err(VcfSourceError::InvalidShard { index, count });
        }
        Ok(Self { index, count })
    }

    /// A single shard covering everything
    pub fn whole() -> Self {
        Self { index: 0, count: 1 }
    }

    pub fn all(count: usize) -> Vec<ShardSpec> {
        (0..count).map(|index| ShardSpec { index, count }).collect()
    }

    /// Whether this shard owns records on `contig`
    pub fn owns_contig(&self, header: &ArraysHeader, contig: &str) -> bool {
        let slot = match header.contig_index(contig) {
            Some(i) => i,
            None => stable_hash(contig) as usize,
        };
        slot % self.count == self.index
    }
}

/// FNV-1a; stable across runs and platforms
fn stable_hash(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<VariantRecord, VcfSourceError>> + 'a>;

/// Anything that can hand out the records of one shard
///
/// Implementations are shared read-only across worker threads. Together the
/// shards `0..count` yield every record exactly once.
pub trait VariantSource: Sync {
    fn header(&self) -> &ArraysHeader;

    fn records(&self, shard: ShardSpec) -> Result<RecordIter<'_>, VcfSourceError>;
}

/// Arrays VCF on disk (.vcf or .vcf.gz)
#[derive(Debug)]
pub struct VcfSource {
    path: PathBuf,
    header: ArraysHeader,
}

impl VcfSource {
    /// Open the file once to read its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VcfSourceError> {
        let path = path.as_ref().to_path_buf();
        let (_, header) = open_reader(&path)?;

        Ok(Self {
            header: arrays_header(&header),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VariantSource for VcfSource {
    fn header(&self) -> &ArraysHeader {
        &self.header
    }

    fn records(&self, shard: ShardSpec) -> Result<RecordIter<'_>, VcfSourceError> {
        let (reader, _) = open_reader(&self.path)?;

        Ok(Box::new(ShardRecords {
            reader,
            header: &self.header,
            shard,
            record: vcf::Record::default(),
            line: 0,
            done: false,
        }))
    }
}

fn open_reader(path: &Path) -> Result<(vcf::io::Reader<Box<dyn BufRead>>, vcf::Header), VcfSourceError> {
    let mut reader = vcf::io::reader::Builder::default()
        .build_from_path(path)
        .map_err(|e| VcfSourceError::FileOpenError(format!("{}: {}", path.display(), e)))?;

    let header = reader
        .read_header()
        .map_err(|e| VcfSourceError::HeaderError(format!("{}: {}", path.display(), e)))?;

    Ok((reader, header))
}

/// Pull sample names, contigs and ##key=value metadata out of a VCF header
pub fn arrays_header(header: &vcf::Header) -> ArraysHeader {
    let mut arrays = ArraysHeader::new(header.sample_names().iter().cloned().collect());

    for (name, contig) in header.contigs() {
        arrays = arrays.with_contig(name.clone(), contig.length());
    }

    for (key, collection) in header.other_records() {
        if let Collection::Unstructured(values) = collection {
            if let Some(value) = values.first() {
                let key: &str = key.as_ref();
                arrays.insert_metadata(key, value.clone());
            }
        }
    }

    arrays
}

/// Streaming reader over one shard of a VCF file
struct ShardRecords<'a> {
    reader: vcf::io::Reader<Box<dyn BufRead>>,
    header: &'a ArraysHeader,
    shard: ShardSpec,
    record: vcf::Record,
    line: usize,
    done: bool,
}

impl ShardRecords<'_> {
    fn convert(&self) -> Result<VariantRecord, VcfSourceError> {
        let record = &self.record;
        let chromosome = record.reference_sequence_name().to_string();

        let error = |message: String| VcfSourceError::RecordError {
            location: format!("record {} ({})", self.line, chromosome),
            message,
        };

        let position = match record.variant_start() {
            Some(Ok(pos)) => usize::from(pos) as u64,
            Some(Err(e)) => return Err(error(format!("Failed to get position: {}", e))),
            None => return Err(error("Missing position".to_string())),
        };

        let reference_bases = record.reference_bases();
        let reference_allele: &str = reference_bases.as_ref();

        let mut alternate_alleles = Vec::new();
        for alt in record.alternate_bases().iter() {
            let alt = alt.map_err(|e| error(format!("Failed to get ALT allele: {}", e)))?;
            alternate_alleles.push(alt.to_string());
        }

        let filters = record.filters();
        let filters: &str = filters.as_ref();
        let samples = record.samples();
        let samples: &str = samples.as_ref();

        let genotypes = parse_sample_columns(samples, self.header.sample_names()).map_err(error)?;

        Ok(VariantRecord {
            chromosome,
            position,
            reference_allele: reference_allele.to_string(),
            alternate_alleles,
            filter: FilterStatus::from_filters(filters.split(';')),
            genotypes,
        })
    }
}

impl Iterator for ShardRecords<'_> {
    type Item = Result<VariantRecord, VcfSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.reader.read_record(&mut self.record) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    if self
                        .shard
                        .owns_contig(self.header, self.record.reference_sequence_name())
                    {
                        return Some(self.convert());
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(VcfSourceError::IoError(e)));
                }
            }
        }
        None
    }
}

/// Split the raw FORMAT + sample columns into per-sample genotypes
///
/// Samples without a GT value (short column, or GT absent from FORMAT) are
/// reported with a `.` genotype.
pub fn parse_sample_columns(raw: &str, sample_names: &[String]) -> Result<Vec<SampleGenotype>, String> {
    if sample_names.is_empty() || raw.is_empty() {
        return Ok(Vec::new());
    }

    let mut columns = raw.split('\t');
    let format: Vec<&str> = columns.next().unwrap_or_default().split(':').collect();
    let gt_index = format.iter().position(|&k| k == GENOTYPE_KEY);
    let gta_index = format.iter().position(|&k| k == AUTOCALL_GENOTYPE_KEY);

    let values: Vec<&str> = columns.collect();
    if values.len() != sample_names.len() {
        return Err(format!(
            "Expected {} sample columns, found {}",
            sample_names.len(),
            values.len()
        ));
    }

    Ok(sample_names
        .iter()
        .zip(values)
        .map(|(name, column)| {
            let fields: Vec<&str> = column.split(':').collect();
            let pick = |index: Option<usize>| index.and_then(|i| fields.get(i).copied());

            SampleGenotype {
                sample: name.clone(),
                genotype: pick(gt_index).unwrap_or(".").to_string(),
                autocall_genotype: pick(gta_index).map(str::to_string),
            }
        })
        .collect())
}

/// Records held in memory, mostly for tests and small panels
///
/// Shards split the record list round-robin by position in the list.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    header: ArraysHeader,
    records: Vec<VariantRecord>,
}

impl InMemorySource {
    pub fn new(header: ArraysHeader, records: Vec<VariantRecord>) -> Self {
        Self { header, records }
    }
}

impl VariantSource for InMemorySource {
    fn header(&self) -> &ArraysHeader {
        &self.header
    }

    fn records(&self, shard: ShardSpec) -> Result<RecordIter<'_>, VcfSourceError> {
        Ok(Box::new(
            self.records
                .iter()
                .enumerate()
                .filter(move |(i, _)| i % shard.count == shard.index)
                .map(|(_, record)| Ok(record.clone())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_sample_columns() {
        let genotypes = parse_sample_columns("GT:GTA:IGC\t0/1:0/0:0.9\t./.:1/1:0.1", &names(&["A", "B"])).unwrap();

        assert_eq!(genotypes.len(), 2);
        assert_eq!(genotypes[0].sample, "A");
        assert_eq!(genotypes[0].genotype, "0/1");
        assert_eq!(genotypes[0].autocall_genotype.as_deref(), Some("0/0"));
        assert_eq!(genotypes[1].genotype, "./.");
        assert_eq!(genotypes[1].autocall_genotype.as_deref(), Some("1/1"));
    }

    #[test]
    fn test_parse_sample_columns_missing_values() {
        let genotypes = parse_sample_columns("IGC\t0.9", &names(&["A"])).unwrap();
        assert_eq!(genotypes[0].genotype, ".");
        assert_eq!(genotypes[0].autocall_genotype, None);

        let trailing = parse_sample_columns("GT:GTA\t1/1", &names(&["A"])).unwrap();
        assert_eq!(trailing[0].genotype, "1/1");
        assert_eq!(trailing[0].autocall_genotype, None);

        assert!(parse_sample_columns("GT\t0/1", &names(&["A", "B"])).is_err());
        assert!(parse_sample_columns("", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_shard_spec() {
        assert!(ShardSpec::new(0, 0).is_err());
        assert!(ShardSpec::new(2, 2).is_err());
        assert_eq!(ShardSpec::all(3).len(), 3);

        let header = ArraysHeader::new(vec![])
            .with_contig("1", Some(1000))
            .with_contig("2", Some(1000))
            .with_contig("3", Some(1000));

        let shards = ShardSpec::all(2);
        assert!(shards[0].owns_contig(&header, "1"));
        assert!(shards[1].owns_contig(&header, "2"));
        assert!(shards[0].owns_contig(&header, "3"));

        // Undeclared contigs land in exactly one shard
        for contig in ["MT", "chrUn_gl000220", "HLA-A"] {
            let owners = shards.iter().filter(|s| s.owns_contig(&header, contig)).count();
            assert_eq!(owners, 1);
        }
        assert!(ShardSpec::whole().owns_contig(&header, "anything"));
    }

    #[test]
    fn test_in_memory_shards_cover_every_record() {
        let record = |position| VariantRecord {
            chromosome: "1".to_string(),
            position,
            reference_allele: "A".to_string(),
            alternate_alleles: vec!["G".to_string()],
            filter: FilterStatus::Pass,
            genotypes: vec![],
        };
        let source = InMemorySource::new(ArraysHeader::new(vec![]), (1..=7).map(record).collect());

        let mut positions: Vec<u64> = ShardSpec::all(3)
            .into_iter()
            .flat_map(|shard| source.records(shard).unwrap().map(|r| r.unwrap().position).collect::<Vec<_>>())
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=7).collect::<Vec<_>>());
    }
}

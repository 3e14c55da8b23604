// ==============================================================================
// parsers/mod.rs - Input parser modules
// ==============================================================================
// Description: Arrays VCF header metadata and sharded variant sources
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-14
// Version: 2.0.0
// ==============================================================================

pub mod header;
pub mod vcf;

pub use header::{ArraysHeader, HeaderError};
pub use vcf::{InMemorySource, ShardSpec, VariantSource, VcfSource, VcfSourceError};

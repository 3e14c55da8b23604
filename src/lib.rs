// ==============================================================================
// lib.rs - Arrays Metrics Library
// ==============================================================================
// Description: Library interface for arrays variant calling metrics modules
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-14
// Version: 2.0.0
// ==============================================================================

pub mod config;
pub mod genotype;
pub mod metrics;
pub mod models;
pub mod output;
pub mod parsers;
pub mod processor;
pub mod reference_index;

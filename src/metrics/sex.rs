// ==============================================================================
// metrics/sex.rs - Three-Way Sex Concordance
// ==============================================================================
// Description: Reported / fingerprint / autocall sex agreement check
// Author: Matt Barham
// Created: 2026-10-01
// Modified: 2026-10-01
// Version: 0.1.0
// ==============================================================================
// Rule:
//   Unknown + NotReported == 3               → fail
//   Female >= 2 and Male == 0                → pass
//   Male >= 2 and Female == 0                → pass
//   anything else (1-1-1, 2F+1M, 2M+1F, ...) → fail
// ==============================================================================

use crate::models::Sex;

/// Whether the three sex calls agree
pub fn sex_concordance(reported: Sex, fingerprint: Sex, autocall: Sex) -> bool {
    let votes = [reported, fingerprint, autocall];
    let tally = |sex: Sex| votes.iter().filter(|&&v| v == sex).count();

    if tally(Sex::Unknown) + tally(Sex::NotReported) == votes.len() {
        return false;
    }

    let female = tally(Sex::Female);
    let male = tally(Sex::Male);

    (female > 1 && male == 0) || (male > 1 && female == 0)
}

/// Concordance from free-text labels as stored in the header
pub fn sex_concordance_from_labels(
    reported: Option<&str>,
    fingerprint: Option<&str>,
    autocall: Option<&str>,
) -> bool {
    sex_concordance(
        Sex::from_label(reported),
        Sex::from_label(fingerprint),
        Sex::from_label(autocall),
    )
}

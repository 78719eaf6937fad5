//! UMI collapse: group reads by barcode and build a consensus per group.
//!
//! Two consensus modes exist. Unpaired reads vary in length at the 3′ end,
//! so the ragged mode left-justifies the group and sizes the consensus so
//! every position is supported by at least `min_umi_group_size` reads.
//! Assembled pairs are expected to be the same length; the strict mode
//! takes the modal length and ignores reads of any other length, treating
//! indel-length outliers as PCR artifacts.
//!
//! At each position the consensus base is the most frequent nucleotide,
//! ties broken by the best quality seen; the consensus quality is the best
//! quality supporting the winning base.

use ahash::AHashMap;

use crate::pipeline::log::ParseLog;
use crate::pipeline::parallel::parallel_transform_filter;
use crate::pipeline::read::Read;
use crate::seq::{Monomer, Nt};

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Choice {
    nt: Nt,
    occurs: u32,
    max_qual: u8,
}

/// One slot per nucleotide, in index order.
const DEFAULT_CHOICES: [Choice; Nt::CARDINALITY] = [
    Choice { nt: Nt::A, occurs: 0, max_qual: 0 },
    Choice { nt: Nt::C, occurs: 0, max_qual: 0 },
    Choice { nt: Nt::T, occurs: 0, max_qual: 0 },
    Choice { nt: Nt::G, occurs: 0, max_qual: 0 },
    Choice { nt: Nt::N, occurs: 0, max_qual: 0 },
];

/// Collapse `group` (len >= min_umi_group_size, len > 1) into a consensus
/// stored in `group[0]`; `umi_group_size` becomes the number of reads that
/// contributed.
fn build_consensus(group: &mut Vec<Read>, min_umi_group_size: usize, ragged_ends: bool) {
    debug_assert!(group.len() >= min_umi_group_size);

    let mut choices: Vec<[Choice; Nt::CARDINALITY]>;
    let contributed;

    if ragged_ends {
        group.sort_unstable_by(|a, b| b.len().cmp(&a.len()));
        let supported = group[min_umi_group_size - 1].len();
        choices = vec![DEFAULT_CHOICES; supported];
        contributed = group.len() as u64;

        for rd in group.iter() {
            vote(&mut choices, rd);
        }
    } else {
        let mut length_counts: AHashMap<usize, usize> = AHashMap::new();
        for rd in group.iter() {
            *length_counts.entry(rd.len()).or_insert(0) += 1;
        }
        // Ties on count go to the longer length so the result is stable
        // across runs.
        let modal_size = length_counts
            .into_iter()
            .max_by_key(|&(len, count)| (count, len))
            .map(|(len, _)| len)
            .unwrap_or(0);

        choices = vec![DEFAULT_CHOICES; modal_size];
        let mut votes = 0u64;
        for rd in group.iter() {
            if rd.len() != modal_size {
                continue;
            }
            votes += 1;
            vote(&mut choices, rd);
        }
        contributed = votes;
    }

    let consensus = &mut group[0];
    consensus.dna.resize(choices.len(), Nt::A);
    consensus.qual.resize(choices.len(), 0);
    for (i, slot) in choices.iter().enumerate() {
        let mut best = slot[0];
        for ch in &slot[1..] {
            if (ch.occurs, ch.max_qual) > (best.occurs, best.max_qual) {
                best = *ch;
            }
        }
        consensus.dna.set(i, best.nt);
        consensus.qual[i] = best.max_qual;
    }
    consensus.umi_group_size = contributed;

    group.truncate(1);
}

fn vote(choices: &mut [[Choice; Nt::CARDINALITY]], rd: &Read) {
    let limit = choices.len().min(rd.len());
    for i in 0..limit {
        let ch = &mut choices[i][rd.dna.get(i).index()];
        ch.occurs += 1;
        if rd.qual[i] > ch.max_qual {
            ch.max_qual = rd.qual[i];
        }
    }
}

// ---------------------------------------------------------------------------
// umi_collapse
// ---------------------------------------------------------------------------

/// Group `reads` by barcode and emit one consensus read per surviving
/// group. Relative record order is not preserved across this stage;
/// barcodes carry the correspondence.
pub fn umi_collapse(
    reads: Vec<Read>,
    min_umi_group_size: usize,
    log: &mut ParseLog,
    ragged_ends: bool,
) -> Vec<Read> {
    let mut groups: AHashMap<String, Vec<Read>> = AHashMap::new();
    for rd in reads {
        groups.entry(rd.barcode.clone()).or_default().push(rd);
    }
    let groups: Vec<Vec<Read>> = groups.into_values().collect();

    parallel_transform_filter(groups, log, |mut group, log| {
        let original_size = group.len();

        if original_size < min_umi_group_size {
            log.filter_umi_group_size_too_small += original_size as u64;
            return None;
        }

        if original_size > 1 {
            build_consensus(&mut group, min_umi_group_size, ragged_ends);
        }

        if (group[0].umi_group_size as usize) < min_umi_group_size {
            log.filter_umi_group_size_too_small += original_size as u64;
            return None;
        }

        if group[0].dna.contains(Nt::N) {
            log.filter_invalid_chars += 1;
            return None;
        }

        log.filter_duplicate_umi += (original_size - 1) as u64;
        Some(group.swap_remove(0))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::Nts;

    fn read(barcode: &str, dna: &[u8], qual: &[u8]) -> Read {
        Read {
            barcode: barcode.to_string(),
            umi_group_size: 1,
            dna: Nts::from_text(dna),
            qual: qual.to_vec(),
        }
    }

    #[test]
    fn test_consensus_of_identical_reads_is_idempotent() {
        let reads = vec![
            read("AC", b"ACGTACGT", b"IIIIIIII"),
            read("AC", b"ACGTACGT", b"IIIIIIII"),
            read("AC", b"ACGTACGT", b"IIIIIIII"),
        ];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 1, &mut log, false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].dna.as_bytes(), b"ACGTACGT");
        assert_eq!(out[0].umi_group_size, 3);
        assert_eq!(log.filter_duplicate_umi, 2);
    }

    #[test]
    fn test_majority_vote_per_position() {
        let reads = vec![
            read("AC", b"ACGT", b"IIII"),
            read("AC", b"ACGT", b"IIII"),
            read("AC", b"ACGA", b"IIII"),
        ];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 1, &mut log, false);
        assert_eq!(out[0].dna.as_bytes(), b"ACGT");
    }

    #[test]
    fn test_tie_breaks_by_quality() {
        let reads = vec![
            read("AC", b"ACGT", b"III5"),
            read("AC", b"ACGA", b"IIIJ"),
        ];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 1, &mut log, false);
        // 1-1 tie at the last position; 'A' carries quality 'J' > '5'.
        assert_eq!(out[0].dna.as_bytes(), b"ACGA");
        assert_eq!(out[0].qual[3], b'J');
    }

    #[test]
    fn test_strict_mode_ignores_offlength_reads() {
        let reads = vec![
            read("AC", b"ACGT", b"IIII"),
            read("AC", b"ACGT", b"IIII"),
            read("AC", b"ACGTTT", b"IIIIII"),
        ];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 1, &mut log, false);
        assert_eq!(out[0].dna.as_bytes(), b"ACGT");
        assert_eq!(out[0].umi_group_size, 2);
    }

    #[test]
    fn test_ragged_mode_supports_every_position() {
        let reads = vec![
            read("AC", b"ACGTACGT", b"IIIIIIII"),
            read("AC", b"ACGTAC", b"IIIIII"),
            read("AC", b"ACGT", b"IIII"),
        ];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 2, &mut log, true);
        assert_eq!(out.len(), 1);
        // The second-largest read has 6 bases, so every consensus position
        // draws from at least two reads.
        assert_eq!(out[0].dna.as_bytes(), b"ACGTAC");
        assert_eq!(out[0].umi_group_size, 3);
    }

    #[test]
    fn test_small_groups_are_dropped_with_accounting() {
        let reads = vec![
            read("AA", b"ACGT", b"IIII"),
            read("CC", b"ACGT", b"IIII"),
            read("CC", b"ACGT", b"IIII"),
        ];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 2, &mut log, false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].barcode, "CC");
        assert_eq!(log.filter_umi_group_size_too_small, 1);
    }

    #[test]
    fn test_consensus_with_n_is_dropped() {
        let reads = vec![read("AA", b"ACNT", b"IIII")];
        let mut log = ParseLog::default();
        let out = umi_collapse(reads, 1, &mut log, false);
        assert!(out.is_empty());
        assert_eq!(log.filter_invalid_chars, 1);
    }
}

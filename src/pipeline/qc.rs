//! Read-pair quality control: 3′ quality trim, reference/UMI extraction,
//! and reference stripping.

use crate::pipeline::log::ParseLog;
use crate::pipeline::parallel::parallel_transform_filter;
use crate::pipeline::read::{Read, ReadPair};
use crate::pipeline::umi::{ExtractedUmi, UmiExtractor};

/// QC one batch of forward/reverse reads into surviving pairs.
///
/// Per pair, in order:
/// 1. either read empty (failed parse) — drop, `filter_invalid_chars`;
/// 2. pop 3′ bases with quality below `tp_qual_min`;
/// 3. find a reference with the extractor chains (first match wins) —
///    no match drops the pair (`filter_no_fw_umi` / `filter_no_rv_umi`);
/// 4. strip everything through the end of the reference match from
///    sequence and quality, leaving the region of interest;
/// 5. store the concatenated forward-then-reverse barcode on the forward
///    read.
pub fn qc_reads(
    fw: Vec<Read>,
    rv: Vec<Read>,
    fw_extractors: &[UmiExtractor],
    rv_extractors: &[UmiExtractor],
    tp_qual_min: u8,
    log: &mut ParseLog,
) -> Vec<ReadPair> {
    debug_assert_eq!(fw.len(), rv.len());

    let pairs: Vec<(Read, Read)> = fw.into_iter().zip(rv).collect();
    parallel_transform_filter(pairs, log, |(mut fw, mut rv), log| {
        if fw.is_empty() || rv.is_empty() {
            log.filter_invalid_chars += 1;
            return None;
        }

        trim_three_prime(&mut fw, tp_qual_min);
        trim_three_prime(&mut rv, tp_qual_min);

        let Some(fw_umi) = first_match(fw_extractors, &fw) else {
            log.filter_no_fw_umi += 1;
            return None;
        };
        let Some(rv_umi) = first_match(rv_extractors, &rv) else {
            log.filter_no_rv_umi += 1;
            return None;
        };

        strip_reference(&mut fw, &fw_umi);
        strip_reference(&mut rv, &rv_umi);

        let mut barcode = String::with_capacity(fw_umi.barcode.len() + rv_umi.barcode.len());
        barcode.push_str(&fw_umi.barcode);
        barcode.push_str(&rv_umi.barcode);
        fw.barcode = barcode;

        Some(ReadPair { fw, rv })
    })
}

/// Pop 3′ bases whose quality falls below the cutoff.
fn trim_three_prime(read: &mut Read, tp_qual_min: u8) {
    while !read.is_empty() && read.qual.last().is_some_and(|&q| q < tp_qual_min) {
        read.pop();
    }
}

/// Try each extractor in declaration order; first hit wins.
fn first_match(extractors: &[UmiExtractor], read: &Read) -> Option<ExtractedUmi> {
    extractors
        .iter()
        .map(|ex| ex.extract(read.dna.as_bytes()))
        .find(ExtractedUmi::is_valid)
}

/// Remove everything up to and including the reference match.
fn strip_reference(read: &mut Read, umi: &ExtractedUmi) {
    let cut = umi.from + umi.length;
    read.dna.exo(cut, 0);
    read.qual.drain(..cut.min(read.qual.len()));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::Nts;

    fn read(dna: &[u8], qual: &[u8]) -> Read {
        Read {
            barcode: String::new(),
            umi_group_size: 1,
            dna: Nts::from_text(dna),
            qual: qual.to_vec(),
        }
    }

    fn extractors(refs: &[&str]) -> Vec<UmiExtractor> {
        refs.iter().map(|r| UmiExtractor::new(r).unwrap()).collect()
    }

    #[test]
    fn test_accepted_pair_is_stripped_and_barcoded() {
        let fwex = extractors(&["ACnnGT"]);
        let rvex = extractors(&["TTnnAA"]);
        let fw = vec![read(b"ACGTGTCCCAAA", b"IIIIIIIIIIII")];
        let rv = vec![read(b"TTGCAAGGG", b"IIIIIIIII")];

        let mut log = ParseLog::default();
        let pairs = qc_reads(fw, rv, &fwex, &rvex, b'A', &mut log);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].fw.dna.as_bytes(), b"CCCAAA");
        assert_eq!(pairs[0].fw.qual.len(), 6);
        assert_eq!(pairs[0].rv.dna.as_bytes(), b"GGG");
        assert_eq!(pairs[0].fw.barcode, "GTGC");
        assert!(pairs[0].rv.barcode.is_empty());
        assert_eq!(log, ParseLog::default());
    }

    #[test]
    fn test_empty_reads_count_invalid_chars() {
        let fwex = extractors(&["ACnnGT"]);
        let rvex = extractors(&["ACnnGT"]);
        let fw = vec![Read::new(), read(b"ACGTGTAAA", b"IIIIIIIII")];
        let rv = vec![read(b"ACGTGTAAA", b"IIIIIIIII"), Read::new()];

        let mut log = ParseLog::default();
        let pairs = qc_reads(fw, rv, &fwex, &rvex, b'A', &mut log);
        assert!(pairs.is_empty());
        assert_eq!(log.filter_invalid_chars, 2);
    }

    #[test]
    fn test_missing_references_are_counted_separately() {
        let fwex = extractors(&["GGGGGGGG"]);
        let rvex = extractors(&["CCCCCCCC"]);
        let fw = vec![
            read(b"AAAATTTT", b"IIIIIIII"),
            read(b"GGGGGGGGAA", b"IIIIIIIIII"),
        ];
        let rv = vec![
            read(b"CCCCCCCCTT", b"IIIIIIIIII"),
            read(b"AAAATTTT", b"IIIIIIII"),
        ];

        let mut log = ParseLog::default();
        let pairs = qc_reads(fw, rv, &fwex, &rvex, b'A', &mut log);
        assert!(pairs.is_empty());
        assert_eq!(log.filter_no_fw_umi, 1);
        assert_eq!(log.filter_no_rv_umi, 1);
    }

    #[test]
    fn test_fallback_chain_first_match_wins() {
        let fwex = extractors(&["GGGGGG", "ACnnGT"]);
        let rvex = extractors(&["TTnnAA"]);
        let fw = vec![read(b"ACGTGTCCC", b"IIIIIIIII")];
        let rv = vec![read(b"TTGCAACCC", b"IIIIIIIII")];

        let mut log = ParseLog::default();
        let pairs = qc_reads(fw, rv, &fwex, &rvex, b'A', &mut log);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].fw.barcode, "GTGC");
    }

    #[test]
    fn test_three_prime_trim_runs_before_extraction() {
        let fwex = extractors(&["ACnnGT"]);
        let rvex = extractors(&["TTnnAA"]);
        // Low-quality tail ('!' < 'A') must be popped before matching.
        let fw = vec![read(b"ACGTGTCCCTT", b"IIIIIIIII!!")];
        let rv = vec![read(b"TTGCAAGGG", b"IIIIIIIII")];

        let mut log = ParseLog::default();
        let pairs = qc_reads(fw, rv, &fwex, &rvex, b'A', &mut log);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].fw.dna.as_bytes(), b"CCC");
    }
}

//! Orientation-aware translation and premature-stop filtering.

use crate::pipeline::log::ParseLog;
use crate::pipeline::parallel::parallel_transform_filter;
use crate::pipeline::read::{Orf, Read};

/// Translate reads into ORFs, dropping any whose translation contains a
/// stop codon.
///
/// Forward reads are already in frame from their first base. Reverse reads
/// encode the ORF on the other strand: they are trimmed to a codon
/// boundary from the right and reverse-complemented before packing.
pub fn translate_and_filter_ptcs(
    reads: Vec<Read>,
    log: &mut ParseLog,
    reverse_complement: bool,
) -> Vec<Orf> {
    parallel_transform_filter(reads, log, |mut rd, log| {
        if reverse_complement {
            rd.reverse_complement();
        }

        let orf = Orf::from(rd);
        if orf.contains_ptc() {
            log.filter_premature_stop_codon += 1;
            None
        } else {
            Some(orf)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::Nts;

    fn read(dna: &[u8]) -> Read {
        Read {
            barcode: "BC".into(),
            umi_group_size: 2,
            dna: Nts::from_text(dna),
            qual: vec![b'I'; dna.len()],
        }
    }

    #[test]
    fn test_forward_translation() {
        let mut log = ParseLog::default();
        let orfs = translate_and_filter_ptcs(vec![read(b"ATGAAATGG")], &mut log, false);
        assert_eq!(orfs.len(), 1);
        assert_eq!(orfs[0].aas.as_bytes(), b"MKW");
        assert_eq!(orfs[0].barcode, "BC");
        assert_eq!(orfs[0].umi_group_size, 2);
    }

    #[test]
    fn test_ptc_is_filtered() {
        let mut log = ParseLog::default();
        let orfs = translate_and_filter_ptcs(vec![read(b"ATGTAAAAA")], &mut log, false);
        assert!(orfs.is_empty());
        assert_eq!(log.filter_premature_stop_codon, 1);
    }

    #[test]
    fn test_reverse_complement_translation() {
        // Reverse strand of ATGAAA, read 3'→5' with two stray bases that
        // the frame trim removes.
        let mut rc = Nts::from_text(b"ATGAAA");
        rc.reverse_complement();
        let mut dna = rc.as_bytes().to_vec();
        dna.extend_from_slice(b"CC");
        let mut log = ParseLog::default();
        let orfs = translate_and_filter_ptcs(vec![read(&dna)], &mut log, true);
        assert_eq!(orfs.len(), 1);
        assert_eq!(orfs[0].aas.as_bytes(), b"MK");
    }

    #[test]
    fn test_every_emitted_orf_is_stop_free() {
        let inputs = vec![
            read(b"ATGAAATGA"), // ends in stop
            read(b"ATGAAAGGG"),
            read(b"TAGTAGTAG"),
        ];
        let mut log = ParseLog::default();
        let orfs = translate_and_filter_ptcs(inputs, &mut log, false);
        assert_eq!(orfs.len(), 1);
        assert!(orfs.iter().all(|o| !o.contains_ptc()));
        assert_eq!(log.filter_premature_stop_codon, 2);
    }
}

//! Read, read-pair, and ORF records, plus paired-end assembly.

use crate::align::overlap::find_overlap;
use crate::seq::{Aas, Cdns, Nts};

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// One sequencing read: a forward read, a reverse read, an assembled pair,
/// or the consensus of a UMI group after collapse.
#[derive(Debug, Clone)]
pub struct Read {
    /// The extracted UMI barcode.
    pub barcode: String,
    /// Number of reads merged into this one (1 until UMI collapse).
    pub umi_group_size: u64,
    pub dna: Nts,
    /// FASTQ quality bytes, one per base.
    pub qual: Vec<u8>,
}

impl Default for Read {
    fn default() -> Self {
        Self::new()
    }
}

impl Read {
    pub fn new() -> Self {
        Self {
            barcode: String::new(),
            umi_group_size: 1,
            dna: Nts::new(),
            qual: Vec::new(),
        }
    }

    /// A read is empty when it has no sequence. Empty reads mark records
    /// that failed parsing but must keep their file position.
    pub fn is_empty(&self) -> bool {
        self.dna.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dna.len()
    }

    /// Truncate sequence and quality to `n` bases.
    pub fn truncate(&mut self, n: usize) {
        let len = self.dna.len();
        if n < len {
            self.dna.exo(0, len - n);
            self.qual.truncate(n);
        }
    }

    /// Drop the last base and its quality.
    pub fn pop(&mut self) {
        self.dna.pop();
        self.qual.pop();
    }

    /// Reverse-complement in frame: truncate to a codon boundary from the
    /// right, then flip sequence and quality.
    pub fn reverse_complement(&mut self) {
        self.truncate(self.len() / 3 * 3);
        self.dna.reverse_complement();
        self.qual.reverse();
    }

    /// Assemble a read pair through its 3′ overlap.
    ///
    /// The reverse read is reverse-complemented, the overlap located, the
    /// overlapping bases merged base-by-base in favor of the higher
    /// quality, and the non-overlapping remainder appended. Returns an
    /// empty read when no acceptable overlap exists.
    pub fn assemble(
        mut fw: Read,
        mut rv: Read,
        min_overlap: usize,
        max_mismatches: usize,
    ) -> Read {
        rv.dna.reverse_complement();

        let ol = find_overlap(
            fw.dna.as_bytes(),
            rv.dna.as_bytes(),
            max_mismatches,
        );
        if ol.overlap < min_overlap || ol.mismatches > max_mismatches {
            return Read::new();
        }

        rv.qual.reverse();

        if !ol.in_order {
            std::mem::swap(&mut fw.dna, &mut rv.dna);
            std::mem::swap(&mut fw.qual, &mut rv.qual);
        }

        // A nonzero mismatch budget can select an overlap longer than one
        // of the strands; such a pair is unassemblable.
        if ol.overlap > fw.len() || ol.overlap > rv.len() {
            return Read::new();
        }

        let start = fw.len() - ol.overlap;
        for j in 0..ol.overlap {
            let i = start + j;
            if fw.qual[i] < rv.qual[j] {
                fw.qual[i] = rv.qual[j];
                fw.dna.set(i, rv.dna.get(j));
            }
        }

        rv.dna.exo(ol.overlap, 0);
        fw.dna.extend_from(&rv.dna);
        fw.qual.extend_from_slice(&rv.qual[ol.overlap..]);

        let mut barcode = std::mem::take(&mut fw.barcode);
        barcode.push_str(&rv.barcode);

        Read {
            barcode,
            umi_group_size: 1,
            dna: fw.dna,
            qual: fw.qual,
        }
    }
}

// ---------------------------------------------------------------------------
// ReadPair / Orf
// ---------------------------------------------------------------------------

/// An unassembled forward/reverse pair that passed QC.
#[derive(Debug, Clone, Default)]
pub struct ReadPair {
    pub fw: Read,
    pub rv: Read,
}

/// The in-frame translation of a read.
#[derive(Debug, Clone, Default)]
pub struct Orf {
    pub barcode: String,
    pub umi_group_size: u64,
    pub cdns: Cdns,
    pub aas: Aas,
}

impl From<Read> for Orf {
    fn from(mut read: Read) -> Self {
        let cdns = Cdns::from(read.dna.take());
        let aas = Aas::from(&cdns);
        Orf {
            barcode: std::mem::take(&mut read.barcode),
            umi_group_size: read.umi_group_size,
            cdns,
            aas,
        }
    }
}

impl Orf {
    /// True if the translation contains a premature termination codon.
    pub fn contains_ptc(&self) -> bool {
        self.aas.contains(crate::seq::Aa::STOP)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn read(dna: &[u8], qual: &[u8]) -> Read {
        Read {
            barcode: String::new(),
            umi_group_size: 1,
            dna: Nts::from_text(dna),
            qual: qual.to_vec(),
        }
    }

    #[test]
    fn test_assemble_palindromic_pair() {
        // rv reverse-complements onto fw exactly; the assembled sequence
        // is the forward sequence.
        let fw = read(b"AAAAAAAA", b"IIIIIIII");
        let rv = read(b"TTTTTTTT", b"IIIIIIII");
        let rd = Read::assemble(fw, rv, 4, 0);
        assert!(!rd.is_empty());
        assert_eq!(rd.dna.as_bytes(), b"AAAAAAAA");
        assert_eq!(rd.qual, b"IIIIIIII");
    }

    #[test]
    fn test_assemble_extends_past_overlap() {
        // fw:     ACGTACGT
        // rv(rc):     ACGTTTTT
        let fw = read(b"ACGTACGT", b"IIIIIIII");
        let mut rv_src = Nts::from_text(b"ACGTTTTT");
        rv_src.reverse_complement();
        let rv = read(rv_src.as_bytes(), b"JJJJJJJJ");
        let rd = Read::assemble(fw, rv, 4, 0);
        assert_eq!(rd.dna.as_bytes(), b"ACGTACGTTTTT");
        assert_eq!(rd.qual.len(), 12);
    }

    #[test]
    fn test_assemble_prefers_higher_quality_base() {
        // One mismatch inside the overlap; the higher-quality reverse base
        // must win.
        let fw = read(b"ACGTACGT", b"IIIIIII!");
        let mut rv_src = Nts::from_text(b"ACGATTTT");
        rv_src.reverse_complement();
        let rv = read(rv_src.as_bytes(), b"JJJJJJJJ");
        let rd = Read::assemble(fw, rv, 3, 1);
        assert!(!rd.is_empty());
        // fw ends ...ACGT with low-quality T; rv contributes A there.
        assert_eq!(&rd.dna.as_bytes()[..8], b"ACGTACGA");
    }

    #[test]
    fn test_assemble_rejects_short_overlap() {
        let fw = read(b"ACGTGGGG", b"IIIIIIII");
        let rv = read(b"AAAACCCC", b"IIIIIIII");
        let rd = Read::assemble(fw, rv, 6, 0);
        assert!(rd.is_empty());
    }

    #[test]
    fn test_assemble_concatenates_barcodes() {
        let mut fw = read(b"AAAAAAAA", b"IIIIIIII");
        fw.barcode = "ACGT".into();
        let mut rv = read(b"TTTTTTTT", b"IIIIIIII");
        rv.barcode = "GGCC".into();
        let rd = Read::assemble(fw, rv, 4, 0);
        assert_eq!(rd.barcode, "ACGTGGCC");
    }

    #[test]
    fn test_reverse_complement_trims_to_frame() {
        let mut rd = read(b"ACGTACG", b"ABCDEFG");
        rd.reverse_complement();
        assert_eq!(rd.len(), 6);
        assert_eq!(rd.dna.as_bytes(), b"GTACGT");
        assert_eq!(rd.qual, b"FEDCBA");
    }

    #[test]
    fn test_orf_from_read() {
        let rd = read(b"ATGAAATGG", b"IIIIIIIII");
        let orf = Orf::from(rd);
        assert_eq!(orf.aas.as_bytes(), b"MKW");
        assert_eq!(orf.cdns.len(), 3);
        assert!(!orf.contains_ptc());

        let stop = Orf::from(read(b"ATGTAAAAA", b"IIIIIIIII"));
        assert!(stop.contains_ptc());
    }
}

//! Amino-acid symbol, sequence, and codon translation.

use crate::seq::cdn::{Cdn, Cdns};
use crate::seq::polymer::{Monomer, Polymer};

// ---------------------------------------------------------------------------
// Aa
// ---------------------------------------------------------------------------

/// A single amino-acid residue, stored as its capital IUPAC letter, or `*`
/// for a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Aa(u8);

/// Dense index lookup over `byte - b'*'`. Invalid letters (B, J, O, U, X,
/// Z) collapse onto 0 and are rejected by `normalize` before indexing.
const INDICES: [usize; 48] = [
    0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 1, //
    0, 2, 3, 4, 5, 6, 7, 8, //
    0, 9, 10, 11, 12, 0, 13, 14, //
    15, 16, 17, 0, 18, 19, 0, 20,
];

impl Aa {
    pub const STOP: Aa = Aa(b'*');

    /// All valid residue letters, stop first, in index order.
    pub const VALID: &'static [u8; 21] = b"*ACDEFGHIKLMNPQRSTVWY";

    /// Number of distinct residues including the stop.
    pub const CARDINALITY: usize = 21;
}

impl Monomer for Aa {
    fn normalize(byte: u8) -> Option<u8> {
        let upper = byte.to_ascii_uppercase();
        Aa::VALID.contains(&upper).then_some(upper)
    }

    fn from_byte(byte: u8) -> Self {
        Aa(byte)
    }

    fn to_byte(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        INDICES[(self.0 - b'*') as usize]
    }
}

// ---------------------------------------------------------------------------
// TranslationTable
// ---------------------------------------------------------------------------

/// The standard genetic code, one residue byte per codon index.
const STANDARD_CODE: &[u8; 64] = b"KNNKTTTTIIIMRSSRQHHQPPPPLLLLRRRR*YY*SSSSLFFL*CCWEDDEAAAAVVVVGGGG";

/// Codon-indexed translation table.
#[derive(Debug, Clone)]
pub struct TranslationTable {
    table: [u8; 64],
}

impl TranslationTable {
    pub const STANDARD: TranslationTable = TranslationTable {
        table: *STANDARD_CODE,
    };

    pub fn translate(&self, c: Cdn) -> Aa {
        Aa(self.table[c.index()])
    }
}

// ---------------------------------------------------------------------------
// Aas
// ---------------------------------------------------------------------------

/// An amino-acid sequence.
pub type Aas = Polymer<Aa>;

impl Aas {
    /// Translate a codon sequence; length is preserved.
    pub fn from_cdns(cdns: &Cdns, table: &TranslationTable) -> Aas {
        let mut aas = Aas::with_capacity(cdns.len());
        for c in cdns.iter() {
            aas.push(table.translate(c));
        }
        aas
    }
}

impl From<&Cdns> for Aas {
    fn from(cdns: &Cdns) -> Self {
        Aas::from_cdns(cdns, &TranslationTable::STANDARD)
    }
}

impl From<Cdns> for Aas {
    /// Translate in place, reusing the codon buffer.
    fn from(cdns: Cdns) -> Self {
        let (mut buf, lo, hi) = cdns.into_raw();
        for b in &mut buf[lo..hi] {
            *b = STANDARD_CODE[(*b - Cdn::BIAS) as usize];
        }
        Polymer::from_raw(buf, lo, hi)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::nt::Nts;

    #[test]
    fn test_indices_are_dense_and_ordered() {
        for (i, &b) in Aa::VALID.iter().enumerate() {
            assert_eq!(Aa::from_byte(b).index(), i);
        }
    }

    #[test]
    fn test_normalize_capitalizes_and_rejects() {
        assert_eq!(Aa::normalize(b'm'), Some(b'M'));
        assert_eq!(Aa::normalize(b'*'), Some(b'*'));
        assert_eq!(Aa::normalize(b'B'), None);
        assert_eq!(Aa::normalize(b'1'), None);
    }

    #[test]
    fn test_translate_start_and_stop() {
        let t = &TranslationTable::STANDARD;
        assert_eq!(t.translate(Cdn::ATG), Aa::from_byte(b'M'));
        let cdns = Cdns::from(Nts::from_text(b"TAATAGTGA"));
        for c in cdns.iter() {
            assert_eq!(t.translate(c), Aa::STOP);
        }
    }

    #[test]
    fn test_translate_all_codons() {
        // Every codon spelled out in index order must reproduce the code
        // string byte for byte.
        let mut dna = Nts::new();
        for i in 0..Cdn::CARDINALITY {
            let [a, b, c] = Cdn::from_index(i).to_nts();
            dna.push(a);
            dna.push(b);
            dna.push(c);
        }
        let aas = Aas::from(Cdns::from(dna));
        assert_eq!(aas.as_bytes(), STANDARD_CODE);
    }

    #[test]
    fn test_orf_translation() {
        let aas = Aas::from(Cdns::from(Nts::from_text(b"ATGAAATAA")));
        assert_eq!(aas.as_bytes(), b"MK*");
    }
}

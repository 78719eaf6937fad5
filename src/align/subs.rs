//! Substitution score matrices.
//!
//! `BLOSUM62` is 21×21 over amino-acid indices (stop first). `NT_SUBS` is
//! the 4×4 nucleotide identity matrix. `CDN_SUBS` is 64×64 over codon
//! indices, derived at startup from BLOSUM62 and the standard genetic code
//! with a +1 bonus on the diagonal, which steers the aligner toward the
//! identical codon among synonymous alternatives.

use std::sync::LazyLock;

use crate::align::matrix::Matrix;
use crate::seq::{Aa, Cdn, Monomer, TranslationTable};

#[rustfmt::skip]
const BLOSUM62_DATA: [i32; 21 * 21] = [
     0, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4,
    -4,  4,  0, -2, -1, -2,  0, -2, -1, -1, -1, -1, -2, -1, -1, -1,  1,  0,  0, -3, -2,
    -4,  0,  9, -3, -4, -2, -3, -3, -1, -3, -1, -1, -3, -3, -3, -3, -1, -1, -1, -2, -2,
    -4, -2, -3,  6,  2, -3, -1, -1, -3, -1, -4, -3,  1, -1,  0, -2,  0, -1, -3, -4, -3,
    -4, -1, -4,  2,  5, -3, -2,  0, -3,  1, -3, -2,  0, -1,  2,  0,  0, -1, -2, -3, -2,
    -4, -2, -2, -3, -3,  6, -3, -1,  0, -3,  0,  0, -3, -4, -3, -3, -2, -2, -1,  1,  3,
    -4,  0, -3, -1, -2, -3,  6, -2, -4, -2, -4, -3,  0, -2, -2, -2,  0, -2, -3, -2, -3,
    -4, -2, -3, -1,  0, -1, -2,  8, -3, -1, -3, -2,  1, -2,  0,  0, -1, -2, -3, -2,  2,
    -4, -1, -1, -3, -3,  0, -4, -3,  4, -3,  2,  1, -3, -3, -3, -3, -2, -1,  3, -3, -1,
    -4, -1, -3, -1,  1, -3, -2, -1, -3,  5, -2, -1,  0, -1,  1,  2,  0, -1, -2, -3, -2,
    -4, -1, -1, -4, -3,  0, -4, -3,  2, -2,  4,  2, -3, -3, -2, -2, -2, -1,  1, -2, -1,
    -4, -1, -1, -3, -2,  0, -3, -2,  1, -1,  2,  5, -2, -2,  0, -1, -1, -1,  1, -1, -1,
    -4, -2, -3,  1,  0, -3,  0,  1, -3,  0, -3, -2,  6, -2,  0,  0,  1,  0, -3, -4, -2,
    -4, -1, -3, -1, -1, -4, -2, -2, -3, -1, -3, -2, -2,  7, -1, -2, -1, -1, -2, -4, -3,
    -4, -1, -3,  0,  2, -3, -2,  0, -3,  1, -2,  0,  0, -1,  5,  1,  0, -1, -2, -2, -1,
    -4, -1, -3, -2,  0, -3, -2,  0, -3,  2, -2, -1,  0, -2,  1,  5, -1, -1, -3, -3, -2,
    -4,  1, -1,  0,  0, -2,  0, -1, -2,  0, -2, -1,  1, -1,  0, -1,  4,  1, -2, -3, -2,
    -4,  0, -1, -1, -1, -2, -2, -2, -1, -1, -1, -1,  0, -1, -1, -1,  1,  5,  0, -2, -2,
    -4,  0, -1, -3, -2, -1, -3, -3,  3, -2,  1,  1, -3, -2, -2, -3, -2,  0,  4, -3, -1,
    -4, -3, -2, -4, -3,  1, -2, -2, -3, -3, -2, -1, -4, -4, -2, -3, -3, -2, -3, 11,  2,
    -4, -2, -2, -3, -2,  3, -3,  2, -1, -2, -1, -1, -2, -3, -1, -2, -2, -2, -1,  2,  7,
];

/// BLOSUM62 over [`Aa::index`] rows and columns.
pub static BLOSUM62: LazyLock<Matrix<i32>> =
    LazyLock::new(|| Matrix::from_values(Aa::CARDINALITY, Aa::CARDINALITY, BLOSUM62_DATA.to_vec()));

/// Nucleotide identity: +1 on the diagonal, −1 elsewhere.
pub static NT_SUBS: LazyLock<Matrix<i32>> = LazyLock::new(|| {
    let mut m = Matrix::from_values(4, 4, vec![-1; 16]);
    for i in 0..4 {
        m.set(i, i, 1);
    }
    m
});

/// Codon substitution scores derived from BLOSUM62 through the standard
/// genetic code.
pub static CDN_SUBS: LazyLock<Matrix<i32>> = LazyLock::new(|| {
    let table = &TranslationTable::STANDARD;
    let mut m = Matrix::new(Cdn::CARDINALITY, Cdn::CARDINALITY);
    for i in 0..Cdn::CARDINALITY {
        let aa_i = table.translate(Cdn::from_index(i));
        for j in 0..Cdn::CARDINALITY {
            let aa_j = table.translate(Cdn::from_index(j));
            let mut score = *BLOSUM62.get(aa_i.index(), aa_j.index());
            if i == j {
                score += 1;
            }
            m.set(i, j, score);
        }
    }
    m
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::polymer::Monomer;

    fn aa(c: u8) -> usize {
        Aa::from_byte(c).index()
    }

    #[test]
    fn test_blosum62_spot_values() {
        assert_eq!(*BLOSUM62.get(aa(b'W'), aa(b'W')), 11);
        assert_eq!(*BLOSUM62.get(aa(b'A'), aa(b'A')), 4);
        assert_eq!(*BLOSUM62.get(aa(b'A'), aa(b'W')), -3);
        assert_eq!(*BLOSUM62.get(aa(b'*'), aa(b'A')), -4);
        assert_eq!(*BLOSUM62.get(aa(b'*'), aa(b'*')), 0);
    }

    #[test]
    fn test_blosum62_is_symmetric() {
        for i in 0..Aa::CARDINALITY {
            for j in 0..Aa::CARDINALITY {
                assert_eq!(BLOSUM62.get(i, j), BLOSUM62.get(j, i));
            }
        }
    }

    #[test]
    fn test_nt_subs_is_identity() {
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(*NT_SUBS.get(i, j), if i == j { 1 } else { -1 });
            }
        }
    }

    #[test]
    fn test_cdn_subs_diagonal_bonus() {
        let table = &TranslationTable::STANDARD;
        for i in 0..Cdn::CARDINALITY {
            let a = table.translate(Cdn::from_index(i)).index();
            assert_eq!(*CDN_SUBS.get(i, i), *BLOSUM62.get(a, a) + 1);
        }
    }

    #[test]
    fn test_cdn_subs_synonymous_pair() {
        // CTT and CTG both encode leucine; off-diagonal score is the plain
        // BLOSUM L/L value, one less than the identical-codon score.
        let ctt = Cdn::from_nts(crate::seq::Nt::C, crate::seq::Nt::T, crate::seq::Nt::T);
        let ctg = Cdn::from_nts(crate::seq::Nt::C, crate::seq::Nt::T, crate::seq::Nt::G);
        let l = aa(b'L');
        assert_eq!(*CDN_SUBS.get(ctt.index(), ctg.index()), *BLOSUM62.get(l, l));
        assert_eq!(*CDN_SUBS.get(ctt.index(), ctt.index()), *BLOSUM62.get(l, l) + 1);
    }
}

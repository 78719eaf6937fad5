//! Needleman–Wunsch global alignment with free end gaps.
//!
//! The recurrence is the standard three-move dynamic program, except that
//! the gap penalty drops to zero in the last query row and the last
//! template column. Trailing overhangs on either sequence therefore cost
//! nothing, which keeps a strong interior alignment from being suppressed
//! by mismatched ends.
//!
//! The traceback renders a gapped query string: an aligned symbol prints
//! uppercase, a deletion relative to the template prints the gap character,
//! and an insertion prints lowercase (codons print their packed byte as-is
//! with a space for the gap).

use crate::align::matrix::Matrix;
use crate::seq::Monomer;

// ---------------------------------------------------------------------------
// Cells and moves
// ---------------------------------------------------------------------------

/// Path taken into a traceback cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Move {
    /// Query symbol consumed against a template symbol.
    #[default]
    Match,
    /// Gap opened in the query (template symbol unmatched).
    GapQ,
    /// Gap opened in the template (query symbol inserted).
    GapT,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cell {
    pub score: i32,
    pub mv: Move,
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Result of one alignment; reusable across calls to avoid reallocating
/// the traceback matrix.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub score: i32,
    pub traceback: Matrix<Cell>,
    pub aligned_query: String,
}

impl Alignment {
    pub fn clear(&mut self) {
        self.score = 0;
        self.traceback.resize(0, 0);
        self.aligned_query.clear();
    }

    /// Render the gapped query string from the traceback for the query the
    /// alignment was computed over.
    pub fn build_string<M: Monomer>(&self, query: &[u8]) -> String {
        let q_size = query.len();
        let t_size = self.traceback.cols() - 1;
        debug_assert_eq!(q_size + 1, self.traceback.rows());

        let mut out = Vec::with_capacity(q_size.max(t_size));
        let (mut i, mut j) = (q_size, t_size);
        while i + j != 0 {
            match self.traceback.get(i, j).mv {
                Move::GapQ => {
                    out.push(M::GAP);
                    j -= 1;
                }
                Move::GapT => {
                    out.push(M::from_byte(query[i - 1]).insert_byte());
                    i -= 1;
                }
                Move::Match => {
                    out.push(M::from_byte(query[i - 1]).aligned_byte());
                    i -= 1;
                    j -= 1;
                }
            }
        }
        out.reverse();
        String::from_utf8(out).expect("alignment strings are ASCII")
    }
}

// ---------------------------------------------------------------------------
// nw_align
// ---------------------------------------------------------------------------

/// Align `query` against `templ` with substitution matrix `subs` and gap
/// penalty `gap`. Both slices hold canonical bytes of the alphabet `M`.
///
/// With `score_only` the gapped string is skipped; the traceback matrix is
/// still filled, so `build_string` can render the string later.
pub fn nw_align<M: Monomer>(
    query: &[u8],
    templ: &[u8],
    subs: &Matrix<i32>,
    gap: i32,
    result: &mut Alignment,
    score_only: bool,
) {
    result.clear();

    let q_size = query.len();
    let t_size = templ.len();
    let trace = &mut result.traceback;
    trace.resize(q_size + 1, t_size + 1);

    for i in 1..=q_size {
        trace.get_mut(i, 0).mv = Move::GapT;
    }
    for j in 1..=t_size {
        trace.get_mut(0, j).mv = Move::GapQ;
    }

    for i in 0..q_size {
        let n = M::from_byte(query[i]).index();
        // Gaps are free once the query is exhausted (last row).
        let gap_q = if i != q_size - 1 { gap } else { 0 };
        for j in 0..t_size {
            let m = M::from_byte(templ[j]).index();
            let gap_t = if j != t_size - 1 { gap } else { 0 };

            let mut cell = Cell {
                score: trace.get(i, j).score + subs.get(m, n),
                mv: Move::Match,
            };

            let gap_q_score = trace.get(i + 1, j).score - gap_q;
            if gap_q_score > cell.score {
                cell.score = gap_q_score;
                cell.mv = Move::GapQ;
            }

            let gap_t_score = trace.get(i, j + 1).score - gap_t;
            if gap_t_score > cell.score {
                cell.score = gap_t_score;
                cell.mv = Move::GapT;
            }

            trace.set(i + 1, j + 1, cell);
        }
    }
    result.score = trace.get(q_size, t_size).score;

    if !score_only {
        result.aligned_query = result.build_string::<M>(query);
    }
}

/// Score of aligning a sequence to itself: the sum of diagonal matrix
/// entries over its symbols. Used as the normalization ceiling.
pub fn self_align_score<M: Monomer>(seq: &[u8], subs: &Matrix<i32>) -> i32 {
    seq.iter()
        .map(|&b| {
            let i = M::from_byte(b).index();
            *subs.get(i, i)
        })
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

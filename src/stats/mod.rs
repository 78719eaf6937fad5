//! Per-template mutation statistics.
//!
//! Both reductions walk a gapped query string against its template:
//! a `-` consumes a template position with no query symbol (deletion), a
//! lowercase letter is a query insertion and consumes no template
//! position, and an uppercase letter consumes one of each. The alignment
//! ranges are split across workers and the partial matrices and count
//! vectors summed.

use std::ops::{Add, Range};
use std::sync::Arc;

use crate::align::matrix::Matrix;
use crate::pipeline::parallel::parallel_reduce;
use crate::pipeline::template::{AlignmentTemplate, GroupAlignment};
use crate::seq::{Aa, Aas, Cdns, Monomer};

// ---------------------------------------------------------------------------
// Substitution frequencies
// ---------------------------------------------------------------------------

/// Per-position residue frequencies for one template.
///
/// Rows are the 21 residues in [`Aa::VALID`] order, columns the template
/// positions. Counts normalize column-wise, and the wild-type residue's
/// row is zeroed at each position so the matrix shows only substitutions.
pub fn substitution_matrix(template: &Aas, alignments: &[GroupAlignment]) -> Matrix<f32> {
    let tpl_size = template.len();

    let count = |chunk: &[GroupAlignment]| -> Matrix<f32> {
        let mut out = Matrix::new(Aa::CARDINALITY, tpl_size);
        for ga in chunk {
            let query = ga.alignment.as_bytes();
            debug_assert!(tpl_size <= query.len());
            let (mut q, mut t) = (0, 0);
            while t != tpl_size && q < query.len() {
                let c = query[q];
                q += 1;
                if c == b'-' {
                    t += 1;
                    continue;
                }
                if c.is_ascii_lowercase() {
                    continue;
                }
                *out.get_mut(Aa::from_byte(c).index(), t) += 1.0;
                t += 1;
            }
        }
        out
    };

    let mut substitutions = parallel_reduce(alignments, count);

    let mut column_totals = vec![0.0f32; tpl_size];
    for r in 0..substitutions.rows() {
        for (c, total) in column_totals.iter_mut().enumerate() {
            *total += substitutions.get(r, c);
        }
    }

    for (c, &total) in column_totals.iter().enumerate() {
        if total == 0.0 {
            continue; // keep 0/0 at zero
        }
        for r in 0..substitutions.rows() {
            *substitutions.get_mut(r, c) /= total;
        }
    }

    for c in 0..tpl_size {
        substitutions.set(template.get(c).index(), c, 0.0);
    }

    substitutions
}

// ---------------------------------------------------------------------------
// Mutation counts
// ---------------------------------------------------------------------------

/// Synonymous/nonsynonymous tallies per template position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationCount {
    pub synonymous: Vec<u32>,
    pub nonsynonymous: Vec<u32>,
    pub total: Vec<u32>,
}

impl MutationCount {
    pub fn new(cols: usize) -> Self {
        Self {
            synonymous: vec![0; cols],
            nonsynonymous: vec![0; cols],
            total: vec![0; cols],
        }
    }
}

fn accumulate(a: &mut [u32], b: &[u32]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

impl Add for MutationCount {
    type Output = MutationCount;

    fn add(mut self, rhs: MutationCount) -> MutationCount {
        accumulate(&mut self.synonymous, &rhs.synonymous);
        accumulate(&mut self.nonsynonymous, &rhs.nonsynonymous);
        accumulate(&mut self.total, &rhs.total);
        self
    }
}

/// Count mutations against a template with codon data.
///
/// A codon differing from the template's is a mutation; it is synonymous
/// when the aligned residue still matches the template residue. Indels are
/// not counted.
pub fn mutation_counts(
    template_aas: &Aas,
    template_cdns: &Cdns,
    alignments: &[GroupAlignment],
) -> MutationCount {
    debug_assert_eq!(template_aas.len(), template_cdns.len());
    let tpl_aas = template_aas.as_bytes();
    let tpl_cdns = template_cdns.as_bytes();
    let t_size = tpl_aas.len();

    let categorize = |chunk: &[GroupAlignment]| -> MutationCount {
        let mut out = MutationCount::new(t_size);
        for ga in chunk {
            let query_aas = ga.alignment.as_bytes();
            let query_cdns = ga.cdns.as_bytes();
            debug_assert_eq!(query_aas.len(), query_cdns.len());

            let (mut q, mut t) = (0, 0);
            while t != t_size && q < query_aas.len() {
                let c = query_aas[q];
                if c == b'-' {
                    t += 1;
                    q += 1;
                    continue;
                }
                if c.is_ascii_lowercase() {
                    q += 1;
                    continue;
                }
                out.total[t] += 1;
                if query_cdns[q] != tpl_cdns[t] {
                    if c == tpl_aas[t] {
                        out.synonymous[t] += 1;
                    } else {
                        out.nonsynonymous[t] += 1;
                    }
                }
                t += 1;
                q += 1;
            }
        }
        out
    };

    parallel_reduce(alignments, categorize)
}

// ---------------------------------------------------------------------------
// Per-template statistics
// ---------------------------------------------------------------------------

/// Statistics for one template over its contiguous alignment range.
pub struct TemplateStats {
    pub template: Arc<AlignmentTemplate>,
    pub substitutions: Matrix<f32>,
    /// Present only when the template carries codon data of matching
    /// length.
    pub mutation_counts: Option<MutationCount>,
    /// Index range of this template's alignments in the sorted list.
    pub range: Range<usize>,
}

/// Walk alignments sorted by template id and compute statistics per
/// template. Untemplated alignments are skipped.
pub fn template_stats(alignments: &[GroupAlignment]) -> Vec<TemplateStats> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < alignments.len() {
        let Some(template) = alignments[i].template.clone() else {
            i += 1;
            continue;
        };
        let id = template.id;
        let j = alignments[i..]
            .iter()
            .position(|g| g.template_id() != id)
            .map_or(alignments.len(), |p| i + p);

        let substitutions = substitution_matrix(&template.aas, &alignments[i..j]);
        let mutation_counts = (!template.cdns.is_empty()
            && template.cdns.len() == template.aas.len())
        .then(|| mutation_counts(&template.aas, &template.cdns, &alignments[i..j]));

        out.push(TemplateStats {
            template,
            substitutions,
            mutation_counts,
            range: i..j,
        });
        i = j;
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

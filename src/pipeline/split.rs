//! Splitting translated ORFs into parts for multi-template alignment.
//!
//! The user expression must match the whole amino-acid sequence; each
//! capturing group becomes one part. Offsets into the amino-acid string
//! are offsets into the codon string, so the codon slices come for free.

use regex::Regex;

use crate::error::Result;
use crate::pipeline::log::ParseLog;
use crate::pipeline::read::Orf;

// ---------------------------------------------------------------------------
// SplitExpression
// ---------------------------------------------------------------------------

/// A compiled `--split` expression.
#[derive(Debug, Clone)]
pub struct SplitExpression {
    regex: Regex,
    text: String,
}

impl SplitExpression {
    pub fn new(text: &str) -> Result<Self> {
        // Anchor both ends: a split must account for the whole ORF.
        let regex = Regex::new(&format!("^(?:{})$", text))?;
        Ok(Self {
            regex,
            text: text.to_string(),
        })
    }

    /// The expression as the user wrote it.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn capture_count(&self) -> usize {
        self.regex.captures_len() - 1
    }
}

// ---------------------------------------------------------------------------
// split_orfs
// ---------------------------------------------------------------------------

/// Split each ORF into its capture-group parts.
///
/// Without an expression (or with one that has no capture groups) every
/// ORF becomes a one-element row. Otherwise an ORF that fails the full
/// match is dropped (`filter_split_failed`); a matching ORF yields one
/// sub-ORF per group, slicing amino acids and codons at the same offsets.
pub fn split_orfs(
    orfs: Vec<Orf>,
    expression: Option<&SplitExpression>,
    log: &mut ParseLog,
) -> Vec<Vec<Orf>> {
    let Some(expr) = expression.filter(|e| e.capture_count() > 0) else {
        return orfs.into_iter().map(|orf| vec![orf]).collect();
    };

    let mut rows = Vec::with_capacity(orfs.len());
    for orf in orfs {
        let aas = orf.aas.to_string();
        let Some(caps) = expr.regex.captures(&aas) else {
            log.filter_split_failed += 1;
            continue;
        };

        let mut row = Vec::with_capacity(expr.capture_count());
        for i in 1..caps.len() {
            let group = caps.get(i);
            let (start, len) = group
                .map(|g| (g.start(), g.len()))
                .unwrap_or((0, 0));
            row.push(Orf {
                barcode: orf.barcode.clone(),
                umi_group_size: orf.umi_group_size,
                aas: orf.aas.subclone(start, len),
                cdns: orf.cdns.subclone(start, len),
            });
        }
        rows.push(row);
    }
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

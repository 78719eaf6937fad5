//! Template databases and multi-template alignment.
//!
//! A [`TemplateDatabase`] holds candidate templates for one split column.
//! Aligning a row of split ORFs walks the columns: each part queries its
//! database (codon alphabet when codon data is available, amino acids
//! otherwise), the winning entries' sub-alignments concatenate into one
//! [`GroupAlignment`], and the ordered tuple of winning entry ids
//! identifies the row's composite [`AlignmentTemplate`], deduplicated
//! across the run.

use std::sync::Arc;

use ahash::AHashMap;

use crate::align::nw::{nw_align, self_align_score, Alignment};
use crate::align::subs::{BLOSUM62, CDN_SUBS};
use crate::error::{Result, ScanError};
use crate::pipeline::log::ParseLog;
use crate::pipeline::parallel::parallel_transform_filter;
use crate::pipeline::read::Orf;
use crate::seq::{Aa, Aas, Cdn, Cdns};

// ---------------------------------------------------------------------------
// TemplateDatabase
// ---------------------------------------------------------------------------

/// Sentinel id meaning "no entry matched". Entry ids are 1-based.
pub const NOT_FOUND: usize = 0;

#[derive(Debug, Clone)]
pub struct TemplateDatabaseEntry {
    pub label: String,
    /// Empty unless the entry came with in-frame nucleotide data.
    pub cdns: Cdns,
    pub aas: Aas,
}

/// An ordered, 1-indexed set of candidate templates plus the gap penalty
/// used to align against them.
#[derive(Debug, Clone)]
pub struct TemplateDatabase {
    entries: Vec<TemplateDatabaseEntry>,
    gap_penalty: i32,
}

impl Default for TemplateDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateDatabase {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            gap_penalty: 4,
        }
    }

    pub fn from_entries(entries: Vec<TemplateDatabaseEntry>) -> Self {
        Self {
            entries,
            gap_penalty: 4,
        }
    }

    pub fn add_entry(&mut self, label: &str, cdns: Cdns, aas: Aas) {
        self.entries.push(TemplateDatabaseEntry {
            label: label.to_string(),
            cdns,
            aas,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Codon-alphabet alignment is possible when the first entry carries
    /// codon data.
    pub fn codon_data_available(&self) -> bool {
        self.entries.first().is_some_and(|e| !e.cdns.is_empty())
    }

    pub fn gap_penalty(&self) -> i32 {
        self.gap_penalty
    }

    /// Entry by 1-based id.
    pub fn entry(&self, id: usize) -> &TemplateDatabaseEntry {
        assert_ne!(id, NOT_FOUND);
        &self.entries[id - 1]
    }

    pub fn entries(&self) -> &[TemplateDatabaseEntry] {
        &self.entries
    }

    /// Trim every entry by `left`/`right` residues (and codons when
    /// present). Trimming an entry down to nothing is an error.
    pub fn trim(&mut self, left: usize, right: usize) -> Result<()> {
        let total = left + right;
        for entry in &mut self.entries {
            if total >= entry.aas.len() {
                return Err(ScanError::ExcessiveTrimming {
                    requested: total,
                    label: entry.label.clone(),
                    len: entry.aas.len(),
                });
            }
            entry.aas.exo(left, right);
            if !entry.cdns.is_empty() {
                entry.cdns.exo(left, right);
            }
        }
        Ok(())
    }

    /// Score `query` (codon bytes) against every entry; returns the 1-based
    /// id of the best entry and leaves its score and traceback in
    /// `result`. Ties go to the earlier entry. [`NOT_FOUND`] for an empty
    /// database.
    pub fn query_and_align_cdns(&self, query: &[u8], result: &mut Alignment) -> usize {
        self.query_best(result, |entry, current| {
            nw_align::<Cdn>(
                query,
                entry.cdns.as_bytes(),
                &CDN_SUBS,
                self.gap_penalty,
                current,
                true,
            );
        })
    }

    /// As [`Self::query_and_align_cdns`], over amino acids and BLOSUM62.
    pub fn query_and_align_aas(&self, query: &[u8], result: &mut Alignment) -> usize {
        self.query_best(result, |entry, current| {
            nw_align::<Aa>(
                query,
                entry.aas.as_bytes(),
                &BLOSUM62,
                self.gap_penalty,
                current,
                true,
            );
        })
    }

    fn query_best<F>(&self, result: &mut Alignment, align_one: F) -> usize
    where
        F: Fn(&TemplateDatabaseEntry, &mut Alignment),
    {
        let mut best = NOT_FOUND;
        result.clear();
        result.score = i32::MIN;

        let mut current = Alignment::default();
        for (i, entry) in self.entries.iter().enumerate() {
            align_one(entry, &mut current);
            if current.score > result.score {
                best = i + 1;
                std::mem::swap(result, &mut current);
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// AlignmentTemplate / GroupAlignment
// ---------------------------------------------------------------------------

/// The concatenation of the database entries one row of split ORFs aligned
/// to. Shared by every alignment that selected the same entry tuple.
#[derive(Debug, Clone, Default)]
pub struct AlignmentTemplate {
    /// 1-based id in order of first appearance.
    pub id: u64,
    /// One label per split column ("none" for a pass-through column).
    pub labels: Vec<String>,
    pub aas: Aas,
    pub cdns: Cdns,
}

impl AlignmentTemplate {
    /// Labels joined for display.
    pub fn label(&self) -> String {
        self.labels.join(" / ")
    }
}

/// One UMI group's alignment against its composite template.
#[derive(Debug, Clone, Default)]
pub struct GroupAlignment {
    pub umi_group_size: u64,
    pub template: Option<Arc<AlignmentTemplate>>,
    pub barcode: String,
    /// Gapped amino-acid string: uppercase aligned, `-` deletion,
    /// lowercase insertion.
    pub alignment: String,
    /// Parallel codon string; space is the gap character.
    pub cdns: String,
}

impl GroupAlignment {
    pub fn template_id(&self) -> u64 {
        self.template.as_ref().map_or(0, |t| t.id)
    }
}

// ---------------------------------------------------------------------------
// align_to_multiple_templates
// ---------------------------------------------------------------------------

/// Align a 2-D ragged array of split ORFs, one database per column.
///
/// A `None` column passes its part through unaligned. A row is dropped
/// when any column finds no template (`filter_no_matching_template`) or
/// scores below `min_alignment_score` of the chosen entry's self-alignment
/// score (`filter_bad_alignment`); for ragged input the self score is
/// discounted by `gap_penalty × |length difference|` first.
pub fn align_to_multiple_templates(
    rows: Vec<Vec<Orf>>,
    dbs: &[Option<Arc<TemplateDatabase>>],
    min_alignment_score: f32,
    log: &mut ParseLog,
    ragged_ends: bool,
) -> Vec<GroupAlignment> {
    if rows.is_empty() {
        return Vec::new();
    }

    struct WorkerOutput {
        alignment: GroupAlignment,
        template_ids: Vec<usize>,
    }

    let outputs = parallel_transform_filter(rows, log, |row, log| {
        let mut alignment = GroupAlignment::default();
        let mut template_ids = Vec::with_capacity(row.len());
        let mut aln = Alignment::default();

        for (i, orf) in row.iter().enumerate() {
            let db = dbs.get(i).and_then(|db| db.as_ref());
            let Some(db) = db else {
                template_ids.push(NOT_FOUND);
                alignment.alignment.push_str(&orf.aas.to_string());
                alignment.cdns.push_str(&orf.cdns.to_string());
                continue;
            };

            let by_cdns = db.codon_data_available();
            let template_id = if by_cdns {
                db.query_and_align_cdns(orf.cdns.as_bytes(), &mut aln)
            } else {
                db.query_and_align_aas(orf.aas.as_bytes(), &mut aln)
            };

            if template_id == NOT_FOUND {
                log.filter_no_matching_template += 1;
                break;
            }

            let entry = db.entry(template_id);
            let self_score = if by_cdns {
                self_align_score::<Cdn>(entry.cdns.as_bytes(), &CDN_SUBS)
            } else {
                self_align_score::<Aa>(entry.aas.as_bytes(), &BLOSUM62)
            };
            let mut max_score = self_score as f32;

            if ragged_ends {
                let diff = orf.aas.len() as i64 - entry.aas.len() as i64;
                max_score -= db.gap_penalty() as f32 * diff.unsigned_abs() as f32;
            }

            if (aln.score as f32) / max_score < min_alignment_score {
                log.filter_bad_alignment += 1;
                break;
            }

            template_ids.push(template_id);
            alignment
                .alignment
                .push_str(&aln.build_string::<Aa>(orf.aas.as_bytes()));
            alignment
                .cdns
                .push_str(&aln.build_string::<Cdn>(orf.cdns.as_bytes()));
        }

        if template_ids.len() != row.len() {
            return None;
        }

        let first = &row[0];
        alignment.umi_group_size = first.umi_group_size;
        alignment.barcode = first.barcode.clone();
        Some(WorkerOutput {
            alignment,
            template_ids,
        })
    });

    // Deduplicate composite templates by their entry-id tuple; the mapping
    // is injective within a run.
    let mut lookup: AHashMap<Vec<usize>, Arc<AlignmentTemplate>> = AHashMap::new();
    let mut next_id = 0u64;
    let mut alignments = Vec::with_capacity(outputs.len());

    for output in outputs {
        let template = lookup
            .entry(output.template_ids)
            .or_insert_with_key(|ids| {
                next_id += 1;
                let mut tpl = AlignmentTemplate {
                    id: next_id,
                    ..Default::default()
                };
                for (i, &id) in ids.iter().enumerate() {
                    match dbs.get(i).and_then(|db| db.as_ref()) {
                        Some(db) if id != NOT_FOUND => {
                            let entry = db.entry(id);
                            tpl.labels.push(entry.label.clone());
                            tpl.aas.extend_from(&entry.aas);
                            tpl.cdns.extend_from(&entry.cdns);
                        }
                        _ => tpl.labels.push("none".to_string()),
                    }
                }
                Arc::new(tpl)
            })
            .clone();

        let mut alignment = output.alignment;
        alignment.template = Some(template);
        alignments.push(alignment);
    }

    alignments
}

// ---------------------------------------------------------------------------
// collate_alignments
// ---------------------------------------------------------------------------

/// Collate forward and reverse alignments from a skip-assembly run.
///
/// Both lists sort by descending barcode; matched barcodes interleave
/// forward-then-reverse, unpaired alignments follow, and whatever remains
/// of either list comes last in ascending barcode order.
pub fn collate_alignments(
    mut fw: Vec<GroupAlignment>,
    mut rv: Vec<GroupAlignment>,
) -> Vec<GroupAlignment> {
    let mut collated = Vec::with_capacity(fw.len() + rv.len());
    let mut unpaired = Vec::new();

    fw.sort_by(|a, b| b.barcode.cmp(&a.barcode));
    rv.sort_by(|a, b| b.barcode.cmp(&a.barcode));

    while let (Some(f), Some(r)) = (fw.last(), rv.last()) {
        match f.barcode.cmp(&r.barcode) {
            std::cmp::Ordering::Equal => {
                collated.push(fw.pop().expect("checked non-empty"));
                collated.push(rv.pop().expect("checked non-empty"));
            }
            std::cmp::Ordering::Less => {
                unpaired.push(fw.pop().expect("checked non-empty"));
            }
            std::cmp::Ordering::Greater => {
                unpaired.push(rv.pop().expect("checked non-empty"));
            }
        }
    }

    collated.extend(unpaired);
    collated.extend(fw.into_iter().rev());
    collated.extend(rv.into_iter().rev());
    collated
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The end-to-end analysis pipeline.
//!
//! Stages run as sequential batches, each internally parallel: mapped
//! FASTQ → reads → QC'd pairs → (assembled | unpaired) reads →
//! UMI-collapsed consensus reads → ORFs → split ORFs → group alignments.
//! [`run_pipeline`] drives the whole chain from a [`Params`] value and
//! returns the alignments plus the filter accounting.

pub mod collapse;
pub mod log;
pub mod parallel;
pub mod qc;
pub mod read;
pub mod split;
pub mod template;
pub mod translate;
pub mod umi;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, ScanError};
use crate::io::{extract_read_data, Mapping};
use crate::pipeline::collapse::umi_collapse;
use crate::pipeline::log::ParseLog;
use crate::pipeline::qc::qc_reads;
use crate::pipeline::read::Read;
use crate::pipeline::split::{split_orfs, SplitExpression};
use crate::pipeline::template::{
    align_to_multiple_templates, collate_alignments, GroupAlignment, TemplateDatabase,
};
use crate::pipeline::translate::translate_and_filter_ptcs;
use crate::pipeline::umi::UmiExtractor;
use crate::seq::{Aas, Cdns};

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// How codon data accompanies each alignment row in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodonOutput {
    #[default]
    None,
    /// One packed byte per codon.
    Ascii,
    /// The nucleotides on one line.
    Horizontal,
    /// Three lines, one nucleotide of each triplet per line.
    Vertical,
}

impl CodonOutput {
    pub fn from_name(name: &str) -> Option<CodonOutput> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(CodonOutput::None),
            "ascii" => Some(CodonOutput::Ascii),
            "horizontal" => Some(CodonOutput::Horizontal),
            "vertical" => Some(CodonOutput::Vertical),
            _ => None,
        }
    }
}

/// One `--template`/`--template_dna`/`--template_db` occurrence, in
/// command-line order.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    /// `-t SEQUENCE`: a single amino-acid template without codon data.
    AaSequence(Aas),
    /// `-d DNA`: a single in-frame nucleotide template, packed.
    DnaSequence(Cdns),
    /// `--template_db PATH`: a FASTA database of candidates.
    Database(PathBuf),
    /// `-t none`: align nothing, pass the part through.
    Null,
}

/// Run configuration, as produced by the CLI.
#[derive(Debug, Clone)]
pub struct Params {
    pub fw_fastq: PathBuf,
    pub rv_fastq: PathBuf,
    pub fw_refs: Vec<String>,
    pub rv_refs: Vec<String>,
    pub template_sources: Vec<TemplateSource>,
    /// One `(left, right)` trim per template source.
    pub trims: Vec<(usize, usize)>,
    pub split: Option<SplitExpression>,
    /// 3′ bases below this quality are trimmed.
    pub tp_qual_min: u8,
    pub min_umi_group_size: usize,
    pub min_overlap: usize,
    pub max_mismatches: usize,
    /// Minimum alignment score as a fraction of the template self-score.
    pub min_alignment_score: f32,
    pub skip_assembly: bool,
    /// First position number in the substitutions table.
    pub number_from: usize,
    pub codon_output: CodonOutput,
    pub no_header: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            fw_fastq: PathBuf::new(),
            rv_fastq: PathBuf::new(),
            fw_refs: Vec::new(),
            rv_refs: Vec::new(),
            template_sources: Vec::new(),
            trims: Vec::new(),
            split: None,
            tp_qual_min: b'A',
            min_umi_group_size: 1,
            min_overlap: 9,
            max_mismatches: 0,
            min_alignment_score: 0.8,
            skip_assembly: false,
            number_from: 1,
            codon_output: CodonOutput::None,
            no_header: false,
        }
    }
}

impl Params {
    /// Check cross-flag constraints; individual value ranges are the CLI's
    /// problem.
    pub fn validate(&self) -> Result<()> {
        if self.fw_refs.is_empty() {
            return Err(ScanError::config(
                "at least one reference sequence is required for the forward read (-f, --fw_ref)",
            ));
        }
        if self.rv_refs.is_empty() {
            return Err(ScanError::config(
                "at least one reference sequence is required for the reverse read (-r, --rv_ref)",
            ));
        }
        if self.max_mismatches >= self.min_overlap {
            return Err(ScanError::config(
                "max_mismatches must be less than min_overlap",
            ));
        }

        let captures = self.split.as_ref().map_or(0, SplitExpression::capture_count);
        if captures != 0 && captures != self.template_sources.len() {
            return Err(ScanError::config(
                "when splitting reads for multi-template alignment (--split), a template source \
                 (--template, --template_dna, --template_db) must be provided for each capturing \
                 group of the regular expression",
            ));
        }
        if self.skip_assembly && (self.template_sources.len() > 1 || captures != 0) {
            return Err(ScanError::config(
                "skipping assembly (-x, --skip_assembly) is incompatible with split templates \
                 and multiple template alignment",
            ));
        }
        if self.trims.len() != self.template_sources.len() {
            return Err(ScanError::config(
                "using --trim requires a separate --trim=L,R for each template source \
                 (--template, --template_dna, --template_db)",
            ));
        }
        Ok(())
    }

    /// Compile the reference sequences into extractor chains.
    pub fn build_extractors(&self) -> Result<(Vec<UmiExtractor>, Vec<UmiExtractor>)> {
        let fw = self
            .fw_refs
            .iter()
            .map(|r| UmiExtractor::new(r))
            .collect::<Result<Vec<_>>>()?;
        let rv = self
            .rv_refs
            .iter()
            .map(|r| UmiExtractor::new(r))
            .collect::<Result<Vec<_>>>()?;
        Ok((fw, rv))
    }

    /// Materialize and trim the template databases, one per source
    /// (`None` for a `-t none` column).
    pub fn build_databases(&self) -> Result<Vec<Option<Arc<TemplateDatabase>>>> {
        let mut dbs = Vec::with_capacity(self.template_sources.len());
        for (source, &(left, right)) in self.template_sources.iter().zip(&self.trims) {
            let db = match source {
                TemplateSource::Database(path) => Some(TemplateDatabase::from_fasta(path)?),
                TemplateSource::DnaSequence(cdns) => {
                    let mut db = TemplateDatabase::new();
                    db.add_entry("user_defined_cdns", cdns.clone(), Aas::from(cdns));
                    Some(db)
                }
                TemplateSource::AaSequence(aas) => {
                    let mut db = TemplateDatabase::new();
                    db.add_entry("user_defined_aas", Cdns::new(), aas.clone());
                    Some(db)
                }
                TemplateSource::Null => None,
            };
            let db = match db {
                Some(mut db) => {
                    if left + right > 0 {
                        db.trim(left, right)?;
                    }
                    Some(Arc::new(db))
                }
                None => None,
            };
            dbs.push(db);
        }

        let total_entries: usize = dbs
            .iter()
            .map(|db| db.as_ref().map_or(0, |db| db.len()))
            .sum();
        if self.skip_assembly && total_entries > 1 {
            return Err(ScanError::config(
                "skipping assembly (-x, --skip_assembly) is incompatible with split templates \
                 and multiple template alignment",
            ));
        }

        Ok(dbs)
    }
}

// ---------------------------------------------------------------------------
// run_pipeline
// ---------------------------------------------------------------------------

/// Everything a report needs from one run.
pub struct RunOutput {
    /// Read pairs parsed from the input files.
    pub total_reads: usize,
    pub log: ParseLog,
    /// Sorted by `(template id, barcode)`.
    pub alignments: Vec<GroupAlignment>,
    pub databases: Vec<Option<Arc<TemplateDatabase>>>,
    pub fw_extractors: Vec<UmiExtractor>,
    pub rv_extractors: Vec<UmiExtractor>,
}

/// Drive the full pipeline.
pub fn run_pipeline(params: &Params) -> Result<RunOutput> {
    params.validate()?;
    let (fw_extractors, rv_extractors) = params.build_extractors()?;
    let databases = params.build_databases()?;

    let mut log = ParseLog::default();

    let fw_reads = {
        let mapping = Mapping::open(&params.fw_fastq)?;
        extract_read_data(mapping.bytes())
    };
    let rv_reads = {
        let mapping = Mapping::open(&params.rv_fastq)?;
        extract_read_data(mapping.bytes())
    };

    if fw_reads.len() != rv_reads.len() {
        return Err(ScanError::ReadCountMismatch {
            fw: params.fw_fastq.clone(),
            rv: params.rv_fastq.clone(),
            fw_count: fw_reads.len(),
            rv_count: rv_reads.len(),
        });
    }
    let total_reads = fw_reads.len();
    info!(total_reads, "parsed fastq inputs");

    let pairs = qc_reads(
        fw_reads,
        rv_reads,
        &fw_extractors,
        &rv_extractors,
        params.tp_qual_min,
        &mut log,
    );
    info!(surviving = pairs.len(), "qc complete");

    let mut alignments = if params.skip_assembly {
        run_unassembled(params, pairs, &databases, &mut log)
    } else {
        run_assembled(params, pairs, &databases, &mut log)
    };
    info!(alignments = alignments.len(), "alignment complete");

    // Total order so per-template report sections are contiguous.
    alignments.sort_by(|a, b| {
        a.template_id()
            .cmp(&b.template_id())
            .then_with(|| a.barcode.cmp(&b.barcode))
    });

    Ok(RunOutput {
        total_reads,
        log,
        alignments,
        databases,
        fw_extractors,
        rv_extractors,
    })
}

/// The assembled path: merge each pair, collapse with strict lengths,
/// translate, split, align.
fn run_assembled(
    params: &Params,
    pairs: Vec<crate::pipeline::read::ReadPair>,
    databases: &[Option<Arc<TemplateDatabase>>],
    log: &mut ParseLog,
) -> Vec<GroupAlignment> {
    let reads = parallel::parallel_transform_filter(pairs, log, |pair, log| {
        let rd = Read::assemble(pair.fw, pair.rv, params.min_overlap, params.max_mismatches);
        if rd.is_empty() {
            log.filter_could_not_assemble += 1;
            None
        } else {
            Some(rd)
        }
    });
    info!(assembled = reads.len(), "assembly complete");

    let reads = umi_collapse(reads, params.min_umi_group_size, log, false);
    let orfs = translate_and_filter_ptcs(reads, log, false);
    let splits = split_orfs(orfs, params.split.as_ref(), log);

    align_to_multiple_templates(splits, databases, params.min_alignment_score, log, false)
}

/// The skip-assembly path: the same pipeline run once over forward reads
/// and once over reverse-complemented reverse reads, collated by barcode.
fn run_unassembled(
    params: &Params,
    pairs: Vec<crate::pipeline::read::ReadPair>,
    databases: &[Option<Arc<TemplateDatabase>>],
    log: &mut ParseLog,
) -> Vec<GroupAlignment> {
    let mut fw_reads = Vec::with_capacity(pairs.len());
    let mut rv_reads = Vec::with_capacity(pairs.len());
    for mut pair in pairs {
        pair.rv.barcode = pair.fw.barcode.clone();
        fw_reads.push(pair.fw);
        rv_reads.push(pair.rv);
    }

    let fw_reads = umi_collapse(fw_reads, params.min_umi_group_size, log, true);
    let rv_reads = umi_collapse(rv_reads, params.min_umi_group_size, log, true);

    let fw_orfs = translate_and_filter_ptcs(fw_reads, log, false);
    let fw_splits = split_orfs(fw_orfs, params.split.as_ref(), log);

    let rv_orfs = translate_and_filter_ptcs(rv_reads, log, true);
    let rv_splits = split_orfs(rv_orfs, params.split.as_ref(), log);

    let fw_alignments =
        align_to_multiple_templates(fw_splits, databases, params.min_alignment_score, log, true);
    let rv_alignments =
        align_to_multiple_templates(rv_splits, databases, params.min_alignment_score, log, true);

    collate_alignments(fw_alignments, rv_alignments)
}

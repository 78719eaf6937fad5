//! Command-line interface.
//!
//! Flag parsing and validation live here; the pipeline itself consumes the
//! resulting [`Params`] value. Template sources can be given by three
//! different flags (`-t`, `-d`, `--template_db`) whose *relative* order
//! decides which split column each one feeds, so the builder recovers
//! inter-flag ordering from clap's argument indices.

mod report;

use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use crate::pipeline::split::SplitExpression;
use crate::pipeline::{run_pipeline, CodonOutput, Params, TemplateSource};
use crate::seq::{Aas, Cdns, Nts};
use crate::stats::template_stats;

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "deepscan")]
#[command(version)]
#[command(about = "Analyze paired-end deep sequencing reads that encode a protein: \
extract UMI barcodes, build per-UMI consensus sequences, translate, align to \
templates, and report per-position mutation statistics")]
pub struct Args {
    /// Nucleotide reference sequence(s) used to locate the UMI and reading
    /// frame in the forward read; capital ACGT match literally, N is a
    /// wildcard, lowercase n captures a barcode base (may repeat)
    #[arg(short = 'f', long = "fw_ref", value_name = "SEQUENCE")]
    pub fw_ref: Vec<String>,

    /// Reference sequence(s) for the reverse read (may repeat)
    #[arg(short = 'r', long = "rv_ref", value_name = "SEQUENCE")]
    pub rv_ref: Vec<String>,

    /// Amino-acid template to align translated reads against, or 'none'
    /// to pass the corresponding split part through unaligned
    #[arg(short = 't', long = "template", value_name = "AA_SEQUENCE")]
    pub template: Vec<String>,

    /// In-frame DNA template (length must be a multiple of 3)
    #[arg(short = 'd', long = "template_dna", value_name = "DNA")]
    pub template_dna: Vec<String>,

    /// FASTA file of candidate nucleotide templates
    #[arg(long = "template_db", value_name = "FASTA")]
    pub template_db: Vec<PathBuf>,

    /// Regular expression splitting translated ORFs into one part per
    /// capture group, each aligned to its own template source
    #[arg(long = "split", value_name = "REGEX")]
    pub split: Option<String>,

    /// Trim L residues from the left and R from the right of a template
    /// source; one occurrence per template source
    #[arg(long = "trim", value_name = "L,R")]
    pub trim: Vec<String>,

    /// 3' bases with quality below this character are trimmed
    #[arg(short = 'q', long = "min_qual", value_name = "CHAR", default_value = "A")]
    pub min_qual: char,

    /// Minimum UMI group size; smaller groups are discarded
    #[arg(short = 'g', long = "min_umi_grp", value_name = "N", default_value_t = 1)]
    pub min_umi_grp: usize,

    /// Minimum 3' overlap for paired-end assembly
    #[arg(short = 'v', long = "min_overlap", value_name = "N", default_value_t = 9)]
    pub min_overlap: usize,

    /// Maximum mismatches tolerated inside the assembly overlap
    #[arg(short = 'm', long = "max_mismatch", value_name = "N", default_value_t = 0)]
    pub max_mismatch: usize,

    /// Minimum alignment score as a fraction of the template self-score
    #[arg(short = 'a', long = "min_aln", value_name = "FRACTION", default_value_t = 0.8)]
    pub min_aln: f32,

    /// Skip paired-end assembly; align forward and reverse reads
    /// independently
    #[arg(short = 'x', long = "skip_assembly")]
    pub skip_assembly: bool,

    /// Number template positions from this value in the substitutions
    /// table
    #[arg(short = 'n', long = "number_from", value_name = "N", default_value_t = 1)]
    pub number_from: usize,

    /// Codon output mode: none, ascii, horizontal, or vertical
    #[arg(short = 'c', long = "show_codons", value_name = "MODE", default_value = "none")]
    pub show_codons: String,

    /// Suppress the settings and parse preamble
    #[arg(short = 's', long = "no_header")]
    pub no_header: bool,

    /// Forward reads
    #[arg(value_name = "FW_FASTQ")]
    pub fw_fastq: PathBuf,

    /// Reverse reads
    #[arg(value_name = "RV_FASTQ")]
    pub rv_fastq: PathBuf,
}

// ---------------------------------------------------------------------------
// Params construction
// ---------------------------------------------------------------------------

/// Collect template sources from all three flags in command-line order.
fn collect_template_sources(matches: &ArgMatches) -> Result<Vec<TemplateSource>> {
    let mut sources: Vec<(usize, TemplateSource)> = Vec::new();

    if let (Some(values), Some(indices)) = (
        matches.get_many::<String>("template"),
        matches.indices_of("template"),
    ) {
        for (value, index) in values.zip(indices) {
            let source = if value == "none" {
                TemplateSource::Null
            } else {
                TemplateSource::AaSequence(Aas::from_text(value.as_bytes()))
            };
            sources.push((index, source));
        }
    }

    if let (Some(values), Some(indices)) = (
        matches.get_many::<String>("template_dna"),
        matches.indices_of("template_dna"),
    ) {
        for (value, index) in values.zip(indices) {
            let nts = Nts::from_text(value.as_bytes());
            if nts.len() % 3 != 0 {
                bail!("template_dna must encode a valid orf with length a multiple of 3");
            }
            sources.push((index, TemplateSource::DnaSequence(Cdns::from(nts))));
        }
    }

    if let (Some(values), Some(indices)) = (
        matches.get_many::<PathBuf>("template_db"),
        matches.indices_of("template_db"),
    ) {
        for (value, index) in values.zip(indices) {
            sources.push((index, TemplateSource::Database(value.clone())));
        }
    }

    sources.sort_by_key(|(index, _)| *index);
    Ok(sources.into_iter().map(|(_, source)| source).collect())
}

fn parse_trim(value: &str) -> Result<(usize, usize)> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() == 2 {
        if let (Ok(left), Ok(right)) = (parts[0].parse(), parts[1].parse()) {
            return Ok((left, right));
        }
    }
    bail!("--trim takes two comma-separated integers (e.g. --trim=5,0)");
}

fn build_params(args: Args, matches: &ArgMatches) -> Result<Params> {
    if !args.min_qual.is_ascii() || !('!'..='~').contains(&args.min_qual) {
        bail!("min_qual must be a single ascii character in the interval ['!', '~']");
    }
    if args.min_umi_grp < 1 {
        bail!("min_umi_grp must be an integer >= 1");
    }
    if args.min_overlap < 1 {
        bail!("min_overlap must be an integer >= 1");
    }
    if !(0.0..=1.0).contains(&args.min_aln) {
        bail!("min_aln must be a number in the interval [0.0, 1.0]");
    }
    let Some(codon_output) = CodonOutput::from_name(&args.show_codons) else {
        bail!("show_codons must be one of 'none', 'ascii', 'horizontal', or 'vertical'");
    };

    let split = match &args.split {
        Some(text) => Some(SplitExpression::new(text).with_context(|| {
            format!(
                "--split requires a valid regular expression; '{}' could not be interpreted as one",
                text
            )
        })?),
        None => None,
    };

    let template_sources = collect_template_sources(matches)?;

    let mut trims = args
        .trim
        .iter()
        .map(|t| parse_trim(t))
        .collect::<Result<Vec<_>>>()?;
    if trims.is_empty() {
        trims = vec![(0, 0); template_sources.len()];
    }

    let params = Params {
        fw_fastq: args.fw_fastq,
        rv_fastq: args.rv_fastq,
        fw_refs: args.fw_ref,
        rv_refs: args.rv_ref,
        template_sources,
        trims,
        split,
        tp_qual_min: args.min_qual as u8,
        min_umi_group_size: args.min_umi_grp,
        min_overlap: args.min_overlap,
        max_mismatches: args.max_mismatch,
        min_alignment_score: args.min_aln,
        skip_assembly: args.skip_assembly,
        number_from: args.number_from,
        codon_output,
        no_header: args.no_header,
    };
    params.validate()?;
    Ok(params)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run() -> Result<()> {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches)?;
    let params = build_params(args, &matches)?;

    let started = Instant::now();
    let output = run_pipeline(&params)?;
    let stats = template_stats(&output.alignments);

    let stdout = std::io::stdout().lock();
    report::print_report(
        BufWriter::new(stdout),
        &params,
        &output,
        &stats,
        started.elapsed(),
    )
    .context("failed to write report")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Params> {
        let matches = Args::command().try_get_matches_from(argv)?;
        let args = Args::from_arg_matches(&matches)?;
        build_params(args, &matches)
    }

    #[test]
    fn test_minimal_arguments() {
        let params = parse(&[
            "deepscan", "-f", "ACnnGT", "-r", "TTnnAA", "fw.fastq", "rv.fastq",
        ])
        .unwrap();
        assert_eq!(params.fw_refs, vec!["ACnnGT"]);
        assert_eq!(params.min_overlap, 9);
        assert_eq!(params.min_umi_group_size, 1);
        assert_eq!(params.tp_qual_min, b'A');
        assert!(params.template_sources.is_empty());
    }

    #[test]
    fn test_template_sources_keep_command_line_order() {
        let params = parse(&[
            "deepscan",
            "-f", "ACnnGT", "-r", "TTnnAA",
            "--split", "(.+)(.+)",
            "--template_db", "db.fasta",
            "-t", "MKTAYIAK",
            "fw.fastq", "rv.fastq",
        ])
        .unwrap();
        assert_eq!(params.template_sources.len(), 2);
        assert!(matches!(params.template_sources[0], TemplateSource::Database(_)));
        assert!(matches!(params.template_sources[1], TemplateSource::AaSequence(_)));
    }

    #[test]
    fn test_template_none_becomes_null_source() {
        let params = parse(&[
            "deepscan", "-f", "ACnnGT", "-r", "TTnnAA", "-t", "none", "fw.fastq", "rv.fastq",
        ])
        .unwrap();
        assert!(matches!(params.template_sources[0], TemplateSource::Null));
    }

    #[test]
    fn test_bad_dna_template_length() {
        let err = parse(&[
            "deepscan", "-f", "A", "-r", "A", "-d", "ATGA", "fw.fastq", "rv.fastq",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_mismatch_must_be_below_overlap() {
        let err = parse(&[
            "deepscan", "-f", "A", "-r", "A", "-v", "4", "-m", "4", "fw.fastq", "rv.fastq",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_split_requires_matching_source_count() {
        let err = parse(&[
            "deepscan",
            "-f", "A", "-r", "A",
            "--split", "(.+)(.+)",
            "-t", "MKT",
            "fw.fastq", "rv.fastq",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_skip_assembly_rejects_multiple_templates() {
        let err = parse(&[
            "deepscan",
            "-f", "A", "-r", "A", "-x",
            "-t", "MKT", "-t", "AYI",
            "fw.fastq", "rv.fastq",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_trim_parsing() {
        let params = parse(&[
            "deepscan",
            "-f", "A", "-r", "A",
            "-t", "MKTAYIAK",
            "--trim", "2,1",
            "fw.fastq", "rv.fastq",
        ])
        .unwrap();
        assert_eq!(params.trims, vec![(2, 1)]);
        assert!(parse(&[
            "deepscan", "-f", "A", "-r", "A", "-t", "MKT", "--trim", "x,y", "fw.fastq", "rv.fastq",
        ])
        .is_err());
    }
}

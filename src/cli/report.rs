//! The tab-separated stdout report.
//!
//! Sections appear in a fixed order, each introduced by a `#Section#`
//! line: `#Settings#`, `#Parse#`, `#Templates#`, `#Template Usage#`,
//! `#Alignments#`, then per-template `#Substitutions#` and
//! `#Mutation Counts#`, and finally the uniqueness sections (assembly
//! mode only). Everything else the program emits goes to stderr.

use std::io::{self, Write};
use std::time::Duration;

use ahash::AHashMap;

use crate::pipeline::template::GroupAlignment;
use crate::pipeline::{CodonOutput, Params, RunOutput, TemplateSource};
use crate::seq::{Aa, Cdn, Monomer};
use crate::stats::TemplateStats;

pub fn print_report<W: Write>(
    mut out: W,
    params: &Params,
    run: &RunOutput,
    stats: &[TemplateStats],
    elapsed: Duration,
) -> io::Result<()> {
    if !params.no_header {
        print_settings(&mut out, params, run, elapsed)?;
        print_parse(&mut out, run)?;
    }

    if !params.template_sources.is_empty() {
        print_templates(&mut out, run, stats)?;
    }

    print_alignments(&mut out, params, run)?;

    if !params.template_sources.is_empty() {
        print_statistics(&mut out, params, stats)?;
    }

    if !params.skip_assembly {
        print_unique_sequences(&mut out, &run.alignments)?;
    }

    out.flush()
}

// ---------------------------------------------------------------------------
// Settings / Parse
// ---------------------------------------------------------------------------

fn print_settings<W: Write>(
    out: &mut W,
    params: &Params,
    run: &RunOutput,
    elapsed: Duration,
) -> io::Result<()> {
    writeln!(out, "#Settings#")?;
    writeln!(out, "#program version\t{}", crate::VERSION)?;
    writeln!(
        out,
        "#run complete\t{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    let millis = elapsed.as_millis();
    writeln!(
        out,
        "#wall clock time\t{:02}:{:02}:{:02}.{:03}",
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1_000 % 60,
        millis % 1_000
    )?;

    writeln!(out, "#forward reads fastq file\t{}", params.fw_fastq.display())?;
    writeln!(out, "#reverse reads fastq file\t{}", params.rv_fastq.display())?;
    for ex in &run.fw_extractors {
        writeln!(
            out,
            "#forward nucleotide reference sequence (-f, --fw_ref)\t{}",
            ex.sequence()
        )?;
    }
    for ex in &run.rv_extractors {
        writeln!(
            out,
            "#reverse nucleotide reference sequence (-r, --rv_ref)\t{}",
            ex.sequence()
        )?;
    }
    if let Some(split) = &params.split {
        writeln!(
            out,
            "#split template regular expression (--split)\t{}",
            split.text()
        )?;
    }
    for source in &params.template_sources {
        match source {
            TemplateSource::AaSequence(aas) => {
                writeln!(out, "#amino acid template sequence (-t, --template)\t{}", aas)?;
            }
            TemplateSource::Null => {
                writeln!(out, "#amino acid template sequence (-t, --template)\tnone")?;
            }
            TemplateSource::DnaSequence(cdns) => {
                writeln!(
                    out,
                    "#dna template sequence (-d, --template_dna)\t{}",
                    cdns.to_nts()
                )?;
            }
            TemplateSource::Database(path) => {
                writeln!(out, "#template database (--template_db)\t{}", path.display())?;
            }
        }
    }
    writeln!(
        out,
        "#minimum 3 prime quality (-q, --min_qual)\t{}",
        params.tp_qual_min as char
    )?;
    writeln!(
        out,
        "#minimum umi group size (-g, --min_umi_grp)\t{}",
        params.min_umi_group_size
    )?;
    writeln!(
        out,
        "#reads aligned to template separately (-x, --skip_assembly)\t{}",
        params.skip_assembly as u8
    )?;
    writeln!(
        out,
        "#minimum nucleotide alignment overlap (-v, --min_overlap)\t{}",
        params.min_overlap
    )?;
    writeln!(
        out,
        "#maximum nucleotide mismatches allowed (-m, --max_mismatch)\t{}",
        params.max_mismatches
    )?;
    writeln!(
        out,
        "#minimum template alignment score (-a, --min_aln)\t{}",
        params.min_alignment_score
    )?;
    Ok(())
}

fn print_parse<W: Write>(out: &mut W, run: &RunOutput) -> io::Result<()> {
    let log = &run.log;
    writeln!(out, "#Parse#")?;
    writeln!(out, "#paired end reads parsed\t{}", run.total_reads)?;
    writeln!(
        out,
        "#reads filtered because of non-ATGC characters\t{}",
        log.filter_invalid_chars
    )?;
    writeln!(
        out,
        "#reads filtered because reference could not be identified in forward sequence\t{}",
        log.filter_no_fw_umi
    )?;
    writeln!(
        out,
        "#reads filtered because reference could not be identified in reverse sequence\t{}",
        log.filter_no_rv_umi
    )?;
    writeln!(
        out,
        "#reads filtered because they could not be assembled\t{}",
        log.filter_could_not_assemble
    )?;
    writeln!(
        out,
        "#reads filtered because of small umi group size\t{}",
        log.filter_umi_group_size_too_small
    )?;
    writeln!(
        out,
        "#reads merged during umi collapse\t{}",
        log.filter_duplicate_umi
    )?;
    writeln!(
        out,
        "#reads filtered because of premature stop codons\t{}",
        log.filter_premature_stop_codon
    )?;
    writeln!(
        out,
        "#reads filtered because they could not be split\t{}",
        log.filter_split_failed
    )?;
    writeln!(
        out,
        "#reads filtered because no matching template was identified\t{}",
        log.filter_no_matching_template
    )?;
    writeln!(
        out,
        "#reads filtered because of poor alignment to template\t{}",
        log.filter_bad_alignment
    )?;
    writeln!(
        out,
        "#alignments calculated after qc and umi collapse\t{}",
        run.alignments.len()
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Templates / usage
// ---------------------------------------------------------------------------

fn print_templates<W: Write>(
    out: &mut W,
    run: &RunOutput,
    stats: &[TemplateStats],
) -> io::Result<()> {
    writeln!(out, "#Templates#")?;
    writeln!(out, "Template Id\tTemplate Name\tSequence")?;
    for ts in stats {
        writeln!(
            out,
            "{}\t{}\t{}",
            ts.template.id,
            ts.template.label(),
            ts.template.aas
        )?;
    }

    // Usage per split column: how often each database entry won.
    let columns = run.databases.len();
    let mut counters: Vec<AHashMap<&str, u64>> = vec![AHashMap::new(); columns];
    let mut totals = vec![0u64; columns];
    for alignment in &run.alignments {
        let Some(template) = &alignment.template else {
            continue;
        };
        for (i, label) in template.labels.iter().enumerate().take(columns) {
            *counters[i].entry(label.as_str()).or_insert(0) += 1;
            totals[i] += 1;
        }
    }

    writeln!(out, "#Template Usage#")?;
    writeln!(out, "Split\tTemplate\tCount\tFrequency")?;
    for (i, counter) in counters.iter().enumerate() {
        let mut rows: Vec<(&str, u64)> = counter.iter().map(|(&l, &c)| (l, c)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        for (label, count) in rows {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                i + 1,
                label,
                count,
                count as f64 / totals[i] as f64
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Alignments
// ---------------------------------------------------------------------------

fn print_alignments<W: Write>(out: &mut W, params: &Params, run: &RunOutput) -> io::Result<()> {
    writeln!(out, "#Alignments#")?;
    writeln!(out, "Template\tUMI Group Size\tBarcode\tSequence")?;
    for alignment in &run.alignments {
        let id = alignment
            .template
            .as_ref()
            .map(|t| t.id.to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            id, alignment.umi_group_size, alignment.barcode, alignment.alignment
        )?;

        match params.codon_output {
            CodonOutput::None => {}
            CodonOutput::Ascii => {
                writeln!(out, "\t\t\t{}", alignment.cdns)?;
            }
            CodonOutput::Horizontal => {
                write!(out, "\t\t\t")?;
                for byte in alignment.cdns.bytes() {
                    if let Some(c) = Cdn::from_byte_checked(byte) {
                        let [a, b, d] = c.to_nts();
                        write!(
                            out,
                            "{}{}{}",
                            a.to_byte() as char,
                            b.to_byte() as char,
                            d.to_byte() as char
                        )?;
                    }
                }
                writeln!(out)?;
            }
            CodonOutput::Vertical => {
                for i in 0..3 {
                    write!(out, "\t\t\t")?;
                    for byte in alignment.cdns.bytes() {
                        match Cdn::from_byte_checked(byte) {
                            Some(c) => write!(out, "{}", c.at(i).to_byte() as char)?,
                            None => write!(out, " ")?,
                        }
                    }
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Substitutions / mutation counts
// ---------------------------------------------------------------------------

fn print_statistics<W: Write>(
    out: &mut W,
    params: &Params,
    stats: &[TemplateStats],
) -> io::Result<()> {
    for ts in stats {
        writeln!(out, "#Substitutions ({})#", ts.template.label())?;
        for (c, aa) in ts.template.aas.iter().enumerate() {
            write!(out, "\t{}{}", aa.to_byte() as char, c + params.number_from)?;
        }
        writeln!(out)?;
        for r in 0..ts.substitutions.rows() {
            write!(out, "{}", Aa::VALID[r] as char)?;
            for c in 0..ts.substitutions.cols() {
                write!(out, "\t{}", ts.substitutions.get(r, c))?;
            }
            writeln!(out)?;
        }

        let Some(counts) = &ts.mutation_counts else {
            continue;
        };
        writeln!(out, "#Mutation Counts ({})#", ts.template.label())?;
        for (c, aa) in ts.template.aas.iter().enumerate() {
            write!(out, "\t{}{}", aa.to_byte() as char, c + params.number_from)?;
        }
        writeln!(out)?;
        write!(out, "Total")?;
        for v in &counts.total {
            write!(out, "\t{}", v)?;
        }
        writeln!(out)?;
        write!(out, "Non-Coding")?;
        for v in &counts.synonymous {
            write!(out, "\t{}", v)?;
        }
        writeln!(out)?;
        write!(out, "Coding")?;
        for v in &counts.nonsynonymous {
            write!(out, "\t{}", v)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unique sequences
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UniqueCounts {
    groups: u64,
    reads: u64,
}

fn print_unique_sequences<W: Write>(
    out: &mut W,
    alignments: &[GroupAlignment],
) -> io::Result<()> {
    let mut unique_aas: AHashMap<String, UniqueCounts> = AHashMap::new();
    let mut unique_cdns: AHashMap<String, UniqueCounts> = AHashMap::new();

    for alignment in alignments {
        // Uniqueness is over the raw sequences, gaps removed.
        let aas: String = alignment.alignment.chars().filter(|&c| c != '-').collect();
        let cdns: String = alignment.cdns.chars().filter(|&c| c != ' ').collect();

        let entry = unique_aas.entry(aas).or_default();
        entry.groups += 1;
        entry.reads += alignment.umi_group_size;

        let entry = unique_cdns.entry(cdns).or_default();
        entry.groups += 1;
        entry.reads += alignment.umi_group_size;
    }

    for (title, unique) in [
        ("#Unique Amino Acids#", unique_aas),
        ("#Unique Codons#", unique_cdns),
    ] {
        writeln!(out, "{}", title)?;
        writeln!(out, "Num UMI Groups\tNum PCR Reads\tSequence")?;
        let mut rows: Vec<(String, UniqueCounts)> = unique.into_iter().collect();
        rows.sort_by(|a, b| b.1.groups.cmp(&a.1.groups).then_with(|| a.0.cmp(&b.0)));
        for (seq, counts) in rows {
            writeln!(out, "{}\t{}\t{}", counts.groups, counts.reads, seq)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::log::ParseLog;

    fn empty_run() -> RunOutput {
        RunOutput {
            total_reads: 0,
            log: ParseLog::default(),
            alignments: Vec::new(),
            databases: Vec::new(),
            fw_extractors: Vec::new(),
            rv_extractors: Vec::new(),
        }
    }

    fn ga(barcode: &str, alignment: &str, cdns: &str, umi: u64) -> GroupAlignment {
        GroupAlignment {
            umi_group_size: umi,
            template: None,
            barcode: barcode.into(),
            alignment: alignment.into(),
            cdns: cdns.into(),
        }
    }

    #[test]
    fn test_report_sections_in_order() {
        let params = Params::default();
        let run = empty_run();
        let mut buf = Vec::new();
        print_report(&mut buf, &params, &run, &[], Duration::from_millis(1234)).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let settings = text.find("#Settings#").unwrap();
        let parse = text.find("#Parse#").unwrap();
        let alignments = text.find("#Alignments#").unwrap();
        let unique = text.find("#Unique Amino Acids#").unwrap();
        assert!(settings < parse && parse < alignments && alignments < unique);
        assert!(text.contains("#wall clock time\t00:00:01.234"));
    }

    #[test]
    fn test_no_header_suppresses_preamble() {
        let params = Params {
            no_header: true,
            ..Params::default()
        };
        let run = empty_run();
        let mut buf = Vec::new();
        print_report(&mut buf, &params, &run, &[], Duration::ZERO).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("#Settings#"));
        assert!(text.contains("#Alignments#"));
    }

    #[test]
    fn test_alignment_rows_and_ascii_codons() {
        let params = Params {
            no_header: true,
            codon_output: CodonOutput::Ascii,
            ..Params::default()
        };
        let mut run = empty_run();
        run.alignments.push(ga("ACGT", "MKW", ";0_", 3));

        let mut buf = Vec::new();
        print_report(&mut buf, &params, &run, &[], Duration::ZERO).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\t3\tACGT\tMKW"));
        assert!(text.contains("\t\t\t;0_"));
    }

    #[test]
    fn test_unique_sequences_strip_gaps_and_sort() {
        let params = Params {
            no_header: true,
            ..Params::default()
        };
        let mut run = empty_run();
        run.alignments.push(ga("A", "MK-W", "", 2));
        run.alignments.push(ga("C", "MKW", "", 1));
        run.alignments.push(ga("G", "MAW", "", 1));

        let mut buf = Vec::new();
        print_report(&mut buf, &params, &run, &[], Duration::ZERO).unwrap();
        let text = String::from_utf8(buf).unwrap();
        // The gap-stripped MK-W merges with MKW: 2 groups, 3 reads total.
        assert!(text.contains("2\t3\tMKW"));
        assert!(text.contains("1\t1\tMAW"));
    }
}

//! Template-database FASTA parsing.
//!
//! Databases are FASTA files of in-frame nucleotides. A header is either a
//! single token (everything after `>` is the label) or IMGT-style
//! `|`-delimited (the label is the second field). Allelic variants — labels
//! ending in `*02` through `*09` — are skipped so each gene appears once.
//! Blank lines and CR/CRLF endings are tolerated. An empty database is a
//! parse error.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, ScanError};
use crate::pipeline::template::{TemplateDatabase, TemplateDatabaseEntry};
use crate::seq::{Aas, Cdns, Nts};

static ALLELIC_VARIANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*0[2-9]$").expect("fixed pattern compiles"));

/// Expand a leading `~` through `$HOME`.
fn resolve_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    if components.next().map(|c| c.as_os_str()) == Some("~".as_ref()) {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(components.as_path());
        }
    }
    path.to_path_buf()
}

impl TemplateDatabase {
    /// Parse `path` as a template database.
    pub fn from_fasta(path: &Path) -> Result<TemplateDatabase> {
        let resolved = resolve_home(path);
        let text = std::fs::read_to_string(&resolved).map_err(|source| ScanError::OpenInput {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ScanError::TemplateDatabaseParse {
            path: path.to_path_buf(),
            message,
        };

        let mut records: Vec<TemplateDatabaseEntry> = Vec::new();
        let mut label = String::new();
        let mut nts = Nts::new();

        let flush = |label: &mut String, nts: &mut Nts, records: &mut Vec<TemplateDatabaseEntry>| {
            if !label.is_empty() {
                if !ALLELIC_VARIANT.is_match(label) {
                    records.push(TemplateDatabaseEntry {
                        label: std::mem::take(label),
                        cdns: Cdns::from(nts.take()),
                        aas: Aas::new(),
                    });
                }
                label.clear();
                nts.clear();
            }
        };

        for (line_no, raw) in text.lines().enumerate() {
            let line_no = line_no + 1;
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('>') {
                flush(&mut label, &mut nts, &mut records);

                let tokens: Vec<&str> = header.split('|').collect();
                if tokens.len() == 1 {
                    if tokens[0].is_empty() {
                        return Err(parse_error(format!(
                            "bad header '{}' on line {}: identifier field is empty",
                            line, line_no
                        )));
                    }
                    label = tokens[0].to_string();
                } else {
                    if tokens[1].is_empty() {
                        return Err(parse_error(format!(
                            "bad header '{}' on line {}: identifier field is empty",
                            line, line_no
                        )));
                    }
                    label = tokens[1].to_string();
                }
            } else if label.is_empty() {
                return Err(parse_error(format!(
                    "unexpected sequence data '{}' on line {}",
                    line, line_no
                )));
            } else {
                nts.push_normalized(line.as_bytes());
            }
        }
        flush(&mut label, &mut nts, &mut records);

        if records.is_empty() {
            return Err(parse_error("no FASTA records found".to_string()));
        }

        for record in &mut records {
            record.aas = Aas::from(&record.cdns);
        }

        Ok(TemplateDatabase::from_entries(records))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

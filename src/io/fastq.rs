//! Memory-mapped FASTQ ingestion.
//!
//! The file is mapped read-only and carved into one byte range per worker.
//! Interior range boundaries land mid-record, so each is advanced to the
//! next record start by finding the `\n+\n` separator between a quality
//! line and the following header and skipping past both lines. Workers
//! parse their ranges independently; results concatenate in range order.
//!
//! A record whose sequence contains bytes outside the nucleotide alphabet,
//! or whose sequence and quality lengths disagree, becomes an *empty*
//! read rather than disappearing — the forward and reverse files must stay
//! positionally aligned.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Result, ScanError};
use crate::pipeline::parallel::thread_count;
use crate::pipeline::read::Read;
use crate::seq::Nts;

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// A read-only memory mapping of one input file.
pub struct Mapping {
    map: Mmap,
}

impl Mapping {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| ScanError::OpenInput {
            path: path.to_path_buf(),
            source,
        })?;
        // Safety: the map is read-only and input files are not rewritten
        // while a run is in flight.
        let map = unsafe { Mmap::map(&file) }.map_err(|source| ScanError::OpenInput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { map })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }
}

// ---------------------------------------------------------------------------
// Record seeking
// ---------------------------------------------------------------------------

/// Position after the `n + 1`-th newline at or after `from`.
fn next_lines(bytes: &[u8], from: usize, n: usize) -> usize {
    let mut newlines = 0;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        if b == b'\n' {
            if newlines == n {
                return i + 1;
            }
            newlines += 1;
        }
    }
    bytes.len()
}

/// Advance an arbitrary position to the start of the next FASTQ record by
/// locating a `\n+\n` separator and skipping the `+` and quality lines.
fn seek_next_record(bytes: &[u8], from: usize) -> usize {
    let mut cur = from;
    while cur < bytes.len() {
        if bytes[cur] == b'+' {
            if cur + 1 == bytes.len() {
                return bytes.len();
            }
            if cur > 0 && bytes[cur - 1] == b'\n' && bytes[cur + 1] == b'\n' {
                return next_lines(bytes, cur, 1);
            }
        }
        cur += 1;
    }
    bytes.len()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i)
        .unwrap_or(bytes.len())
}

fn skip_line(bytes: &[u8], from: usize) -> usize {
    let end = line_end(bytes, from);
    (end + 1).min(bytes.len())
}

/// Parse every four-line record in `bytes`.
fn parse_records(bytes: &[u8]) -> Vec<Read> {
    let mut reads = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        pos = skip_line(bytes, pos); // header

        let seq_end = line_end(bytes, pos);
        let mut dna = Nts::with_capacity(seq_end - pos);
        let stripped = dna.push_normalized(&bytes[pos..seq_end]);
        pos = (seq_end + 1).min(bytes.len());

        pos = skip_line(bytes, pos); // '+' separator

        let qual_end = line_end(bytes, pos);
        let qual = bytes[pos..qual_end].to_vec();
        pos = (qual_end + 1).min(bytes.len());

        if stripped != 0 || dna.len() != qual.len() {
            reads.push(Read::new());
        } else {
            reads.push(Read {
                barcode: String::new(),
                umi_group_size: 1,
                dna,
                qual,
            });
        }
    }

    reads
}

/// Parse a whole mapped FASTQ file across the available workers.
pub fn extract_read_data(bytes: &[u8]) -> Vec<Read> {
    let threads = thread_count();
    let chunk = bytes.len() / threads;
    if chunk == 0 {
        return parse_records(bytes);
    }

    let mut bounds = Vec::with_capacity(threads + 1);
    bounds.push(0);
    for i in 1..threads {
        let seeked = seek_next_record(bytes, i * chunk);
        // Ranges must stay monotonic even when one record spans a chunk.
        bounds.push(seeked.max(bounds[i - 1]));
    }
    bounds.push(bytes.len());

    let partials: Vec<Vec<Read>> = crossbeam::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let range = &bytes[bounds[i]..bounds[i + 1]];
                scope.spawn(move |_| parse_records(range))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    })
    .expect("worker thread panicked");

    let mut reads = Vec::with_capacity(partials.iter().map(Vec::len).sum());
    for partial in partials {
        reads.extend(partial);
    }
    reads
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fastq(records: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, (seq, qual)) in records.iter().enumerate() {
            writeln!(out, "@read{}", i).unwrap();
            writeln!(out, "{}", seq).unwrap();
            writeln!(out, "+").unwrap();
            writeln!(out, "{}", qual).unwrap();
        }
        out
    }

    #[test]
    fn test_parse_simple_records() {
        let data = fastq(&[("ACGT", "IIII"), ("TTGGCC", "JJJJJJ")]);
        let reads = parse_records(&data);
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].dna.as_bytes(), b"ACGT");
        assert_eq!(reads[0].qual, b"IIII");
        assert_eq!(reads[1].dna.as_bytes(), b"TTGGCC");
    }

    #[test]
    fn test_invalid_bases_produce_empty_read() {
        let data = fastq(&[("ACXT", "IIII"), ("ACGT", "IIII")]);
        let reads = parse_records(&data);
        assert_eq!(reads.len(), 2);
        assert!(reads[0].is_empty());
        assert!(!reads[1].is_empty());
    }

    #[test]
    fn test_length_mismatch_produces_empty_read() {
        let data = fastq(&[("ACGT", "III")]);
        let reads = parse_records(&data);
        assert_eq!(reads.len(), 1);
        assert!(reads[0].is_empty());
    }

    #[test]
    fn test_seek_next_record_lands_on_header() {
        let data = fastq(&[("ACGT", "IIII"), ("TTTT", "JJJJ")]);
        // From anywhere inside the first record we land on the second
        // record's header line.
        let pos = seek_next_record(&data, 3);
        assert_eq!(&data[pos..pos + 6], b"@read1");
    }

    #[test]
    fn test_parallel_parse_matches_sequential() {
        let records: Vec<(String, String)> = (0..500)
            .map(|i| {
                let seq = match i % 3 {
                    0 => "ACGTACGTACGT",
                    1 => "TTTTGGGGCCCC",
                    _ => "AACCGGTTAACC",
                };
                (seq.to_string(), "I".repeat(seq.len()))
            })
            .collect();
        let refs: Vec<(&str, &str)> = records
            .iter()
            .map(|(s, q)| (s.as_str(), q.as_str()))
            .collect();
        let data = fastq(&refs);

        let parallel = extract_read_data(&data);
        let sequential = parse_records(&data);
        assert_eq!(parallel.len(), sequential.len());
        for (a, b) in parallel.iter().zip(&sequential) {
            assert_eq!(a.dna.as_bytes(), b.dna.as_bytes());
            assert_eq!(a.qual, b.qual);
        }
    }

    #[test]
    fn test_mapping_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, fastq(&[("ACGT", "IIII")])).unwrap();

        let mapping = Mapping::open(&path).unwrap();
        let reads = extract_read_data(mapping.bytes());
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].dna.as_bytes(), b"ACGT");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Mapping::open(Path::new("/nonexistent/reads.fastq"));
        assert!(err.is_err());
    }
}

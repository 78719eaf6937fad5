//! Input parsing: memory-mapped FASTQ reads and FASTA template databases.

pub mod fasta;
pub mod fastq;

pub use fastq::{extract_read_data, Mapping};

//! Reference-sequence matching and UMI barcode extraction.
//!
//! A reference sequence is written in `ACGTNn`: capital letters match
//! literally, capital `N` is a one-base wildcard, and each maximal run of
//! lowercase `n` becomes one capturing group whose matched bases join the
//! UMI barcode. The compiled form is a case-insensitive byte regex, so
//! extraction runs directly over read bytes.

use regex::bytes::{Regex, RegexBuilder};

use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// ExtractedUmi
// ---------------------------------------------------------------------------

/// Result of searching one read for a reference sequence.
#[derive(Debug, Clone, Default)]
pub struct ExtractedUmi {
    /// Concatenated capture groups, in order.
    pub barcode: String,
    /// Offset of the first base of the reference match.
    pub from: usize,
    /// Total length of the match; 0 means the reference was not found.
    pub length: usize,
}

impl ExtractedUmi {
    pub fn is_valid(&self) -> bool {
        self.length != 0
    }
}

// ---------------------------------------------------------------------------
// UmiExtractor
// ---------------------------------------------------------------------------

/// A compiled reference sequence.
#[derive(Debug, Clone)]
pub struct UmiExtractor {
    sequence: String,
    pattern: String,
    regex: Regex,
}

impl UmiExtractor {
    /// Compile `sequence` into an extractor.
    ///
    /// Characters other than `n` and `N` are capitalized first; anything
    /// outside `ACGTNn` then fails with [`ScanError::InvalidReference`].
    pub fn new(sequence: &str) -> Result<Self> {
        let mut normalized = String::with_capacity(sequence.len());
        for c in sequence.chars() {
            let c = if c == 'n' || c == 'N' {
                c
            } else {
                c.to_ascii_uppercase()
            };
            if !matches!(c, 'A' | 'C' | 'G' | 'T' | 'N' | 'n') {
                return Err(ScanError::InvalidReference(sequence.to_string()));
            }
            normalized.push(c);
        }

        let mut pattern = String::with_capacity(normalized.len() + 8);
        let mut capturing = false;
        for c in normalized.chars() {
            match (capturing, c) {
                (false, 'n') => {
                    pattern.push_str("(.");
                    capturing = true;
                }
                (true, 'n') => pattern.push('.'),
                (true, other) => {
                    pattern.push(')');
                    pattern.push(if other == 'N' { '.' } else { other });
                    capturing = false;
                }
                (false, other) => pattern.push(if other == 'N' { '.' } else { other }),
            }
        }
        if capturing {
            pattern.push(')');
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|_| ScanError::InvalidReference(sequence.to_string()))?;

        Ok(Self {
            sequence: normalized,
            pattern,
            regex,
        })
    }

    /// The reference sequence as supplied (capitalized).
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// The regular-expression text the reference compiled into.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of capturing groups, i.e. maximal `n` runs.
    pub fn capture_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// Search `bytes` for the reference and pull out the barcode.
    pub fn extract(&self, bytes: &[u8]) -> ExtractedUmi {
        let Some(caps) = self.regex.captures(bytes) else {
            return ExtractedUmi::default();
        };

        let whole = caps.get(0).expect("group 0 always present");
        let mut barcode = String::new();
        for i in 1..caps.len() {
            if let Some(group) = caps.get(i) {
                barcode.push_str(std::str::from_utf8(group.as_bytes()).unwrap_or(""));
            }
        }

        ExtractedUmi {
            barcode,
            from: whole.start(),
            length: whole.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_compilation() {
        let ex = UmiExtractor::new("GAAnnCGnnNNN").unwrap();
        assert_eq!(ex.pattern(), "GAA(..)CG(..)...");
        assert_eq!(ex.capture_count(), 2);
    }

    #[test]
    fn test_simple_extraction() {
        let ex = UmiExtractor::new("ACnnGT").unwrap();
        let umi = ex.extract(b"ACGTGT");
        assert!(umi.is_valid());
        assert_eq!(umi.from, 0);
        assert_eq!(umi.length, 6);
        assert_eq!(umi.barcode, "GT");
    }

    #[test]
    fn test_extraction_at_offset() {
        let ex = UmiExtractor::new("GAAnnCGnnNNN").unwrap();
        let umi = ex.extract(b"TTTTGAAGACGAGGTTCTGCAG");
        assert!(umi.is_valid());
        assert_eq!(umi.from, 4);
        assert_eq!(umi.length, 12);
        assert_eq!(umi.barcode, "GAAG");
    }

    #[test]
    fn test_wildcard_does_not_capture() {
        let ex = UmiExtractor::new("ANNGT").unwrap();
        let umi = ex.extract(b"ACCGT");
        assert!(umi.is_valid());
        assert_eq!(umi.barcode, "");
    }

    #[test]
    fn test_missing_reference() {
        let ex = UmiExtractor::new("ACGTACGT").unwrap();
        let umi = ex.extract(b"TTTTTTTT");
        assert!(!umi.is_valid());
        assert_eq!(umi.length, 0);
    }

    #[test]
    fn test_invalid_reference_rejected() {
        assert!(UmiExtractor::new("ACGTX").is_err());
        assert!(UmiExtractor::new("AC-GT").is_err());
        assert!(UmiExtractor::new("acgt").is_ok());
    }

    #[test]
    fn test_trailing_capture_group() {
        let ex = UmiExtractor::new("ACGnnn").unwrap();
        assert_eq!(ex.pattern(), "ACG(...)");
        let umi = ex.extract(b"ACGTTA");
        assert_eq!(umi.barcode, "TTA");
    }
}

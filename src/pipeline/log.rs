//! Per-record filter accounting.

use std::ops::{Add, AddAssign};

/// One counter per reason a record can drop out of the pipeline. Workers
/// keep private logs which are summed when a stage joins, so the totals are
/// independent of how the input was partitioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseLog {
    pub filter_invalid_chars: u64,
    pub filter_no_fw_umi: u64,
    pub filter_no_rv_umi: u64,
    pub filter_could_not_assemble: u64,
    pub filter_umi_group_size_too_small: u64,
    pub filter_duplicate_umi: u64,
    pub filter_premature_stop_codon: u64,
    pub filter_split_failed: u64,
    pub filter_no_matching_template: u64,
    pub filter_bad_alignment: u64,
}

impl Add for ParseLog {
    type Output = ParseLog;

    fn add(mut self, rhs: ParseLog) -> ParseLog {
        self += rhs;
        self
    }
}

impl AddAssign for ParseLog {
    fn add_assign(&mut self, rhs: ParseLog) {
        self.filter_invalid_chars += rhs.filter_invalid_chars;
        self.filter_no_fw_umi += rhs.filter_no_fw_umi;
        self.filter_no_rv_umi += rhs.filter_no_rv_umi;
        self.filter_could_not_assemble += rhs.filter_could_not_assemble;
        self.filter_umi_group_size_too_small += rhs.filter_umi_group_size_too_small;
        self.filter_duplicate_umi += rhs.filter_duplicate_umi;
        self.filter_premature_stop_codon += rhs.filter_premature_stop_codon;
        self.filter_split_failed += rhs.filter_split_failed;
        self.filter_no_matching_template += rhs.filter_no_matching_template;
        self.filter_bad_alignment += rhs.filter_bad_alignment;
    }
}

//! Alignment machinery: substitution matrices, the end-gap-free
//! Needleman–Wunsch aligner, and the pair-assembly overlap scanner.

pub mod matrix;
pub mod nw;
pub mod overlap;
pub mod subs;

pub use matrix::Matrix;
pub use nw::{nw_align, self_align_score, Alignment};
pub use overlap::{find_overlap, Overlap};
pub use subs::{BLOSUM62, CDN_SUBS, NT_SUBS};

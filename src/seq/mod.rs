//! Packed sequence types shared by every pipeline stage.

pub mod aa;
pub mod cdn;
pub mod nt;
pub mod polymer;

pub use aa::{Aa, Aas, TranslationTable};
pub use cdn::{Cdn, Cdns};
pub use nt::{Nt, Nts};
pub use polymer::{Monomer, Polymer};

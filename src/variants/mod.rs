//! Variants from several genomes, merged onto the meta-genome axis.
//!
//! - [`record`]: [`VariantRecord`] as supplied by a source, and the
//!   positioned [`Variant`]
//! - [`aligner`]: [`VariantAligner`], the k-way merge producing
//!   [`VariantGroup`]s

pub mod aligner;
pub mod record;

pub use aligner::{AlignedWindow, VariantAligner, VariantGroup, VariantSource};
pub use record::{Variant, VariantRecord};

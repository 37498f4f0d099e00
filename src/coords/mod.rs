//! Coordinate spaces of a multi-genome project and conversions between them.
//!
//! Three kinds of axes exist per chromosome:
//!
//! - **Reference**: the reference genome itself
//! - **MetaGenome**: the reference widened by every insertion carried by any
//!   loaded genome (for each reference position, the longest one), so all
//!   genomes fit side by side
//! - **GenomeAllele**: one genome/allele's own sequence, shifted by its indels
//!
//! All positions are 0-based. An insertion of `n` bases at `p` sits right
//! before reference base `p`; a deletion of `n` bases at `p` removes
//! `[p, p + n)`.
//!
//! Translating a position always goes through a [`CoordinateTransformer`].
//! Transformers are immutable snapshots handed out by a [`GenomeRegistry`];
//! loading another genome produces a new one.
//!
//! # Example
//!
//! ```
//! use genotrack::context::ProjectContext;
//! use genotrack::coords::{CoordinateShift, CoordinateSpace, GenomeRegistry, Position};
//!
//! # fn main() -> genotrack::Result<()> {
//! let ctx = ProjectContext::from_pairs([("chr1", 1000)])?;
//! let mut registry = GenomeRegistry::new(&ctx);
//! registry.load_shift(1, 0, "chr1", CoordinateShift::new([(100, 3), (200, -2)])?)?;
//!
//! let transformer = registry.transformer();
//! let allele = Position::new(250, CoordinateSpace::allele(1, 0));
//! let reference = transformer.transform("chr1", allele, CoordinateSpace::Reference)?;
//! assert_eq!(reference.value, 249);
//! # Ok(())
//! # }
//! ```

pub mod registry;
pub mod shift;
pub mod transformer;

pub use registry::GenomeRegistry;
pub use shift::{CoordinateShift, ShiftEntry};
pub use transformer::CoordinateTransformer;

use std::fmt;

/// Genome identifier
pub type GenomeId = u32;

/// Allele (haplotype) identifier within a genome
pub type AlleleId = u32;

/// The axis a position is measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSpace {
    /// Reference genome coordinates
    Reference,
    /// Shared axis holding the union of all insertions
    MetaGenome,
    /// Coordinates of one genome's allele
    GenomeAllele {
        /// Genome id
        genome: GenomeId,
        /// Allele id
        allele: AlleleId,
    },
}

impl CoordinateSpace {
    /// Shorthand for [`CoordinateSpace::GenomeAllele`]
    pub fn allele(genome: GenomeId, allele: AlleleId) -> Self {
        CoordinateSpace::GenomeAllele { genome, allele }
    }
}

impl fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSpace::Reference => write!(f, "reference"),
            CoordinateSpace::MetaGenome => write!(f, "meta"),
            CoordinateSpace::GenomeAllele { genome, allele } => {
                write!(f, "genome {} allele {}", genome, allele)
            }
        }
    }
}

/// A 0-based position tagged with its space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// 0-based coordinate
    pub value: u64,
    /// Space the coordinate belongs to
    pub space: CoordinateSpace,
}

impl Position {
    /// Create a tagged position
    pub fn new(value: u64, space: CoordinateSpace) -> Self {
        Position { value, space }
    }

    /// A reference position
    pub fn reference(value: u64) -> Self {
        Self::new(value, CoordinateSpace::Reference)
    }

    /// A meta-genome position
    pub fn meta(value: u64) -> Self {
        Self::new(value, CoordinateSpace::MetaGenome)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.space)
    }
}

//! Immutable position converter over one snapshot of loaded genomes.

use crate::coords::shift::{CoordinateShift, Located, ShiftTable, UnionTable};
use crate::coords::{AlleleId, CoordinateSpace, GenomeId, Position};
use crate::error::{GenotrackError, Result};
use std::collections::HashMap;

/// Shift tables of one chromosome
#[derive(Debug, Clone, Default)]
struct ChromosomeShifts {
    length: u64,
    union: UnionTable,
    alleles: HashMap<(GenomeId, AlleleId), ShiftTable>,
}

/// Converts positions between reference, meta-genome and allele spaces.
///
/// Instances never change after construction and can be shared freely
/// across threads behind an `Arc`. A genome/allele with no shift table on a
/// chromosome is identical to the reference there.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    generation: u64,
    chromosomes: HashMap<String, ChromosomeShifts>,
}

impl CoordinateTransformer {
    /// Build from chromosome lengths and per-allele shifts.
    pub(crate) fn build<'s, L, S>(generation: u64, lengths: L, shifts: S) -> Self
    where
        L: IntoIterator<Item = (&'s str, u64)>,
        S: IntoIterator<Item = (&'s str, GenomeId, AlleleId, &'s CoordinateShift)>,
    {
        let mut chromosomes: HashMap<String, ChromosomeShifts> = lengths
            .into_iter()
            .map(|(name, length)| {
                (
                    name.to_string(),
                    ChromosomeShifts {
                        length,
                        ..Default::default()
                    },
                )
            })
            .collect();

        for (chrom, genome, allele, shift) in shifts {
            if let Some(shifts) = chromosomes.get_mut(chrom) {
                shifts
                    .alleles
                    .insert((genome, allele), ShiftTable::new(shift));
            }
        }
        for shifts in chromosomes.values_mut() {
            shifts.union = UnionTable::new(shifts.alleles.values());
        }

        CoordinateTransformer {
            generation,
            chromosomes,
        }
    }

    /// Registry generation this snapshot was built for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn chromosome(&self, chrom: &str) -> Result<&ChromosomeShifts> {
        self.chromosomes
            .get(chrom)
            .ok_or_else(|| GenotrackError::invalid_input(format!("unknown chromosome '{}'", chrom)))
    }

    /// Length of a chromosome on the meta-genome axis
    pub fn meta_length(&self, chrom: &str) -> Result<u64> {
        let shifts = self.chromosome(chrom)?;
        Ok(shifts.length + shifts.union.total())
    }

    /// Convert to the meta-genome axis. Never ambiguous.
    pub fn to_meta(&self, chrom: &str, value: u64, space: CoordinateSpace) -> Result<u64> {
        let shifts = self.chromosome(chrom)?;
        match space {
            CoordinateSpace::MetaGenome => Ok(value),
            CoordinateSpace::Reference => Ok(shifts.union.to_meta(value)),
            CoordinateSpace::GenomeAllele { genome, allele } => {
                match shifts.locate_allele(genome, allele, value) {
                    Located::Base(reference) => Ok(shifts.union.to_meta(reference)),
                    // The allele's insertion is part of the union one at the same spot
                    Located::Inserted { before, offset } => shifts
                        .union
                        .insertion_start(before)
                        .map(|start| start + offset)
                        .ok_or_else(|| {
                            GenotrackError::invalid_input(format!(
                                "insertion at {}:{} missing from meta-genome",
                                chrom, before
                            ))
                        }),
                }
            }
        }
    }

    /// Convert to reference coordinates.
    ///
    /// Inserted bases have no reference counterpart and fail with
    /// [`GenotrackError::AmbiguousPosition`], naming the reference bases on
    /// either side of the insertion.
    pub fn to_reference(&self, chrom: &str, value: u64, space: CoordinateSpace) -> Result<u64> {
        let shifts = self.chromosome(chrom)?;
        let located = match space {
            CoordinateSpace::Reference => Located::Base(value),
            CoordinateSpace::MetaGenome => shifts.union.locate(value),
            CoordinateSpace::GenomeAllele { genome, allele } => {
                shifts.locate_allele(genome, allele, value)
            }
        };
        match located {
            Located::Base(reference) => Ok(reference),
            Located::Inserted { before, .. } => Err(GenotrackError::AmbiguousPosition {
                position: value,
                left: before.saturating_sub(1),
                right: before,
            }),
        }
    }

    /// Convert to one genome/allele's coordinates.
    ///
    /// Positions the allele does not carry (inside its deletions, or inside
    /// meta-genome insertions it lacks) resolve to the allele position where
    /// the gap sits.
    pub fn to_genome_allele(
        &self,
        chrom: &str,
        value: u64,
        space: CoordinateSpace,
        genome: GenomeId,
        allele: AlleleId,
    ) -> Result<u64> {
        let shifts = self.chromosome(chrom)?;
        let target = shifts.alleles.get(&(genome, allele));
        let to_allele = |reference: u64| target.map_or(reference, |t| t.to_allele(reference));

        match space {
            CoordinateSpace::Reference => Ok(to_allele(value)),
            CoordinateSpace::GenomeAllele {
                genome: from_genome,
                allele: from_allele,
            } if from_genome == genome && from_allele == allele => Ok(value),
            CoordinateSpace::MetaGenome | CoordinateSpace::GenomeAllele { .. } => {
                let meta = self.to_meta(chrom, value, space)?;
                match shifts.union.locate(meta) {
                    Located::Base(reference) => Ok(to_allele(reference)),
                    Located::Inserted { before, offset } => {
                        let carried = target.and_then(|t| t.insertion_at(before));
                        match carried {
                            Some((start, length)) if offset < length => Ok(start + offset),
                            _ => Ok(to_allele(before)),
                        }
                    }
                }
            }
        }
    }

    /// Convert a tagged position into `to`
    pub fn transform(&self, chrom: &str, position: Position, to: CoordinateSpace) -> Result<Position> {
        let value = match to {
            CoordinateSpace::Reference => self.to_reference(chrom, position.value, position.space)?,
            CoordinateSpace::MetaGenome => self.to_meta(chrom, position.value, position.space)?,
            CoordinateSpace::GenomeAllele { genome, allele } => {
                self.to_genome_allele(chrom, position.value, position.space, genome, allele)?
            }
        };
        Ok(Position::new(value, to))
    }

    /// [`transform`](Self::transform), resolving ambiguous positions to the
    /// left candidate.
    pub fn transform_left_anchored(
        &self,
        chrom: &str,
        position: Position,
        to: CoordinateSpace,
    ) -> Result<Position> {
        match self.transform(chrom, position, to) {
            Err(GenotrackError::AmbiguousPosition { left, .. }) => Ok(Position::new(left, to)),
            other => other,
        }
    }
}

impl ChromosomeShifts {
    fn locate_allele(&self, genome: GenomeId, allele: AlleleId, value: u64) -> Located {
        match self.alleles.get(&(genome, allele)) {
            Some(table) => table.locate(value),
            None => Located::Base(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer(shifts: &[(GenomeId, AlleleId, &[(u64, i64)])]) -> CoordinateTransformer {
        let built: Vec<(GenomeId, AlleleId, CoordinateShift)> = shifts
            .iter()
            .map(|(g, a, e)| (*g, *a, CoordinateShift::new(e.iter().copied()).unwrap()))
            .collect();
        CoordinateTransformer::build(
            7,
            [("chr1", 1000u64)],
            built.iter().map(|(g, a, s)| ("chr1", *g, *a, s)),
        )
    }

    #[test]
    fn test_allele_to_reference_scenario() {
        let t = transformer(&[(1, 0, &[(100, 3), (200, -2)])]);
        let space = CoordinateSpace::allele(1, 0);
        assert_eq!(t.to_reference("chr1", 250, space).unwrap(), 249);
        // Meta only widens for the insertion
        assert_eq!(t.to_reference("chr1", 250, CoordinateSpace::MetaGenome).unwrap(), 247);
        assert_eq!(t.generation(), 7);
    }

    #[test]
    fn test_inserted_base_is_ambiguous() {
        let t = transformer(&[(1, 0, &[(100, 3)])]);
        let err = t
            .to_reference("chr1", 101, CoordinateSpace::allele(1, 0))
            .unwrap_err();
        match err {
            GenotrackError::AmbiguousPosition { position, left, right } => {
                assert_eq!((position, left, right), (101, 99, 100));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let left = t
            .transform_left_anchored(
                "chr1",
                Position::new(101, CoordinateSpace::allele(1, 0)),
                CoordinateSpace::Reference,
            )
            .unwrap();
        assert_eq!(left, Position::reference(99));
    }

    #[test]
    fn test_allele_insertion_maps_into_union_insertion() {
        let t = transformer(&[(1, 0, &[(100, 2)]), (2, 0, &[(100, 5)])]);
        // Second inserted base of genome 1 sits on the second base of the 5-base union gap
        assert_eq!(t.to_meta("chr1", 101, CoordinateSpace::allele(1, 0)).unwrap(), 101);
        assert_eq!(t.to_meta("chr1", 102, CoordinateSpace::allele(1, 0)).unwrap(), 105);
        assert_eq!(t.meta_length("chr1").unwrap(), 1005);
    }

    #[test]
    fn test_meta_gap_resolves_left_anchored() {
        let t = transformer(&[(1, 0, &[(100, 2)]), (2, 0, &[(100, 5)])]);
        let g1 = |meta| {
            t.to_genome_allele("chr1", meta, CoordinateSpace::MetaGenome, 1, 0)
                .unwrap()
        };
        assert_eq!(g1(100), 100);
        assert_eq!(g1(101), 101);
        // Union bases 2..5 are absent from genome 1: its next base is reference 100
        assert_eq!(g1(102), 102);
        assert_eq!(g1(104), 102);
        assert_eq!(g1(105), 102);
    }

    #[test]
    fn test_between_genomes() {
        let t = transformer(&[(1, 0, &[(100, 3)]), (2, 0, &[(50, -10)])]);
        let from = Position::new(200, CoordinateSpace::allele(1, 0));
        let to = t.transform("chr1", from, CoordinateSpace::allele(2, 0)).unwrap();
        // Allele 1 position 200 is reference 197; genome 2 lost 10 bases before it
        assert_eq!(to.value, 187);
    }

    #[test]
    fn test_unknown_chromosome() {
        let t = transformer(&[]);
        assert!(t.to_meta("chrZ", 5, CoordinateSpace::Reference).is_err());
        assert_eq!(t.to_meta("chr1", 5, CoordinateSpace::Reference).unwrap(), 5);
    }
}

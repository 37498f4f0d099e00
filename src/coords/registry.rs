//! Loaded genomes and the transformer snapshots built from them.

use crate::context::ProjectContext;
use crate::coords::shift::CoordinateShift;
use crate::coords::transformer::CoordinateTransformer;
use crate::coords::{AlleleId, GenomeId};
use crate::error::{GenotrackError, Result};
use crate::variants::VariantRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Per-genome shift tables of one project.
///
/// Every load or unload bumps the generation and builds a fresh
/// [`CoordinateTransformer`]; snapshots handed out earlier keep working but
/// are no longer [current](Self::is_current).
#[derive(Debug)]
pub struct GenomeRegistry<'a> {
    context: &'a ProjectContext,
    shifts: BTreeMap<(String, GenomeId, AlleleId), CoordinateShift>,
    generation: u64,
    current: Arc<CoordinateTransformer>,
}

impl<'a> GenomeRegistry<'a> {
    /// Empty registry over the project's chromosomes
    pub fn new(context: &'a ProjectContext) -> Self {
        GenomeRegistry {
            context,
            shifts: BTreeMap::new(),
            generation: 0,
            current: Arc::new(CoordinateTransformer::build(
                0,
                context.chromosomes(),
                std::iter::empty(),
            )),
        }
    }

    /// (Re)load one genome/allele on a chromosome from its variant records
    pub fn load_genome(
        &mut self,
        genome: GenomeId,
        allele: AlleleId,
        chromosome: &str,
        records: &[VariantRecord],
    ) -> Result<()> {
        let shift = CoordinateShift::from_records(records)?;
        self.load_shift(genome, allele, chromosome, shift)
    }

    /// (Re)load one genome/allele on a chromosome from a prepared shift
    pub fn load_shift(
        &mut self,
        genome: GenomeId,
        allele: AlleleId,
        chromosome: &str,
        shift: CoordinateShift,
    ) -> Result<()> {
        let length = self.context.chromosome_length(chromosome).ok_or_else(|| {
            GenotrackError::invalid_input(format!("unknown chromosome '{}'", chromosome))
        })?;
        if shift.reference_extent() > length {
            return Err(GenotrackError::InvalidRange(format!(
                "indels of genome {} allele {} reach {} past {} length {}",
                genome,
                allele,
                shift.reference_extent(),
                chromosome,
                length
            )));
        }

        let indels = shift.entries().len();
        self.shifts
            .insert((chromosome.to_string(), genome, allele), shift);
        self.rebuild();

        info!(
            genome,
            allele,
            chromosome,
            indels,
            generation = self.generation,
            "loaded genome shifts"
        );
        Ok(())
    }

    /// Drop every table of a genome. Returns whether anything was removed.
    pub fn unload_genome(&mut self, genome: GenomeId) -> bool {
        let before = self.shifts.len();
        self.shifts.retain(|(_, g, _), _| *g != genome);
        if self.shifts.len() == before {
            return false;
        }
        self.rebuild();
        info!(genome, generation = self.generation, "unloaded genome");
        true
    }

    fn rebuild(&mut self) {
        self.generation += 1;
        let shifts = self
            .shifts
            .iter()
            .map(|((chrom, genome, allele), shift)| (chrom.as_str(), *genome, *allele, shift));
        self.current = Arc::new(CoordinateTransformer::build(
            self.generation,
            self.context.chromosomes(),
            shifts,
        ));
    }

    /// Transformer for the genomes loaded right now
    pub fn transformer(&self) -> Arc<CoordinateTransformer> {
        Arc::clone(&self.current)
    }

    /// Current generation; starts at 0 and grows with every change
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `transformer` reflects the current set of genomes
    pub fn is_current(&self, transformer: &CoordinateTransformer) -> bool {
        transformer.generation() == self.generation
    }

    /// The project context
    pub fn context(&self) -> &ProjectContext {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordinateSpace;

    #[test]
    fn test_reload_produces_new_snapshot() {
        let ctx = ProjectContext::from_pairs([("chr1", 1000)]).unwrap();
        let mut registry = GenomeRegistry::new(&ctx);
        let empty = registry.transformer();
        assert!(registry.is_current(&empty));

        let records = vec![VariantRecord::new(100, 0, 3, "ins")];
        registry.load_genome(1, 0, "chr1", &records).unwrap();
        let loaded = registry.transformer();

        assert!(!registry.is_current(&empty));
        assert!(registry.is_current(&loaded));
        // The old snapshot is untouched
        assert_eq!(empty.to_meta("chr1", 150, CoordinateSpace::Reference).unwrap(), 150);
        assert_eq!(loaded.to_meta("chr1", 150, CoordinateSpace::Reference).unwrap(), 153);
    }

    #[test]
    fn test_unknown_chromosome_rejected() {
        let ctx = ProjectContext::from_pairs([("chr1", 1000)]).unwrap();
        let mut registry = GenomeRegistry::new(&ctx);
        let err = registry.load_genome(1, 0, "chr9", &[]).unwrap_err();
        assert!(matches!(err, GenotrackError::InvalidInput { .. }));
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn test_shift_past_chromosome_end() {
        let ctx = ProjectContext::from_pairs([("chr1", 100)]).unwrap();
        let mut registry = GenomeRegistry::new(&ctx);
        let shift = CoordinateShift::new([(95, -10)]).unwrap();
        assert!(registry.load_shift(1, 0, "chr1", shift).is_err());
    }

    #[test]
    fn test_unload() {
        let ctx = ProjectContext::from_pairs([("chr1", 1000)]).unwrap();
        let mut registry = GenomeRegistry::new(&ctx);
        registry
            .load_shift(3, 1, "chr1", CoordinateShift::new([(10, 4)]).unwrap())
            .unwrap();
        assert!(registry.unload_genome(3));
        assert!(!registry.unload_genome(3));
        let t = registry.transformer();
        assert_eq!(t.meta_length("chr1").unwrap(), 1000);
    }
}

//! Variant records and positioned variants.

use crate::coords::{AlleleId, CoordinateSpace, CoordinateTransformer, GenomeId};
use crate::error::{GenotrackError, Result};

/// A variant as supplied by a genome's variant source.
///
/// `length` reference bases starting at `reference_position` are replaced by
/// `allele_length` bases of the genome. Pure insertions have `length == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    /// 0-based start on the reference
    pub reference_position: u64,
    /// Reference bases consumed
    pub length: u64,
    /// Bases the allele puts in their place
    pub allele_length: u64,
    /// Opaque data carried for the display layer
    pub payload: String,
}

impl VariantRecord {
    /// Create a record
    pub fn new(
        reference_position: u64,
        length: u64,
        allele_length: u64,
        payload: impl Into<String>,
    ) -> Self {
        VariantRecord {
            reference_position,
            length,
            allele_length,
            payload: payload.into(),
        }
    }

    /// Build from REF/ALT strings at a 0-based position.
    ///
    /// Leading bases shared by both alleles are trimmed, so a VCF-style
    /// anchored insertion `A -> ACG` at 99 becomes a 2-base insertion at 100.
    pub fn from_alleles(
        position: u64,
        reference: &str,
        alternate: &str,
        payload: impl Into<String>,
    ) -> Self {
        let shared = reference
            .bytes()
            .zip(alternate.bytes())
            .take_while(|(r, a)| r.eq_ignore_ascii_case(a))
            .count();
        VariantRecord::new(
            position + shared as u64,
            (reference.len() - shared) as u64,
            (alternate.len() - shared) as u64,
            payload,
        )
    }

    /// Extract the chromosome and first alternate allele of a VCF data line.
    ///
    /// Returns `None` for lines without an alternate allele (`.`). Symbolic
    /// deletions (`<DEL>`) take their span from `INFO/END`; other symbolic
    /// alleles carry no shift. The whole line becomes the payload.
    pub fn from_vcf_line(line: &str) -> Result<Option<(&str, Self)>> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return Err(GenotrackError::invalid_input(format!(
                "VCF line has {} fields, expected at least 5",
                fields.len()
            )));
        }

        let chrom = fields[0];
        let pos: u64 = fields[1].parse().map_err(|e| {
            GenotrackError::invalid_input(format!("invalid POS '{}': {}", fields[1], e))
        })?;
        if pos == 0 {
            return Err(GenotrackError::invalid_input("VCF POS is 1-based, got 0"));
        }
        let start = pos - 1;
        let reference = fields[3];
        let alternate = fields[4].split(',').next().unwrap_or(".");

        if alternate == "." || alternate == "*" {
            return Ok(None);
        }

        if alternate.starts_with('<') {
            let end = fields
                .get(7)
                .and_then(|info| info.split(';').find_map(|kv| kv.strip_prefix("END=")))
                .and_then(|v| v.parse::<u64>().ok());
            let record = match end {
                Some(end) if alternate == "<DEL>" && end > pos => {
                    VariantRecord::new(pos, end - pos, 0, line)
                }
                _ => VariantRecord::new(pos, 0, 0, line),
            };
            return Ok(Some((chrom, record)));
        }

        Ok(Some((
            chrom,
            VariantRecord::from_alleles(start, reference, alternate, line),
        )))
    }

    /// Net change in sequence length
    pub fn shift_delta(&self) -> i64 {
        self.allele_length as i64 - self.length as i64
    }

    /// Reference position just past the consumed bases
    pub fn reference_end(&self) -> u64 {
        self.reference_position + self.length
    }
}

/// A variant placed on the meta-genome axis.
///
/// The meta-genome position is computed once from the reference position
/// and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    start_reference_position: u64,
    length: u64,
    meta_genome_position: u64,
    genome: GenomeId,
    allele: AlleleId,
    payload: String,
}

impl Variant {
    /// Position a record using `transformer`
    pub fn positioned(
        record: VariantRecord,
        genome: GenomeId,
        allele: AlleleId,
        chromosome: &str,
        transformer: &CoordinateTransformer,
    ) -> Result<Self> {
        let meta_genome_position = transformer.to_meta(
            chromosome,
            record.reference_position,
            CoordinateSpace::Reference,
        )?;
        Ok(Variant {
            start_reference_position: record.reference_position,
            length: record.length,
            meta_genome_position,
            genome,
            allele,
            payload: record.payload,
        })
    }

    /// Position every record of one genome/allele
    pub fn position_all<I>(
        records: I,
        genome: GenomeId,
        allele: AlleleId,
        chromosome: &str,
        transformer: &CoordinateTransformer,
    ) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = VariantRecord>,
    {
        records
            .into_iter()
            .map(|record| Variant::positioned(record, genome, allele, chromosome, transformer))
            .collect()
    }

    /// 0-based reference start
    pub fn start_reference_position(&self) -> u64 {
        self.start_reference_position
    }

    /// Reference bases consumed
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Position on the meta-genome axis
    pub fn meta_genome_position(&self) -> u64 {
        self.meta_genome_position
    }

    /// Genome the variant belongs to
    pub fn genome(&self) -> GenomeId {
        self.genome
    }

    /// Allele the variant belongs to
    pub fn allele(&self) -> AlleleId {
        self.allele
    }

    /// Opaque display data
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProjectContext;
    use crate::coords::{CoordinateShift, GenomeRegistry};

    #[test]
    fn test_from_alleles_trims_anchor() {
        let ins = VariantRecord::from_alleles(99, "A", "ACG", "");
        assert_eq!((ins.reference_position, ins.length, ins.allele_length), (100, 0, 2));
        assert_eq!(ins.shift_delta(), 2);

        let del = VariantRecord::from_alleles(199, "ATT", "A", "");
        assert_eq!((del.reference_position, del.length, del.allele_length), (200, 2, 0));
        assert_eq!(del.reference_end(), 202);

        let snv = VariantRecord::from_alleles(10, "C", "T", "");
        assert_eq!((snv.reference_position, snv.length, snv.allele_length), (10, 1, 1));
    }

    #[test]
    fn test_from_vcf_line() {
        let line = "chr1\t100\trs1\tA\tACG,AC\t50\tPASS\t.";
        let (chrom, record) = VariantRecord::from_vcf_line(line).unwrap().unwrap();
        assert_eq!(chrom, "chr1");
        assert_eq!(record.reference_position, 100);
        assert_eq!(record.allele_length, 2);
        assert_eq!(record.payload, line);

        assert!(VariantRecord::from_vcf_line("chr1\t5\t.\tA\t.").unwrap().is_none());
        assert!(VariantRecord::from_vcf_line("chr1\t5\t.").is_err());
    }

    #[test]
    fn test_symbolic_deletion() {
        let line = "chr2\t1000\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=1500";
        let (_, record) = VariantRecord::from_vcf_line(line).unwrap().unwrap();
        assert_eq!((record.reference_position, record.length), (1000, 500));
        assert_eq!(record.shift_delta(), -500);
    }

    #[test]
    fn test_positioned_caches_meta() {
        let ctx = ProjectContext::from_pairs([("chr1", 1000)]).unwrap();
        let mut registry = GenomeRegistry::new(&ctx);
        registry
            .load_shift(1, 0, "chr1", CoordinateShift::new([(100, 3)]).unwrap())
            .unwrap();
        let t = registry.transformer();

        let v = Variant::positioned(VariantRecord::new(500, 1, 1, "x"), 2, 0, "chr1", &t).unwrap();
        assert_eq!(v.meta_genome_position(), 503);
        assert_eq!(v.start_reference_position(), 500);
        assert_eq!(v.genome(), 2);
        assert_eq!(v.payload(), "x");
    }
}

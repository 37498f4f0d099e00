//! Project-wide context shared by the index and coordinate components.
//!
//! A [`ProjectContext`] is built once per opened project and passed by
//! reference wherever chromosome metadata is needed. There is no global
//! registry.
//!
//! # Example
//!
//! ```
//! use genotrack::context::ProjectContext;
//!
//! # fn main() -> genotrack::Result<()> {
//! let ctx = ProjectContext::from_pairs([("chr1", 248_956_422), ("chr2", 242_193_529)])?;
//! assert_eq!(ctx.chromosome_length("chr2"), Some(242_193_529));
//! assert!(ctx.validate_range("chr1", 0, 1_000).is_ok());
//! # Ok(())
//! # }
//! ```

use crate::error::{GenotrackError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Chromosome-length table for one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    names: Vec<String>,
    lengths: Vec<u64>,
    name_map: HashMap<String, usize>,
}

impl ProjectContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from `(name, length)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut ctx = Self::new();
        for (name, length) in pairs {
            ctx.add_chromosome(name, length)?;
        }
        Ok(ctx)
    }

    /// Load a chromosome sizes file (`name<TAB>length`, extra columns ignored).
    ///
    /// FASTA index (`.fai`) files have the same leading columns and load too.
    pub fn from_chrom_sizes<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a chromosome sizes table from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut ctx = Self::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or_default();
            let length = fields
                .next()
                .ok_or_else(|| {
                    GenotrackError::invalid_input(format!(
                        "line {}: expected name and length columns",
                        line_num + 1
                    ))
                })?
                .parse::<u64>()
                .map_err(|e| {
                    GenotrackError::invalid_input(format!(
                        "line {}: invalid chromosome length: {}",
                        line_num + 1,
                        e
                    ))
                })?;

            ctx.add_chromosome(name, length)?;
        }

        Ok(ctx)
    }

    /// Register a chromosome. Names must be unique.
    pub fn add_chromosome(&mut self, name: impl Into<String>, length: u64) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(GenotrackError::invalid_input("empty chromosome name"));
        }
        if self.name_map.contains_key(&name) {
            return Err(GenotrackError::invalid_input(format!(
                "duplicate chromosome '{}'",
                name
            )));
        }
        self.name_map.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.lengths.push(length);
        Ok(())
    }

    /// Length of a chromosome, if known
    pub fn chromosome_length(&self, name: &str) -> Option<u64> {
        self.name_map.get(name).map(|&idx| self.lengths[idx])
    }

    /// Whether the chromosome is known
    pub fn contains(&self, name: &str) -> bool {
        self.name_map.contains_key(name)
    }

    /// Chromosomes in registration order
    pub fn chromosomes(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.names
            .iter()
            .zip(self.lengths.iter())
            .map(|(name, &len)| (name.as_str(), len))
    }

    /// Number of chromosomes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check an inclusive range `[start, end]` against the chromosome length.
    ///
    /// Chromosomes missing from the table are not checked.
    pub fn validate_range(&self, chrom: &str, start: u64, end: u64) -> Result<()> {
        if start > end {
            return Err(GenotrackError::InvalidRange(format!(
                "start ({}) > end ({})",
                start, end
            )));
        }
        if let Some(length) = self.chromosome_length(chrom) {
            if end >= length {
                return Err(GenotrackError::InvalidRange(format!(
                    "{}:{}-{} extends past chromosome length {}",
                    chrom, start, end, length
                )));
            }
        }
        Ok(())
    }
}

/// Cooperative cancellation hook polled by long-running operations.
///
/// Implemented for any `Fn() -> bool` closure returning `true` while work
/// should go on.
pub trait ContinueCheck {
    /// `false` stops the operation at its next checkpoint
    fn should_continue(&self) -> bool;
}

impl<F: Fn() -> bool> ContinueCheck for F {
    fn should_continue(&self) -> bool {
        self()
    }
}

/// A check that never stops anything
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysContinue;

impl ContinueCheck for AlwaysContinue {
    fn should_continue(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_from_reader() {
        let data = "# sizes\nchr1\t1000\nchr2\t500\tignored\n\n";
        let ctx = ProjectContext::from_reader(data.as_bytes()).unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.chromosome_length("chr1"), Some(1000));
        assert_eq!(ctx.chromosome_length("chr2"), Some(500));
        assert_eq!(ctx.chromosome_length("chr3"), None);
    }

    #[test]
    fn test_from_reader_bad_length() {
        let data = "chr1\tlots\n";
        let err = ProjectContext::from_reader(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_duplicate_chromosome() {
        let result = ProjectContext::from_pairs([("chr1", 10), ("chr1", 20)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_range() {
        let ctx = ProjectContext::from_pairs([("chr1", 1000)]).unwrap();
        assert!(ctx.validate_range("chr1", 0, 999).is_ok());
        assert!(ctx.validate_range("chr1", 0, 1000).is_err());
        assert!(ctx.validate_range("chr1", 10, 5).is_err());
        // Unknown chromosomes are left to the index
        assert!(ctx.validate_range("chrUn", 0, 5_000).is_ok());
    }

    #[test]
    fn test_closure_continue_check() {
        let budget = Cell::new(2);
        let check = || {
            budget.set(budget.get() - 1);
            budget.get() > 0
        };
        assert!(check.should_continue());
        assert!(!check.should_continue());
        assert!(AlwaysContinue.should_continue());
    }
}

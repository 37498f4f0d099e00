//! Region strings such as `chr1:1,000-2,000`.
//!
//! Regions are written the way genome browsers show them: 1-based with an
//! inclusive end. Parsing converts to the 0-based inclusive range used by
//! index queries.
//!
//! ```
//! use genotrack::formats::region::Region;
//!
//! let region: Region = "chr1:1,001-2,000".parse()?;
//! assert_eq!(region.chrom, "chr1");
//! assert_eq!(region.start, 1000);
//! assert_eq!(region.end, Some(1999));
//! assert_eq!(region.to_string(), "chr1:1001-2000");
//! # Ok::<(), genotrack::GenotrackError>(())
//! ```

use crate::context::ProjectContext;
use crate::error::{GenotrackError, Result};
use crate::formats::index::bins::MAX_COORDINATE;
use std::fmt;
use std::str::FromStr;

/// A chromosome with an optional 0-based inclusive range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    /// Chromosome or contig name
    pub chrom: String,
    /// Start position (0-based, inclusive)
    pub start: u64,
    /// End position (0-based, inclusive); `None` runs to the chromosome end
    pub end: Option<u64>,
}

impl Region {
    /// A region over `[start, end]`, 0-based inclusive
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(GenotrackError::InvalidRange(format!(
                "start ({}) > end ({})",
                start, end
            )));
        }
        Ok(Region {
            chrom: chrom.into(),
            start,
            end: Some(end),
        })
    }

    /// A whole chromosome
    pub fn whole(chrom: impl Into<String>) -> Self {
        Region {
            chrom: chrom.into(),
            start: 0,
            end: None,
        }
    }

    /// Concrete inclusive bounds for a query.
    ///
    /// An open end resolves to the last base of the chromosome when the
    /// context knows it, else to the last addressable coordinate.
    pub fn bounds(&self, context: Option<&ProjectContext>) -> Result<(u64, u64)> {
        let end = match self.end {
            Some(end) => end,
            None => context
                .and_then(|ctx| ctx.chromosome_length(&self.chrom))
                .map(|len| len.saturating_sub(1))
                .unwrap_or(MAX_COORDINATE - 1),
        };
        if let Some(ctx) = context {
            ctx.validate_range(&self.chrom, self.start, end)?;
        }
        Ok((self.start, end))
    }
}

fn parse_position(text: &str, region: &str) -> Result<u64> {
    let digits: String = text.chars().filter(|&c| c != ',').collect();
    digits
        .parse::<u64>()
        .map_err(|e| GenotrackError::InvalidRange(format!("'{}': bad position '{}': {}", region, text, e)))
}

impl FromStr for Region {
    type Err = GenotrackError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (chrom, range) = match s.rsplit_once(':') {
            Some((chrom, range)) => (chrom, Some(range)),
            None => (s, None),
        };
        if chrom.is_empty() {
            return Err(GenotrackError::InvalidRange(format!(
                "'{}': missing chromosome",
                s
            )));
        }

        let range = match range {
            None => return Ok(Region::whole(chrom)),
            Some(range) => range,
        };

        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (parse_position(start, s)?, Some(parse_position(end, s)?)),
            None => (parse_position(range, s)?, None),
        };
        if start == 0 || end == Some(0) {
            return Err(GenotrackError::InvalidRange(format!(
                "'{}': positions are 1-based",
                s
            )));
        }

        match end {
            Some(end) => Region::new(chrom, start - 1, end - 1),
            None => Ok(Region {
                chrom: chrom.to_string(),
                start: start - 1,
                end: None,
            }),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.chrom, self.start + 1, end + 1),
            None if self.start == 0 => write!(f, "{}", self.chrom),
            None => write!(f, "{}:{}", self.chrom, self.start + 1),
        }
    }
}

//! Compression modes for captured blocks.
//!
//! The mode decides two things: whether a block's buffer is wrapped in a
//! streaming encoder, and which extra extension the committed file name
//! carries (`.gz` / `.snappy`).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Compression applied to a block's buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Bytes pass through untouched.
    #[default]
    None,
    /// Streaming gzip via `flate2`.
    Gzip,
    /// Streaming Snappy frame format via `snap`.
    Snappy,
}

impl Compression {
    /// Parse from a config string (case-insensitive).
    pub fn from_str_config(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "snappy" => Ok(Compression::Snappy),
            other => Err(Error::InvalidCompression(other.to_string())),
        }
    }

    /// Extend a base file extension with the compression extension.
    ///
    /// `"json"` stays `"json"` uncompressed, and becomes `"json.gz"` or
    /// `"json.snappy"` otherwise.
    pub fn suffix(&self, base: &str) -> String {
        match self {
            Compression::None => base.to_string(),
            Compression::Gzip => format!("{}.gz", base),
            Compression::Snappy => format!("{}.snappy", base),
        }
    }

    /// Whether this mode actually compresses.
    pub const fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Snappy => write!(f, "snappy"),
        }
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Compression::from_str_config(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Parsing
    // ---------------------------------------------------------------

    #[test]
    fn test_parse_known_modes() {
        assert_eq!(Compression::from_str_config("none").unwrap(), Compression::None);
        assert_eq!(Compression::from_str_config("gzip").unwrap(), Compression::Gzip);
        assert_eq!(Compression::from_str_config("snappy").unwrap(), Compression::Snappy);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Compression::from_str_config("GZip").unwrap(), Compression::Gzip);
        assert_eq!(Compression::from_str_config("SNAPPY").unwrap(), Compression::Snappy);
    }

    #[test]
    fn test_parse_empty_is_none() {
        assert_eq!(Compression::from_str_config("").unwrap(), Compression::None);
    }

    #[test]
    fn test_parse_unknown_fails() {
        let err = Compression::from_str_config("lz4").unwrap_err();
        assert!(matches!(err, Error::InvalidCompression(_)));
    }

    #[test]
    fn test_from_str_trait() {
        let c: Compression = "gzip".parse().unwrap();
        assert_eq!(c, Compression::Gzip);
    }

    // ---------------------------------------------------------------
    // Suffix handling
    // ---------------------------------------------------------------

    #[test]
    fn test_suffix_none() {
        assert_eq!(Compression::None.suffix("csv"), "csv");
    }

    #[test]
    fn test_suffix_gzip() {
        assert_eq!(Compression::Gzip.suffix("json"), "json.gz");
    }

    #[test]
    fn test_suffix_snappy() {
        assert_eq!(Compression::Snappy.suffix("csv"), "csv.snappy");
    }

    #[test]
    fn test_display_round_trips() {
        for c in [Compression::None, Compression::Gzip, Compression::Snappy] {
            let parsed = Compression::from_str_config(&c.to_string()).unwrap();
            assert_eq!(parsed, c);
        }
    }

    #[test]
    fn test_is_compressed() {
        assert!(!Compression::None.is_compressed());
        assert!(Compression::Gzip.is_compressed());
        assert!(Compression::Snappy.is_compressed());
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(Compression::default(), Compression::None);
    }
}

use flate2::Compression as Level;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use snafu::{Location, OptionExt, ResultExt, Snafu, ensure};
use std::io::{Read, Write};
use std::str::FromStr;

/// Largest decoded payload accepted unless a caller configures otherwise.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Payload compression negotiated per call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    Identity,
    Gzip,
}

impl Compression {
    pub fn name(self) -> &'static str {
        match self {
            Compression::Identity => "identity",
            Compression::Gzip => "gzip",
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Compression::Identity => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Level::default());
                encoder.write_all(data).context(DataWritingSnafu)?;
                encoder.finish().context(DataWritingSnafu)
            }
        }
    }

    /// Restores a payload. Output longer than `limit` bytes is rejected
    /// without inflating more than `limit + 1` bytes.
    pub fn decompress(self, data: &[u8], limit: usize) -> Result<Vec<u8>, CompressionError> {
        match self {
            Compression::Identity => {
                ensure!(data.len() <= limit, TooLargeSnafu { limit });
                Ok(data.to_vec())
            }
            Compression::Gzip => {
                let mut decoder = GzDecoder::new(data).take((limit as u64).saturating_add(1));
                let mut decompressed = Vec::new();
                decoder
                    .read_to_end(&mut decompressed)
                    .context(DataReadingSnafu)?;
                ensure!(decompressed.len() <= limit, TooLargeSnafu { limit });
                Ok(decompressed)
            }
        }
    }
}

impl FromStr for Compression {
    type Err = CompressionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "identity" | "none" | "" => Some(Compression::Identity),
            "gzip" => Some(Compression::Gzip),
            _ => None,
        }
        .context(UnknownAlgorithmSnafu { name })
    }
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum CompressionError {
    #[snafu(display("Failed to write data during compression"))]
    DataWriting {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to read data during decompression"))]
    DataReading {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Decompressed payload exceeds {limit} bytes"))]
    TooLarge {
        limit: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Unknown compression algorithm: {name}"))]
    UnknownAlgorithm {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },
}

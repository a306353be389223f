use std::{
    io::{self, Write},
    str::FromStr,
};

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::FinishWrite;

const GZIP_DEFAULT_LEVEL: u8 = 6;
const GZIP_MAX_LEVEL: u8 = 9;
const LZ4_DEFAULT_LEVEL: u8 = 0;
const LZ4_MAX_LEVEL: u8 = 16;
const ZSTD_DEFAULT_LEVEL: u8 = 0;
const ZSTD_MAX_LEVEL: u8 = 19;

/// Compression format
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Compression {
    /// The bzip2 format
    Bzip2,
    /// The gzip format with compression level as associated value
    Gzip(u8),
    /// The lz4 format with compression level as associated value
    Lz4(u8),
    /// The zstd format with compression level as associated value
    Zstd(u8),
}

impl Compression {
    /// Conventional file name extension, without leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Bzip2 => "bz2",
            Compression::Gzip(_) => "gz",
            Compression::Lz4(_) => "lz4",
            Compression::Zstd(_) => "zst",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseCompressionErr {
    #[error("Unknown compression algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("Level {1} not supported for {0} compression")]
    UnsupportedLevel(String, String),
}

lazy_static! {
    static ref COMPRESSION_RE: Regex =
        Regex::new(r"^(?P<algo>[[:alnum:]]+)(?:_(?P<lvl>\d+))?$").unwrap();
}

impl FromStr for Compression {
    type Err = ParseCompressionErr;

    /// Parse a compression format of the form `ALGO[_LEVEL]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Compression::*;
        use ParseCompressionErr::*;

        let lower_case = s.to_ascii_lowercase();
        let Some(captures) = COMPRESSION_RE.captures(&lower_case) else {
            return Err(UnknownAlgorithm(s.to_owned()));
        };
        let algo = &captures["algo"];
        let lvl = captures.name("lvl").map(|l| l.as_str());
        let level = |default: u8, max: u8| match lvl {
            None => Ok(default),
            Some(l) => match l.parse::<u8>() {
                Ok(l) if l <= max => Ok(l),
                _ => Err(UnsupportedLevel(algo.to_owned(), l.to_owned())),
            },
        };
        match algo {
            "bzip2" | "bz2" => match lvl {
                None => Ok(Bzip2),
                Some(l) => Err(UnsupportedLevel(algo.to_owned(), l.to_owned())),
            },
            "gzip" | "gz" => level(GZIP_DEFAULT_LEVEL, GZIP_MAX_LEVEL).map(Gzip),
            "lz4" => level(LZ4_DEFAULT_LEVEL, LZ4_MAX_LEVEL).map(Lz4),
            "zstd" | "zstandard" | "zst" => {
                level(ZSTD_DEFAULT_LEVEL, ZSTD_MAX_LEVEL).map(Zstd)
            }
            _ => Err(UnknownAlgorithm(s.to_owned())),
        }
    }
}

/// Writer compressing to one of the supported formats
///
/// Unlike the encoders it wraps, the compressed stream can be completed
/// explicitly with [FinishWrite::finish_write], so that errors while
/// writing the trailing data are not lost.
pub enum CompressWriter<W: Write> {
    Bzip2(BzEncoder<W>),
    Gzip(GzEncoder<W>),
    Lz4(lz4::Encoder<W>),
    Zstd(zstd::Encoder<'static, W>),
    Plain(W),
    Finished,
}

impl<W: Write> Write for CompressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        use CompressWriter::*;
        match self {
            Bzip2(w) => w.write(buf),
            Gzip(w) => w.write(buf),
            Lz4(w) => w.write(buf),
            Zstd(w) => w.write(buf),
            Plain(w) => w.write(buf),
            Finished => Err(io::Error::new(
                io::ErrorKind::Other,
                "Write to finished compression stream",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        use CompressWriter::*;
        match self {
            Bzip2(w) => w.flush(),
            Gzip(w) => w.flush(),
            Lz4(w) => w.flush(),
            Zstd(w) => w.flush(),
            Plain(w) => w.flush(),
            Finished => Ok(()),
        }
    }
}

impl<W: Write> FinishWrite for CompressWriter<W> {
    /// Write the end of the compressed stream and flush the underlying writer
    fn finish_write(&mut self) -> io::Result<()> {
        use CompressWriter::*;
        let mut inner = match std::mem::replace(self, Finished) {
            Bzip2(w) => w.finish()?,
            Gzip(w) => w.finish()?,
            Lz4(w) => {
                let (inner, res) = w.finish();
                res?;
                inner
            }
            Zstd(w) => w.finish()?,
            Plain(w) => w,
            Finished => return Ok(()),
        };
        inner.flush()
    }
}

/// Convert into a writer that compresses to the given format
pub fn compress_writer<W: Write>(
    writer: W,
    compression: Option<Compression>,
) -> Result<CompressWriter<W>, io::Error> {
    match compression {
        Some(Compression::Bzip2) => {
            let encoder = BzEncoder::new(writer, bzip2::Compression::best());
            Ok(CompressWriter::Bzip2(encoder))
        }
        Some(Compression::Gzip(lvl)) => {
            let encoder =
                GzEncoder::new(writer, flate2::Compression::new(lvl.into()));
            Ok(CompressWriter::Gzip(encoder))
        }
        Some(Compression::Lz4(lvl)) => {
            let encoder = lz4::EncoderBuilder::new()
                .auto_flush(true)
                .level(lvl.into())
                .build(writer)?;
            Ok(CompressWriter::Lz4(encoder))
        }
        Some(Compression::Zstd(lvl)) => {
            let encoder = zstd::Encoder::new(writer, lvl.into())?;
            Ok(CompressWriter::Zstd(encoder))
        }
        None => Ok(CompressWriter::Plain(writer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    #[test]
    fn parse() {
        use Compression::*;
        assert_eq!("bz2".parse(), Ok(Bzip2));
        assert_eq!("GZIP".parse(), Ok(Gzip(6)));
        assert_eq!("gz_9".parse(), Ok(Gzip(9)));
        assert_eq!("lz4_3".parse(), Ok(Lz4(3)));
        assert_eq!("zstd".parse(), Ok(Zstd(0)));
        assert_eq!("zstd_19".parse(), Ok(Zstd(19)));
        assert!(matches!(
            "gz_10".parse::<Compression>(),
            Err(ParseCompressionErr::UnsupportedLevel(..))
        ));
        assert!(matches!(
            "bzip2_1".parse::<Compression>(),
            Err(ParseCompressionErr::UnsupportedLevel(..))
        ));
        assert!(matches!(
            "xz".parse::<Compression>(),
            Err(ParseCompressionErr::UnknownAlgorithm(..))
        ));
        assert!("gz-3".parse::<Compression>().is_err());
    }

    const LINE: &[u8] = b"{\"record\":\"header\"}\n";

    fn finished(compression: Compression) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut w = compress_writer(&mut buf, Some(compression)).unwrap();
        w.write_all(LINE).unwrap();
        w.finish_write().unwrap();
        assert!(w.write_all(LINE).is_err());
        // finishing twice is harmless
        w.finish_write().unwrap();
        drop(w);
        buf
    }

    #[test]
    fn gzip_round_trip() {
        let buf = finished(Compression::Gzip(6));
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(buf.as_slice())
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, LINE);
    }

    #[test]
    fn lz4_round_trip() {
        let buf = finished(Compression::Lz4(0));
        let mut out = Vec::new();
        lz4::Decoder::new(buf.as_slice())
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, LINE);
    }

    #[test]
    fn zstd_round_trip() {
        let buf = finished(Compression::Zstd(3));
        assert_eq!(zstd::decode_all(buf.as_slice()).unwrap(), LINE);
    }

    /// Accepts a limited number of bytes, then fails
    struct Full(usize);

    impl Write for Full {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = std::cmp::min(self.0, buf.len());
            self.0 -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn error_on_finish() {
        for compression in [Compression::Gzip(6), Compression::Bzip2, Compression::Zstd(0)] {
            let mut w = compress_writer(Full(4), Some(compression)).unwrap();
            let res = w.write_all(LINE).and_then(|_| w.finish_write());
            assert!(res.is_err(), "{compression:?}");
        }
        let mut w = compress_writer(Full(4), Some(Compression::Bzip2)).unwrap();
        w.write_all(LINE).unwrap();
        assert!(w.finish_write().is_err());
    }
}

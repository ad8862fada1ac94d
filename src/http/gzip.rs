//! Transcoding of response bodies.
//!
//! The sink writes into a [`BodyWriter`]. With gzip enabled the pooled buffer
//! is moved behind a `GzEncoder`; finishing the encoder hands the buffer back
//! so the next tenant reuses the same allocation.

use std::io::{self, Write};

use axum::http::{header, HeaderValue};
use bytes::buf::Writer;
use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::http::response::ResponseSink;

/// Value of `Content-Encoding` for compressed responses.
pub const GZIP_SCHEME: &str = "gzip";

/// Destination of everything a handler writes.
pub(crate) enum BodyWriter {
    Plain(BytesMut),
    Gzip(GzEncoder<Writer<BytesMut>>),
}

impl Default for BodyWriter {
    fn default() -> Self {
        BodyWriter::Plain(BytesMut::new())
    }
}

impl BodyWriter {
    pub(crate) fn is_gzip(&self) -> bool {
        matches!(self, BodyWriter::Gzip(_))
    }

    pub(crate) fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            BodyWriter::Plain(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            BodyWriter::Gzip(encoder) => encoder.write_all(data),
        }
    }

    /// Chain a gzip encoder in front of the buffer. Bytes already written stay
    /// uncompressed, so this must run before the handler writes anything.
    pub(crate) fn compress(&mut self, level: u32) -> io::Result<()> {
        if level > 9 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("gzip: invalid compression level: {level}"),
            ));
        }
        if let BodyWriter::Plain(buf) = std::mem::take(self) {
            *self = BodyWriter::Gzip(GzEncoder::new(buf.writer(), Compression::new(level)));
        }
        Ok(())
    }

    /// Flush everything written so far into a frozen body.
    ///
    /// The writer is left plain and empty. Its buffer can reclaim the
    /// allocation once the returned bytes are dropped.
    pub(crate) fn finish(&mut self) -> io::Result<Bytes> {
        let mut buf = match std::mem::take(self) {
            BodyWriter::Plain(buf) => buf,
            BodyWriter::Gzip(encoder) => encoder.finish()?.into_inner(),
        };
        let body = buf.split().freeze();
        *self = BodyWriter::Plain(buf);
        Ok(body)
    }

    pub(crate) fn clear(&mut self) {
        match self {
            BodyWriter::Plain(buf) => buf.clear(),
            BodyWriter::Gzip(_) => *self = BodyWriter::default(),
        }
    }
}

/// Rebind the sink to a gzip encoder and announce the encoding.
pub(crate) fn transcode(sink: &mut ResponseSink, level: u32) -> io::Result<()> {
    sink.writer_mut().compress(level)?;
    sink.headers_mut().insert(
        header::CONTENT_ENCODING,
        HeaderValue::from_static(GZIP_SCHEME),
    );
    Ok(())
}

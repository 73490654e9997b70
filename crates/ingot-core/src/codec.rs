//! Fixed-width binary codec
//!
//! Decodes raw fixed-length records into typed [`DecodedRecord`]s driven
//! entirely by the [`RecordDescriptor`] layout. All field extraction is
//! bounds-checked slicing over explicit offset/width windows.
//!
//! # Format
//!
//! - `integer64`: 8 bytes, signed, in the configured byte order
//! - `float64`: 8 bytes, IEEE-754, in the configured byte order
//! - `fixed_text`: single-byte (ASCII/Latin-1) text padded to the declared
//!   width; decoding strips trailing padding bytes (NUL and ASCII
//!   whitespace) and preserves leading content exactly
//!
//! Byte order defaults to little-endian; exports produced on a big-endian
//! host need [`Endianness::Big`] set explicitly.

use crate::error::{LoadError, Result};
use crate::record::{DecodedRecord, FieldValue};
use crate::schema::{FieldKind, RecordDescriptor};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Byte order of the numeric fields in a record source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little-endian (the default; matches x86 export hosts)
    #[default]
    Little,
    /// Big-endian sources require this explicit flag
    Big,
}

impl Endianness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }

    fn read_i64(self, buf: &[u8]) -> i64 {
        match self {
            Endianness::Little => LittleEndian::read_i64(buf),
            Endianness::Big => BigEndian::read_i64(buf),
        }
    }

    fn read_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endianness::Little => LittleEndian::read_f64(buf),
            Endianness::Big => BigEndian::read_f64(buf),
        }
    }

    fn write_i64(self, buf: &mut [u8], value: i64) {
        match self {
            Endianness::Little => LittleEndian::write_i64(buf, value),
            Endianness::Big => BigEndian::write_i64(buf, value),
        }
    }

    fn write_f64(self, buf: &mut [u8], value: f64) {
        match self {
            Endianness::Little => LittleEndian::write_f64(buf, value),
            Endianness::Big => BigEndian::write_f64(buf, value),
        }
    }
}

impl std::str::FromStr for Endianness {
    type Err = LoadError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "little" | "le" | "little-endian" => Ok(Endianness::Little),
            "big" | "be" | "big-endian" => Ok(Endianness::Big),
            _ => Err(LoadError::Config(format!("invalid byte order: {}", s))),
        }
    }
}

impl std::fmt::Display for Endianness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing padding in text fields: NUL plus ASCII whitespace.
fn trim_trailing_padding(window: &[u8]) -> &[u8] {
    let mut end = window.len();
    while end > 0 {
        let b = window[end - 1];
        if b == 0 || b.is_ascii_whitespace() {
            end -= 1;
        } else {
            break;
        }
    }
    &window[..end]
}

/// Latin-1 bytes map 1:1 onto the first 256 Unicode scalar values.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Decode one raw record against its schema.
///
/// The buffer must be exactly `schema.record_len()` bytes; anything else is
/// a [`LoadError::RecordLengthMismatch`]. A caller streaming a file must
/// drop a short trailing chunk instead of passing it here (see
/// [`RecordReader`]).
pub fn decode_record(
    schema: &Arc<RecordDescriptor>,
    buf: &[u8],
    order: Endianness,
) -> Result<DecodedRecord> {
    if buf.len() != schema.record_len() {
        return Err(LoadError::RecordLengthMismatch {
            table: schema.table_name().to_string(),
            expected: schema.record_len(),
            actual: buf.len(),
        });
    }

    let mut values = Vec::with_capacity(schema.fields().len());
    for window in schema.windows() {
        let bytes = &buf[window.range()];
        let value = match window.field.kind() {
            FieldKind::Integer64 => FieldValue::Integer64(order.read_i64(bytes)),
            FieldKind::Float64 => FieldValue::Float64(order.read_f64(bytes)),
            FieldKind::FixedText => {
                FieldValue::Text(latin1_to_string(trim_trailing_padding(bytes)))
            },
        };
        values.push(value);
    }

    Ok(DecodedRecord::new(Arc::clone(schema), values))
}

/// Encode a decoded record back into its fixed-width form.
///
/// The inverse of [`decode_record`], used for fixture construction and
/// tooling. Text fields are space-padded to their declared width, so a
/// source that padded with NUL does not round-trip byte-identically; the
/// decoded values always do, because decoding strips either padding.
pub fn encode_record(record: &DecodedRecord, order: Endianness) -> Result<Vec<u8>> {
    let schema = record.schema();
    let mut buf = vec![0u8; schema.record_len()];

    for (window, value) in schema.windows().zip(record.values()) {
        let name = window.field.name();
        let out = &mut buf[window.range()];
        match (window.field.kind(), value) {
            (FieldKind::Integer64, FieldValue::Integer64(v)) => order.write_i64(out, *v),
            (FieldKind::Float64, FieldValue::Float64(v)) => order.write_f64(out, *v),
            (FieldKind::FixedText, FieldValue::Text(text)) => {
                encode_text(name, text, out)?;
            },
            (kind, value) => {
                return Err(LoadError::InvalidFieldValue {
                    field: name.to_string(),
                    reason: format!("expected {}, got {}", kind, value.kind()),
                });
            },
        }
    }

    Ok(buf)
}

fn encode_text(field: &str, text: &str, out: &mut [u8]) -> Result<()> {
    let mut idx = 0;
    for ch in text.chars() {
        let code = ch as u32;
        if code > 0xFF {
            return Err(LoadError::InvalidFieldValue {
                field: field.to_string(),
                reason: format!("character {:?} is outside Latin-1", ch),
            });
        }
        if idx >= out.len() {
            return Err(LoadError::InvalidFieldValue {
                field: field.to_string(),
                reason: format!(
                    "text of {} bytes exceeds declared width {}",
                    text.chars().count(),
                    out.len()
                ),
            });
        }
        out[idx] = code as u8;
        idx += 1;
    }
    for slot in out.iter_mut().skip(idx) {
        *slot = b' ';
    }
    Ok(())
}

/// Decoding strategy for one table's records.
///
/// [`SchemaDecoder`] is the generic implementation driven by the schema
/// model; specialized implementations can be registered per table in a
/// [`DecoderRegistry`](crate::registry::DecoderRegistry).
pub trait RecordDecoder: std::fmt::Debug + Send + Sync {
    fn schema(&self) -> &Arc<RecordDescriptor>;

    /// Decode one raw record of exactly `schema().record_len()` bytes.
    fn decode(&self, buf: &[u8]) -> Result<DecodedRecord>;
}

/// Generic schema-driven decoder.
#[derive(Debug, Clone)]
pub struct SchemaDecoder {
    schema: Arc<RecordDescriptor>,
    order: Endianness,
}

impl SchemaDecoder {
    pub fn new(schema: Arc<RecordDescriptor>, order: Endianness) -> Self {
        Self { schema, order }
    }

    pub fn byte_order(&self) -> Endianness {
        self.order
    }
}

impl RecordDecoder for SchemaDecoder {
    fn schema(&self) -> &Arc<RecordDescriptor> {
        &self.schema
    }

    fn decode(&self, buf: &[u8]) -> Result<DecodedRecord> {
        decode_record(&self.schema, buf, self.order)
    }
}

/// Lazy, forward-only record stream over any byte source.
///
/// Reads `record_len`-sized chunks into a single reused buffer until the
/// source is exhausted. A final chunk shorter than one record ends the
/// stream without decoding: fixed-block export tooling pads files to block
/// boundaries, so truncated trailing bytes are dropped, not reported.
pub struct RecordReader<R> {
    reader: R,
    decoder: Arc<dyn RecordDecoder>,
    buf: Vec<u8>,
    records_read: u64,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R, decoder: Arc<dyn RecordDecoder>) -> Self {
        let record_len = decoder.schema().record_len();
        Self {
            reader,
            decoder,
            buf: vec![0u8; record_len],
            records_read: 0,
            finished: false,
        }
    }

    /// Stream with the generic schema-driven decoder.
    pub fn from_schema(reader: R, schema: Arc<RecordDescriptor>, order: Endianness) -> Self {
        Self::new(reader, Arc::new(SchemaDecoder::new(schema, order)))
    }

    /// Records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read and decode the next record, or `None` at end of stream.
    pub fn read_record(&mut self) -> Result<Option<DecodedRecord>> {
        if self.finished {
            return Ok(None);
        }

        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            self.finished = true;
            return Ok(None);
        }
        if filled < self.buf.len() {
            // Short trailing chunk: end of stream, silently dropped.
            self.finished = true;
            debug!(
                table = %self.decoder.schema().table_name(),
                dropped_bytes = filled,
                "Discarding truncated trailing chunk"
            );
            return Ok(None);
        }

        let record = self.decoder.decode(&self.buf)?;
        self.records_read += 1;
        Ok(Some(record))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn example_schema() -> Arc<RecordDescriptor> {
        Arc::new(
            RecordDescriptor::new(
                "trades",
                "trades.dat",
                vec![
                    FieldDescriptor::integer64("id"),
                    FieldDescriptor::fixed_text("name", 8),
                    FieldDescriptor::float64("score"),
                ],
            )
            .unwrap(),
        )
    }

    fn example_row_le(id: i64, name: &[u8; 8], score: f64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24);
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(name);
        buf.extend_from_slice(&score.to_le_bytes());
        buf
    }

    #[test]
    fn test_decode_example_record() {
        let schema = example_schema();
        assert_eq!(schema.record_len(), 24);

        let buf = example_row_le(42, b"ABC\0\0\0\0\0", 3.5);
        let record = decode_record(&schema, &buf, Endianness::Little).unwrap();

        assert_eq!(record.get("id").and_then(FieldValue::as_i64), Some(42));
        assert_eq!(record.get("name").and_then(FieldValue::as_text), Some("ABC"));
        assert_eq!(record.get("score").and_then(FieldValue::as_f64), Some(3.5));
    }

    #[test]
    fn test_decode_big_endian_source() {
        let schema = example_schema();
        let mut buf = Vec::with_capacity(24);
        buf.extend_from_slice(&42i64.to_be_bytes());
        buf.extend_from_slice(b"ABC     ");
        buf.extend_from_slice(&3.5f64.to_be_bytes());

        let record = decode_record(&schema, &buf, Endianness::Big).unwrap();
        assert_eq!(record.get("id").and_then(FieldValue::as_i64), Some(42));
        assert_eq!(record.get("score").and_then(FieldValue::as_f64), Some(3.5));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let schema = example_schema();
        let buf = vec![0u8; 23];
        let err = decode_record(&schema, &buf, Endianness::Little).unwrap_err();
        match err {
            LoadError::RecordLengthMismatch {
                table,
                expected,
                actual,
            } => {
                assert_eq!(table, "trades");
                assert_eq!(expected, 24);
                assert_eq!(actual, 23);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_trailing_padding_stripped() {
        let schema = Arc::new(
            RecordDescriptor::new(
                "t",
                "t.dat",
                vec![FieldDescriptor::fixed_text("txt", 8)],
            )
            .unwrap(),
        );

        // Mixed trailing padding: spaces, tab, NUL. Leading spaces survive.
        let record = decode_record(&schema, b"  AB \t\0 ", Endianness::Little).unwrap();
        assert_eq!(record.get("txt").and_then(FieldValue::as_text), Some("  AB"));

        // All padding decodes to the empty string.
        let record = decode_record(&schema, b"\0\0\0\0    ", Endianness::Little).unwrap();
        assert_eq!(record.get("txt").and_then(FieldValue::as_text), Some(""));

        let record = decode_record(&schema, b"\0\0\0\0\0\0\0\0", Endianness::Little).unwrap();
        assert_eq!(record.get("txt").and_then(FieldValue::as_text), Some(""));
    }

    #[test]
    fn test_text_latin1_high_bytes() {
        let schema = Arc::new(
            RecordDescriptor::new(
                "t",
                "t.dat",
                vec![FieldDescriptor::fixed_text("txt", 4)],
            )
            .unwrap(),
        );
        // 0xE9 is 'é' in Latin-1.
        let record = decode_record(&schema, &[0xE9, b'f', b' ', b' '], Endianness::Little).unwrap();
        assert_eq!(record.get("txt").and_then(FieldValue::as_text), Some("\u{e9}f"));
    }

    #[test]
    fn test_encode_round_trip() {
        let schema = example_schema();
        let buf = example_row_le(-7, b"XY\0\0\0\0\0\0", -0.25);
        let record = decode_record(&schema, &buf, Endianness::Little).unwrap();

        let encoded = encode_record(&record, Endianness::Little).unwrap();
        assert_eq!(encoded.len(), schema.record_len());

        let round_tripped = decode_record(&schema, &encoded, Endianness::Little).unwrap();
        assert_eq!(round_tripped, record);

        // Encoding pads text with spaces, so NUL-padded input is not
        // byte-identical even though the values are.
        assert_ne!(encoded, buf);
    }

    #[test]
    fn test_encode_rejects_oversized_text() {
        let schema = Arc::new(
            RecordDescriptor::new(
                "t",
                "t.dat",
                vec![FieldDescriptor::fixed_text("txt", 2)],
            )
            .unwrap(),
        );
        let record =
            DecodedRecord::new(schema, vec![FieldValue::Text("toolong".to_string())]);
        let err = encode_record(&record, Endianness::Little).unwrap_err();
        assert!(matches!(err, LoadError::InvalidFieldValue { .. }));
    }

    #[test]
    fn test_encode_rejects_non_latin1_text() {
        let schema = Arc::new(
            RecordDescriptor::new(
                "t",
                "t.dat",
                vec![FieldDescriptor::fixed_text("txt", 8)],
            )
            .unwrap(),
        );
        let record = DecodedRecord::new(schema, vec![FieldValue::Text("\u{20ac}".to_string())]);
        let err = encode_record(&record, Endianness::Little).unwrap_err();
        assert!(matches!(err, LoadError::InvalidFieldValue { .. }));
    }

    #[test]
    fn test_encode_rejects_kind_mismatch() {
        let schema = example_schema();
        let record = DecodedRecord::new(
            schema,
            vec![
                FieldValue::Text("not an int".to_string()),
                FieldValue::Text("x".to_string()),
                FieldValue::Float64(0.0),
            ],
        );
        let err = encode_record(&record, Endianness::Little).unwrap_err();
        assert!(matches!(err, LoadError::InvalidFieldValue { .. }));
    }

    #[test]
    fn test_stream_reads_exact_multiple() {
        let schema = example_schema();
        let mut data = Vec::new();
        for i in 0..3 {
            data.extend_from_slice(&example_row_le(i, b"ROW     ", i as f64));
        }

        let mut reader =
            RecordReader::from_schema(Cursor::new(data), Arc::clone(&schema), Endianness::Little);
        let mut ids = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            ids.push(record.get("id").and_then(FieldValue::as_i64).unwrap());
        }
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_stream_drops_truncated_tail() {
        let schema = example_schema();
        let mut data = Vec::new();
        for i in 0..2 {
            data.extend_from_slice(&example_row_le(i, b"ROW     ", 1.0));
        }
        // 10 stray bytes: less than one record, silently dropped.
        data.extend_from_slice(&[0xAA; 10]);

        let reader =
            RecordReader::from_schema(Cursor::new(data), Arc::clone(&schema), Endianness::Little);
        let records: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_stream_empty_source() {
        let schema = example_schema();
        let mut reader = RecordReader::from_schema(
            Cursor::new(Vec::new()),
            Arc::clone(&schema),
            Endianness::Little,
        );
        assert!(reader.read_record().unwrap().is_none());
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 0);
    }

    #[test]
    fn test_endianness_from_str() {
        assert_eq!("little".parse::<Endianness>().unwrap(), Endianness::Little);
        assert_eq!("LE".parse::<Endianness>().unwrap(), Endianness::Little);
        assert_eq!("big".parse::<Endianness>().unwrap(), Endianness::Big);
        assert_eq!("big-endian".parse::<Endianness>().unwrap(), Endianness::Big);
        assert!("middle".parse::<Endianness>().is_err());
    }

    fn arb_schema() -> impl Strategy<Value = RecordDescriptor> {
        proptest::collection::vec((0u8..3u8, 1usize..32usize), 1..8).prop_map(|specs| {
            let fields = specs
                .iter()
                .enumerate()
                .map(|(i, (kind, width))| match kind {
                    0 => FieldDescriptor::integer64(format!("f{i}")),
                    1 => FieldDescriptor::float64(format!("f{i}")),
                    _ => FieldDescriptor::fixed_text(format!("f{i}"), *width),
                })
                .collect();
            RecordDescriptor::new("prop", "prop.dat", fields).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_record_len_is_width_sum(schema in arb_schema()) {
            let sum: usize = schema.fields().iter().map(|f| f.width()).sum();
            prop_assert_eq!(schema.record_len(), sum);

            let last = schema.windows().last().unwrap();
            prop_assert_eq!(last.range().end, schema.record_len());
        }

        #[test]
        fn prop_decode_never_reads_out_of_bounds(schema in arb_schema(), seed in any::<u64>()) {
            let schema = Arc::new(schema);
            let buf: Vec<u8> = (0..schema.record_len())
                .map(|i| (seed.wrapping_mul(31).wrapping_add(i as u64)) as u8)
                .collect();
            // Any exact-length buffer decodes without panicking.
            let record = decode_record(&schema, &buf, Endianness::Little).unwrap();
            prop_assert_eq!(record.len(), schema.fields().len());
        }

        #[test]
        fn prop_numeric_round_trip(
            ints in proptest::collection::vec(any::<i64>(), 1..5),
            floats in proptest::collection::vec(-1e300f64..1e300f64, 1..5),
            order in prop_oneof![Just(Endianness::Little), Just(Endianness::Big)],
        ) {
            let mut fields = Vec::new();
            let mut values = Vec::new();
            for (i, v) in ints.iter().enumerate() {
                fields.push(FieldDescriptor::integer64(format!("i{i}")));
                values.push(FieldValue::Integer64(*v));
            }
            for (i, v) in floats.iter().enumerate() {
                fields.push(FieldDescriptor::float64(format!("d{i}")));
                values.push(FieldValue::Float64(*v));
            }
            let schema = Arc::new(RecordDescriptor::new("prop", "prop.dat", fields).unwrap());
            let record = DecodedRecord::new(Arc::clone(&schema), values);

            let encoded = encode_record(&record, order).unwrap();
            let decoded = decode_record(&schema, &encoded, order).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}

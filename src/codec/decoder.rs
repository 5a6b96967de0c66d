//! Streaming decoder: bytes → `(Message, bytes_consumed)`.
//!
//! `decode` is a pure function over `&[u8]` — it holds no state of its own.
//! The caller (`Client`'s receive loop) owns buffer growth and retries,
//! mirroring the split the teacher's own `read_message`/`read_incoming`
//! draw between "parse what's in this buffer" and "own the socket".
//!
//! Unlike the teacher's length-prefixed framing, messages here are framed
//! only by their self-describing outer MessagePack array header, so the
//! decoder must be able to tell a truncated prefix (`NeedMore`) apart from
//! genuinely malformed bytes at every level of recursion, not just at a
//! fixed length-prefix boundary.

use rmp::decode::{self, Bytes, MarkerReadError, NumValueReadError, ValueReadError};
use rmp::Marker;

use super::message::Message;
use crate::error::{DecodeError, Result};
use crate::value::Value;

/// MessagePack's reserved extension type for timestamps (-1).
const EXT_TYPE_TIMESTAMP: i8 = -1;

/// Attempt to decode a single message from the front of `bytes`.
///
/// On success, returns the decoded [`Message`] and the number of bytes it
/// consumed from the front of `bytes` — the caller is responsible for
/// dropping those bytes before the next call. On
/// `Err(`[`DecodeError::NeedMore`]`)`, `bytes` is a strict prefix of a
/// valid message: read more from the transport, append it, and retry. Any
/// other `Err` is terminal — the buffer should be discarded.
pub fn decode(bytes: &[u8]) -> Result<(Message, usize)> {
    let mut reader = Bytes::new(bytes);
    let value = decode_value(&mut reader)?;
    let consumed = reader.position() as usize;
    let message = Message::from_value(value)?;
    Ok((message, consumed))
}

/// Decode a single, arbitrarily-nested `Value` from `reader`. `Value`s are
/// acyclic owned trees, so this recursion always terminates on well-formed
/// input; on malformed input it terminates because every byte is consumed
/// monotonically.
fn decode_value(reader: &mut Bytes<'_>) -> Result<Value> {
    let marker = decode::read_marker(reader).map_err(marker_err)?;
    decode_value_from_marker(marker, reader)
}

fn decode_value_from_marker(marker: Marker, reader: &mut Bytes<'_>) -> Result<Value> {
    use rmp::decode::RmpRead;

    let value = match marker {
        Marker::Null => Value::Nil,
        Marker::True => Value::Bool(true),
        Marker::False => Value::Bool(false),
        Marker::FixPos(v) => Value::UInt(u64::from(v)),
        Marker::FixNeg(v) => Value::Int(i64::from(v)),
        Marker::U8 => Value::UInt(u64::from(reader.read_data_u8().map_err(data_err)?)),
        Marker::U16 => Value::UInt(u64::from(reader.read_data_u16().map_err(data_err)?)),
        Marker::U32 => Value::UInt(u64::from(reader.read_data_u32().map_err(data_err)?)),
        Marker::U64 => Value::UInt(reader.read_data_u64().map_err(data_err)?),
        Marker::I8 => Value::Int(i64::from(reader.read_data_i8().map_err(data_err)?)),
        Marker::I16 => Value::Int(i64::from(reader.read_data_i16().map_err(data_err)?)),
        Marker::I32 => Value::Int(i64::from(reader.read_data_i32().map_err(data_err)?)),
        Marker::I64 => Value::Int(reader.read_data_i64().map_err(data_err)?),
        Marker::F32 => Value::Float(f64::from(reader.read_data_f32().map_err(data_err)?)),
        Marker::F64 => Value::Float(reader.read_data_f64().map_err(data_err)?),
        Marker::FixStr(len) => Value::Str(read_bytes(reader, u32::from(len))?),
        Marker::Str8 => {
            let len = reader.read_data_u8().map_err(data_err)?;
            Value::Str(read_bytes(reader, u32::from(len))?)
        }
        Marker::Str16 => {
            let len = reader.read_data_u16().map_err(data_err)?;
            Value::Str(read_bytes(reader, u32::from(len))?)
        }
        Marker::Str32 => {
            let len = reader.read_data_u32().map_err(data_err)?;
            Value::Str(read_bytes(reader, len)?)
        }
        Marker::Bin8 => {
            let len = reader.read_data_u8().map_err(data_err)?;
            Value::Bin(read_bytes(reader, u32::from(len))?)
        }
        Marker::Bin16 => {
            let len = reader.read_data_u16().map_err(data_err)?;
            Value::Bin(read_bytes(reader, u32::from(len))?)
        }
        Marker::Bin32 => {
            let len = reader.read_data_u32().map_err(data_err)?;
            Value::Bin(read_bytes(reader, len)?)
        }
        Marker::FixArray(len) => decode_array(reader, u32::from(len))?,
        Marker::Array16 => {
            let len = reader.read_data_u16().map_err(data_err)?;
            decode_array(reader, u32::from(len))?
        }
        Marker::Array32 => {
            let len = reader.read_data_u32().map_err(data_err)?;
            decode_array(reader, len)?
        }
        Marker::FixMap(len) => decode_map(reader, u32::from(len))?,
        Marker::Map16 => {
            let len = reader.read_data_u16().map_err(data_err)?;
            decode_map(reader, u32::from(len))?
        }
        Marker::Map32 => {
            let len = reader.read_data_u32().map_err(data_err)?;
            decode_map(reader, len)?
        }
        Marker::FixExt1 => decode_ext(reader, 1)?,
        Marker::FixExt2 => decode_ext(reader, 2)?,
        Marker::FixExt4 => decode_ext(reader, 4)?,
        Marker::FixExt8 => decode_ext(reader, 8)?,
        Marker::FixExt16 => decode_ext(reader, 16)?,
        Marker::Ext8 => {
            let len = reader.read_data_u8().map_err(data_err)?;
            decode_ext(reader, u32::from(len))?
        }
        Marker::Ext16 => {
            let len = reader.read_data_u16().map_err(data_err)?;
            decode_ext(reader, u32::from(len))?
        }
        Marker::Ext32 => {
            let len = reader.read_data_u32().map_err(data_err)?;
            decode_ext(reader, len)?
        }
        Marker::Reserved => {
            return Err(DecodeError::InvalidMessageFormat(
                "reserved marker 0xc1 is never valid MessagePack".to_string(),
            )
            .into());
        }
    };
    Ok(value)
}

fn decode_array(reader: &mut Bytes<'_>, len: u32) -> Result<Value> {
    let mut items = Vec::with_capacity(sane_capacity(len));
    for _ in 0..len {
        items.push(decode_value(reader)?);
    }
    Ok(Value::Array(items))
}

fn decode_map(reader: &mut Bytes<'_>, len: u32) -> Result<Value> {
    let mut entries = Vec::with_capacity(sane_capacity(len));
    for _ in 0..len {
        let key = decode_value(reader)?;
        let val = decode_value(reader)?;
        entries.push((key, val));
    }
    Ok(Value::Map(entries))
}

fn decode_ext(reader: &mut Bytes<'_>, len: u32) -> Result<Value> {
    use rmp::decode::RmpRead;

    let typ = reader.read_data_i8().map_err(data_err)?;
    let data = read_bytes(reader, len)?;
    if typ == EXT_TYPE_TIMESTAMP {
        decode_timestamp(&data)
    } else {
        Ok(Value::Ext { typ, data })
    }
}

/// Decode the MessagePack timestamp extension's three wire forms (32-bit
/// seconds-only, 64-bit combined, 96-bit separate nanoseconds+seconds).
fn decode_timestamp(data: &[u8]) -> Result<Value> {
    match data.len() {
        4 => {
            let seconds = u32::from_be_bytes(data.try_into().unwrap());
            Ok(Value::Timestamp {
                seconds: i64::from(seconds),
                nanoseconds: 0,
            })
        }
        8 => {
            let combined = u64::from_be_bytes(data.try_into().unwrap());
            let nanoseconds = (combined >> 34) as u32;
            let seconds = (combined & 0x0000_0003_ffff_ffff) as i64;
            Ok(Value::Timestamp {
                seconds,
                nanoseconds,
            })
        }
        12 => {
            let nanoseconds = u32::from_be_bytes(data[0..4].try_into().unwrap());
            let seconds = i64::from_be_bytes(data[4..12].try_into().unwrap());
            Ok(Value::Timestamp {
                seconds,
                nanoseconds,
            })
        }
        other => Err(DecodeError::InvalidFieldType(format!(
            "timestamp extension has unsupported length {other}"
        ))
        .into()),
    }
}

/// Read exactly `len` bytes, mapping an exhausted reader to `NeedMore`
/// rather than a hard error.
///
/// Checks `len` against what's actually left in `reader` before
/// allocating, so a claimed length that exceeds the buffer surfaces as
/// `NeedMore` instead of either truncating the read (desyncing the
/// stream, since the remaining payload bytes would be misparsed as the
/// start of the next message) or allocating `len` bytes up front on the
/// strength of an unverified, possibly malicious length field.
fn read_bytes(reader: &mut Bytes<'_>, len: u32) -> Result<Vec<u8>> {
    use rmp::decode::RmpRead;

    if len as usize > reader.remaining_slice().len() {
        return Err(DecodeError::NeedMore.into());
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact_buf(&mut buf).map_err(|_| DecodeError::NeedMore)?;
    Ok(buf)
}

/// Caps the up-front allocation for a claimed array/map length to the
/// number of bytes actually available, so a malicious or corrupt length
/// field (e.g. `Array32` claiming 4 billion elements from a 10-byte
/// buffer) cannot be used to force an out-of-memory abort before the
/// decoder ever confirms the elements exist. Unlike string/binary/ext
/// payloads, array and map elements aren't a flat byte run, so this only
/// bounds the initial `Vec` capacity — the recursive per-element decode
/// still fails with `NeedMore` if the claimed count outruns the buffer.
fn sane_capacity(len: u32) -> usize {
    len.min(1 << 20) as usize
}

fn marker_err(e: MarkerReadError<decode::bytes::BytesReadError>) -> crate::error::Error {
    let _ = e;
    DecodeError::NeedMore.into()
}

fn data_err<E>(e: E) -> crate::error::Error
where
    E: Into<ReadErrKind>,
{
    match e.into() {
        ReadErrKind::NeedMore => DecodeError::NeedMore.into(),
        ReadErrKind::TypeMismatch(m) => {
            DecodeError::InvalidFieldType(format!("unexpected marker {m:?}")).into()
        }
        ReadErrKind::OutOfRange => DecodeError::InvalidFieldType("integer out of range".into()).into(),
    }
}

/// Normalizes the handful of `rmp` error shapes we see at the leaves down
/// to "need more bytes" vs. "structurally wrong", regardless of which of
/// `rmp`'s several near-identical error enums produced it.
enum ReadErrKind {
    NeedMore,
    TypeMismatch(Marker),
    OutOfRange,
}

impl From<decode::bytes::BytesReadError> for ReadErrKind {
    fn from(_: decode::bytes::BytesReadError) -> Self {
        ReadErrKind::NeedMore
    }
}

impl From<ValueReadError<decode::bytes::BytesReadError>> for ReadErrKind {
    fn from(e: ValueReadError<decode::bytes::BytesReadError>) -> Self {
        match e {
            ValueReadError::InvalidMarkerRead(_) | ValueReadError::InvalidDataRead(_) => {
                ReadErrKind::NeedMore
            }
            ValueReadError::TypeMismatch(m) => ReadErrKind::TypeMismatch(m),
        }
    }
}

impl From<NumValueReadError<decode::bytes::BytesReadError>> for ReadErrKind {
    fn from(e: NumValueReadError<decode::bytes::BytesReadError>) -> Self {
        match e {
            NumValueReadError::InvalidMarkerRead(_) | NumValueReadError::InvalidDataRead(_) => {
                ReadErrKind::NeedMore
            }
            NumValueReadError::TypeMismatch(m) => ReadErrKind::TypeMismatch(m),
            NumValueReadError::OutOfRange => ReadErrKind::OutOfRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::{encode_notification, encode_request, encode_response};

    #[test]
    fn decode_needs_more_on_every_prefix() {
        let bytes = encode_request(1, "nvim_get_mode", &Value::Array(vec![])).unwrap();
        for k in 0..bytes.len() {
            let result = decode(&bytes[..k]);
            match result {
                Err(crate::error::Error::Decode(DecodeError::NeedMore)) => {}
                Err(other) => panic!("prefix of len {k} produced hard error: {other:?}"),
                Ok(_) => panic!("prefix of len {k} unexpectedly decoded a full message"),
            }
        }
    }

    #[test]
    fn decode_consumes_exactly_one_message() {
        let mut bytes = encode_request(1, "a", &Value::Array(vec![])).unwrap();
        let second = encode_notification("b", &Value::Array(vec![])).unwrap();
        bytes.extend_from_slice(&second);

        let (msg, consumed) = decode(&bytes).unwrap();
        assert!(matches!(msg, Message::Request { .. }));
        let (msg2, consumed2) = decode(&bytes[consumed..]).unwrap();
        assert!(matches!(msg2, Message::Notification { .. }));
        assert_eq!(consumed + consumed2, bytes.len());
    }

    #[test]
    fn scenario_invalid_message_type() {
        let bytes = [0x94u8, 0xcc, 0xFF, 0x00, 0xa0, 0x90];
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidMessageType(255))
        ));
    }

    #[test]
    fn scenario_invalid_field_type_negative_msgid() {
        let bytes = [0x94u8, 0x00, 0xff, 0xa0, 0x90];
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidFieldType(_))
        ));
    }

    #[test]
    fn scenario_deeply_nested_array() {
        let mut bytes = vec![0x91u8; 100]; // 100 nested fixarray-len-1 headers
        bytes.push(0x00); // innermost value

        let mut reader = Bytes::new(&bytes);
        let value = decode_value(&mut reader).unwrap();
        let mut depth = 0;
        let mut cur = &value;
        loop {
            match cur {
                Value::Array(items) if items.len() == 1 => {
                    depth += 1;
                    cur = &items[0];
                }
                Value::Int(0) | Value::UInt(0) => break,
                other => panic!("unexpected leaf {other:?}"),
            }
        }
        assert_eq!(depth, 100);
    }

    #[test]
    fn round_trip_response_with_error() {
        let bytes = encode_response(9, Some(&Value::str("boom")), None).unwrap();
        let (msg, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        match msg {
            Message::Response { id, error, result } => {
                assert_eq!(id, 9);
                assert_eq!(error.as_str().unwrap(), "boom");
                assert!(result.is_nil());
            }
            _ => panic!("expected a response"),
        }
    }

    #[test]
    fn oversized_length_needs_more_instead_of_truncating() {
        // Str32 header claiming 2 MiB, but only a few bytes actually follow.
        let mut bytes = vec![0xdbu8];
        bytes.extend_from_slice(&(2u32 << 20).to_be_bytes());
        bytes.extend_from_slice(b"short");
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::NeedMore)
        ));
    }

    #[test]
    fn large_string_decodes_whole_without_desync() {
        // A payload over the old 1 MiB sane_capacity cap must decode whole
        // and consume exactly its own bytes, leaving a trailing value intact
        // rather than getting silently truncated and misparsed.
        let big = vec![b'x'; (1 << 20) + 10];
        let mut bytes = Vec::new();
        crate::codec::encoder::encode_value(&mut bytes, &Value::Str(big.clone())).unwrap();
        let big_len = bytes.len();
        bytes.push(0x2a); // trailing fixint 42, a second value right after

        let mut reader = Bytes::new(&bytes);
        let value = decode_value(&mut reader).unwrap();
        assert_eq!(value, Value::Str(big));
        assert_eq!(reader.position() as usize, big_len);

        let next = decode_value(&mut reader).unwrap();
        assert_eq!(next, Value::UInt(42));
    }

    #[test]
    fn fuzz_never_panics() {
        use rand::RngCore;
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let len = (rng.next_u32() % 200) as usize;
            let mut buf = vec![0u8; len];
            rng.fill_bytes(&mut buf);
            let _ = decode(&buf);
        }
    }
}

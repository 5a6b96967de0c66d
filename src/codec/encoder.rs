//! Streaming encoder: `Value` → bytes, and the three message-level
//! constructors the client uses directly.
//!
//! Built on `rmp::encode`'s marker-level primitives — the same dependency
//! family the teacher's own MsgPack-RPC code builds on (there, via
//! `rmp-serde`/`rmpv`) — writing straight into a `Vec<u8>` rather than
//! through `serde`, since our `Value` is a bespoke tree (it carries its own
//! `Timestamp` variant, which the wire format encodes as an extension
//! type).

use rmp::encode;

use crate::error::{EncodeError, Result};
use crate::value::Value;

/// MessagePack's reserved extension type for timestamps (-1).
const EXT_TYPE_TIMESTAMP: i8 = -1;

/// Encode a `Request` message: `[0, msgid, method, params]`.
pub fn encode_request(id: u32, method: &str, params: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode::write_array_len(&mut buf, 4).map_err(io_err)?;
    encode::write_sint(&mut buf, 0).map_err(io_err)?;
    encode::write_uint(&mut buf, u64::from(id)).map_err(io_err)?;
    encode::write_str(&mut buf, method).map_err(io_err)?;
    encode_value(&mut buf, params)?;
    Ok(buf)
}

/// Encode a `Response` message: `[1, msgid, error, result]`. Either `error`
/// or `result` may be `None`, which is encoded as `nil`.
pub fn encode_response(id: u32, error: Option<&Value>, result: Option<&Value>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode::write_array_len(&mut buf, 4).map_err(io_err)?;
    encode::write_sint(&mut buf, 1).map_err(io_err)?;
    encode::write_uint(&mut buf, u64::from(id)).map_err(io_err)?;
    match error {
        Some(v) => encode_value(&mut buf, v)?,
        None => encode::write_nil(&mut buf).map_err(io_err)?,
    }
    match result {
        Some(v) => encode_value(&mut buf, v)?,
        None => encode::write_nil(&mut buf).map_err(io_err)?,
    }
    Ok(buf)
}

/// Encode a `Notification` message: `[2, method, params]`.
pub fn encode_notification(method: &str, params: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode::write_array_len(&mut buf, 3).map_err(io_err)?;
    encode::write_sint(&mut buf, 2).map_err(io_err)?;
    encode::write_str(&mut buf, method).map_err(io_err)?;
    encode_value(&mut buf, params)?;
    Ok(buf)
}

/// Encode an arbitrary `Value` tree. `Value`s are acyclic owned trees built
/// up from the leaves, so this recursion always terminates.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Nil => encode::write_nil(buf).map_err(io_err)?,
        Value::Bool(b) => encode::write_bool(buf, *b).map_err(io_err)?,
        Value::Int(i) => {
            encode::write_sint(buf, *i).map_err(io_err)?;
        }
        Value::UInt(u) => {
            encode::write_uint(buf, *u).map_err(io_err)?;
        }
        Value::Float(f) => encode::write_f64(buf, *f).map_err(io_err)?,
        Value::Str(bytes) => {
            let s = String::from_utf8_lossy(bytes);
            encode::write_str(buf, &s).map_err(io_err)?;
        }
        Value::Bin(bytes) => encode::write_bin(buf, bytes).map_err(io_err)?,
        Value::Array(items) => {
            let len = u32::try_from(items.len()).map_err(|_| EncodeError::OutOfMemory)?;
            encode::write_array_len(buf, len).map_err(io_err)?;
            for item in items {
                encode_value(buf, item)?;
            }
        }
        Value::Map(entries) => {
            let len = u32::try_from(entries.len()).map_err(|_| EncodeError::OutOfMemory)?;
            encode::write_map_len(buf, len).map_err(io_err)?;
            for (k, v) in entries {
                encode_value(buf, k)?;
                encode_value(buf, v)?;
            }
        }
        Value::Ext { typ, data } => {
            let len = u32::try_from(data.len()).map_err(|_| EncodeError::OutOfMemory)?;
            encode::write_ext_meta(buf, len, *typ).map_err(io_err)?;
            buf.extend_from_slice(data);
        }
        Value::Timestamp {
            seconds,
            nanoseconds,
        } => {
            encode_timestamp(buf, *seconds, *nanoseconds)?;
        }
    }
    Ok(())
}

/// Encode a timestamp using the most compact of the three wire forms the
/// MessagePack timestamp extension defines (32-bit, 64-bit, 96-bit).
fn encode_timestamp(buf: &mut Vec<u8>, seconds: i64, nanoseconds: u32) -> Result<()> {
    if nanoseconds == 0 && (0..=u32::MAX as i64).contains(&seconds) {
        encode::write_ext_meta(buf, 4, EXT_TYPE_TIMESTAMP).map_err(io_err)?;
        buf.extend_from_slice(&(seconds as u32).to_be_bytes());
    } else if (0..(1i64 << 34)).contains(&seconds) {
        let combined = (u64::from(nanoseconds) << 34) | (seconds as u64);
        encode::write_ext_meta(buf, 8, EXT_TYPE_TIMESTAMP).map_err(io_err)?;
        buf.extend_from_slice(&combined.to_be_bytes());
    } else {
        encode::write_ext_meta(buf, 12, EXT_TYPE_TIMESTAMP).map_err(io_err)?;
        buf.extend_from_slice(&nanoseconds.to_be_bytes());
        buf.extend_from_slice(&seconds.to_be_bytes());
    }
    Ok(())
}

fn io_err<E: std::fmt::Display>(e: E) -> crate::error::Error {
    EncodeError::Io(std::io::Error::other(e.to_string())).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_begins_with_expected_bytes() {
        let bytes = encode_request(1, "nvim_get_mode", &Value::Array(vec![])).unwrap();
        assert_eq!(&bytes[0..3], &[0x94, 0x00, 0x01]);
    }

    #[test]
    fn notification_begins_with_fixarray3() {
        let bytes = encode_notification("redraw", &Value::Array(vec![])).unwrap();
        assert_eq!(bytes[0], 0x93);
    }

    #[test]
    fn response_with_both_fields_none_encodes_nils() {
        let bytes = encode_response(5, None, None).unwrap();
        // [1, 5, nil, nil] => fixarray4, fixint 1, fixint 5, nil, nil
        assert_eq!(&bytes[..], &[0x94, 0x01, 0x05, 0xc0, 0xc0]);
    }
}

//! The three MessagePack-RPC message shapes.

use crate::error::{DecodeError, Result};
use crate::value::Value;

/// A single MessagePack-RPC message.
///
/// Wire shape is always an outer array: `[0, msgid, method, params]` for a
/// request, `[1, msgid, error, result]` for a response, `[2, method,
/// params]` for a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A request expecting a matching [`Message::Response`].
    Request {
        /// Correlation id, echoed back by the matching response.
        id: u32,
        /// The RPC method name.
        method: String,
        /// Method parameters (typically, but not necessarily, an array).
        params: Value,
    },
    /// A reply to a previously-sent request.
    Response {
        /// The id of the request this replies to.
        id: u32,
        /// Non-nil when the call failed.
        error: Value,
        /// The call's result, if any.
        result: Value,
    },
    /// An unsolicited, one-way message — no reply is expected.
    Notification {
        /// The RPC method name.
        method: String,
        /// Method parameters.
        params: Value,
    },
}

const TYPE_REQUEST: i64 = 0;
const TYPE_RESPONSE: i64 = 1;
const TYPE_NOTIFICATION: i64 = 2;

impl Message {
    /// Validate and build a [`Message`] from the outer array `Value`
    /// produced by the decoder.
    ///
    /// This is the single place that enforces the wire-shape invariants
    /// from spec.md §3: arity matching message type, non-negative msgid
    /// fitting `u32`, and string method names.
    pub fn from_value(value: Value) -> Result<Message> {
        let elems = match value {
            Value::Array(elems) => elems,
            other => {
                return Err(DecodeError::InvalidMessageFormat(format!(
                    "expected an array, got {other:?}"
                ))
                .into());
            }
        };

        if !matches!(elems.len(), 3 | 4) {
            return Err(DecodeError::InvalidMessageFormat(format!(
                "expected an array of length 3 or 4, got {}",
                elems.len()
            ))
            .into());
        }

        let first = elems
            .first()
            .ok_or_else(|| DecodeError::InvalidMessageFormat("empty outer array".to_string()))?;
        let msg_type = match first {
            Value::Int(i) => *i,
            Value::UInt(u) => i64::try_from(*u).unwrap_or(i64::MAX),
            other => {
                return Err(DecodeError::InvalidMessageFormat(format!(
                    "message type must be an integer, got {other:?}"
                ))
                .into());
            }
        };

        match (elems.len(), msg_type) {
            (4, TYPE_REQUEST) => {
                let mut it = elems.into_iter();
                let _ = it.next();
                let id = read_msgid(it.next().unwrap())?;
                let method = read_method(it.next().unwrap())?;
                let params = it.next().unwrap();
                Ok(Message::Request { id, method, params })
            }
            (4, TYPE_RESPONSE) => {
                let mut it = elems.into_iter();
                let _ = it.next();
                let id = read_msgid(it.next().unwrap())?;
                let error = it.next().unwrap();
                let result = it.next().unwrap();
                Ok(Message::Response { id, error, result })
            }
            (3, TYPE_NOTIFICATION) => {
                let mut it = elems.into_iter();
                let _ = it.next();
                let method = read_method(it.next().unwrap())?;
                let params = it.next().unwrap();
                Ok(Message::Notification { method, params })
            }
            (len, t) if t == TYPE_REQUEST || t == TYPE_RESPONSE || t == TYPE_NOTIFICATION => {
                Err(DecodeError::InvalidMessageFormat(format!(
                    "message type {t} with arity {len}"
                ))
                .into())
            }
            (_, t) => Err(DecodeError::InvalidMessageType(t).into()),
        }
    }
}

fn read_msgid(v: Value) -> Result<u32> {
    let i = v
        .expect_i64()
        .map_err(|_| DecodeError::InvalidFieldType(format!("msgid must be an integer: {v:?}")))?;
    u32::try_from(i)
        .map_err(|_| DecodeError::InvalidFieldType(format!("msgid out of u32 range: {i}")).into())
}

fn read_method(v: Value) -> Result<String> {
    match v {
        Value::Str(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        other => Err(DecodeError::InvalidFieldType(format!(
            "method must be a string, got {other:?}"
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_array() {
        let err = Message::from_value(Value::Array(vec![])).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidMessageFormat(_))
        ));
    }

    #[test]
    fn rejects_bad_arity_before_inspecting_type() {
        // Arity 2 with a type byte outside {0,1,2}: must report bad arity,
        // not be misread as an unknown message type.
        let v = Value::Array(vec![Value::Int(9), Value::UInt(1)]);
        let err = Message::from_value(v).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidMessageFormat(_))
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        let v = Value::Array(vec![
            Value::Int(9),
            Value::UInt(1),
            Value::str("x"),
            Value::Array(vec![]),
        ]);
        let err = Message::from_value(v).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidMessageType(9))
        ));
    }

    #[test]
    fn rejects_negative_msgid() {
        let v = Value::Array(vec![
            Value::Int(0),
            Value::Int(-1),
            Value::str("x"),
            Value::Array(vec![]),
        ]);
        let err = Message::from_value(v).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidFieldType(_))
        ));
    }

    #[test]
    fn rejects_non_string_method() {
        let v = Value::Array(vec![Value::Int(2), Value::Int(1), Value::Array(vec![])]);
        let err = Message::from_value(v).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidFieldType(_))
        ));
    }

    #[test]
    fn accepts_well_formed_request() {
        let v = Value::Array(vec![
            Value::Int(0),
            Value::UInt(7),
            Value::str("nvim_get_mode"),
            Value::Array(vec![]),
        ]);
        match Message::from_value(v).unwrap() {
            Message::Request { id, method, .. } => {
                assert_eq!(id, 7);
                assert_eq!(method, "nvim_get_mode");
            }
            _ => panic!("expected a request"),
        }
    }
}

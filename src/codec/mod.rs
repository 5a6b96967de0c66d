//! MessagePack-RPC wire codec: [`Message`] shapes plus streaming
//! encode/decode over them.

mod decoder;
mod encoder;
mod message;

pub use decoder::decode;
pub use encoder::{encode_notification, encode_request, encode_response, encode_value};
pub use message::Message;

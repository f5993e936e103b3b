//! Request body decoding.
//!
//! A [`Binder`] turns raw body bytes into a JSON value; [`Request::bind`]
//! then deserialises that value into whatever the handler asked for. The
//! binder is installed once on the [`Service`](crate::Service) and is the
//! same for every route.
//!
//! [`Request::bind`]: crate::Request::bind

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Why a body could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not valid JSON.
    #[error("malformed JSON body: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Valid JSON, wrong shape for the target type.
    #[error("invalid request body: {0}")]
    Shape(#[source] serde_json::Error),

    /// The body could not be read off the connection.
    #[error("unreadable request body: {0}")]
    Unreadable(String),
}

/// Decodes a raw request body.
pub trait Binder: Send + Sync + 'static {
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError>;
}

/// The default binder.
///
/// An empty (or all-whitespace) body decodes to `{}`, so handlers whose
/// parameters are all optional work without a body at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonBinder;

impl Binder for JsonBinder {
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(body).map_err(DecodeError::Syntax)
    }
}

/// Runs `binder` over `body` and deserialises the result into `T`.
pub fn bind<T: DeserializeOwned>(binder: &dyn Binder, body: &[u8]) -> Result<T, DecodeError> {
    let value = binder.decode(body)?;
    serde_json::from_value(value).map_err(DecodeError::Shape)
}

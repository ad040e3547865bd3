//! Request/response values and the prost codec used to move them over the wire.
//!
//! Handlers work with concrete prost message types. Interceptors sit between
//! the dispatcher and a handler of any method, so they see requests and
//! responses through the type-erased [`BoxMessage`].

use std::any::Any;
use std::fmt;

use prost::Message;

use crate::status::Status;

/// Object-safe view of a prost message.
pub trait DynMessage: Any + fmt::Debug + Send {
    fn encode_message(&self) -> Vec<u8>;

    /// Unqualified Rust type name, e.g. `GetFramesRequest`.
    fn message_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<M> DynMessage for M
where
    M: Message + fmt::Debug + 'static,
{
    fn encode_message(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    fn message_name(&self) -> &'static str {
        short_type_name::<M>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub type BoxMessage = Box<dyn DynMessage>;

pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

/// Decodes a request payload. Malformed input is the caller's fault, hence
/// `InvalidArgument`.
pub fn decode<M: Message + Default>(payload: &[u8]) -> Result<M, Status> {
    M::decode(payload).map_err(|e| {
        Status::invalid_argument(format!(
            "failed to decode {}: {e}",
            short_type_name::<M>()
        ))
    })
}

pub fn decode_boxed<M: Message + Default + fmt::Debug + 'static>(
    payload: &[u8],
) -> Result<BoxMessage, Status> {
    decode::<M>(payload).map(|message| Box::new(message) as BoxMessage)
}

pub fn boxed<M: Message + fmt::Debug + 'static>(message: M) -> BoxMessage {
    Box::new(message)
}

/// Recovers the concrete message. Fails with `Internal` when an interceptor
/// substituted a value of another type.
pub fn downcast<M: Message + 'static>(message: BoxMessage) -> Result<M, Status> {
    let actual = message.message_name();
    message
        .into_any()
        .downcast::<M>()
        .map(|message| *message)
        .map_err(|_| {
            Status::internal(format!(
                "expected message {}, got {actual}",
                short_type_name::<M>()
            ))
        })
}

pub fn downcast_ref<M: Message + 'static>(message: &BoxMessage) -> Option<&M> {
    message.as_any().downcast_ref::<M>()
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

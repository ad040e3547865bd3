use std::time::Duration;

use prost::Message;
use tracing::instrument;
use uuid::Uuid;

use crate::compression::{Compression, DEFAULT_MAX_MESSAGE_BYTES};
use crate::context::{CallContext, Metadata};
use crate::message::encode;
use crate::status::Status;
use crate::transport::{
    Channel, DeadlineExceededSnafu, OutboundCall, TransportError, compress_payload,
    decompress_payload,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Per-call client options. Unset fields fall back to the client defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub credentials: Option<String>,
    pub compression: Option<Compression>,
    pub metadata: Metadata,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn credentials(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(token.into());
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn metadata(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Tags the call so a server can drop a retried duplicate.
    pub fn with_idempotency_key(self, key: Uuid) -> Self {
        self.metadata(IDEMPOTENCY_KEY_HEADER, key.to_string())
    }

    /// Tags the call with a fresh random idempotency key.
    pub fn idempotent(self) -> Self {
        self.with_idempotency_key(Uuid::new_v4())
    }

    /// `overrides` wins field by field; metadata is the union of both.
    pub fn merge(&self, overrides: CallOptions) -> CallOptions {
        let mut metadata = self.metadata.clone();
        metadata.extend_from(&overrides.metadata);
        CallOptions {
            timeout: overrides.timeout.or(self.timeout),
            credentials: overrides.credentials.or_else(|| self.credentials.clone()),
            compression: overrides.compression.or(self.compression),
            metadata,
        }
    }
}

/// Typed unary client over a [`Channel`].
#[derive(Clone, Debug)]
pub struct Client<C> {
    channel: C,
    defaults: CallOptions,
}

impl<C: Channel> Client<C> {
    pub fn new(channel: C) -> Self {
        Self::with_defaults(channel, CallOptions::default())
    }

    pub fn with_defaults(channel: C, defaults: CallOptions) -> Self {
        Client { channel, defaults }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn defaults(&self) -> &CallOptions {
        &self.defaults
    }

    /// Sends one request and waits for the response, the context or the
    /// timeout, whichever finishes first.
    ///
    /// The effective timeout is the smaller of the context's remaining time and
    /// the option's timeout. Cancelling `ctx` abandons the transport call.
    #[instrument(name = "Client::unary", skip(self, ctx, request, options))]
    pub async fn unary<Req, Resp>(
        &self,
        ctx: &CallContext,
        full_method: &str,
        request: &Req,
        options: CallOptions,
    ) -> Result<Resp, Status>
    where
        Req: Message,
        Resp: Message + Default,
    {
        ctx.check()?;

        let options = self.defaults.merge(options);
        let compression = options.compression.unwrap_or_default();
        let timeout = match (ctx.remaining(), options.timeout) {
            (Some(remaining), Some(timeout)) => Some(remaining.min(timeout)),
            (remaining, timeout) => remaining.or(timeout),
        };
        let mut metadata = ctx.metadata().clone();
        metadata.extend_from(&options.metadata);

        let payload = compress_payload(compression, &encode(request))
            .map_err(TransportError::into_status)?;
        let call = OutboundCall {
            full_method: full_method.to_string(),
            payload,
            metadata,
            timeout,
            credentials: options.credentials,
            compression,
        };

        let result = tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => {
                tracing::debug!("Call abandoned by caller");
                return Err(Status::deadline_exceeded("call was cancelled"));
            }
            result = invoke_with_timeout(&self.channel, call, timeout) => result,
        };

        let response = result
            .and_then(|payload| {
                decompress_payload(compression, &payload, DEFAULT_MAX_MESSAGE_BYTES)
            })
            .map_err(|e| {
                let status = e.into_status();
                tracing::debug!("Call failed: {status}");
                status
            })?;
        Resp::decode(response.as_slice()).map_err(|e| {
            Status::internal(format!("failed to decode response of {full_method}: {e}"))
        })
    }
}

async fn invoke_with_timeout<C: Channel>(
    channel: &C,
    call: OutboundCall,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, TransportError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, channel.invoke(call))
            .await
            .unwrap_or_else(|_| DeadlineExceededSnafu.fail()),
        None => channel.invoke(call).await,
    }
}

//! Transport seam between clients and the dispatch core.
//!
//! A [`Channel`] moves one encoded request to a server and brings back the
//! encoded response. [`Server`] is the receiving end that turns an
//! [`OutboundCall`] into a dispatcher call. [`LocalChannel`] connects the two
//! inside one process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use snafu::{Location, ResultExt, Snafu, ensure};
use tokio_util::sync::CancellationToken;

use crate::compression::{Compression, CompressionError, DEFAULT_MAX_MESSAGE_BYTES};
use crate::context::{CallContext, Metadata};
use crate::descriptor::split_full_method_name;
use crate::dispatcher::Dispatcher;
use crate::status::Status;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const ENCODING_HEADER: &str = "grpc-encoding";

/// One encoded unary request on its way to a server.
#[derive(Clone, Debug)]
pub struct OutboundCall {
    /// `/<package>.<Service>/<Method>`
    pub full_method: String,
    /// Encoded request, already compressed with `compression`.
    pub payload: Vec<u8>,
    pub metadata: Metadata,
    pub timeout: Option<Duration>,
    pub credentials: Option<String>,
    pub compression: Compression,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    #[snafu(display("Transport unavailable: {message}"))]
    Unavailable {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Transport deadline exceeded"))]
    DeadlineExceeded {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Remote call failed: {status}"))]
    Remote {
        status: Status,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Payload compression failed"))]
    Compression {
        source: CompressionError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl TransportError {
    /// Status seen by the caller. Remote statuses pass through unchanged.
    pub fn into_status(self) -> Status {
        match self {
            TransportError::Unavailable { message, .. } => Status::unavailable(message),
            TransportError::DeadlineExceeded { .. } => {
                Status::deadline_exceeded("deadline exceeded")
            }
            TransportError::Remote { status, .. } => status,
            TransportError::Compression {
                source: source @ CompressionError::TooLarge { .. },
                ..
            } => Status::resource_exhausted(source.to_string()),
            TransportError::Compression { source, .. } => {
                Status::internal(format!("payload compression failed: {source}"))
            }
        }
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    async fn invoke(&self, call: OutboundCall) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<C: Channel + ?Sized> Channel for Arc<C> {
    async fn invoke(&self, call: OutboundCall) -> Result<Vec<u8>, TransportError> {
        (**self).invoke(call).await
    }
}

/// Receiving end of a transport.
#[derive(Clone, Debug)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    max_request_bytes: usize,
}

impl Server {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Server {
            dispatcher,
            max_request_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Caps the decompressed size of every request payload.
    pub fn with_max_request_bytes(mut self, max_request_bytes: usize) -> Self {
        self.max_request_bytes = max_request_bytes;
        self
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn deliver(
        &self,
        service: &str,
        method: &str,
        payload: &[u8],
        ctx: CallContext,
    ) -> Result<Vec<u8>, Status> {
        self.dispatcher.dispatch(service, method, payload, ctx).await
    }

    /// Decompresses the payload, rebuilds the call context and dispatches.
    ///
    /// `cancellation` is cancelled by the transport when the caller goes
    /// away. The response is compressed with the request's algorithm.
    pub async fn deliver_call(
        &self,
        call: OutboundCall,
        cancellation: CancellationToken,
    ) -> Result<Vec<u8>, Status> {
        let OutboundCall {
            full_method,
            payload,
            mut metadata,
            timeout,
            credentials,
            compression,
        } = call;
        let (service, method) = split_full_method_name(&full_method)
            .ok_or_else(|| Status::unimplemented(format!("malformed method name {full_method}")))?;

        // The request came from the client, so a bad payload is its fault.
        let payload = compression
            .decompress(&payload, self.max_request_bytes)
            .map_err(|e| match e {
                CompressionError::TooLarge { .. } => Status::resource_exhausted(format!(
                    "{} request too large: {e}",
                    compression.name()
                )),
                _ => Status::invalid_argument(format!(
                    "failed to decompress {} request: {e}",
                    compression.name()
                )),
            })?;

        metadata.insert(ENCODING_HEADER, compression.name());
        if let Some(token) = credentials {
            metadata.insert(AUTHORIZATION_HEADER, format!("Bearer {token}"));
        }
        let mut ctx = CallContext::new()
            .with_cancellation(cancellation)
            .with_metadata(metadata);
        if let Some(timeout) = timeout {
            ctx = ctx.with_timeout(timeout);
        }

        let response = self.deliver(service, method, &payload, ctx).await?;
        compression.compress(&response).map_err(|e| {
            Status::internal(format!("failed to compress {} response: {e}", compression.name()))
        })
    }
}

/// In-process channel. Every call runs on its own tokio task; dropping the
/// caller's future cancels the server-side context.
#[derive(Clone, Debug)]
pub struct LocalChannel {
    server: Arc<Server>,
    closed: Arc<AtomicBool>,
}

impl LocalChannel {
    pub fn new(server: Arc<Server>) -> Self {
        LocalChannel {
            server,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_dispatcher(dispatcher: Arc<Dispatcher>) -> Self {
        Self::new(Arc::new(Server::new(dispatcher)))
    }

    /// Later calls on this channel and its clones fail with `Unavailable`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: "node_rpc::transport", "Local channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for LocalChannel {
    async fn invoke(&self, call: OutboundCall) -> Result<Vec<u8>, TransportError> {
        ensure!(
            !self.is_closed(),
            UnavailableSnafu {
                message: "channel is closed"
            }
        );

        let cancellation = CancellationToken::new();
        let _cancel_on_drop = cancellation.clone().drop_guard();
        let server = Arc::clone(&self.server);
        let task = tokio::spawn(async move { server.deliver_call(call, cancellation).await });

        match task.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(status)) => RemoteSnafu { status }.fail(),
            Err(e) if e.is_panic() => {
                tracing::error!(target: "node_rpc::transport", "Handler task panicked");
                RemoteSnafu {
                    status: Status::internal("handler panicked"),
                }
                .fail()
            }
            Err(e) => UnavailableSnafu {
                message: e.to_string(),
            }
            .fail(),
        }
    }
}

/// Compresses `payload` for the wire.
pub fn compress_payload(
    compression: Compression,
    payload: &[u8],
) -> Result<Vec<u8>, TransportError> {
    compression.compress(payload).context(CompressionSnafu)
}

/// Reverses [`compress_payload`] on a response of at most `limit` bytes.
pub fn decompress_payload(
    compression: Compression,
    payload: &[u8],
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    compression.decompress(payload, limit).context(CompressionSnafu)
}

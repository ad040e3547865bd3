use node_rpc::{Code, Status};
use snafu::Report;

use crate::apis::node::ApiError;

pub mod node_service;
pub mod node_stats;

pub use node_service::NodeServiceImpl;
pub use node_stats::StatsCollector;

// Convert ApiError to the status returned to callers
fn to_status(error: ApiError) -> Status {
    let code = match &error {
        ApiError::InvalidArgument { .. } => Code::InvalidArgument,
        ApiError::InvalidFrameRange { .. } => Code::InvalidArgument,
        ApiError::FrameNotFound { .. } => Code::NotFound,
        ApiError::SelectorMismatch { .. } => Code::NotFound,
        ApiError::StateLocking { .. } => Code::Internal,
    };

    let message = error.to_string();
    let report = Report::from_error(error).to_string();
    tracing::debug!(%code, "Handler failed: {report}");
    Status::new(code, message)
}

// Trait for converting ApiError results to call results
trait ToStatus<T> {
    fn to_status(self) -> Result<T, Status>;
}

impl<T> ToStatus<T> for Result<T, ApiError> {
    fn to_status(self) -> Result<T, Status> {
        self.map_err(to_status)
    }
}

use snafu::{Location, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("Invalid argument: {argument}"))]
    InvalidArgument {
        argument: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid frame range: from {from} is past to {to}"))]
    InvalidFrameRange {
        from: u64,
        to: u64,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Frame {frame_number} not found for filter {filter}"))]
    FrameNotFound {
        filter: String,
        frame_number: u64,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Frame {frame_number} for filter {filter} does not match the selector"))]
    SelectorMismatch {
        filter: String,
        frame_number: u64,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to lock node state"))]
    StateLocking {
        #[snafu(implicit)]
        location: Location,
    },
}

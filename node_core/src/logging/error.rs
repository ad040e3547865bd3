use snafu::{Location, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum LogError {
    #[snafu(display("Failed to create log file"))]
    LogFile {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid log filter: {directive}"))]
    Filter {
        directive: String,
        source: tracing_subscriber::filter::FromEnvError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to install global subscriber"))]
    SetGlobalDefault {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },
}

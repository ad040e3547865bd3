extern crate tracing;
extern crate tracing_subscriber;

pub mod apis;
pub mod config;
pub mod interceptors;
pub mod logging;
pub mod node;
pub mod protobuf_apis;
pub mod protobuf_gen;
#[cfg(test)]
pub mod test_utils;

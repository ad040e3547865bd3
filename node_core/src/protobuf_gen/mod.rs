pub mod node;
mod serde_helpers;

pub mod error;
pub mod idempotency;
pub mod state;

pub use error::ApiError;
pub use idempotency::{Applied, IdempotencyCache};
pub use state::{NodeIdentity, NodeReport, NodeState, TokenBalances, amount_bytes};

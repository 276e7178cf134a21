//! Gateway side of the correlator.
//!
//! The `CorrelationCache` buckets gateway events by correlation token and
//! wakes exactly the issuer waiting on that token; the `Dispatcher` routes
//! events into it and hands resolved replies to the parser.

pub mod cache;
pub mod dispatch;
pub mod nonce;

pub use cache::{CorrelationCache, EntryState, EventBucket, Observation, ResolvePolicy};
pub use dispatch::{
    policy_for, CommandRequest, CommandTransport, Dispatcher, DispatcherConfig, OutgoingCommand,
};
pub use nonce::NonceGenerator;

//! Reply parsing engine.
//!
//! Turns the free-form text of an economy bot reply into a `CommandResult`.
//! Every family grammar is a pure function; the `ReplyParser` registry runs
//! the cooldown pre-check and then dispatches on `CommandFamily`.

pub mod cooldown;
pub mod detection;
pub mod extractors;
pub mod grammar;
pub mod registry;
pub mod types;

pub use cooldown::{check_cooldown, parse_cooldown};
pub use detection::detect_family;
pub use registry::{builtin_extractors, Extractor, ReplyParser};
pub use types::{CommandFamily, CommandInvocation, ExtractContext, Trade};

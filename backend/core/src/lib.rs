pub mod clock;
pub mod error;
pub mod event;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DankError, Result};
pub use event::{
    update_text, Author, Embed, GatewayEvent, InteractionRef, MessagePayload, MessageReference,
};
pub use types::{CommandResult, ItemStack, Ledger};

//! Quote display session and the reaction store it shares with other views.

pub mod channel;
pub mod reaction_store;
pub mod render;
pub mod runtime;
pub mod session;

pub use channel::{ChannelEnvelope, ChannelHub, NamedChannel};
pub use reaction_store::{ExternalUpdates, ReactionStore, StoreKeys};
pub use render::{format_counts, format_quote, QuoteRenderer, PLACEHOLDER};
pub use runtime::{control_button, ControlButton, SessionHandle, ViewControls};
pub use session::{
    QuoteSession, SessionConfig, SessionSnapshot, DEFAULT_ROTATION_INTERVAL, MIN_ROTATION_INTERVAL,
};

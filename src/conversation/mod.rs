//! Conversation state carried between coaching sessions.
//!
//! * [`ConversationWindow`]: bounded history with a pinned system entry.
//! * [`ConversationMessage`] / [`Role`]: one history entry.
//! * [`AmbientContext`]: location hints whose change resets the window.

pub mod ambient;
pub mod window;

pub use ambient::AmbientContext;
pub use window::{ConversationMessage, ConversationWindow, Role};

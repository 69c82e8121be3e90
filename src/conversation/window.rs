//! Bounded conversation history with a pinned system instruction.
//!
//! [`ConversationWindow`] keeps the prior coaching turns that are sent as
//! context on every vision request.  The system instruction is inserted
//! lazily at index 0 on the first append and never evicted; older
//! user/assistant pairs are dropped together so turns stay aligned.

use crate::camera::ImageData;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat-completions APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the conversation.  User turns may carry the frame they
/// asked about.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub image: Option<ImageData>,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            image: None,
        }
    }

    pub fn user(content: impl Into<String>, image: Option<ImageData>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationWindow
// ---------------------------------------------------------------------------

/// Smallest cap that still fits the system entry and one pair.
const MIN_MESSAGES: usize = 3;

/// Ordered, size-bounded message history.
///
/// # Example
/// ```rust
/// use photo_coach::conversation::{ConversationMessage, ConversationWindow, Role};
///
/// let mut window = ConversationWindow::new(20, "You are a photography coach.");
/// window.append(
///     ConversationMessage::user("How is this?", None),
///     ConversationMessage::assistant("Tilt camera down."),
/// );
/// assert_eq!(window.len(), 3);
/// assert_eq!(window.snapshot()[0].role, Role::System);
/// ```
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    messages: Vec<ConversationMessage>,
    max_messages: usize,
    system_prompt: String,
}

impl ConversationWindow {
    /// Create an empty window holding at most `max_messages` entries
    /// (system entry included).  Caps below 3 are raised to 3.
    pub fn new(max_messages: usize, system_prompt: impl Into<String>) -> Self {
        Self {
            messages: Vec::with_capacity(max_messages.max(MIN_MESSAGES) + 2),
            max_messages: max_messages.max(MIN_MESSAGES),
            system_prompt: system_prompt.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a matched user/assistant pair.
    ///
    /// Inserts the pinned system entry first if there is none, then evicts
    /// the oldest non-system pairs until the cap holds.
    pub fn append(&mut self, user: ConversationMessage, assistant: ConversationMessage) {
        if !self.has_system() {
            self.messages
                .insert(0, ConversationMessage::system(self.system_prompt.clone()));
        }

        self.messages.push(user);
        self.messages.push(assistant);

        while self.messages.len() > self.max_messages && self.messages.len() >= 1 + 2 {
            self.messages.drain(1..3);
        }
    }

    /// Drop everything, system entry included.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Replace the instruction used the next time the system entry is
    /// inserted.  An existing system entry is left as is; call
    /// [`reset`](Self::reset) to apply a new one immediately.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Ordered copy of the history for building the next request.
    ///
    /// Always starts with a system entry: the pinned one, or the pending
    /// instruction when nothing has been appended yet.  Images are shared,
    /// not copied.
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        if self.has_system() {
            self.messages.clone()
        } else {
            let mut view = Vec::with_capacity(self.messages.len() + 1);
            view.push(ConversationMessage::system(self.system_prompt.clone()));
            view.extend(self.messages.iter().cloned());
            view
        }
    }

    /// Number of stored messages, system entry included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    fn has_system(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(window: &mut ConversationWindow, i: usize) {
        window.append(
            ConversationMessage::user(format!("q{i}"), None),
            ConversationMessage::assistant(format!("a{i}")),
        );
    }

    #[test]
    fn starts_empty() {
        let window = ConversationWindow::new(20, "sys");
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
    }

    #[test]
    fn first_append_pins_system_message() {
        let mut window = ConversationWindow::new(20, "sys");
        turn(&mut window, 0);

        let view = window.snapshot();
        assert_eq!(view.len(), 3);
        assert_eq!(view[0], ConversationMessage::system("sys"));
        assert_eq!(view[1].role, Role::User);
        assert_eq!(view[2].role, Role::Assistant);
    }

    #[test]
    fn snapshot_of_empty_window_carries_pending_instruction() {
        let window = ConversationWindow::new(20, "sys");
        let view = window.snapshot();
        assert_eq!(view, vec![ConversationMessage::system("sys")]);
        // Taking a snapshot must not mutate.
        assert!(window.is_empty());
    }

    #[test]
    fn never_exceeds_cap_and_keeps_system_first() {
        let mut window = ConversationWindow::new(20, "sys");
        for i in 0..50 {
            turn(&mut window, i);
            assert!(window.len() <= 20);
            assert_eq!(window.snapshot()[0].role, Role::System);
        }
    }

    #[test]
    fn eviction_drops_oldest_pair_and_keeps_alignment() {
        let mut window = ConversationWindow::new(7, "sys");
        for i in 0..4 {
            turn(&mut window, i);
        }
        // system + 3 pairs fits exactly; the 4th pair pushed out pair 0.
        let view = window.snapshot();
        assert_eq!(view.len(), 7);
        assert_eq!(view[1].content, "q1");
        assert_eq!(view[2].content, "a1");
        for pair in view[1..].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    /// 21 sessions against the default cap of 20: the oldest pairs are gone,
    /// the system entry is untouched, and the window sits at the largest
    /// aligned size under the cap.
    #[test]
    fn twenty_one_sessions_stay_bounded() {
        let mut window = ConversationWindow::new(20, "sys");
        for i in 0..21 {
            turn(&mut window, i);
        }

        let view = window.snapshot();
        assert_eq!(view.len(), 19);
        assert_eq!(view[0], ConversationMessage::system("sys"));
        assert!(!view.iter().any(|m| m.content == "q0" || m.content == "a0"));
        assert_eq!(view[view.len() - 2].content, "q20");
        assert_eq!(view[view.len() - 1].content, "a20");
    }

    #[test]
    fn reset_clears_system_message_too() {
        let mut window = ConversationWindow::new(20, "sys");
        turn(&mut window, 0);
        window.reset();
        assert!(window.is_empty());
    }

    #[test]
    fn new_system_prompt_applies_after_reset() {
        let mut window = ConversationWindow::new(20, "old");
        turn(&mut window, 0);

        window.set_system_prompt("new");
        assert_eq!(window.snapshot()[0].content, "old");

        window.reset();
        turn(&mut window, 1);
        assert_eq!(window.snapshot()[0].content, "new");
    }

    #[test]
    fn tiny_cap_is_raised_to_fit_one_pair() {
        let mut window = ConversationWindow::new(1, "sys");
        turn(&mut window, 0);
        turn(&mut window, 1);
        assert_eq!(window.max_messages(), 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window.snapshot()[1].content, "q1");
    }

    #[test]
    fn user_turn_keeps_its_image() {
        let mut window = ConversationWindow::new(20, "sys");
        let image = ImageData::new(vec![1u8, 2, 3]);
        window.append(
            ConversationMessage::user("look", Some(image.clone())),
            ConversationMessage::assistant("ok"),
        );
        assert_eq!(window.snapshot()[1].image.as_ref(), Some(&image));
    }
}

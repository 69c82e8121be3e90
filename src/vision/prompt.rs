//! Prompt builder for photography coaching.
//!
//! [`CoachPrompt`] produces three texts:
//! * the **system** instruction pinned at the head of the conversation,
//!   enriched with the ambient location and nearby points of interest;
//! * the **coaching** instruction sent alongside every captured frame;
//! * the **welcome** instruction for the greeting session (no frame).

use crate::conversation::AmbientContext;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION: &str = "\
You are a photography coach looking through the user's camera.
Give one very short, clear, directional instruction at a time.
Build on your earlier advice instead of repeating it.";

const COACHING_INSTRUCTION: &str = "\
Analyze this image and provide a very short, clear, directional instruction to improve it. \
Your response must be under 10 words. For example: 'Move slightly right.' or 'Tilt camera down.'";

const WELCOME_INSTRUCTION: &str = "\
Greet the photographer in one short sentence. \
If you know where they are, mention it and suggest one subject worth shooting nearby.";

/// How many points of interest are mentioned in the system instruction.
const MAX_POINTS_OF_INTEREST: usize = 5;

// ---------------------------------------------------------------------------
// CoachPrompt
// ---------------------------------------------------------------------------

/// Builds coaching prompts.
///
/// # Example
/// ```rust
/// use photo_coach::conversation::AmbientContext;
/// use photo_coach::vision::CoachPrompt;
///
/// let prompt = CoachPrompt::default();
/// let ambient = AmbientContext::new(
///     Some("Porto, Ribeira".into()),
///     vec!["Dom Luís I Bridge".into()],
/// );
/// let system = prompt.system(&ambient);
/// assert!(system.contains("Porto, Ribeira"));
/// assert!(system.contains("Dom Luís I Bridge"));
/// ```
#[derive(Debug, Clone)]
pub struct CoachPrompt {
    coaching: String,
    welcome: String,
}

impl CoachPrompt {
    /// Override the per-frame and greeting instructions.
    pub fn new(coaching: impl Into<String>, welcome: impl Into<String>) -> Self {
        Self {
            coaching: coaching.into(),
            welcome: welcome.into(),
        }
    }

    /// System instruction for the given ambient context.
    pub fn system(&self, ambient: &AmbientContext) -> String {
        let mut text = String::with_capacity(512);
        text.push_str(SYSTEM_INSTRUCTION);

        if let Some(location) = &ambient.location {
            text.push_str(&format!("\nThe user is at: {location}."));
        }

        if !ambient.points_of_interest.is_empty() {
            text.push_str("\nNearby points of interest:");
            for poi in ambient.points_of_interest.iter().take(MAX_POINTS_OF_INTEREST) {
                text.push_str(&format!("\n- {poi}"));
            }
        }

        text
    }

    /// Instruction that accompanies a captured frame.
    pub fn coaching(&self) -> &str {
        &self.coaching
    }

    /// Instruction for the greeting session.
    pub fn welcome(&self) -> &str {
        &self.welcome
    }
}

impl Default for CoachPrompt {
    fn default() -> Self {
        Self::new(COACHING_INSTRUCTION, WELCOME_INSTRUCTION)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Vision-inference module.
//!
//! This module provides:
//! * [`VisionCoach`]: async trait for "look at this frame, give one tip".
//! * [`OpenAiVision`]: OpenAI-compatible chat-completions backend.
//! * [`CoachPrompt`]: system, coaching and welcome instructions.
//! * [`VisionError`]: error variants for vision calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use photo_coach::config::AppConfig;
//! use photo_coach::conversation::{AmbientContext, ConversationMessage, ConversationWindow};
//! use photo_coach::session::CancellationToken;
//! use photo_coach::vision::{CoachPrompt, OpenAiVision, VisionCoach};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let vision = OpenAiVision::from_config(&config.vision);
//!     let prompt = CoachPrompt::default();
//!
//!     let window = ConversationWindow::new(20, prompt.system(&AmbientContext::default()));
//!     let turn = ConversationMessage::user(prompt.coaching(), None);
//!     let tip = vision
//!         .infer(&window.snapshot(), &turn, &CancellationToken::new())
//!         .await
//!         .unwrap();
//!     println!("{tip}");
//! }
//! ```

pub mod client;
pub mod prompt;

pub use client::{OpenAiVision, VisionCoach, VisionError};
pub use prompt::CoachPrompt;

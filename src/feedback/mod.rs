//! Written feedback drafted by an OpenAI-compatible chat completions API.

mod client;
mod prompts;

pub use client::{ChatCompletionsClient, FeedbackClient, FeedbackError};
pub use prompts::{quiz_prompt, survey_prompt};

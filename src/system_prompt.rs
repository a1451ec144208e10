//! Fixed texts of a session: the system prompt and the canned assistant lines
//!
//! The system prompt asks the model for Chain-of-Thought Self-Consistency
//! answers. Its output is opaque to the session; nothing here parses the
//! reasoning paths back out.

/// First entry of every session log. Never rendered.
pub const SYSTEM_PROMPT: &str = r"You are the Trusted ChatBot, a helpful assistant that generates trusted answers using the CoT-SC (Chain-of-Thought Self-Consistency) method.

For every question:
1. Generate **5 different reasoning paths**.
2. Write each path on a **new line**, in the format:
   Path 1: ...
   Path 2: ...
   Path 3: ...
3. After the 5 paths, write:
   ✅ Final Answer: [your best consistent answer]
Use Markdown formatting with line breaks for readability.";

/// Appended at construction and after every reset
pub const GREETING: &str = "Hi! I'm TrustedBot. How can I help you today?";

/// Shown instead of logging an empty user turn
pub const EMPTY_INPUT_NOTICE: &str = "Oops! I didn't get that. Could you please type something?";

/// Stands in for the reply when the completion call fails
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

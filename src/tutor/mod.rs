// Tutor core: conversation store and session controller
//
// The session drives one provider through the MateTutor persona and keeps
// the transcript the shell renders.

pub mod conversation;
pub mod error;
pub mod prompts;
pub mod session;

pub use conversation::{Conversation, Turn, TurnKind};
pub use error::TutorError;
pub use session::{
    DebugSnapshot, NoopObserver, ReplyObserver, SessionState, Submission, SubmitOutcome,
    TutorOptions, TutorSession,
};

// In-memory conversation store
//
// Ordered, append-only log of the turns shown to the student. Only a full
// reset removes turns.

use chrono::{DateTime, Utc};

use crate::media::DecodedImage;
use crate::providers::{Message, Role};

/// What produced an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// The greeting inserted before any student input
    Welcome,
    /// Student input or a model reply
    Message,
    /// Apology or retry prompt standing in for a failed reply
    Notice,
}

/// One exchange unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    role: Role,
    kind: TurnKind,
    text: String,
    image: Option<DecodedImage>,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, image: Option<DecodedImage>) -> Self {
        Self::new(Role::User, TurnKind::Message, text.into(), image)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnKind::Message, text.into(), None)
    }

    pub fn welcome(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnKind::Welcome, text.into(), None)
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnKind::Notice, text.into(), None)
    }

    fn new(role: Role, kind: TurnKind, text: String, image: Option<DecodedImage>) -> Self {
        Self {
            role,
            kind,
            text,
            image,
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        self.image.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_notice(&self) -> bool {
        self.kind == TurnKind::Notice
    }
}

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns in insertion order. Call again to start over.
    pub fn all(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }

    /// Text-only history of completed exchanges, for providers that keep no
    /// chat state.
    ///
    /// The welcome turn is left out, images are dropped, and an exchange
    /// whose reply failed is skipped entirely (question and notice), so the
    /// model only sees what it actually said. A trailing unanswered student
    /// turn is skipped too.
    pub fn replay_history(&self) -> Vec<Message> {
        let mut history = Vec::new();
        let mut turns = self.turns.iter().filter(|t| t.kind != TurnKind::Welcome).peekable();

        while let Some(turn) = turns.next() {
            match turn.role {
                Role::User => match turns.peek() {
                    Some(reply) if reply.role == Role::Assistant => {
                        if reply.kind == TurnKind::Message {
                            history.push(Message::user(turn.text.clone()));
                            history.push(Message::assistant(reply.text.clone()));
                        }
                        turns.next();
                    }
                    _ => {}
                },
                Role::Assistant => {}
            }
        }

        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut conv = Conversation::new();
        conv.append(Turn::welcome("hola"));
        conv.append(Turn::user("2+2", None));
        conv.append(Turn::assistant("¿Qué intentaste?"));

        let texts: Vec<&str> = conv.all().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["hola", "2+2", "¿Qué intentaste?"]);
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.user_turn_count(), 1);
        assert_eq!(conv.last().unwrap().role(), Role::Assistant);
    }

    #[test]
    fn test_all_is_restartable() {
        let mut conv = Conversation::new();
        conv.append(Turn::user("a", None));
        conv.append(Turn::assistant("b"));
        assert_eq!(conv.all().count(), 2);
        assert_eq!(conv.all().count(), 2);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut conv = Conversation::new();
        conv.append(Turn::welcome("hola"));
        conv.append(Turn::user("x", None));
        conv.reset();
        assert!(conv.is_empty());
        conv.reset();
        assert!(conv.is_empty());
        assert_eq!(conv.all().count(), 0);
    }

    #[test]
    fn test_replay_skips_welcome_and_failed_exchanges() {
        let mut conv = Conversation::new();
        conv.append(Turn::welcome("hola"));
        conv.append(Turn::user("¿cuánto es 3x = 9?", None));
        conv.append(Turn::assistant("¿Qué operación deshace la multiplicación?"));
        conv.append(Turn::user("dividir", None));
        conv.append(Turn::notice("Lo siento, algo salió mal."));
        conv.append(Turn::user("dividir entre 3", None));
        conv.append(Turn::assistant("¡Muy bien! 🎉"));
        conv.append(Turn::user("pendiente", None));

        let history = conv.replay_history();
        let texts: Vec<String> = history.iter().map(|m| m.text()).collect();
        assert_eq!(
            texts,
            vec![
                "¿cuánto es 3x = 9?",
                "¿Qué operación deshace la multiplicación?",
                "dividir entre 3",
                "¡Muy bien! 🎉",
            ]
        );
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn test_replay_of_empty_conversation() {
        let mut conv = Conversation::new();
        assert!(conv.replay_history().is_empty());
        conv.append(Turn::welcome("hola"));
        assert!(conv.replay_history().is_empty());
    }

    #[test]
    fn test_notice_kind() {
        assert!(Turn::notice("x").is_notice());
        assert!(!Turn::assistant("x").is_notice());
        assert_eq!(Turn::welcome("x").kind(), TurnKind::Welcome);
    }
}

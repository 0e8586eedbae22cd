// Errors surfaced by the tutor session to the shell

use thiserror::Error;

use crate::media::MediaError;
use crate::providers::ProviderError;

/// Errors returned by [`TutorSession`](super::TutorSession) handlers.
///
/// Failed model calls are not errors at this level: they become assistant
/// turns in the conversation.
#[derive(Error, Debug)]
pub enum TutorError {
    /// Initialization failed because the credential is missing or rejected.
    #[error("no se pudo configurar el proveedor: {0}")]
    Credential(String),

    /// Input arrived while the session could not accept it.
    #[error("el tutor no está listo: {0}")]
    NotReady(String),

    /// The uploaded image was rejected; nothing was sent.
    #[error("no se pudo usar la imagen: {0}")]
    ImageDecode(#[from] MediaError),

    /// Initialization failed for a reason other than the credential.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl TutorError {
    /// Whether a corrected credential could fix this.
    pub fn is_credential(&self) -> bool {
        matches!(self, TutorError::Credential(_))
    }
}

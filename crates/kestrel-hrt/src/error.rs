use thiserror::Error;

pub type HrtResult<T> = std::result::Result<T, HrtError>;

/// Errors surfaced by the timing substrate.
#[derive(Debug, Error)]
pub enum HrtError {
    /// The dispatcher thread could not be spawned.
    #[error("failed to spawn dispatcher thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

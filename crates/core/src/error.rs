#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-supplied input is outside what the domain accepts (blank
    /// system id, batch size out of range, reading invariant violated).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

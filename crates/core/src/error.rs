/// Result alias that carries the custom [`GonioError`] type.
pub type Result<T> = std::result::Result<T, GonioError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum GonioError {
    /// The output device could not be brought up. Fatal to the session.
    #[error("audio output unavailable: {0}")]
    Initialization(String),
    /// Encoded input was malformed, empty or unsupported. The session keeps
    /// whatever track it had loaded before.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// The output device rejected a start/stop/resume/gain request.
    #[error("audio output failed: {0}")]
    Output(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// Free-form message for the binary and for collaborators that have no
    /// better fitting variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl GonioError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// True for failures the session recovers from without host intervention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Initialization(_))
    }
}

impl From<&str> for GonioError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for GonioError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

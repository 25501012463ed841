use thiserror::Error;

/// Main error type for the highlights pipeline
#[derive(Error, Debug)]
pub enum HighlightsError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Analysis unavailable: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Errors raised while opening or decoding the source video
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to load video file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to probe video file {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Per-frame failures of the visual-analysis service.
///
/// None of these abort a run: the analyzer degrades the frame to an empty result.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("vision service unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("vision service returned a malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("vision service rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("vision request timed out after {seconds:.1}s")]
    Timeout { seconds: f64 },

    #[error("failed to encode frame for upload: {reason}")]
    FrameEncoding { reason: String },
}

/// Clip assembly errors, both fatal to the run
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No highlights found in the source video")]
    NoHighlightsFound,

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },
}

/// Convenience type alias for Results using HighlightsError
pub type Result<T> = std::result::Result<T, HighlightsError>;

impl HighlightsError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// True for the soft "nothing worth cutting" outcome, as opposed to a pipeline failure
    pub fn is_no_highlights(&self) -> bool {
        matches!(self, Self::Assembly(AssemblyError::NoHighlightsFound))
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 64,
            Self::Assembly(AssemblyError::NoHighlightsFound) => 2,
            _ => 1,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Assembly(AssemblyError::NoHighlightsFound) => {
                "No highlights detected: no scoreboard change or event object was seen in any sampled frame. No output was written.".to_string()
            }
            Self::Assembly(AssemblyError::EncodingFailed { reason }) => {
                format!("Pipeline failed while writing the highlights video: {}", reason)
            }
            Self::Video(VideoError::LoadFailed { path }) => {
                format!("Could not load video file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Config(ConfigError::MissingKey { key }) => {
                format!("Missing required setting '{}'. Set it before running.", key)
            }
            _ => self.to_string(),
        }
    }
}

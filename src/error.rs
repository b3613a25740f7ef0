//! Error types for symbol discovery and upload.
//!
//! Every failure carries an actionable message, and the top-level error knows
//! which kinds are worth retrying and what the user can do about the rest.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Main error type for all commands
#[derive(Error, Debug)]
pub enum AppError {
    /// Option and argument errors
    #[error("{0}")]
    Option(#[from] OptionError),

    /// File format errors (DEX, ELF, plist, manifest, ...)
    #[error("{0}")]
    Format(#[from] FormatError),

    /// External tool errors
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// Network and HTTP errors
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Input path does not exist
    #[error("Path not found: {}", path.display())]
    PathNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// An optional datum could not be located
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing datum
        what: String,
    },

    /// Archive entry would be written outside the extraction directory
    #[error("Refusing to extract '{entry}' from {}: path escapes the output directory", archive.display())]
    ZipSlip {
        /// Archive being extracted
        archive: PathBuf,
        /// Offending entry name
        entry: String,
    },

    /// The run was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// File system error with path context
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// Operation being performed, e.g. "reading file"
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        error: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip archive errors
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal errors
    #[error("{0}")]
    Walkdir(#[from] walkdir::Error),
}

/// Option and argument errors, raised before any I/O
#[derive(Error, Debug)]
pub enum OptionError {
    /// Required flag or environment variable absent
    #[error("Missing required option: {option}")]
    MissingOption {
        /// Flag name, e.g. `--api-key`
        option: String,
    },

    /// Invalid argument value or combination
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Mutually exclusive arguments were both given
    #[error("Conflicting arguments: {}", arguments.join(", "))]
    ConflictingArguments {
        /// Arguments that conflict
        arguments: Vec<String>,
    },
}

/// Binary and text format errors
#[derive(Error, Debug)]
pub enum FormatError {
    /// DEX header failed validation
    #[error("Invalid DEX file {}: {reason}", path.display())]
    InvalidDex {
        /// DEX file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// ELF could not be parsed
    #[error("Invalid ELF file {}: {reason}", path.display())]
    InvalidElf {
        /// ELF file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Property list could not be parsed
    #[error("Invalid plist {}: {reason}", path.display())]
    InvalidPlist {
        /// Plist file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// AndroidManifest could not be parsed
    #[error("Invalid AndroidManifest {}: {reason}", path.display())]
    InvalidManifest {
        /// Manifest file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Source map is not a JSON object
    #[error("Invalid source map {}: {reason}", path.display())]
    InvalidSourceMap {
        /// Source map file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// TOML manifest could not be parsed
    #[error("Invalid TOML {}: {reason}", path.display())]
    InvalidToml {
        /// TOML file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// External tool errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool is not on PATH
    #[error("Unable to find '{tool}' on this system")]
    ToolMissing {
        /// Tool name
        tool: String,
    },

    /// Tool ran but reported failure
    #[error("'{tool}' failed: {reason}")]
    ToolFailed {
        /// Tool name
        tool: String,
        /// Captured stderr or exit status
        reason: String,
    },
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Endpoint URL could not be parsed
    #[error("Invalid endpoint URL '{url}': {reason}")]
    BadEndpoint {
        /// URL as given
        url: String,
        /// Parser message
        reason: String,
    },

    /// Request exceeded its timeout
    #[error("Request to {url} timed out after {seconds}s")]
    Timeout {
        /// Target URL
        url: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Connection-level failure
    #[error("Network error sending request to {url}: {reason}")]
    Network {
        /// Target URL
        url: String,
        /// Reason for the error
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    HttpFail {
        /// Target URL
        url: String,
        /// Status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },
}

impl AppError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AppError::Option(OptionError::MissingOption { option }) if option == "--api-key" => {
                vec![
                    "Pass --api-key or set BUGSNAG_API_KEY".to_string(),
                    "Add bugsnag.apiKey to Info.plist or com.bugsnag.android.API_KEY to AndroidManifest.xml".to_string(),
                ]
            }
            AppError::Tool(ToolError::ToolMissing { tool }) => match tool.as_str() {
                "dwarfdump" | "xcodebuild" | "defaults" => {
                    vec!["Install the Xcode Command Line Tools: xcode-select --install".to_string()]
                }
                "llvm-objcopy" => vec![
                    "Set --ndk-root or ANDROID_NDK_ROOT to an NDK r24 or newer".to_string(),
                ],
                _ => vec![format!("Ensure '{tool}' is installed and on PATH")],
            },
            AppError::Transport(TransportError::Timeout { .. })
            | AppError::Transport(TransportError::Network { .. }) => vec![
                "Check network connectivity to the upload server".to_string(),
                "Increase --timeout or --retries".to_string(),
            ],
            AppError::Transport(TransportError::HttpFail { status: 401, .. }) => {
                vec!["Check that the API key is correct for this project".to_string()]
            }
            AppError::Transport(TransportError::BadEndpoint { .. }) => {
                vec!["Check --upload-api-root-url / --build-api-root-url".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Whether the transport may retry after this error
    pub fn is_retriable(&self) -> bool {
        match self {
            AppError::Transport(TransportError::Timeout { .. })
            | AppError::Transport(TransportError::Network { .. }) => true,
            AppError::Transport(TransportError::HttpFail { status, .. }) => *status >= 500,
            _ => false,
        }
    }

    /// Shorthand for a missing option
    pub fn missing(option: &str) -> Self {
        AppError::Option(OptionError::MissingOption {
            option: option.to_string(),
        })
    }

    /// Shorthand for an invalid argument
    pub fn invalid(reason: impl Into<String>) -> Self {
        AppError::Option(OptionError::InvalidArguments {
            reason: reason.into(),
        })
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase, e.g. "reading file".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| AppError::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

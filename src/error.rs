use thiserror::Error;

/// Main error type for the trading pipeline
#[derive(Error, Debug)]
pub enum AgentflowError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    // Entity lookups
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Execution errors
    #[error("Execution failed: {0}")]
    Execution(#[from] VenueError),

    #[error("No venue available for token {token}")]
    NoVenue { token: String },

    // Enhancer errors
    #[error("Signal enhancer error: {0}")]
    Enhancer(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // Crypto/signing errors
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signature error: {0}")]
    Signature(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AgentflowError {
    /// Storage failures that may clear on their own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentflowError::Database(_) | AgentflowError::LedgerUnavailable(_) | AgentflowError::Io(_)
        )
    }
}

/// Result type alias for AgentflowError
pub type Result<T> = std::result::Result<T, AgentflowError>;

/// Failure of a single venue interaction or execution attempt.
///
/// The split that matters to the router is [`VenueError::is_retryable`]: quote
/// validation failures mean the trade cannot be executed at all, everything else
/// is an adverse-conditions failure that may succeed on a second attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    #[error("Quote invalid: {0}")]
    QuoteInvalid(String),

    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Venue does not accept permit authorization")]
    PermitUnsupported,

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Confirmation failed: {0}")]
    Confirmation(String),

    #[error("Confirmation timed out after {elapsed_secs}s for {tx_hash}")]
    ConfirmationTimeout { tx_hash: String, elapsed_secs: u64 },

    #[error("Transaction {tx_hash} reverted on-chain")]
    Reverted { tx_hash: String },
}

impl VenueError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, VenueError::QuoteInvalid(_))
    }
}

impl From<ethers::providers::ProviderError> for AgentflowError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        AgentflowError::Rpc(err.to_string())
    }
}

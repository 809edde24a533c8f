pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Retrieval failed: {message}")]
	RetrievalFailure { message: String },
	#[error("Embedding unavailable: {message}")]
	EmbeddingUnavailable { message: String },
	#[error("Rate limited; retry after {retry_after_secs}s.")]
	RateLimited { retry_after_secs: u64 },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	/// Stable machine-readable kind used on the wire.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::InvalidRequest { .. } => "invalid_request",
			Self::RetrievalFailure { .. } => "retrieval_failure",
			Self::EmbeddingUnavailable { .. } => "embedding_unavailable",
			Self::RateLimited { .. } => "rate_limited",
			Self::Storage { .. } | Self::Internal { .. } => "internal",
		}
	}
}
impl From<scout_storage::Error> for Error {
	fn from(err: scout_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Internal { message: err.to_string() }
	}
}

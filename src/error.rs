//! Error types for routing.

use thiserror::Error;

/// Error type for route pattern compilation.
///
/// Pattern compilation is a one-time, setup-phase operation under developer
/// control, so it is strict: every failure surfaces immediately at route
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
	/// Pattern string exceeds the maximum allowed length.
	#[error("pattern length {length} exceeds maximum allowed length of {max} bytes")]
	TooLong {
		/// Actual pattern length in bytes.
		length: usize,
		/// Maximum allowed length.
		max: usize,
	},

	/// Pattern has too many path segments.
	#[error("pattern has {count} path segments, exceeding maximum of {max}")]
	TooManySegments {
		/// Actual segment count.
		count: usize,
		/// Maximum allowed count.
		max: usize,
	},

	/// The compiled matcher is not a valid regular expression.
	///
	/// Custom parameter constraints are inserted verbatim, so an unbalanced
	/// `)` in a constraint body ends up here.
	#[error("failed to compile pattern regex: {0}")]
	Regex(String),
}

/// Error type for router operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
	/// A route pattern failed to compile at registration time.
	#[error("invalid route pattern `{pattern}`: {source}")]
	InvalidPattern {
		/// The offending pattern string.
		pattern: String,
		/// The underlying compilation error.
		#[source]
		source: PatternError,
	},

	/// No registered route carries the requested name.
	#[error("unknown route name: {0}")]
	UnknownRouteName(String),

	/// A required parameter was not supplied for reverse URL generation.
	#[error("missing parameter `{0}` for reverse lookup")]
	MissingParameter(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_pattern_error_display() {
		let err = PatternError::TooLong {
			length: 2048,
			max: 1024,
		};
		assert!(err.to_string().contains("2048"));
		assert!(err.to_string().contains("1024"));
	}

	#[rstest]
	fn test_router_error_display() {
		assert_eq!(
			RouterError::UnknownRouteName("detail".to_string()).to_string(),
			"unknown route name: detail"
		);
		assert_eq!(
			RouterError::MissingParameter("id".to_string()).to_string(),
			"missing parameter `id` for reverse lookup"
		);
	}

	#[rstest]
	fn test_invalid_pattern_carries_source() {
		let err = RouterError::InvalidPattern {
			pattern: "/a/:b(".to_string(),
			source: PatternError::Regex("unclosed group".to_string()),
		};
		assert!(err.to_string().contains("/a/:b("));
		assert!(std::error::Error::source(&err).is_some());
	}
}

//! Error types for the navigation engine.

use crate::interceptor::InterceptorId;
use crate::node::NodeId;
use thiserror::Error;

/// Boxed error returned by fallible interceptor guards.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Router errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RouterError {
	/// A route pattern could not be compiled.
	#[error("invalid route pattern '{pattern}': {reason}")]
	InvalidPattern {
		/// The offending pattern string.
		pattern: String,
		/// Why compilation failed.
		reason: String,
	},

	/// A node refers to a parent that is not registered (disposed or never created).
	#[error("unknown parent router node {parent}")]
	UnknownParentNode {
		/// The parent id that failed to resolve.
		parent: NodeId,
	},

	/// An interceptor guard returned an error.
	#[error("interceptor {interceptor} failed while navigating from '{from}' to '{to}': {source}")]
	InterceptorFailure {
		/// The guard that failed.
		interceptor: InterceptorId,
		/// Path the navigation started from.
		from: String,
		/// Candidate path the guard was given.
		to: String,
		/// Error raised by the guard.
		#[source]
		source: BoxError,
	},

	/// A navigation target could not be resolved against the current path.
	#[error("cannot resolve navigation target '{target}' against '{base}': {source}")]
	InvalidTarget {
		/// The requested target.
		target: String,
		/// The path it was resolved against.
		base: String,
		/// Underlying URL error.
		#[source]
		source: url::ParseError,
	},

	/// The node has already been disposed.
	#[error("router node {0} has been disposed")]
	NodeDisposed(NodeId),

	/// Router settings failed validation or parsing.
	#[error("invalid router settings: {0}")]
	InvalidSettings(String),
}

impl RouterError {
	pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
		Self::InvalidPattern {
			pattern: pattern.to_string(),
			reason: reason.into(),
		}
	}
}

/// Error type for typed path parameter extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
	/// The parameter was not captured by the matched pattern.
	#[error("missing path parameter '{0}'")]
	Missing(String),
	/// Failed to parse a parameter value.
	#[error("failed to parse parameter '{name}' value '{raw_value}' as {param_type}: {reason}")]
	ParseError {
		/// Name of the parameter.
		name: String,
		/// Expected type name.
		param_type: &'static str,
		/// Raw string value that failed to parse.
		raw_value: String,
		/// Error message from parsing.
		reason: String,
	},
}

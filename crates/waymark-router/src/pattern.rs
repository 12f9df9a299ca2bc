//! Route pattern compilation.
//!
//! Patterns are made of literal text, `:name` placeholders and an optional
//! `*` wildcard marker at either end:
//!
//! - `/users` - exact match, compared as a plain string
//! - `/users/:id` - one placeholder, captures a single path segment
//! - `/cat/:id*` - prefix match, the unmatched rest is handed to nested nodes
//! - `*/edit` - suffix match, no start anchor
//!
//! Compiled matchers are cached by their exact pattern string and shared as
//! `Arc`s, so compiling the same string twice yields the same object.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};

use crate::error::{RouterError, RouterResult};
use crate::params::PathParams;

/// Wildcard marker.
const WILDCARD: char = '*';

/// Placeholder prefix.
const PLACEHOLDER: char = ':';

/// Regex emitted for one placeholder: a single, non-empty path segment.
const SEGMENT_CAPTURE: &str = "([^/]+)";

/// Maximum allowed length for a route pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a route pattern.
const MAX_PATTERN_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

static GLOBAL: Lazy<PatternCompiler> = Lazy::new(PatternCompiler::new);

/// Memoizing pattern compiler.
#[derive(Debug, Default)]
pub struct PatternCompiler {
	cache: Mutex<HashMap<String, Arc<CompiledMatcher>>>,
}

impl PatternCompiler {
	/// Creates a compiler with its own, empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the process-wide compiler. Its cache never evicts.
	pub fn global() -> &'static PatternCompiler {
		&GLOBAL
	}

	/// Compiles a pattern, returning the cached matcher when the exact
	/// string was compiled before.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidPattern`] if the pattern is too long, has
	/// too many segments, misplaces the wildcard marker, contains an unnamed
	/// or repeated placeholder, or exceeds the regex size limit.
	pub fn compile(&self, pattern: &str) -> RouterResult<Arc<CompiledMatcher>> {
		if let Some(hit) = self.cache.lock().get(pattern) {
			return Ok(Arc::clone(hit));
		}

		let compiled = Arc::new(CompiledMatcher::new(pattern)?);
		tracing::trace!(pattern, source = compiled.source(), "compiled route pattern");

		let mut cache = self.cache.lock();
		Ok(Arc::clone(
			cache.entry(pattern.to_string()).or_insert(compiled),
		))
	}

	/// Number of cached patterns.
	pub fn len(&self) -> usize {
		self.cache.lock().len()
	}

	/// Whether nothing has been compiled yet.
	pub fn is_empty(&self) -> bool {
		self.cache.lock().is_empty()
	}
}

/// One lexical piece of a pattern body.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	Literal(String),
	Param(String),
}

#[derive(Debug)]
enum Matcher {
	/// No placeholders and no wildcard: plain string equality.
	Literal(String),
	Regex(Regex),
}

/// A successful match of a path against a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
	/// Captured parameters.
	pub params: PathParams,
	/// Unmatched rest of the path. Only prefix patterns produce a non-empty
	/// remainder; a remainder of just `/` is reported as empty.
	pub remainder: String,
}

/// A compiled route pattern: matcher plus ordered parameter names.
#[derive(Debug)]
pub struct CompiledMatcher {
	pattern: String,
	matcher: Matcher,
	param_names: Vec<String>,
	prefix: bool,
	suffix: bool,
}

impl CompiledMatcher {
	fn new(pattern: &str) -> RouterResult<Self> {
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(RouterError::invalid_pattern(
				pattern,
				format!(
					"pattern length {} exceeds maximum allowed length of {} bytes",
					pattern.len(),
					MAX_PATTERN_LENGTH
				),
			));
		}

		let segment_count = pattern.split('/').count();
		if segment_count > MAX_PATTERN_SEGMENTS {
			return Err(RouterError::invalid_pattern(
				pattern,
				format!(
					"pattern has {} path segments, exceeding maximum of {}",
					segment_count, MAX_PATTERN_SEGMENTS
				),
			));
		}

		let suffix = pattern.starts_with(WILDCARD);
		let prefix = pattern.ends_with(WILDCARD);
		let body = if pattern.len() == 1 && suffix {
			""
		} else {
			let start = usize::from(suffix);
			let end = pattern.len() - usize::from(prefix);
			&pattern[start..end]
		};

		if body.contains(WILDCARD) {
			return Err(RouterError::invalid_pattern(
				pattern,
				"wildcard marker is only allowed as the first or last character",
			));
		}

		let tokens = tokenize(pattern, body)?;
		let param_names: Vec<String> = tokens
			.iter()
			.filter_map(|t| match t {
				Token::Param(name) => Some(name.clone()),
				Token::Literal(_) => None,
			})
			.collect();

		let matcher = if param_names.is_empty() && !prefix && !suffix {
			Matcher::Literal(body.to_string())
		} else {
			let mut source = String::new();
			if !suffix {
				source.push('^');
			}
			for token in &tokens {
				match token {
					Token::Literal(text) => source.push_str(&regex::escape(text)),
					Token::Param(_) => source.push_str(SEGMENT_CAPTURE),
				}
			}
			if !prefix {
				source.push('$');
			}

			let regex = RegexBuilder::new(&source)
				.size_limit(MAX_REGEX_SIZE)
				.build()
				.map_err(|e| {
					RouterError::invalid_pattern(pattern, format!("failed to compile regex: {}", e))
				})?;
			Matcher::Regex(regex)
		};

		Ok(Self {
			pattern: pattern.to_string(),
			matcher,
			param_names,
			prefix,
			suffix,
		})
	}

	/// The original pattern string.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// Regex source, or the literal text for literal patterns.
	pub fn source(&self) -> &str {
		match &self.matcher {
			Matcher::Literal(text) => text,
			Matcher::Regex(regex) => regex.as_str(),
		}
	}

	/// Parameter names in placeholder order.
	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	/// Whether matching is plain string equality.
	pub fn is_literal(&self) -> bool {
		matches!(self.matcher, Matcher::Literal(_))
	}

	/// Whether the pattern ends with the wildcard marker and hands its
	/// remainder to nested nodes.
	pub fn is_prefix(&self) -> bool {
		self.prefix
	}

	/// Whether the pattern starts with the wildcard marker (no start anchor).
	pub fn is_suffix(&self) -> bool {
		self.suffix
	}

	/// Checks if this pattern accepts the given path.
	pub fn is_match(&self, path: &str) -> bool {
		match &self.matcher {
			Matcher::Literal(text) => text == path,
			Matcher::Regex(regex) => regex.is_match(path),
		}
	}

	/// Matches a path, returning the captured parameters and the remainder.
	pub fn matches(&self, path: &str) -> Option<PatternMatch> {
		match &self.matcher {
			Matcher::Literal(text) => (text == path).then(|| PatternMatch {
				params: PathParams::new(),
				remainder: String::new(),
			}),
			Matcher::Regex(regex) => {
				let caps = regex.captures(path)?;
				let whole = caps.get(0)?;
				let params = PathParams::from_captures(
					&self.param_names,
					caps.iter()
						.skip(1)
						.map(|m| m.map(|m| m.as_str()).unwrap_or_default()),
				);
				let remainder = if self.prefix {
					normalize_remainder(&path[whole.end()..])
				} else {
					String::new()
				};
				Some(PatternMatch { params, remainder })
			}
		}
	}
}

impl PartialEq for CompiledMatcher {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl Eq for CompiledMatcher {}

impl std::fmt::Display for CompiledMatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.pattern)
	}
}

fn normalize_remainder(rest: &str) -> String {
	if rest == "/" {
		String::new()
	} else {
		rest.to_string()
	}
}

fn is_name_start(c: char) -> bool {
	c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_'
}

/// Splits a pattern body into literal runs and placeholders.
fn tokenize(pattern: &str, body: &str) -> RouterResult<Vec<Token>> {
	let mut tokens = Vec::new();
	let mut seen = HashSet::new();
	let mut literal = String::new();
	let mut chars = body.chars().peekable();

	while let Some(c) = chars.next() {
		if c != PLACEHOLDER {
			literal.push(c);
			continue;
		}

		if !chars.peek().copied().is_some_and(is_name_start) {
			return Err(RouterError::invalid_pattern(
				pattern,
				"placeholder marker ':' must be followed by a name",
			));
		}

		let mut name = String::new();
		while let Some(&next) = chars.peek() {
			if !is_name_char(next) {
				break;
			}
			name.push(next);
			chars.next();
		}

		if !seen.insert(name.clone()) {
			return Err(RouterError::invalid_pattern(
				pattern,
				format!("parameter '{}' appears more than once", name),
			));
		}

		if !literal.is_empty() {
			tokens.push(Token::Literal(std::mem::take(&mut literal)));
		}
		tokens.push(Token::Param(name));
	}

	if !literal.is_empty() {
		tokens.push(Token::Literal(literal));
	}
	Ok(tokens)
}

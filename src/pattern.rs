//! Route pattern compilation.
//!
//! A pattern string mixes literal segments with named parameters:
//!
//! - `/items/`: literal match
//! - `/items/:id`: required named capture
//! - `/items/:id?`: optional named capture (only meaningful when followed
//!   by a path boundary or the end of the pattern)
//! - `/items/:id(\d+)`: capture constrained by a custom regex body
//!
//! Each pattern compiles into **two** matchers. The lenient matcher
//! tolerates one optional leading and trailing path separator and is
//! case-insensitive; the strict matcher requires exact boundaries. The
//! strict acceptance set is a subset of the lenient one.
//!
//! Constraint bodies are inserted verbatim and must not contain an
//! unescaped `)` that would break group boundaries; this is a caller
//! responsibility, not validated here (it surfaces as a
//! [`PatternError::Regex`] when the final expression fails to compile).

use std::collections::HashMap;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::{PatternError, RouterError};

/// Maximum allowed length for a route pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a route pattern.
const MAX_PATH_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled matcher (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

/// A compiled route pattern.
///
/// Holds the ordered parameter names and the lenient/strict matchers. Every
/// named parameter contributes exactly one capturing group, so parameter
/// extraction can index captures positionally.
#[derive(Debug, Clone)]
pub struct RoutePattern {
	/// The original pattern string.
	pattern: String,
	/// Parameter names in declaration order.
	param_names: Vec<String>,
	/// Separator-tolerant, case-insensitive matcher.
	lenient: Regex,
	/// Exact-boundary, case-sensitive matcher.
	strict: Regex,
}

impl RoutePattern {
	/// Compiles a pattern string.
	///
	/// # Errors
	///
	/// Returns a [`PatternError`] if the pattern exceeds the length or
	/// segment limits, or if the derived expression is not a valid regex
	/// (typically a malformed custom constraint body).
	pub fn compile(pattern: &str) -> Result<Self, PatternError> {
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(PatternError::TooLong {
				length: pattern.len(),
				max: MAX_PATTERN_LENGTH,
			});
		}

		let segment_count = pattern.split('/').count();
		if segment_count > MAX_PATH_SEGMENTS {
			return Err(PatternError::TooManySegments {
				count: segment_count,
				max: MAX_PATH_SEGMENTS,
			});
		}

		let (body, param_names) = Self::build_body(pattern);

		let strict = RegexBuilder::new(&format!("^{body}$"))
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| PatternError::Regex(e.to_string()))?;

		// Relax the anchors: one optional separator on either side.
		let mut relaxed = body.as_str();
		relaxed = relaxed.strip_prefix("\\/").unwrap_or(relaxed);
		relaxed = relaxed.strip_suffix("\\/").unwrap_or(relaxed);

		let lenient = RegexBuilder::new(&format!("^/?{relaxed}/?$"))
			.size_limit(MAX_REGEX_SIZE)
			.case_insensitive(true)
			.build()
			.map_err(|e| PatternError::Regex(e.to_string()))?;

		Ok(Self {
			pattern: pattern.to_string(),
			param_names,
			lenient,
			strict,
		})
	}

	/// Transforms the pattern into an unanchored regex body and collects
	/// parameter names.
	///
	/// `/:name` becomes `(?:\/([^/]+))`, a custom constraint replaces the
	/// default capture, and a literal `?` following the token survives as
	/// group optionality. Everything else is escaped literally.
	fn build_body(pattern: &str) -> (String, Vec<String>) {
		let mut body = String::new();
		let mut param_names = Vec::new();
		let mut chars = pattern.chars().peekable();

		while let Some(c) = chars.next() {
			if c == '/' && chars.peek() == Some(&':') {
				chars.next(); // consume ':'

				let mut name = String::new();
				while let Some(&next) = chars.peek() {
					if next.is_ascii_alphanumeric() || next == '_' {
						name.push(next);
						chars.next();
					} else {
						break;
					}
				}

				if name.is_empty() {
					// `/:` with no identifier stays literal
					body.push_str("\\/:");
					continue;
				}

				param_names.push(name);

				// Custom constraint body, inserted verbatim up to the
				// first `)`
				let mut capture = String::from("[^/]+");
				if chars.peek() == Some(&'(') {
					chars.next();
					let mut custom = String::new();
					while let Some(&next) = chars.peek() {
						chars.next();
						if next == ')' {
							break;
						}
						custom.push(next);
					}
					capture = custom;
				}

				body.push_str("(?:\\/(");
				body.push_str(&capture);
				body.push_str("))");

				// `:name?`: the source `?` makes the whole segment
				// optional
				if chars.peek() == Some(&'?') {
					chars.next();
					body.push('?');
				}
			} else {
				match c {
					'/' | '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '^' | '$' | '|'
					| '\\' => {
						body.push('\\');
						body.push(c);
					}
					_ => body.push(c),
				}
			}
		}

		(body, param_names)
	}

	/// Returns the original pattern string.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Returns the parameter names in declaration order.
	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	/// Tests a request against the lenient matcher.
	pub fn is_match(&self, path: &str) -> bool {
		self.lenient.is_match(path)
	}

	/// Tests a request against the strict matcher.
	pub fn is_strict_match(&self, path: &str) -> bool {
		self.strict.is_match(path)
	}

	/// Captures the parameter values of a path using the lenient matcher.
	///
	/// Returns one entry per parameter name; an entry is `None` when the
	/// path does not match at all, when the capture is absent (unsatisfied
	/// optional) or when it is empty.
	pub(crate) fn captures(&self, path: &str) -> Vec<Option<String>> {
		let Some(caps) = self.lenient.captures(path) else {
			return vec![None; self.param_names.len()];
		};

		(1..=self.param_names.len())
			.map(|i| {
				caps.get(i)
					.map(|m| m.as_str())
					.filter(|s| !s.is_empty())
					.map(str::to_string)
			})
			.collect()
	}

	/// Generates a path from this pattern with the given parameters.
	///
	/// Optional segments whose parameter is absent are omitted; constraint
	/// bodies are not re-validated against the supplied values.
	///
	/// # Errors
	///
	/// Returns [`RouterError::MissingParameter`] when a required parameter
	/// is not supplied.
	pub fn reverse(&self, params: &HashMap<String, String>) -> Result<String, RouterError> {
		let mut out = String::new();
		let mut chars = self.pattern.chars().peekable();

		while let Some(c) = chars.next() {
			if c == '/' && chars.peek() == Some(&':') {
				chars.next();

				let mut name = String::new();
				while let Some(&next) = chars.peek() {
					if next.is_ascii_alphanumeric() || next == '_' {
						name.push(next);
						chars.next();
					} else {
						break;
					}
				}

				if name.is_empty() {
					out.push_str("/:");
					continue;
				}

				// skip a constraint body
				if chars.peek() == Some(&'(') {
					for next in chars.by_ref() {
						if next == ')' {
							break;
						}
					}
				}

				let optional = chars.peek() == Some(&'?');
				if optional {
					chars.next();
				}

				match params.get(&name) {
					Some(value) => {
						out.push('/');
						out.push_str(value);
					}
					None if optional => {}
					None => return Err(RouterError::MissingParameter(name)),
				}
			} else {
				out.push(c);
			}
		}

		Ok(out)
	}
}

impl PartialEq for RoutePattern {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl Eq for RoutePattern {}

impl fmt::Display for RoutePattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.pattern)
	}
}

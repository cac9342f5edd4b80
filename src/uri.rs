//! URI decomposition.
//!
//! A navigation request is a raw string; [`Uri::parse`] splits it into
//! protocol, host, path, query string and hash fragment. Parsing is
//! deliberately total: any input decomposes into *some* `Uri`, with absent
//! parts left as empty strings.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A decomposed navigation request.
///
/// `query` keeps its leading `?` and `fragment` its leading `#`; both are
/// empty strings when the part is absent. `path` includes the leading slash
/// when the input carries one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uri {
	/// Scheme without the `://` separator (e.g. `https`), or empty.
	pub protocol: String,
	/// Host (and port, if any), or empty for relative requests.
	pub host: String,
	/// Path component.
	pub path: String,
	/// Raw query string including the leading `?`, or empty.
	pub query: String,
	/// Raw hash fragment including the leading `#`, or empty.
	pub fragment: String,
}

fn uri_regex() -> &'static Regex {
	static URI_REGEX: OnceLock<Regex> = OnceLock::new();
	URI_REGEX.get_or_init(|| {
		Regex::new(r"^(?:([\w+.-]+)://([^/]+))?([^?#]*)(\?[^#]*)?(#.*)?").expect("valid uri regex")
	})
}

impl Uri {
	/// Parses a raw request string into its components.
	///
	/// Never fails: every part of the expression is optional, so arbitrary
	/// input canonicalizes to a (possibly mostly-empty) `Uri`.
	pub fn parse(raw: &str) -> Self {
		let group = |caps: &regex::Captures<'_>, i: usize| {
			caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
		};

		uri_regex()
			.captures(raw)
			.map(|caps| Self {
				protocol: group(&caps, 1),
				host: group(&caps, 2),
				path: group(&caps, 3),
				query: group(&caps, 4),
				fragment: group(&caps, 5),
			})
			.unwrap_or_default()
	}

	/// The relative portion: `path + query + fragment`.
	pub fn relative(&self) -> String {
		format!("{}{}{}", self.path, self.query, self.fragment)
	}
}

impl fmt::Display for Uri {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if !self.protocol.is_empty() {
			write!(f, "{}://{}", self.protocol, self.host)?;
		}
		write!(f, "{}", self.relative())
	}
}

/// Joins path parts with a single separator, collapsing duplicate slashes.
pub fn join_paths(parts: &[&str]) -> String {
	let joined = parts.join("/");
	let mut out = String::with_capacity(joined.len());
	let mut prev_slash = false;

	for c in joined.chars() {
		if c == '/' {
			if !prev_slash {
				out.push(c);
			}
			prev_slash = true;
		} else {
			out.push(c);
			prev_slash = false;
		}
	}

	out
}

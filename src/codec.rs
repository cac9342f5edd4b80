//! Query-string and fragment codecs.
//!
//! Observed values are dynamic JSON scalars and containers
//! ([`serde_json::Value`]); this module converts them to and from the two
//! wire conventions:
//!
//! - the query string (`?k=v&...`), with values lenient-JSON-coerced so
//!   numbers, booleans and containers survive a round trip;
//! - the hash fragment (`#!<percent-encoded JSON>`).
//!
//! Both directions apply a lossy canonicalization policy: pairs whose value
//! is empty (`""`, `0`, `false`, `null`, `{}`, `[]`) are dropped, and a
//! malformed fragment payload degrades to an empty map. Dispatch
//! correctness depends on these functions never failing.

use serde_json::Value;

/// Key → value carrier used for seed data, extracted parameters, observed
/// state and history payloads.
pub type DataMap = serde_json::Map<String, Value>;

/// Parses a string as JSON, falling back to the raw string itself.
///
/// This is the coercion applied to query values and path captures: `"1"`
/// becomes a number, `"true"` a boolean, anything unparseable stays a
/// string.
pub fn parse_json_lenient(raw: &str) -> Value {
	serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Whether a value is dropped by canonicalization.
pub fn is_empty_value(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(b) => !b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
		Value::String(s) => s.is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
	}
}

/// Drops empty-valued entries.
pub fn compact(map: DataMap) -> DataMap {
	map.into_iter().filter(|(_, v)| !is_empty_value(v)).collect()
}

/// Keeps only the entries named by `keys`, in `keys` order.
pub fn pick(map: &DataMap, keys: &[String]) -> DataMap {
	keys.iter()
		.filter_map(|key| map.get(key).map(|v| (key.clone(), v.clone())))
		.collect()
}

/// Merges `source` into `target`; `source` wins on key collisions.
pub fn merge(target: &mut DataMap, source: DataMap) {
	for (key, value) in source {
		target.insert(key, value);
	}
}

/// Percent-decodes, falling back to the raw input on malformed sequences.
pub(crate) fn percent_decode(raw: &str) -> String {
	urlencoding::decode(raw)
		.map(|cow| cow.into_owned())
		.unwrap_or_else(|_| raw.to_string())
}

/// Parses a query string into a map.
///
/// Walks `&`-delimited pairs after the first `?`, percent-decodes both
/// sides and lenient-JSON-coerces the value. Pairs without a value and
/// pairs whose value canonicalizes to empty are dropped. When `keys` is
/// supplied, only the named keys are retained.
pub fn parse_query(qs: &str, keys: Option<&[String]>) -> DataMap {
	let mut parsed = DataMap::new();

	if let Some(index) = qs.find('?') {
		for pair in qs[index + 1..].split('&') {
			let Some((raw_key, raw_value)) = pair.split_once('=') else {
				continue;
			};
			if raw_value.is_empty() || is_empty_value(&parse_json_lenient(raw_value)) {
				continue;
			}

			parsed.insert(
				percent_decode(raw_key),
				parse_json_lenient(&percent_decode(raw_value)),
			);
		}
	}

	match keys {
		Some(keys) => pick(&parsed, keys),
		None => parsed,
	}
}

/// Parses a `#!<json>` fragment into a map.
///
/// The two-byte marker is skipped, the remainder percent-decoded and
/// JSON-parsed. Anything malformed, or a payload that is not an object,
/// yields an empty map; the error is swallowed, never surfaced.
pub fn parse_fragment(hash: &str, keys: Option<&[String]>) -> DataMap {
	let body = hash.get(2..).unwrap_or("");

	let parsed = match serde_json::from_str(&percent_decode(body)) {
		Ok(Value::Object(map)) => compact(map),
		_ => DataMap::new(),
	};

	match keys {
		Some(keys) => pick(&parsed, keys),
		None => parsed,
	}
}

/// Serializes a value for the query string.
///
/// Scalars are written as their literal text (a bare `2`, not `"2"`) so
/// the lenient parse on the way back in restores the original type.
/// Containers go through JSON.
pub fn stringify_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Array(_) | Value::Object(_) => {
			serde_json::to_string(value).unwrap_or_default()
		}
		other => other.to_string(),
	}
}

/// Serializes a map as `?k=v&...`, skipping empty values.
///
/// Returns an empty string when nothing survives.
pub fn serialize_query(map: &DataMap) -> String {
	let mut qs = String::new();

	for (key, value) in map {
		if is_empty_value(value) {
			continue;
		}

		qs.push(if qs.is_empty() { '?' } else { '&' });
		qs.push_str(&urlencoding::encode(key));
		qs.push('=');
		qs.push_str(&urlencoding::encode(&stringify_value(value)));
	}

	qs
}

/// Serializes a map as `#!<percent-encoded JSON>`.
///
/// Returns an empty string when the compacted map has no keys left.
pub fn serialize_fragment(map: &DataMap) -> String {
	let data = compact(map.clone());

	if data.is_empty() {
		return String::new();
	}

	let json = serde_json::to_string(&data).unwrap_or_default();
	format!("#!{}", urlencoding::encode(&json))
}

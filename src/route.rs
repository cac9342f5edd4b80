//! Route definition and lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::codec::{self, DataMap};
use crate::error::PatternError;
use crate::pattern::RoutePattern;
use crate::uri::Uri;
use crate::view::{
	CallbackContext, ObserveOptions, READY_KEY, RouteHandler, View, ViewContext, ViewObserver,
};

/// Which live-view keys feed back into the canonical URI, partitioned by
/// serialization destination.
///
/// `query` keys land in the URL query string, `fragment` keys in the
/// `#!<json>` hash, and `state` keys in the opaque history-entry payload
/// (never visible in the URL, only retrievable via back/forward
/// navigation). The three sets are disjoint by convention; duplicates are
/// not guarded against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveSpec {
	#[serde(default)]
	query: Vec<String>,
	#[serde(default)]
	fragment: Vec<String>,
	#[serde(default)]
	state: Vec<String>,
}

impl ObserveSpec {
	/// Creates an empty spec (nothing observed).
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the query-observed keys.
	pub fn query<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.query = keys.into_iter().map(Into::into).collect();
		self
	}

	/// Sets the fragment-observed keys.
	pub fn fragment<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fragment = keys.into_iter().map(Into::into).collect();
		self
	}

	/// Sets the state-observed keys.
	pub fn state<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.state = keys.into_iter().map(Into::into).collect();
		self
	}

	/// Query-observed keys.
	pub fn query_keys(&self) -> &[String] {
		&self.query
	}

	/// Fragment-observed keys.
	pub fn fragment_keys(&self) -> &[String] {
		&self.fragment
	}

	/// State-observed keys.
	pub fn state_keys(&self) -> &[String] {
		&self.state
	}

	/// All observed keys: query ++ fragment ++ state, order preserved,
	/// duplicates allowed.
	pub fn all(&self) -> Vec<String> {
		self.query
			.iter()
			.chain(&self.fragment)
			.chain(&self.state)
			.cloned()
			.collect()
	}
}

/// Snapshot of a route's observed view state, partitioned back into the
/// three observation buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteState {
	/// Values destined for the query string.
	pub query: DataMap,
	/// Values destined for the hash fragment.
	pub fragment: DataMap,
	/// Values destined for the opaque history payload.
	pub state: DataMap,
}

/// A single entry in the route table.
///
/// Couples a compiled pattern to a handler and an observation spec, and
/// exclusively owns the live view between `init` and `destroy`.
pub struct Route {
	pattern: RoutePattern,
	name: Option<String>,
	handler: RouteHandler,
	observe: ObserveSpec,
	all_observed: Vec<String>,
	view: Option<Box<dyn View>>,
}

impl std::fmt::Debug for Route {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Route")
			.field("pattern", &self.pattern)
			.field("name", &self.name)
			.field("handler", &self.handler)
			.field("observe", &self.observe)
			.field("has_view", &self.view.is_some())
			.finish()
	}
}

impl Route {
	/// Compiles a new route.
	///
	/// # Errors
	///
	/// Fails when the pattern does not compile.
	pub fn new(
		pattern: &str,
		handler: RouteHandler,
		observe: ObserveSpec,
	) -> Result<Self, PatternError> {
		let all_observed = observe.all();

		Ok(Self {
			pattern: RoutePattern::compile(pattern)?,
			name: None,
			handler,
			observe,
			all_observed,
			view: None,
		})
	}

	pub(crate) fn with_name(mut self, name: &str) -> Self {
		self.name = Some(name.to_string());
		self
	}

	/// Returns the compiled pattern.
	pub fn pattern(&self) -> &RoutePattern {
		&self.pattern
	}

	/// Returns the route name, if any.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Returns the observation spec.
	pub fn observe_spec(&self) -> &ObserveSpec {
		&self.observe
	}

	/// Whether a live view is currently owned.
	pub fn has_view(&self) -> bool {
		self.view.is_some()
	}

	/// Matches a request against this route's pattern.
	pub fn matches(&self, request: &str, strict: bool) -> bool {
		if strict {
			self.pattern.is_strict_match(request)
		} else {
			self.pattern.is_match(request)
		}
	}

	/// Extracts named path parameters from a path.
	///
	/// Captured text is lenient-JSON-coerced (`"1"` becomes a number);
	/// absent optional captures are omitted entirely, never stored as
	/// null.
	pub fn parse_path(&self, path: &str) -> DataMap {
		let mut data = DataMap::new();

		for (name, capture) in self.pattern.param_names().iter().zip(self.pattern.captures(path)) {
			if let Some(text) = capture {
				data.insert(name.clone(), codec::parse_json_lenient(&text));
			}
		}

		data
	}

	/// Activates this route for `uri`.
	///
	/// Merges, in increasing precedence: `seed`, path parameters, observed
	/// query values, observed fragment values. A callback route fires its
	/// handler once; a view route constructs the view, registers the
	/// single change observer over all observed keys (`init: false`) and
	/// flags the view ready.
	pub(crate) fn init(
		&mut self,
		uri: &Uri,
		mut data: DataMap,
		mount_point: Option<&str>,
		resync: ViewObserver,
	) {
		codec::merge(&mut data, self.parse_path(&uri.path));
		codec::merge(&mut data, codec::parse_query(&uri.query, Some(&self.observe.query)));
		codec::merge(
			&mut data,
			codec::parse_fragment(&uri.fragment, Some(&self.observe.fragment)),
		);

		match &self.handler {
			RouteHandler::Callback(callback) => {
				trace!(pattern = %self.pattern, "invoking callback route");
				callback(CallbackContext {
					mount_point: mount_point.map(str::to_string),
					data,
					uri: uri.clone(),
				});
			}
			RouteHandler::View(factory) => {
				trace!(pattern = %self.pattern, "constructing view");
				let mut view = factory.create(ViewContext {
					mount_point: mount_point.map(str::to_string),
					data,
				});

				if !self.all_observed.is_empty() {
					view.observe(
						&self.all_observed.join(" "),
						resync,
						ObserveOptions { init: false },
					);
				}

				view.set(READY_KEY, Value::Bool(true));
				self.view = Some(view);
			}
		}
	}

	/// Tears down the owned view, if any. Idempotent.
	pub(crate) fn destroy(&mut self) {
		if let Some(mut view) = self.view.take() {
			trace!(pattern = %self.pattern, "tearing down view");
			view.teardown();
		}
	}

	/// Reads the current value of a single view key.
	///
	/// [`Value::Null`] when there is no live view or the key is unset.
	pub(crate) fn view_get(&self, key: &str) -> Value {
		self.view.as_ref().map(|v| v.get(key)).unwrap_or(Value::Null)
	}

	/// Snapshots the current values of every observed key and partitions
	/// them back into the three observation buckets.
	///
	/// A route without a live view yields empty buckets.
	pub fn state(&self) -> RouteState {
		let mut values = DataMap::new();

		if let Some(view) = &self.view {
			for key in &self.all_observed {
				let value = view.get(key);
				if !value.is_null() {
					values.insert(key.clone(), value);
				}
			}
		}

		RouteState {
			query: codec::pick(&values, &self.observe.query),
			fragment: codec::pick(&values, &self.observe.fragment),
			state: codec::pick(&values, &self.observe.state),
		}
	}
}

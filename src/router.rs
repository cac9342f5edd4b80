//! The router: route table, dispatch decision logic, canonical-URI
//! rebuild, history write policy, and link/popstate interception.
//!
//! A navigation request enters through [`Router::dispatch`]: the request
//! is decomposed, the first matching route found (first-match-wins in
//! registration order), and the dispatch decision made: tear down the old
//! view and activate the new route, or merely resync history. Either way
//! the canonical URI is rebuilt from the live route state and written to
//! the history backend.
//!
//! The router is a shared handle; observer callbacks and environment
//! listeners hold weak handles back into it, so a dropped router
//! deactivates them instead of leaking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::codec::{self, DataMap};
use crate::env::{Environment, HistoryBackend, LinkListener, MemoryEnvironment, MemoryHistory, StateListener};
use crate::error::RouterError;
use crate::route::{ObserveSpec, Route};
use crate::uri::{Uri, join_paths};
use crate::view::{RouteHandler, ViewObserver};

/// Provider of default seed data for every transition.
pub type DefaultsProvider = Arc<dyn Fn() -> DataMap + Send + Sync>;

/// Options for a single dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
	/// Force a view transition even when the dispatch decision would be a
	/// no-op.
	pub reload: bool,
	/// History write policy: `Some(true)` replaces the current entry
	/// instead of pushing a new one; unset means push.
	pub no_history: Option<bool>,
	/// Seed data for the opaque state bucket (lowest precedence after
	/// defaults).
	pub state: Option<DataMap>,
	/// Seed data overriding `state`.
	pub fragment: Option<DataMap>,
	/// Seed data overriding both `state` and `fragment`.
	pub query: Option<DataMap>,
}

/// Which hrefs the link watcher hands to the router.
#[derive(Debug, Clone)]
pub enum LinkFilter {
	/// Same-origin absolute links (`//host/...`, `http(s)://host/...`) and
	/// any relative href.
	SameOrigin,
	/// Hrefs matching a custom pattern.
	Pattern(Regex),
}

impl LinkFilter {
	fn allows(&self, href: &str, hostname: &str) -> bool {
		match self {
			Self::Pattern(pattern) => pattern.is_match(href),
			Self::SameOrigin => {
				if let Some(rest) = href
					.strip_prefix("https://")
					.or_else(|| href.strip_prefix("http://"))
					.or_else(|| href.strip_prefix("//"))
				{
					rest.starts_with(hostname)
				} else {
					// relative: no scheme separator at all
					!href.contains(':')
				}
			}
		}
	}
}

/// Builder for [`Router`].
pub struct RouterBuilder {
	base_path: String,
	mount_point: Option<String>,
	globals: Vec<String>,
	defaults: Option<DefaultsProvider>,
	strict_mode: bool,
	history: Option<Arc<dyn HistoryBackend>>,
	environment: Option<Arc<dyn Environment>>,
}

impl RouterBuilder {
	fn new() -> Self {
		Self {
			base_path: String::new(),
			mount_point: None,
			globals: Vec::new(),
			defaults: None,
			strict_mode: false,
			history: None,
			environment: None,
		}
	}

	/// Path prefix stripped from the browser URI and prepended to every
	/// canonical URI.
	pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
		self.base_path = base_path.into();
		self
	}

	/// Mount point handed to view factories and callbacks.
	pub fn mount_point(mut self, mount_point: impl Into<String>) -> Self {
		self.mount_point = Some(mount_point.into());
		self
	}

	/// Keys snapshot from the outgoing view and carried into the next
	/// transition's state seed.
	pub fn globals<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.globals = keys.into_iter().map(Into::into).collect();
		self
	}

	/// Default seed data provider, called once per transition.
	pub fn defaults<F>(mut self, defaults: F) -> Self
	where
		F: Fn() -> DataMap + Send + Sync + 'static,
	{
		self.defaults = Some(Arc::new(defaults));
		self
	}

	/// Match the route table with the strict (exact-boundary) matchers.
	pub fn strict_mode(mut self, strict_mode: bool) -> Self {
		self.strict_mode = strict_mode;
		self
	}

	/// History backend to write push/replace entries to.
	pub fn history(mut self, history: Arc<dyn HistoryBackend>) -> Self {
		self.history = Some(history);
		self
	}

	/// Environment to read the live location from.
	pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
		self.environment = Some(environment);
		self
	}

	/// Builds the router. Missing backends default to in-memory ones.
	pub fn build(self) -> Router {
		Router {
			core: Arc::new(Mutex::new(RouterCore {
				routes: Vec::new(),
				named: HashMap::new(),
				base_path: self.base_path,
				mount_point: self.mount_point,
				globals: self.globals,
				defaults: self.defaults,
				strict_mode: self.strict_mode,
				history: self
					.history
					.unwrap_or_else(|| Arc::new(MemoryHistory::new())),
				environment: self
					.environment
					.unwrap_or_else(|| Arc::new(MemoryEnvironment::new())),
				current: None,
				uri: None,
			})),
			updating: Arc::new(AtomicBool::new(false)),
		}
	}
}

/// The client-side router.
///
/// Cheap to clone; all clones share the same route table and navigation
/// state.
#[derive(Clone)]
pub struct Router {
	core: Arc<Mutex<RouterCore>>,
	/// Set while the router itself is writing state; observer hooks check
	/// it before requesting a resync, which both implements the
	/// re-entrancy guard and keeps hooks from re-locking `core` mid-write.
	updating: Arc<AtomicBool>,
}

/// Weak handle held by observer hooks and environment listeners.
struct WeakRouter {
	core: Weak<Mutex<RouterCore>>,
	updating: Arc<AtomicBool>,
}

impl WeakRouter {
	fn upgrade(&self) -> Option<Router> {
		self.core.upgrade().map(|core| Router {
			core,
			updating: Arc::clone(&self.updating),
		})
	}
}

impl std::fmt::Debug for Router {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let core = self.lock_core();
		f.debug_struct("Router")
			.field("routes_count", &core.routes.len())
			.field("base_path", &core.base_path)
			.field("strict_mode", &core.strict_mode)
			.field("current_uri", &core.uri)
			.finish()
	}
}

impl Router {
	/// Starts building a router.
	pub fn builder() -> RouterBuilder {
		RouterBuilder::new()
	}

	fn lock_core(&self) -> MutexGuard<'_, RouterCore> {
		self.core.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn downgrade(&self) -> WeakRouter {
		WeakRouter {
			core: Arc::downgrade(&self.core),
			updating: Arc::clone(&self.updating),
		}
	}

	/// The observer handed to every view: request a router-level resync
	/// unless the router is itself writing state.
	fn resync_observer(&self) -> ViewObserver {
		let weak = self.downgrade();
		Arc::new(move || {
			if weak.updating.load(Ordering::SeqCst) {
				return;
			}
			if let Some(router) = weak.upgrade() {
				router.update();
			}
		})
	}

	/// Registers a route. First registered, first matched.
	///
	/// # Errors
	///
	/// Fails when the pattern does not compile; a broken route table
	/// cannot safely serve any request, so this is surfaced immediately.
	pub fn add_route(
		&self,
		pattern: &str,
		handler: RouteHandler,
		observe: ObserveSpec,
	) -> Result<(), RouterError> {
		let route = Route::new(pattern, handler, observe).map_err(|source| {
			RouterError::InvalidPattern {
				pattern: pattern.to_string(),
				source,
			}
		})?;
		self.lock_core().routes.push(route);
		Ok(())
	}

	/// Registers a named route, enabling [`Router::reverse`].
	pub fn add_named_route(
		&self,
		name: &str,
		pattern: &str,
		handler: RouteHandler,
		observe: ObserveSpec,
	) -> Result<(), RouterError> {
		let route = Route::new(pattern, handler, observe)
			.map_err(|source| RouterError::InvalidPattern {
				pattern: pattern.to_string(),
				source,
			})?
			.with_name(name);

		let mut core = self.lock_core();
		let index = core.routes.len();
		core.routes.push(route);
		core.named.insert(name.to_string(), index);
		Ok(())
	}

	/// Number of registered routes.
	pub fn route_count(&self) -> usize {
		self.lock_core().routes.len()
	}

	/// Whether a named route exists.
	pub fn has_route(&self, name: &str) -> bool {
		self.lock_core().named.contains_key(name)
	}

	/// The router's current (canonical) URI, if a dispatch has happened.
	pub fn current_uri(&self) -> Option<Uri> {
		self.lock_core().uri.clone()
	}

	/// Pattern of the first route matching `request`, honoring strict
	/// mode.
	pub fn matched_pattern(&self, request: &str) -> Option<String> {
		let core = self.lock_core();
		core.match_index(request)
			.map(|i| core.routes[i].pattern().as_str().to_string())
	}

	/// The environment's current URI relative to the base path:
	/// `path-after-basePath + query + fragment`.
	pub fn browser_uri(&self) -> String {
		self.lock_core().browser_uri()
	}

	/// Dispatches a navigation request.
	pub fn dispatch(&self, request: &str, options: DispatchOptions) {
		let resync = self.resync_observer();
		let mut core = self.lock_core();
		let was_updating = self.updating.swap(true, Ordering::SeqCst);
		core.dispatch(request, options, resync);
		self.updating.store(was_updating, Ordering::SeqCst);
	}

	/// Re-synchronizes the canonical URI and history from the live view
	/// state, without any view work. This is what observed-state changes
	/// trigger.
	pub fn update(&self) {
		let mut core = self.lock_core();
		let was_updating = self.updating.swap(true, Ordering::SeqCst);
		core.update(false, None, None);
		self.updating.store(was_updating, Ordering::SeqCst);
	}

	/// Dispatches the environment's current URI. Used for first load and
	/// popstate replay; defaults to replacing the current history entry
	/// rather than pushing.
	pub fn init(&self, mut options: DispatchOptions) {
		if options.no_history.is_none() {
			options.no_history = Some(true);
		}
		let request = self.browser_uri();
		self.dispatch(&request, options);
	}

	/// Generates a URL for a named route.
	///
	/// # Errors
	///
	/// [`RouterError::UnknownRouteName`] when no route carries `name`;
	/// [`RouterError::MissingParameter`] when a required parameter is
	/// absent.
	pub fn reverse(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RouterError> {
		let core = self.lock_core();
		let index = core
			.named
			.get(name)
			.copied()
			.ok_or_else(|| RouterError::UnknownRouteName(name.to_string()))?;

		let params: HashMap<String, String> = params
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();

		core.routes[index].pattern().reverse(&params)
	}

	/// Starts intercepting link clicks with the default same-origin
	/// filter.
	pub fn watch_links(&self) {
		self.watch_links_with(LinkFilter::SameOrigin);
	}

	/// Starts intercepting link clicks, replacing any previous listener.
	///
	/// Clicks whose href passes the filter, and that did not opt out, are
	/// dispatched and reported as consumed.
	pub fn watch_links_with(&self, filter: LinkFilter) {
		let weak = self.downgrade();
		let environment = self.lock_core().environment.clone();
		let hostname = environment.hostname();

		let listener: LinkListener = Arc::new(move |event| {
			if event.opted_out {
				return false;
			}
			let Some(href) = event.href.as_deref() else {
				return false;
			};
			if !filter.allows(href, &hostname) {
				return false;
			}
			let Some(router) = weak.upgrade() else {
				return false;
			};

			router.dispatch(href, DispatchOptions::default());
			true
		});

		environment.unwatch_links();
		environment.watch_links(listener);
	}

	/// Stops intercepting link clicks.
	pub fn unwatch_links(&self) {
		self.lock_core().environment.unwatch_links();
	}

	/// Starts replaying popstate events, replacing any previous listener.
	///
	/// A popped entry's preserved state payload is folded back into the
	/// dispatch as the state seed.
	pub fn watch_state(&self) {
		let weak = self.downgrade();
		let environment = self.lock_core().environment.clone();

		let listener: StateListener = Arc::new(move |state| {
			let Some(state) = state else {
				return;
			};
			if state.is_null() {
				return;
			}
			let Some(router) = weak.upgrade() else {
				return;
			};

			let mut options = DispatchOptions::default();
			if let Value::Object(map) = state {
				options.state = Some(map.clone());
			}
			router.init(options);
		});

		environment.unwatch_state();
		environment.watch_state(listener);
	}

	/// Stops replaying popstate events.
	pub fn unwatch_state(&self) {
		self.lock_core().environment.unwatch_state();
	}
}

struct RouterCore {
	routes: Vec<Route>,
	named: HashMap<String, usize>,
	base_path: String,
	mount_point: Option<String>,
	globals: Vec<String>,
	defaults: Option<DefaultsProvider>,
	strict_mode: bool,
	history: Arc<dyn HistoryBackend>,
	environment: Arc<dyn Environment>,
	/// Index of the current route; the route table owns the routes, this
	/// is a non-owning reference into it.
	current: Option<usize>,
	/// The canonical URI as of the last dispatch/update.
	uri: Option<Uri>,
}

impl RouterCore {
	fn browser_uri(&self) -> String {
		let pathname = self.environment.pathname();
		let path = pathname.get(self.base_path.len()..).unwrap_or("");
		format!(
			"{}{}{}",
			path,
			self.environment.search(),
			self.environment.hash()
		)
	}

	fn match_index(&self, path: &str) -> Option<usize> {
		let strict = self.strict_mode;
		self.routes.iter().position(|route| route.matches(path, strict))
	}

	fn redirect(&self, request: &str) {
		let target = join_paths(&[&self.base_path, request]);
		debug!(request, target = %target, "no route matched, redirecting");
		self.environment.navigate(&target);
	}

	fn dispatch(&mut self, request: &str, mut options: DispatchOptions, resync: ViewObserver) {
		let uri = Uri::parse(request);

		let Some(index) = self.match_index(&uri.path) else {
			self.redirect(request);
			return;
		};

		let old_uri = self.uri.clone();
		let path_changed = match &old_uri {
			None => true,
			Some(old) => old.path.is_empty() || old.path != uri.path,
		};

		if options.reload || should_dispatch(old_uri.as_ref(), &uri, &self.routes[index]) {
			// carry globally-preserved keys over from the outgoing view
			if let Some(current) = self.current {
				if self.routes[current].has_view() && !self.globals.is_empty() {
					let state = options.state.get_or_insert_with(DataMap::new);
					for key in &self.globals {
						if !state.contains_key(key) {
							let value = self.routes[current].view_get(key);
							if !value.is_null() {
								state.insert(key.clone(), value);
							}
						}
					}
				}
			}

			let mut data = self.defaults.as_ref().map(|f| f()).unwrap_or_default();
			if let Some(state) = options.state.take() {
				codec::merge(&mut data, state);
			}
			if let Some(fragment) = options.fragment.take() {
				codec::merge(&mut data, fragment);
			}
			if let Some(query) = options.query.take() {
				codec::merge(&mut data, query);
			}

			// destroy before init: at most one live view at a time
			if let Some(current) = self.current {
				self.routes[current].destroy();
			}

			self.uri = Some(uri.clone());
			let mount_point = self.mount_point.clone();
			self.routes[index].init(&uri, data, mount_point.as_deref(), resync);
			self.current = Some(index);

			debug!(
				path = %uri.path,
				pattern = self.routes[index].pattern().as_str(),
				"route activated"
			);
		} else {
			debug!(path = %uri.path, "no-op transition, resyncing history only");
		}

		// scrolls to the top when the fragment names no element
		let anchor = uri.fragment.get(1..).unwrap_or("");
		self.environment.scroll_to(anchor);

		self.update(path_changed, Some(!options.no_history.unwrap_or(false)), Some(&uri));
	}

	/// Rebuilds the canonical URI from the live route state and applies
	/// the history write policy: `Some(true)` always pushes, `Some(false)`
	/// always replaces, `None` pushes only when the canonical URI differs
	/// from the live browser URI.
	fn update(&mut self, path_changed: bool, write_history: Option<bool>, uri: Option<&Uri>) {
		let Some(current) = self.current else {
			return;
		};

		let fallback = Uri::default();
		let uri = uri.unwrap_or(&fallback);

		let current_path = self.uri.as_ref().map(|u| u.path.clone()).unwrap_or_default();
		let path = join_paths(&[&self.base_path, &current_path]);
		let route_state = self.routes[current].state();

		// canonical query: request query, plus the live browser query when
		// the path did not change, with the route's observed state winning
		let mut merged = codec::parse_query(&uri.query, None);
		if !path_changed {
			codec::merge(&mut merged, codec::parse_query(&self.environment.search(), None));
		}
		codec::merge(&mut merged, route_state.query);
		let query = codec::serialize_query(&merged);

		let fragment = build_fragment(&route_state.fragment, &uri.fragment);

		let new_uri = format!("{path}{query}{fragment}");
		let browser_uri = format!(
			"{}{}{}",
			self.environment.pathname(),
			self.environment.search(),
			self.environment.hash()
		);
		let state = Value::Object(route_state.state);

		if let Some(canonical) = self.uri.as_mut() {
			canonical.query = query;
			canonical.fragment = fragment;
		}

		match write_history {
			Some(true) => {
				trace!(uri = %new_uri, "pushing history entry");
				self.history.push_state(&state, None, &new_uri);
			}
			Some(false) => {
				trace!(uri = %new_uri, "replacing history entry");
				self.history.replace_state(&state, None, &new_uri);
			}
			None if new_uri != browser_uri => {
				trace!(uri = %new_uri, "canonical uri changed, pushing history entry");
				self.history.push_state(&state, None, &new_uri);
			}
			None => {}
		}
	}
}

/// Whether a navigation request warrants a view transition, as opposed to
/// a history-only resync.
///
/// True when the path differs, the query differs, or the decoded fragment
/// differs *and* the matched route observes at least one fragment key. A
/// route with no observed fragment keys never re-triggers solely because
/// the fragment changed, which lets free-form anchors coexist with
/// state-carrying fragments.
fn should_dispatch(old: Option<&Uri>, new: &Uri, route: &Route) -> bool {
	let Some(old) = old else {
		return true;
	};

	old.path != new.path
		|| old.query != new.query
		|| (codec::percent_decode(&old.fragment) != codec::percent_decode(&new.fragment)
			&& !route.observe_spec().fragment_keys().is_empty())
}

/// Canonical fragment: regenerated from the route's observed fragment
/// state when that is non-empty; otherwise the incoming raw fragment is
/// passed through unchanged, preserving arbitrary non-router anchors.
fn build_fragment(observed: &DataMap, incoming: &str) -> String {
	if !observed.is_empty() || incoming.is_empty() {
		codec::serialize_fragment(observed)
	} else {
		incoming.to_string()
	}
}

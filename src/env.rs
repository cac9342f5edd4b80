//! Environment and history capability seams.
//!
//! The router never touches a real `window`/`location`/`document`; it
//! talks to an injected [`Environment`] (current location, hard
//! navigation, scrolling, link/popstate listeners) and an injected
//! [`HistoryBackend`] (push/replace). [`MemoryEnvironment`] and
//! [`MemoryHistory`] implement both in memory, which is what makes the
//! whole dispatch state machine drivable headlessly.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::uri::Uri;

/// A click on an anchor element, as delivered by the environment.
#[derive(Debug, Clone, Default)]
pub struct LinkEvent {
	/// The anchor's `href` (or `data-href`) attribute, if any.
	pub href: Option<String>,
	/// Whether the anchor opted out of router handling.
	pub opted_out: bool,
}

/// Listener for link clicks. Returns `true` when the event was consumed
/// (the environment should prevent the default navigation).
pub type LinkListener = Arc<dyn Fn(&LinkEvent) -> bool + Send + Sync>;

/// Listener for history pops (back/forward). Receives the entry's
/// preserved state payload, if any.
pub type StateListener = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// The browser-navigation surface the router depends on.
pub trait Environment: Send + Sync {
	/// Current location path (including any base path prefix).
	fn pathname(&self) -> String;

	/// Current location query string, with its leading `?` (or empty).
	fn search(&self) -> String;

	/// Current location hash fragment, with its leading `#` (or empty).
	fn hash(&self) -> String;

	/// Current hostname, for same-origin link filtering.
	fn hostname(&self) -> String;

	/// Performs a hard navigation (full page load) to `url`.
	fn navigate(&self, url: &str);

	/// Scrolls the element named by `anchor` into view, or to the top when
	/// the anchor is empty or names nothing.
	fn scroll_to(&self, anchor: &str);

	/// Installs the single link-click listener, replacing any previous one.
	fn watch_links(&self, listener: LinkListener);

	/// Removes the link-click listener.
	fn unwatch_links(&self);

	/// Installs the single popstate listener, replacing any previous one.
	fn watch_state(&self, listener: StateListener);

	/// Removes the popstate listener.
	fn unwatch_state(&self);
}

/// The history stack the router writes to.
pub trait HistoryBackend: Send + Sync {
	/// Pushes a new history entry.
	fn push_state(&self, state: &Value, title: Option<&str>, url: &str);

	/// Replaces the current history entry.
	fn replace_state(&self, state: &Value, title: Option<&str>, url: &str);
}

#[derive(Default)]
struct MemoryLocation {
	pathname: String,
	search: String,
	hash: String,
	hostname: String,
	navigations: Vec<String>,
	scrolls: Vec<String>,
	link_listener: Option<LinkListener>,
	state_listener: Option<StateListener>,
}

/// In-memory [`Environment`]: a simulated location plus synthetic event
/// delivery, recording navigations and scrolls for inspection.
pub struct MemoryEnvironment {
	inner: Mutex<MemoryLocation>,
}

impl Default for MemoryEnvironment {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryEnvironment {
	/// Creates an environment located at `/` on host `localhost`.
	pub fn new() -> Self {
		Self::at("/", "", "")
	}

	/// Creates an environment at the given location.
	pub fn at(pathname: &str, search: &str, hash: &str) -> Self {
		Self {
			inner: Mutex::new(MemoryLocation {
				pathname: pathname.to_string(),
				search: search.to_string(),
				hash: hash.to_string(),
				hostname: "localhost".to_string(),
				..MemoryLocation::default()
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, MemoryLocation> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Moves the simulated location.
	pub fn set_location(&self, pathname: &str, search: &str, hash: &str) {
		let mut inner = self.lock();
		inner.pathname = pathname.to_string();
		inner.search = search.to_string();
		inner.hash = hash.to_string();
	}

	/// Sets the simulated hostname.
	pub fn set_hostname(&self, hostname: &str) {
		self.lock().hostname = hostname.to_string();
	}

	/// Delivers a synthetic link click. Returns whether a listener
	/// consumed it.
	pub fn emit_link(&self, event: &LinkEvent) -> bool {
		let listener = self.lock().link_listener.clone();
		listener.map(|l| l(event)).unwrap_or(false)
	}

	/// Delivers a synthetic popstate event.
	pub fn emit_pop_state(&self, state: Option<&Value>) {
		let listener = self.lock().state_listener.clone();
		if let Some(listener) = listener {
			listener(state);
		}
	}

	/// Hard navigations performed so far.
	pub fn navigations(&self) -> Vec<String> {
		self.lock().navigations.clone()
	}

	/// Scroll anchors requested so far (empty string means top).
	pub fn scrolls(&self) -> Vec<String> {
		self.lock().scrolls.clone()
	}

	/// Whether a link listener is installed.
	pub fn watching_links(&self) -> bool {
		self.lock().link_listener.is_some()
	}

	/// Whether a popstate listener is installed.
	pub fn watching_state(&self) -> bool {
		self.lock().state_listener.is_some()
	}
}

impl Environment for MemoryEnvironment {
	fn pathname(&self) -> String {
		self.lock().pathname.clone()
	}

	fn search(&self) -> String {
		self.lock().search.clone()
	}

	fn hash(&self) -> String {
		self.lock().hash.clone()
	}

	fn hostname(&self) -> String {
		self.lock().hostname.clone()
	}

	fn navigate(&self, url: &str) {
		let mut inner = self.lock();
		inner.navigations.push(url.to_string());
		inner.pathname = url.to_string();
	}

	fn scroll_to(&self, anchor: &str) {
		self.lock().scrolls.push(anchor.to_string());
	}

	fn watch_links(&self, listener: LinkListener) {
		self.lock().link_listener = Some(listener);
	}

	fn unwatch_links(&self) {
		self.lock().link_listener = None;
	}

	fn watch_state(&self, listener: StateListener) {
		self.lock().state_listener = Some(listener);
	}

	fn unwatch_state(&self) {
		self.lock().state_listener = None;
	}
}

/// How a [`HistoryEntry`] was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOp {
	/// `push_state`
	Push,
	/// `replace_state`
	Replace,
}

/// One recorded history write.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
	/// The opaque state payload.
	pub state: Value,
	/// The canonical URL written.
	pub url: String,
	/// Push or replace.
	pub op: HistoryOp,
}

/// In-memory [`HistoryBackend`] recording every write.
///
/// When linked to a [`MemoryEnvironment`], each write also moves the
/// simulated location, mirroring how `pushState`/`replaceState` update
/// `location` in a real browser.
#[derive(Default)]
pub struct MemoryHistory {
	entries: Mutex<Vec<HistoryEntry>>,
	location: Option<Arc<MemoryEnvironment>>,
}

impl MemoryHistory {
	/// Creates an unlinked history.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a history that mirrors writes into `environment`.
	pub fn linked(environment: Arc<MemoryEnvironment>) -> Self {
		Self {
			entries: Mutex::new(Vec::new()),
			location: Some(environment),
		}
	}

	/// All writes so far, oldest first.
	pub fn entries(&self) -> Vec<HistoryEntry> {
		self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// The most recent write, if any.
	pub fn last(&self) -> Option<HistoryEntry> {
		self.entries().last().cloned()
	}

	fn record(&self, op: HistoryOp, state: &Value, url: &str) {
		self.entries
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(HistoryEntry {
				state: state.clone(),
				url: url.to_string(),
				op,
			});

		if let Some(environment) = &self.location {
			let uri = Uri::parse(url);
			environment.set_location(&uri.path, &uri.query, &uri.fragment);
		}
	}
}

impl HistoryBackend for MemoryHistory {
	fn push_state(&self, state: &Value, _title: Option<&str>, url: &str) {
		self.record(HistoryOp::Push, state, url);
	}

	fn replace_state(&self, state: &Value, _title: Option<&str>, url: &str) {
		self.record(HistoryOp::Replace, state, url);
	}
}

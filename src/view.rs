//! The seam to the external UI-component framework.
//!
//! The router never renders anything itself. Routes flagged as view routes
//! ask a [`ViewFactory`] to construct a live view and then talk to it
//! through the [`View`] trait: read observed values back with `get`, write
//! flags with `set`, register one change observer over all observed keys,
//! and tear the view down when the route is replaced. Routes that are not
//! view routes invoke a plain callback once and retain nothing.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::DataMap;
use crate::uri::Uri;

/// Key set on every freshly constructed view once the router is done
/// initializing it, so templates can distinguish the initial render from
/// post-init reactivity.
pub const READY_KEY: &str = "__ready";

/// Change observer registered on a view.
pub type ViewObserver = Arc<dyn Fn() + Send + Sync>;

/// Options for [`View::observe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOptions {
	/// Whether the observer fires once immediately on registration.
	/// The router always subscribes with `init: false`.
	pub init: bool,
}

/// A live view instance owned by a route.
///
/// Implementations are expected to be handles into the owning UI
/// framework's component; the router only requires this surface.
pub trait View: Send {
	/// Reads the current value of a key. Missing keys read as
	/// [`Value::Null`].
	fn get(&self, key: &str) -> Value;

	/// Writes a value.
	fn set(&mut self, key: &str, value: Value);

	/// Registers a single observer over a space-joined key list.
	fn observe(&mut self, keys: &str, observer: ViewObserver, options: ObserveOptions);

	/// Tears the view down. Called exactly once, from the owning route's
	/// destroy.
	fn teardown(&mut self);
}

/// Construction context handed to a [`ViewFactory`].
#[derive(Debug, Clone)]
pub struct ViewContext {
	/// Where the view should mount, when the router was configured with a
	/// mount point.
	pub mount_point: Option<String>,
	/// Merged seed + path + observed query/fragment data.
	pub data: DataMap,
}

/// Constructs view instances for a view route.
pub trait ViewFactory: Send + Sync {
	/// Builds a live view. The framework may finish sub-resource loading
	/// asynchronously; the router treats activation as fire and forget.
	fn create(&self, ctx: ViewContext) -> Box<dyn View>;
}

impl<F> ViewFactory for F
where
	F: Fn(ViewContext) -> Box<dyn View> + Send + Sync,
{
	fn create(&self, ctx: ViewContext) -> Box<dyn View> {
		self(ctx)
	}
}

/// Invocation context handed to a plain-callback route.
#[derive(Debug, Clone)]
pub struct CallbackContext {
	/// The router's configured mount point.
	pub mount_point: Option<String>,
	/// Merged seed + path + observed query/fragment data.
	pub data: DataMap,
	/// The URI being dispatched.
	pub uri: Uri,
}

/// What a route does when activated: construct a view, or fire a callback.
///
/// The view variant is the explicit-composition form of handler
/// decoration: the router drives the fixed lifecycle (merge data,
/// construct, observe, flag ready) around the factory instead of extending
/// the user's component type.
#[derive(Clone)]
pub enum RouteHandler {
	/// Instantiate a view and keep it alive until the next transition.
	View(Arc<dyn ViewFactory>),
	/// Invoke a callback once; nothing is retained.
	Callback(Arc<dyn Fn(CallbackContext) + Send + Sync>),
}

impl RouteHandler {
	/// Wraps a view factory.
	pub fn view<F>(factory: F) -> Self
	where
		F: ViewFactory + 'static,
	{
		Self::View(Arc::new(factory))
	}

	/// Wraps a plain callback.
	pub fn callback<F>(callback: F) -> Self
	where
		F: Fn(CallbackContext) + Send + Sync + 'static,
	{
		Self::Callback(Arc::new(callback))
	}

	/// Whether this handler owns a view lifecycle.
	pub fn is_view(&self) -> bool {
		matches!(self, Self::View(_))
	}
}

impl fmt::Debug for RouteHandler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::View(_) => f.write_str("RouteHandler::View"),
			Self::Callback(_) => f.write_str("RouteHandler::Callback"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_handler_kind() {
		struct NullView;

		impl View for NullView {
			fn get(&self, _key: &str) -> Value {
				Value::Null
			}
			fn set(&mut self, _key: &str, _value: Value) {}
			fn observe(&mut self, _keys: &str, _observer: ViewObserver, _options: ObserveOptions) {}
			fn teardown(&mut self) {}
		}

		let view = RouteHandler::view(|_ctx: ViewContext| Box::new(NullView) as Box<dyn View>);
		let callback = RouteHandler::callback(|_ctx| {});

		assert!(view.is_view());
		assert!(!callback.is_view());
		assert_eq!(format!("{view:?}"), "RouteHandler::View");
	}
}

//! Client-side URL router with bidirectional URI and view-state
//! synchronization.
//!
//! `routesync` maps browser-visible URIs (path, query string, hash
//! fragment) to application views and keeps the URI, the history stack and
//! a live view's observable state synchronized in both directions:
//!
//! - **Pattern matching**: route patterns mix literal segments with named
//!   parameters (`/items/:id/:filter?/:n(\d+)`), compiled once into a
//!   lenient and a strict matcher ([`pattern::RoutePattern`]).
//! - **Dispatch**: first-match-wins over the registration-ordered route
//!   table, with decision logic that distinguishes a real view transition
//!   from a history-only resync ([`router::Router`]).
//! - **State feedback**: a route declares which view keys it observes
//!   ([`route::ObserveSpec`]); query-observed keys serialize back into the
//!   URL query string, fragment-observed keys into a `#!<json>` hash, and
//!   state-observed keys into the opaque history-entry payload.
//!
//! The view-component lifecycle stays with the embedding UI framework
//! behind the [`view::View`]/[`view::ViewFactory`] traits, and all browser
//! access goes through the [`env::Environment`] and [`env::HistoryBackend`]
//! capability traits, so the whole state machine runs headlessly:
//!
//! ```
//! use routesync::{ObserveSpec, RouteHandler, Router};
//!
//! let router = Router::builder().build();
//! router
//! 	.add_route(
//! 		"/items/:id",
//! 		RouteHandler::callback(|ctx| {
//! 			println!("item {:?}", ctx.data.get("id"));
//! 		}),
//! 		ObserveSpec::new(),
//! 	)
//! 	.unwrap();
//!
//! router.dispatch("/items/42", Default::default());
//! ```

pub mod codec;
pub mod env;
pub mod error;
pub mod pattern;
pub mod route;
pub mod router;
pub mod uri;
pub mod view;

pub use codec::DataMap;
pub use env::{
	Environment, HistoryBackend, HistoryEntry, HistoryOp, LinkEvent, MemoryEnvironment,
	MemoryHistory,
};
pub use error::{PatternError, RouterError};
pub use pattern::RoutePattern;
pub use route::{ObserveSpec, Route, RouteState};
pub use router::{DispatchOptions, LinkFilter, Router, RouterBuilder};
pub use uri::Uri;
pub use view::{
	CallbackContext, ObserveOptions, READY_KEY, RouteHandler, View, ViewContext, ViewFactory,
	ViewObserver,
};

// Full dispatch state machine driven headlessly through MemoryEnvironment
// and MemoryHistory, with a scripted component framework standing in for
// the UI side of the seam.

mod support;

use std::sync::{Arc, Mutex};

use routesync::{
	DataMap, DispatchOptions, HistoryOp, LinkEvent, MemoryEnvironment, MemoryHistory, ObserveSpec,
	READY_KEY, RouteHandler, Router,
};
use serde_json::json;
use support::{ViewProbe, data};

struct Harness {
	router: Router,
	environment: Arc<MemoryEnvironment>,
	history: Arc<MemoryHistory>,
}

fn harness() -> Harness {
	harness_at("/", "", "")
}

fn harness_at(pathname: &str, search: &str, hash: &str) -> Harness {
	let environment = Arc::new(MemoryEnvironment::at(pathname, search, hash));
	let history = Arc::new(MemoryHistory::linked(Arc::clone(&environment)));
	let router = Router::builder()
		.environment(environment.clone())
		.history(history.clone())
		.build();

	Harness {
		router,
		environment,
		history,
	}
}

fn dispatch(router: &Router, request: &str) {
	router.dispatch(request, DispatchOptions::default());
}

// Test: an unmatched request is not an error; it redirects with the exact
// original request string, untouched
#[test]
fn test_redirect_on_unmatched_request() {
	let h = harness();

	dispatch(&h.router, "/xxx/yyy?aaa#bbb");

	assert_eq!(h.environment.navigations(), vec!["/xxx/yyy?aaa#bbb"]);
	assert!(h.history.entries().is_empty());
}

// Test: a path change triggers a view transition
#[test]
fn test_dispatch_on_path_change() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&h.router, "/xx");
	dispatch(&h.router, "/yy");

	assert_eq!(probe.created(), 2);
	assert_eq!(probe.torn_down(), 1);
}

// Test: a query change triggers a view transition
#[test]
fn test_dispatch_on_query_change() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&h.router, "/xx?x=1");
	dispatch(&h.router, "/xx?y=1");

	assert_eq!(probe.created(), 2);
}

// Test: a fragment change triggers a transition only when the route
// observes fragment keys
#[test]
fn test_dispatch_on_observed_fragment_change() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router
		.add_route("/:aa", probe.handler(), ObserveSpec::new().fragment(["x"]))
		.unwrap();

	dispatch(&h.router, "/xx#x");
	dispatch(&h.router, "/xx#y");

	assert_eq!(probe.created(), 2);
}

// Test: dispatching the same request twice must not reconstruct the view,
// but must still run the update bookkeeping step
#[test]
fn test_no_redispatch_on_identical_request() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&h.router, "/xx?x=5");
	dispatch(&h.router, "/xx?x=5");

	assert_eq!(probe.created(), 1);
	// update still ran: one history write per dispatch
	assert_eq!(h.history.entries().len(), 2);
	assert_eq!(h.history.last().unwrap().url, "/xx?x=5");
}

// Test: an identical observed fragment does not re-trigger, even when the
// incoming spelling differs only by percent-encoding
#[test]
fn test_no_redispatch_on_identical_observed_fragment() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router
		.add_route("/:aa", probe.handler(), ObserveSpec::new().fragment(["x"]))
		.unwrap();

	dispatch(&h.router, "/xx#!{\"x\":5}");
	dispatch(&h.router, "/xx#!{\"x\":5}");
	dispatch(&h.router, "/xx#!%7B%22x%22%3A5%7D");

	assert_eq!(probe.created(), 1);
}

// Test: a fragment change on a route that observes no fragment keys is a
// no-op transition; free-form anchors coexist with state-carrying
// fragments
#[test]
fn test_no_redispatch_on_unobserved_fragment_change() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&h.router, "/xx#x");
	dispatch(&h.router, "/xx#y");

	assert_eq!(probe.created(), 1);
	assert_eq!(h.history.entries().len(), 2);
}

// Test: reload forces a transition regardless of the dispatch decision
#[test]
fn test_reload_forces_transition() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&h.router, "/xx");
	h.router.dispatch(
		"/xx",
		DispatchOptions {
			reload: true,
			..DispatchOptions::default()
		},
	);

	assert_eq!(probe.created(), 2);
}

// Test: the canonical URI is rebuilt from live state and pushed, with the
// opaque state bucket as the payload
#[test]
fn test_push_state_canonicalizes_uri() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({"a": 1, "b": 2, "c": 3, "x": 4}));
	h.router
		.add_route(
			"/xx/:a/",
			probe.handler(),
			ObserveSpec::new().query(["b"]).fragment(["c"]).state(["x"]),
		)
		.unwrap();

	dispatch(&h.router, "/xx/11#!{\"c\":12}");

	let entry = h.history.last().unwrap();
	assert_eq!(entry.op, HistoryOp::Push);
	assert_eq!(entry.url, "/xx/11?b=2#!%7B%22c%22%3A12%7D");
	assert_eq!(entry.state, json!({"x": 4}));

	// path parameter reached the view, fragment state overrode the base
	assert_eq!(probe.get("a"), json!(11));
	assert_eq!(probe.get("c"), json!(12));
}

// Test: noHistory replaces the current entry instead of pushing
#[test]
fn test_no_history_replaces_entry() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({"a": 1, "b": 2, "c": 3, "x": 4}));
	h.router
		.add_route(
			"/xx/:a/",
			probe.handler(),
			ObserveSpec::new().query(["b"]).fragment(["c"]).state(["x"]),
		)
		.unwrap();

	h.router.dispatch(
		"/xx/11#!{\"c\":12}",
		DispatchOptions {
			no_history: Some(true),
			..DispatchOptions::default()
		},
	);

	let entry = h.history.last().unwrap();
	assert_eq!(entry.op, HistoryOp::Replace);
	assert_eq!(entry.url, "/xx/11?b=2#!%7B%22c%22%3A12%7D");
	assert_eq!(entry.state, json!({"x": 4}));
}

// Test: an observed-state change resyncs the canonical URI through the
// registered observer, and a bare update with nothing changed writes
// nothing
#[test]
fn test_observed_state_change_resyncs_uri() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({"b": 2}));
	h.router
		.add_route("/:a", probe.handler(), ObserveSpec::new().query(["b"]))
		.unwrap();

	dispatch(&h.router, "/xx");
	assert_eq!(h.history.last().unwrap().url, "/xx?b=2");
	assert_eq!(h.history.entries().len(), 1);

	// canonical equals the live browser URI: if-changed policy writes
	// nothing
	h.router.update();
	assert_eq!(h.history.entries().len(), 1);

	// application-side write to an observed key fires the observer, which
	// requests a router resync
	probe.set("b", json!(3));
	assert_eq!(h.history.entries().len(), 2);
	let entry = h.history.last().unwrap();
	assert_eq!(entry.op, HistoryOp::Push);
	assert_eq!(entry.url, "/xx?b=3");
}

// Test: a write to an unobserved key does not resync
#[test]
fn test_unobserved_state_change_is_ignored() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({"b": 2}));
	h.router
		.add_route("/:a", probe.handler(), ObserveSpec::new().query(["b"]))
		.unwrap();

	dispatch(&h.router, "/xx");
	probe.set("unrelated", json!(1));

	assert_eq!(h.history.entries().len(), 1);
}

// Test: init dispatches the environment's current URI and replaces rather
// than pushes
#[test]
fn test_init_uses_browser_location() {
	let h = harness_at("/aa/7", "", "");
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/aa/:n", probe.handler(), ObserveSpec::new()).unwrap();

	h.router.init(DispatchOptions::default());

	assert_eq!(probe.created(), 1);
	assert_eq!(probe.get("n"), json!(7));
	let entry = h.history.last().unwrap();
	assert_eq!(entry.op, HistoryOp::Replace);
	assert_eq!(entry.url, "/aa/7");
}

// Test: popstate replay folds the entry's preserved state payload back
// into the dispatch
#[test]
fn test_popstate_replays_preserved_state() {
	let h = harness_at("/aa/7", "", "");
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/aa/:n", probe.handler(), ObserveSpec::new()).unwrap();
	h.router.init(DispatchOptions::default());
	h.router.watch_state();

	// back button: the browser already moved the location
	h.environment.set_location("/aa/8", "", "");
	let state = json!({"s": 9});
	h.environment.emit_pop_state(Some(&state));

	assert_eq!(probe.created(), 2);
	assert_eq!(probe.get("n"), json!(8));
	assert_eq!(probe.get("s"), json!(9));
	assert_eq!(h.history.last().unwrap().op, HistoryOp::Replace);
}

// Test: popstate with no state payload is ignored
#[test]
fn test_popstate_without_state_is_ignored() {
	let h = harness_at("/aa/7", "", "");
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/aa/:n", probe.handler(), ObserveSpec::new()).unwrap();
	h.router.init(DispatchOptions::default());
	h.router.watch_state();

	h.environment.emit_pop_state(None);
	let null = serde_json::Value::Null;
	h.environment.emit_pop_state(Some(&null));

	assert_eq!(probe.created(), 1);
}

// Test: intercepted link clicks dispatch; opted-out anchors and foreign
// hrefs are left alone
#[test]
fn test_link_interception() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/aa/:n", probe.handler(), ObserveSpec::new()).unwrap();
	h.router.watch_links();

	let click = |href: &str, opted_out: bool| {
		h.environment.emit_link(&LinkEvent {
			href: Some(href.to_string()),
			opted_out,
		})
	};

	assert!(click("/aa/5", false));
	assert_eq!(probe.created(), 1);
	assert_eq!(h.router.current_uri().unwrap().path, "/aa/5");

	// same-origin absolute href is handled too
	assert!(click("https://localhost/aa/6", false));
	assert_eq!(probe.created(), 2);

	// opted out, foreign, or scheme-carrying hrefs pass through
	assert!(!click("/aa/7", true));
	assert!(!click("https://other.example/aa/7", false));
	assert!(!click("mailto:someone@example.com", false));
	assert!(!h.environment.emit_link(&LinkEvent::default()));
	assert_eq!(probe.created(), 2);

	h.router.unwatch_links();
	assert!(!click("/aa/8", false));
}

// Test: globally-preserved keys are snapshot from the outgoing view into
// the next transition's seed data
#[test]
fn test_globals_carry_across_transitions() {
	let environment = Arc::new(MemoryEnvironment::new());
	let history = Arc::new(MemoryHistory::linked(Arc::clone(&environment)));
	let router = Router::builder()
		.environment(environment)
		.history(history)
		.globals(["session"])
		.build();

	let first = ViewProbe::with_base(json!({"session": 7}));
	let second = ViewProbe::with_base(json!({}));
	router.add_route("/aa", first.handler(), ObserveSpec::new()).unwrap();
	router.add_route("/bb", second.handler(), ObserveSpec::new()).unwrap();

	dispatch(&router, "/aa");
	dispatch(&router, "/bb");

	assert_eq!(second.get("session"), json!(7));
	// an explicitly seeded value wins over the snapshot
	router.dispatch(
		"/aa",
		DispatchOptions {
			state: Some(data(json!({"session": 1}))),
			..DispatchOptions::default()
		},
	);
	assert_eq!(first.get("session"), json!(1));
}

// Test: a non-router fragment is preserved verbatim through a
// non-path-changing dispatch, and drives scrolling
#[test]
fn test_fragment_passthrough_and_scroll() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({}));
	h.router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&h.router, "/xx");
	dispatch(&h.router, "/xx#scrollTarget");

	assert_eq!(probe.created(), 1);
	assert_eq!(h.history.last().unwrap().url, "/xx#scrollTarget");
	assert_eq!(h.environment.scrolls(), vec!["", "scrollTarget"]);
}

// Test: a plain-callback route fires once with merged data and retains no
// view; update bookkeeping still happens with an empty payload
#[test]
fn test_callback_route() {
	let h = harness();
	let seen: Arc<Mutex<Vec<DataMap>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	h.router
		.add_route(
			"/cb/:n",
			RouteHandler::callback(move |ctx| {
				sink.lock().unwrap().push(ctx.data);
			}),
			ObserveSpec::new(),
		)
		.unwrap();

	dispatch(&h.router, "/cb/3?q=1");

	let calls = seen.lock().unwrap();
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0], data(json!({"n": 3})));

	let entry = h.history.last().unwrap();
	assert_eq!(entry.url, "/cb/3?q=1");
	assert_eq!(entry.state, json!({}));
}

// Test: strict mode rejects separator-tolerant requests at the table level
#[test]
fn test_strict_mode_redirects_lenient_request() {
	let environment = Arc::new(MemoryEnvironment::new());
	let router = Router::builder()
		.environment(environment.clone())
		.strict_mode(true)
		.build();
	let probe = ViewProbe::with_base(json!({}));
	router.add_route("/aa/:bb/", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&router, "/aa/x");
	assert_eq!(environment.navigations(), vec!["/aa/x"]);
	assert_eq!(probe.created(), 0);

	dispatch(&router, "/aa/x/");
	assert_eq!(probe.created(), 1);
}

// Test: the view is flagged ready after construction and observation is
// registered once over the space-joined key list
#[test]
fn test_view_lifecycle_contract() {
	let h = harness();
	let probe = ViewProbe::with_base(json!({"a": 1, "b": 2, "c": 3}));
	h.router
		.add_route(
			"/:aa",
			probe.handler(),
			ObserveSpec::new().query(["a"]).fragment(["b"]).state(["c"]),
		)
		.unwrap();

	dispatch(&h.router, "/xx");

	assert_eq!(probe.get(READY_KEY), json!(true));
	assert_eq!(probe.observed_keys(), vec!["a b c".to_string()]);
}

// Test: the base path is prepended to every canonical URI and stripped
// from the browser URI
#[test]
fn test_base_path_round_trip() {
	let environment = Arc::new(MemoryEnvironment::at("/app/xx", "", ""));
	let history = Arc::new(MemoryHistory::linked(Arc::clone(&environment)));
	let router = Router::builder()
		.base_path("/app")
		.environment(environment)
		.history(history.clone())
		.build();
	let probe = ViewProbe::with_base(json!({}));
	router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	router.init(DispatchOptions::default());

	assert_eq!(probe.created(), 1);
	assert_eq!(history.last().unwrap().url, "/app/xx");
}

// Test: defaults provide the lowest-precedence seed data on every
// transition
#[test]
fn test_defaults_seed_every_transition() {
	let environment = Arc::new(MemoryEnvironment::new());
	let router = Router::builder()
		.environment(environment)
		.defaults(|| data(json!({"theme": "dark"})))
		.build();
	let probe = ViewProbe::with_base(json!({}));
	router.add_route("/:aa", probe.handler(), ObserveSpec::new()).unwrap();

	dispatch(&router, "/xx");
	assert_eq!(probe.get("theme"), json!("dark"));

	// query data not named in the observe spec never reaches the view, so
	// the default survives the next transition too
	dispatch(&router, "/yy?theme=light");
	assert_eq!(probe.get("theme"), json!("dark"));
}

// Matcher containment and extraction alignment properties.

use proptest::prelude::*;
use routesync::{ObserveSpec, RouteHandler, RoutePattern};

const PATTERNS: &[&str] = &[
	"/aa/:bb/",
	"/aa/:bb/:cc?/",
	r"/aa/:bb/:cc?/:dd(\d+)/",
	"/items/:id",
	"/",
	"",
];

fn pattern_strategy() -> impl Strategy<Value = &'static str> {
	proptest::sample::select(PATTERNS)
}

proptest! {
	// Test: the strict acceptance set is a subset of the lenient one;
	// anything the strict matcher accepts, the lenient matcher accepts
	#[test]
	fn test_strict_accepts_subset_of_lenient(
		pattern in pattern_strategy(),
		path in "[a-z0-9/]{0,24}",
	) {
		let compiled = RoutePattern::compile(pattern).unwrap();
		if compiled.is_strict_match(&path) {
			prop_assert!(compiled.is_match(&path));
		}
	}

	// Test: extraction yields exactly a subset of the declared parameter
	// names, never a key from outside the pattern
	#[test]
	fn test_extraction_yields_declared_names(
		pattern in pattern_strategy(),
		path in "[a-z0-9/]{0,24}",
	) {
		let route = routesync::Route::new(
			pattern,
			RouteHandler::callback(|_| {}),
			ObserveSpec::new(),
		)
		.unwrap();

		let names = route.pattern().param_names().to_vec();
		for key in route.parse_path(&path).keys() {
			prop_assert!(names.contains(key));
		}
	}
}

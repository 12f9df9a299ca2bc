//! Navigation pipeline integration tests
//!
//! Success Criteria:
//! 1. Handlers run once per distinct outcome
//! 2. Re-navigating to the current path is a no-op
//! 3. Unmatched paths resolve to "no match"
//! 4. History, base path and query forwarding follow committed navigations
//! 5. Nested navigations supersede the outer one
//!
//! Test Categories:
//! - Happy Path: 3 tests
//! - Error Path: 1 test
//! - State Transitions: 4 tests
//! - Re-entrancy: 4 tests

use parking_lot::Mutex;
use rstest::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use waymark_router::{
	MemoryHistory, MemoryQueryParams, NavigationIntent, NodeStatus, QueryParams, RouteTable,
	Router, RouterError, RouterSettings,
};

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
fn history() -> Arc<MemoryHistory> {
	Arc::new(MemoryHistory::new("/"))
}

#[fixture]
fn router(history: Arc<MemoryHistory>) -> (Router, Arc<MemoryHistory>) {
	let router = Router::builder()
		.history(history.clone())
		.build()
		.unwrap();
	(router, history)
}

fn counter() -> Arc<AtomicUsize> {
	Arc::new(AtomicUsize::new(0))
}

// ============================================================================
// Happy Path Tests
// ============================================================================

/// Tests the route1 walkthrough: initial match, navigation, no-op, no match
#[rstest]
fn test_end_to_end_route_switching(router: (Router, Arc<MemoryHistory>)) {
	// Arrange
	let (router, history) = router;
	let home_calls = counter();
	let route1_calls = counter();
	let home = Arc::clone(&home_calls);
	let route1 = Arc::clone(&route1_calls);
	let node = router
		.create_node(
			None,
			RouteTable::new()
				.route("/", move |_| {
					home.fetch_add(1, Ordering::SeqCst);
					"home"
				})
				.route("/route1", move |_| {
					route1.fetch_add(1, Ordering::SeqCst);
					"route1"
				}),
		)
		.unwrap();

	// Assert: initial path resolved at creation
	assert_eq!(node.result(), Some("home"));
	assert_eq!(home_calls.load(Ordering::SeqCst), 1);

	// Act + Assert: new route
	assert!(router.navigate("/route1").unwrap());
	assert_eq!(node.result(), Some("route1"));
	assert_eq!(home_calls.load(Ordering::SeqCst), 1);
	assert_eq!(route1_calls.load(Ordering::SeqCst), 1);

	// Act + Assert: same path again
	assert!(!router.navigate("/route1").unwrap());
	assert_eq!(route1_calls.load(Ordering::SeqCst), 1);
	assert_eq!(history.len(), 2);

	// Act + Assert: nothing matches
	assert!(router.navigate("/missing").unwrap());
	assert_eq!(node.result(), None);
	assert_eq!(node.status(), NodeStatus::NoMatch);
	assert_eq!(home_calls.load(Ordering::SeqCst), 1);
	assert_eq!(route1_calls.load(Ordering::SeqCst), 1);
}

/// Tests that parameters are extracted and parameter changes notify
#[rstest]
fn test_param_change_notifies_subscribers() {
	// Arrange
	let router = Router::new();
	let node = router
		.create_node(
			None,
			RouteTable::new().route("/a/:x/b", |p| p.parse::<u32>("x").unwrap_or_default()),
		)
		.unwrap();
	let changes = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&changes);
	node.subscribe(move |change| sink.lock().push(change.params.clone()));

	// Act
	router.navigate("/a/42/b").unwrap();
	router.navigate("/a/42/c").unwrap();

	// Assert
	assert_eq!(node.result(), None);
	let changes = changes.lock();
	assert_eq!(changes.len(), 2);
	assert_eq!(
		changes[0].as_ref().and_then(|p| p.get("x").map(str::to_string)),
		Some("42".to_string())
	);
	assert_eq!(changes[1], None);
}

/// Tests relative targets, base path persistence and query forwarding
#[rstest]
fn test_relative_navigation_with_base_and_query() {
	// Arrange
	let history = Arc::new(MemoryHistory::new("/app/docs/intro"));
	let query = Arc::new(MemoryQueryParams::new());
	let router = Router::builder()
		.settings(RouterSettings::default().with_base_path("/app"))
		.history(history.clone())
		.query_sink(query.clone())
		.build()
		.unwrap();
	let mut params = QueryParams::new();
	params.insert("section".to_string(), "2".to_string());

	// Act
	router
		.navigate(NavigationIntent::new("./setup").query_params(params.clone(), true))
		.unwrap();

	// Assert
	assert_eq!(router.current_path(), "/docs/setup");
	assert_eq!(history.entries(), vec!["/app/docs/intro", "/app/docs/setup"]);
	assert_eq!(query.get(), params);
}

// ============================================================================
// Error Path Tests
// ============================================================================

/// Tests that a failing guard aborts before anything is committed
#[rstest]
fn test_interceptor_failure_is_atomic(router: (Router, Arc<MemoryHistory>)) {
	// Arrange
	let (router, history) = router;
	let calls = counter();
	let seen = Arc::clone(&calls);
	let node = router
		.create_node(
			None,
			RouteTable::new().route("*", move |_| seen.fetch_add(1, Ordering::SeqCst)),
		)
		.unwrap();
	let guard = router
		.interceptors()
		.register_fallible(|_from, _to| Err("backend unavailable".into()));

	// Act
	let result = router.navigate("/next");

	// Assert
	assert!(matches!(
		result,
		Err(RouterError::InterceptorFailure { interceptor, .. }) if interceptor == guard.id()
	));
	assert_eq!(router.current_path(), "/");
	assert_eq!(history.len(), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(node.result(), Some(0));

	// The router stays usable
	guard.unregister();
	assert!(router.navigate("/next").unwrap());
}

// ============================================================================
// State Transition Tests
// ============================================================================

/// Tests back/forward handling through the host location
#[rstest]
fn test_location_change_reconciles(router: (Router, Arc<MemoryHistory>)) {
	// Arrange
	let (router, history) = router;
	let node = router
		.create_node(
			None,
			RouteTable::new()
				.route("/", |_| "home")
				.route("/page", |_| "page"),
		)
		.unwrap();
	router.navigate("/page").unwrap();

	// Act
	let back = history.back().unwrap();
	router.handle_location_change(&back).unwrap();

	// Assert
	assert_eq!(node.result(), Some("home"));

	// Act
	let forward = history.forward().unwrap();
	router.handle_location_change(&forward).unwrap();

	// Assert
	assert_eq!(node.result(), Some("page"));
	assert_eq!(history.entries(), vec!["/", "/page"]);
}

/// Tests route table re-registration gated by epoch
#[rstest]
fn test_set_routes_by_epoch() {
	// Arrange
	let router = Router::new();
	let node = router
		.create_node(None, RouteTable::new().route("/", |_| "v0"))
		.unwrap();

	// Act + Assert: same epoch keeps the installed table
	assert!(!node.set_routes(RouteTable::new().route("/", |_| "ignored")).unwrap());
	assert_eq!(node.result(), Some("v0"));

	// Act + Assert: new epoch installs and reconciles
	assert!(
		node.set_routes(RouteTable::new().route("/", |_| "v1").with_epoch(1))
			.unwrap()
	);
	assert_eq!(node.result(), Some("v1"));

	// Act + Assert: invalid table leaves the old one
	let result = node.set_routes(RouteTable::new().route("/x*y", |_| "bad").with_epoch(2));
	assert!(matches!(result, Err(RouterError::InvalidPattern { .. })));
	assert_eq!(node.result(), Some("v1"));
}

/// Tests that a non-ASCII start location is already the current path
#[rstest]
fn test_encoded_initial_location_is_current() {
	// Arrange
	let history = Arc::new(MemoryHistory::new("/café"));
	let router = Router::builder().history(history.clone()).build().unwrap();
	let handler_calls = counter();
	let changes = counter();
	let calls = Arc::clone(&handler_calls);
	let node = router
		.create_node(
			None,
			RouteTable::new().route("/:name", move |p| {
				calls.fetch_add(1, Ordering::SeqCst);
				p.get("name").unwrap_or_default().to_string()
			}),
		)
		.unwrap();
	let seen = Arc::clone(&changes);
	node.subscribe(move |_| {
		seen.fetch_add(1, Ordering::SeqCst);
	});

	// Act
	let committed = router.navigate("/café").unwrap();

	// Assert
	assert!(!committed);
	assert_eq!(router.current_path(), "/caf%C3%A9");
	assert_eq!(history.len(), 1);
	assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
	assert_eq!(changes.load(Ordering::SeqCst), 0);
}

/// Tests that host locations with dot segments commit their resolved form
#[rstest]
fn test_location_change_with_dot_segments(router: (Router, Arc<MemoryHistory>)) {
	// Arrange
	let (router, history) = router;
	let node = router
		.create_node(
			None,
			RouteTable::new()
				.route("/x", |_| "x")
				.route("/q/:rest", |_| "q"),
		)
		.unwrap();

	// Act
	let committed = router.handle_location_change("/q/../x").unwrap();

	// Assert
	assert!(committed);
	assert_eq!(router.current_path(), "/x");
	assert_eq!(node.result(), Some("x"));
	assert!(!router.navigate("/x").unwrap());
	assert_eq!(history.len(), 1);
}

// ============================================================================
// Re-entrancy Tests
// ============================================================================

/// Tests a handler navigating elsewhere while its own outcome is computed
#[rstest]
fn test_reentrant_navigation_from_handler() {
	// Arrange
	let router = Router::new();
	let log = Arc::new(Mutex::new(Vec::new()));
	let nested = router.clone();
	let handler_log = Arc::clone(&log);
	let node = router
		.create_node(
			None,
			RouteTable::new()
				.route("/a", move |_| {
					handler_log.lock().push("a".to_string());
					nested.navigate("/b").unwrap();
					"a"
				})
				.route("/b", |_| "b"),
		)
		.unwrap();
	let notify_log = Arc::clone(&log);
	node.subscribe(move |change| {
		notify_log
			.lock()
			.push(format!("notify {}", change.pattern.as_deref().unwrap_or_default()));
	});

	// Act
	router.navigate("/a").unwrap();

	// Assert: the stale "a" result is dropped and announced nowhere
	assert_eq!(router.current_path(), "/b");
	assert_eq!(node.result(), Some("b"));
	assert_eq!(*log.lock(), vec!["a".to_string(), "notify /b".to_string()]);
}

/// Tests a subscriber navigating while a pass is running
#[rstest]
fn test_reentrant_navigation_from_subscriber(router: (Router, Arc<MemoryHistory>)) {
	// Arrange
	let (router, history) = router;
	let first = router
		.create_node(
			None,
			RouteTable::new()
				.route("/old", |_| "old")
				.route("/new", |_| "new"),
		)
		.unwrap();
	let second_calls = Arc::new(Mutex::new(Vec::new()));
	let log = Arc::clone(&second_calls);
	let second = router
		.create_node(
			None,
			RouteTable::new().route("/:page", move |p| {
				let page = p.get("page").unwrap_or_default().to_string();
				log.lock().push(page.clone());
				page
			}),
		)
		.unwrap();
	let nested = router.clone();
	first.subscribe(move |change| {
		if change.pattern.as_deref() == Some("/old") {
			nested.navigate("/new").unwrap();
		}
	});

	// Act
	assert!(router.navigate("/old").unwrap());

	// Assert
	assert_eq!(router.current_path(), "/new");
	assert_eq!(first.result(), Some("new"));
	assert_eq!(second.result().as_deref(), Some("new"));
	// The superseded outer pass never reached the second node
	assert_eq!(*second_calls.lock(), vec!["new".to_string()]);
	assert_eq!(history.entries(), vec!["/", "/old", "/new"]);
}

/// Tests a guard navigating elsewhere while intercepting
#[rstest]
fn test_reentrant_navigation_from_guard() {
	// Arrange
	let router = Router::new();
	let nested = router.clone();
	let once = Arc::new(AtomicUsize::new(0));
	let count = Arc::clone(&once);
	router.register_interceptor(move |_from, to| {
		if to == "/outer" && count.fetch_add(1, Ordering::SeqCst) == 0 {
			nested.navigate("/inner").unwrap();
		}
		to.to_string()
	});

	// Act
	let committed = router.navigate("/outer").unwrap();

	// Assert: the outer call noticed the path moved and backed off
	assert!(!committed);
	assert_eq!(router.current_path(), "/inner");
}

/// Tests disposing a node from inside another node's subscriber
#[rstest]
fn test_dispose_during_pass() {
	// Arrange
	let router = Router::new();
	let first = router
		.create_node(None, RouteTable::new().route("/:p", |_| ()))
		.unwrap();
	let calls = counter();
	let seen = Arc::clone(&calls);
	let second = router
		.create_node(
			None,
			RouteTable::new().route("/:p", move |_| {
				seen.fetch_add(1, Ordering::SeqCst);
			}),
		)
		.unwrap();
	let victim = second.clone();
	first.subscribe(move |_| victim.dispose());

	// Act
	router.navigate("/x").unwrap();

	// Assert
	assert!(second.is_disposed());
	assert_eq!(second.status(), NodeStatus::Disposed);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	assert_eq!(router.node_count(), 1);
	// Disposal is idempotent
	second.dispose();
	assert_eq!(router.node_count(), 1);
}

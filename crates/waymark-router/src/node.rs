//! Router nodes: one routing region with its route table and last match.
//!
//! A node resolves its working path against its routes (first match wins),
//! invokes the matched handler at most once per distinct outcome, and
//! notifies subscribers only when the matched route or its parameters change.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{RouterError, RouterResult};
use crate::params::PathParams;
use crate::pattern::{CompiledMatcher, PatternCompiler};
use crate::router::Router;
use crate::stack::StackEntry;

/// Identity of a router node within one [`Router`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
	pub(crate) fn from_raw(raw: u64) -> Self {
		Self(raw)
	}
}

impl std::fmt::Display for NodeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "node#{}", self.0)
	}
}

/// Identity of one subscription on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Route handler: turns the captured parameters into the node's result.
pub type RouteHandler<T> = Arc<dyn Fn(&PathParams) -> T + Send + Sync>;

type Subscriber = Arc<dyn Fn(&RouteChange) + Send + Sync>;

/// Ordered route table for one node.
///
/// Routes are tried in insertion order and the first match wins, so
/// overlapping patterns must be ordered deliberately.
///
/// # Example
///
/// ```
/// use waymark_router::RouteTable;
///
/// let table = RouteTable::new()
/// 	.route("/", |_| "home".to_string())
/// 	.route("/users/:id", |p| format!("user {}", p.get("id").unwrap_or_default()));
/// assert_eq!(table.len(), 2);
/// ```
pub struct RouteTable<T> {
	routes: Vec<(String, RouteHandler<T>)>,
	epoch: u64,
}

impl<T> RouteTable<T> {
	/// Creates an empty table with epoch 0.
	pub fn new() -> Self {
		Self {
			routes: Vec::new(),
			epoch: 0,
		}
	}

	/// Appends a route.
	pub fn route<F>(mut self, pattern: impl Into<String>, handler: F) -> Self
	where
		F: Fn(&PathParams) -> T + Send + Sync + 'static,
	{
		self.routes.push((pattern.into(), Arc::new(handler)));
		self
	}

	/// Sets the table's epoch.
	///
	/// Re-registering a table on a node only takes effect when the epoch
	/// differs from the one currently installed.
	pub fn with_epoch(mut self, epoch: u64) -> Self {
		self.epoch = epoch;
		self
	}

	/// The table's epoch.
	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	/// Number of routes.
	pub fn len(&self) -> usize {
		self.routes.len()
	}

	/// Whether the table has no routes.
	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}

	/// Compiles every pattern; fails on the first invalid one.
	pub(crate) fn compile(&self, compiler: &PatternCompiler) -> RouterResult<Vec<CompiledRoute<T>>> {
		self.routes
			.iter()
			.map(|(pattern, handler)| {
				Ok(CompiledRoute {
					matcher: compiler.compile(pattern)?,
					handler: Arc::clone(handler),
				})
			})
			.collect()
	}
}

impl<T> Default for RouteTable<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Clone for RouteTable<T> {
	fn clone(&self) -> Self {
		Self {
			routes: self.routes.clone(),
			epoch: self.epoch,
		}
	}
}

impl<T> std::fmt::Debug for RouteTable<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouteTable")
			.field(
				"patterns",
				&self.routes.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
			)
			.field("epoch", &self.epoch)
			.finish()
	}
}

pub(crate) struct CompiledRoute<T> {
	matcher: Arc<CompiledMatcher>,
	handler: RouteHandler<T>,
}

/// Identity of the matched route: table epoch plus position in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RouteKey {
	epoch: u64,
	index: usize,
}

/// Resolution state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
	/// No route matches the working path (or no path was handed down).
	NoMatch,
	/// A route matched.
	Matched,
	/// The node was disposed.
	Disposed,
}

/// Notification delivered to node subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChange {
	/// The node whose outcome changed.
	pub node: NodeId,
	/// Newly matched pattern, `None` for "no match".
	pub pattern: Option<String>,
	/// Newly captured parameters, `None` for "no match".
	pub params: Option<PathParams>,
}

struct Resolved<T> {
	key: Option<RouteKey>,
	matcher: Option<Arc<CompiledMatcher>>,
	params: Option<PathParams>,
	remainder: Option<String>,
	result: Option<T>,
	/// Bumped on every changed outcome.
	generation: u64,
}

impl<T> Default for Resolved<T> {
	fn default() -> Self {
		Self {
			key: None,
			matcher: None,
			params: None,
			remainder: None,
			result: None,
			generation: 0,
		}
	}
}

struct NodeState<T> {
	routes: Vec<CompiledRoute<T>>,
	epoch: u64,
	resolved: Resolved<T>,
	subscribers: Vec<(SubscriptionId, Subscriber)>,
}

/// Outcome of scanning the route table once.
struct Candidate<T> {
	key: RouteKey,
	matcher: Arc<CompiledMatcher>,
	handler: RouteHandler<T>,
	params: PathParams,
	remainder: String,
}

impl<T> NodeState<T> {
	fn scan(&self, working: &str) -> Option<Candidate<T>> {
		// An empty working path is the root of the nested region.
		let subject = if working.is_empty() { "/" } else { working };
		self.routes.iter().enumerate().find_map(|(index, route)| {
			route.matcher.matches(subject).map(|m| Candidate {
				key: RouteKey {
					epoch: self.epoch,
					index,
				},
				matcher: Arc::clone(&route.matcher),
				handler: Arc::clone(&route.handler),
				params: m.params,
				remainder: m.remainder,
			})
		})
	}
}

/// Shared node storage; owned by the router's stack, observed by handles.
pub(crate) struct NodeCell<T> {
	id: NodeId,
	parent: Option<NodeId>,
	disposed: AtomicBool,
	next_subscription: AtomicU64,
	state: Mutex<NodeState<T>>,
}

impl<T> NodeCell<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub(crate) fn new(
		id: NodeId,
		parent: Option<NodeId>,
		routes: Vec<CompiledRoute<T>>,
		epoch: u64,
	) -> Self {
		Self {
			id,
			parent,
			disposed: AtomicBool::new(false),
			next_subscription: AtomicU64::new(0),
			state: Mutex::new(NodeState {
				routes,
				epoch,
				resolved: Resolved::default(),
				subscribers: Vec::new(),
			}),
		}
	}

	/// Installs a new route table unless its epoch is already installed.
	fn replace_routes(&self, routes: Vec<CompiledRoute<T>>, epoch: u64) -> bool {
		let mut state = self.state.lock();
		if state.epoch == epoch {
			return false;
		}
		state.routes = routes;
		state.epoch = epoch;
		true
	}
}

impl<T> StackEntry for NodeCell<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn id(&self) -> NodeId {
		self.id
	}

	fn parent(&self) -> Option<NodeId> {
		self.parent
	}

	fn handoff(&self) -> Option<String> {
		let state = self.state.lock();
		match &state.resolved.matcher {
			Some(matcher) if matcher.is_prefix() => state.resolved.remainder.clone(),
			_ => None,
		}
	}

	fn reconcile(&self, working: Option<&str>) -> bool {
		if self.is_disposed() {
			return false;
		}

		let (generation, invocation, change) = {
			let mut state = self.state.lock();
			let candidate = working.and_then(|path| state.scan(path));
			let key = candidate.as_ref().map(|c| c.key);
			let params = candidate.as_ref().map(|c| c.params.clone());

			let resolved = &mut state.resolved;
			resolved.remainder = candidate.as_ref().map(|c| c.remainder.clone());
			if resolved.key == key && resolved.params == params {
				return false;
			}

			resolved.key = key;
			resolved.params = params.clone();
			resolved.matcher = candidate.as_ref().map(|c| Arc::clone(&c.matcher));
			resolved.result = None;
			resolved.generation += 1;

			let change = RouteChange {
				node: self.id,
				pattern: candidate.as_ref().map(|c| c.matcher.pattern().to_string()),
				params,
			};
			let invocation = candidate.map(|c| (c.handler, c.params));
			(resolved.generation, invocation, change)
		};

		tracing::debug!(
			node = %self.id,
			pattern = change.pattern.as_deref(),
			"router node outcome changed"
		);

		// Handlers run unlocked: they may navigate re-entrantly.
		let result = invocation.map(|(handler, params)| handler(&params));

		let subscribers: Vec<Subscriber> = {
			let mut state = self.state.lock();
			if state.resolved.generation != generation || self.is_disposed() {
				// A nested navigation already produced and announced a newer outcome.
				return true;
			}
			state.resolved.result = result;
			state.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect()
		};

		for subscriber in subscribers {
			if self.is_disposed() {
				break;
			}
			subscriber(&change);
		}
		true
	}

	fn dispose(&self) -> bool {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return false;
		}
		self.state.lock().subscribers.clear();
		true
	}

	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}
}

/// Caller-side handle to a node.
///
/// Handles are cheap to clone. Dropping a handle does not dispose the node;
/// call [`NodeHandle::dispose`] when the owning region is torn down.
pub struct NodeHandle<T> {
	cell: Arc<NodeCell<T>>,
	router: Router,
}

impl<T> Clone for NodeHandle<T> {
	fn clone(&self) -> Self {
		Self {
			cell: Arc::clone(&self.cell),
			router: self.router.clone(),
		}
	}
}

impl<T> std::fmt::Debug for NodeHandle<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NodeHandle")
			.field("id", &self.cell.id)
			.field("parent", &self.cell.parent)
			.finish()
	}
}

impl<T> NodeHandle<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub(crate) fn new(cell: Arc<NodeCell<T>>, router: Router) -> Self {
		Self { cell, router }
	}

	/// The node's id.
	pub fn id(&self) -> NodeId {
		self.cell.id
	}

	/// The parent node's id, if any.
	pub fn parent(&self) -> Option<NodeId> {
		self.cell.parent
	}

	/// Result of the matched handler, `None` when nothing matches.
	pub fn result(&self) -> Option<T> {
		self.cell.state.lock().resolved.result.clone()
	}

	/// Pattern of the matched route.
	pub fn matched_pattern(&self) -> Option<String> {
		self.cell
			.state
			.lock()
			.resolved
			.matcher
			.as_ref()
			.map(|m| m.pattern().to_string())
	}

	/// Parameters captured by the matched route.
	pub fn params(&self) -> Option<PathParams> {
		self.cell.state.lock().resolved.params.clone()
	}

	/// Unmatched rest of the working path from the last match.
	pub fn remainder(&self) -> Option<String> {
		self.cell.state.lock().resolved.remainder.clone()
	}

	/// Current resolution state.
	pub fn status(&self) -> NodeStatus {
		if self.cell.is_disposed() {
			NodeStatus::Disposed
		} else if self.cell.state.lock().resolved.key.is_some() {
			NodeStatus::Matched
		} else {
			NodeStatus::NoMatch
		}
	}

	/// The path this node matches against; `None` when its parent hands
	/// nothing down.
	///
	/// # Errors
	///
	/// Returns [`RouterError::NodeDisposed`] for a disposed node and
	/// [`RouterError::UnknownParentNode`] if the parent is gone.
	pub fn working_path(&self) -> RouterResult<Option<String>> {
		self.router.working_path(self.id())
	}

	/// Registers a change notifier.
	pub fn subscribe<F>(&self, on_change: F) -> SubscriptionId
	where
		F: Fn(&RouteChange) + Send + Sync + 'static,
	{
		let id = SubscriptionId(self.cell.next_subscription.fetch_add(1, Ordering::Relaxed));
		if !self.cell.is_disposed() {
			self.cell
				.state
				.lock()
				.subscribers
				.push((id, Arc::new(on_change)));
		}
		id
	}

	/// Removes a change notifier. Returns whether it was registered.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut state = self.cell.state.lock();
		let before = state.subscribers.len();
		state.subscribers.retain(|(sid, _)| *sid != id);
		state.subscribers.len() != before
	}

	/// Re-registers the node's route table.
	///
	/// Nothing happens when `table` carries the epoch already installed.
	/// Otherwise the table is compiled, installed, and every node is
	/// reconciled against the current path. Returns whether the table was
	/// replaced.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidPattern`] (leaving the old table in
	/// place) or [`RouterError::NodeDisposed`].
	pub fn set_routes(&self, table: RouteTable<T>) -> RouterResult<bool> {
		if self.cell.is_disposed() {
			return Err(RouterError::NodeDisposed(self.id()));
		}
		if self.cell.state.lock().epoch == table.epoch() {
			return Ok(false);
		}
		let routes = table.compile(self.router.compiler())?;
		if !self.cell.replace_routes(routes, table.epoch()) {
			return Ok(false);
		}
		tracing::debug!(node = %self.id(), epoch = table.epoch(), "route table replaced");
		self.router.reconcile()?;
		Ok(true)
	}

	/// Removes the node from its router. Safe to call during a
	/// reconciliation pass and more than once.
	pub fn dispose(&self) {
		self.router.remove_node(self.id());
		self.cell.dispose();
	}

	/// Whether the node was disposed.
	pub fn is_disposed(&self) -> bool {
		self.cell.is_disposed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::sync::atomic::AtomicUsize;

	fn cell(table: RouteTable<String>) -> NodeCell<String> {
		let routes = table.compile(&PatternCompiler::new()).unwrap();
		NodeCell::new(NodeId::from_raw(0), None, routes, table.epoch())
	}

	#[rstest]
	fn test_first_match_wins() {
		// Arrange
		let node = cell(
			RouteTable::new()
				.route("/users/:id", |_| "param".to_string())
				.route("/users/me", |_| "literal".to_string()),
		);

		// Act
		node.reconcile(Some("/users/me"));

		// Assert
		assert_eq!(node.state.lock().resolved.result.as_deref(), Some("param"));
	}

	#[rstest]
	fn test_unchanged_outcome_skips_handler() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let node = cell(RouteTable::new().route("/a/:x", move |p| {
			counter.fetch_add(1, Ordering::SeqCst);
			p.get("x").unwrap_or_default().to_string()
		}));

		assert!(node.reconcile(Some("/a/1")));
		assert!(!node.reconcile(Some("/a/1")));
		assert!(node.reconcile(Some("/a/2")));

		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(node.state.lock().resolved.result.as_deref(), Some("2"));
	}

	#[rstest]
	fn test_remainder_change_alone_does_not_notify() {
		// Arrange
		let node = cell(RouteTable::new().route("/cat/:id*", |_| "cat".to_string()));
		node.reconcile(Some("/cat/1/a"));

		// Act
		let changed = node.reconcile(Some("/cat/1/b"));

		// Assert
		assert!(!changed);
		assert_eq!(node.handoff().as_deref(), Some("/b"));
	}

	#[rstest]
	fn test_non_prefix_match_hands_nothing_down() {
		let node = cell(RouteTable::new().route("/cat/:id", |_| "cat".to_string()));
		node.reconcile(Some("/cat/1"));

		assert_eq!(node.handoff(), None);
	}

	#[rstest]
	fn test_no_working_path_forces_no_match() {
		let node = cell(RouteTable::new().route("*", |_| "any".to_string()));
		node.reconcile(Some("/x"));

		assert!(node.reconcile(None));
		assert!(node.state.lock().resolved.key.is_none());
		assert!(node.state.lock().resolved.result.is_none());
	}

	#[rstest]
	fn test_empty_working_path_matches_root() {
		let node = cell(RouteTable::new().route("/", |_| "root".to_string()));
		node.reconcile(Some(""));

		assert_eq!(node.state.lock().resolved.result.as_deref(), Some("root"));
	}

	#[rstest]
	fn test_disposed_node_is_skipped() {
		let node = cell(RouteTable::new().route("/", |_| "root".to_string()));

		assert!(node.dispose());
		assert!(!node.dispose());
		assert!(!node.reconcile(Some("/")));
		assert!(node.state.lock().resolved.result.is_none());
	}

	#[rstest]
	fn test_replace_routes_is_epoch_gated() {
		let node = cell(RouteTable::new().route("/", |_| "v0".to_string()));
		let same = RouteTable::new().route("/", |_| "same".to_string());
		let next = RouteTable::new()
			.route("/", |_| "v1".to_string())
			.with_epoch(1);

		assert!(!node.replace_routes(same.compile(&PatternCompiler::new()).unwrap(), 0));
		assert!(node.replace_routes(next.compile(&PatternCompiler::new()).unwrap(), 1));
	}

	#[rstest]
	fn test_route_table_debug_lists_patterns() {
		let table: RouteTable<()> = RouteTable::new().route("/", |_| ()).route("/a", |_| ());
		let debug = format!("{:?}", table);
		assert!(debug.contains("\"/\""));
		assert!(debug.contains("\"/a\""));
	}
}

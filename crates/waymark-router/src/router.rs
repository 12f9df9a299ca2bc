//! The router context: one independent routing tree.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{RouterError, RouterResult};
use crate::history::{HistoryBackend, strip_base};
use crate::interceptor::{InterceptorChain, InterceptorHandle};
use crate::navigation::{QueryParamSink, resolve_target};
use crate::node::{NodeCell, NodeHandle, NodeId, RouteTable};
use crate::pattern::PatternCompiler;
use crate::settings::RouterSettings;
use crate::stack::{RouterStack, StackEntry};

enum CompilerRef {
	Global,
	Owned(Arc<PatternCompiler>),
}

pub(crate) struct RouterInner {
	pub(crate) settings: RouterSettings,
	pub(crate) current_path: Mutex<String>,
	/// Bumped on every committed navigation.
	pub(crate) sequence: AtomicU64,
	pub(crate) history: Option<Arc<dyn HistoryBackend>>,
	pub(crate) query_sink: Option<Arc<dyn QueryParamSink>>,
	pub(crate) interceptors: InterceptorChain,
	pub(crate) stack: RouterStack,
	compiler: CompilerRef,
}

/// Handle to one routing tree.
///
/// A router owns the current path, the interceptor chain and the stack of
/// router nodes. Cloning is cheap and yields another handle to the same tree;
/// independent routers never observe each other.
///
/// # Example
///
/// ```
/// use waymark_router::{RouteTable, Router};
///
/// let router = Router::new();
/// let node = router
/// 	.create_node(
/// 		None,
/// 		RouteTable::new()
/// 			.route("/", |_| "home")
/// 			.route("/about", |_| "about"),
/// 	)
/// 	.unwrap();
/// assert_eq!(node.result(), Some("home"));
///
/// router.navigate("/about").unwrap();
/// assert_eq!(node.result(), Some("about"));
/// ```
#[derive(Clone)]
pub struct Router {
	pub(crate) inner: Arc<RouterInner>,
}

impl Router {
	/// Creates a router with default settings, no history backend and the
	/// process-wide pattern cache. The current path starts at `/`.
	pub fn new() -> Self {
		let settings = RouterSettings::default();
		let initial = settings.initial_path().to_string();
		RouterBuilder::default().assemble(settings, initial)
	}

	/// Starts configuring a router.
	pub fn builder() -> RouterBuilder {
		RouterBuilder::default()
	}

	/// The router's settings.
	pub fn settings(&self) -> &RouterSettings {
		&self.inner.settings
	}

	/// The committed current path, without the base path.
	pub fn current_path(&self) -> String {
		self.inner.current_path.lock().clone()
	}

	/// The router's interceptor chain.
	pub fn interceptors(&self) -> &InterceptorChain {
		&self.inner.interceptors
	}

	/// Registers a navigation guard. See [`InterceptorChain::register`].
	pub fn register_interceptor<G>(&self, guard: G) -> InterceptorHandle
	where
		G: Fn(&str, &str) -> String + Send + Sync + 'static,
	{
		self.inner.interceptors.register(guard)
	}

	/// Number of live nodes.
	pub fn node_count(&self) -> usize {
		self.inner.stack.len()
	}

	/// Creates a router node and resolves it against the current path.
	///
	/// With a `parent`, the node only receives a working path while the
	/// parent is matched by a wildcard route.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidPattern`] if any route fails to compile
	/// and [`RouterError::UnknownParentNode`] if `parent` is not registered.
	/// In both cases no node is added.
	pub fn create_node<T>(
		&self,
		parent: Option<NodeId>,
		table: RouteTable<T>,
	) -> RouterResult<NodeHandle<T>>
	where
		T: Clone + Send + Sync + 'static,
	{
		let routes = table.compile(self.compiler())?;
		if let Some(parent) = parent.filter(|p| self.inner.stack.get(*p).is_none()) {
			return Err(RouterError::UnknownParentNode { parent });
		}

		let id = self.inner.stack.next_id();
		let cell = Arc::new(NodeCell::new(id, parent, routes, table.epoch()));
		self.inner
			.stack
			.insert(Arc::clone(&cell) as Arc<dyn StackEntry>);
		tracing::debug!(node = %id, parent = ?parent, routes = table.len(), "router node created");

		let working = self
			.inner
			.stack
			.working_path_for(parent, &self.current_path())?;
		cell.reconcile(working.as_deref());

		Ok(NodeHandle::new(cell, self.clone()))
	}

	/// The working path of a node: the current path for a root node, the
	/// parent's handed-down remainder for a nested one.
	///
	/// # Errors
	///
	/// Returns [`RouterError::NodeDisposed`] if the node is gone and
	/// [`RouterError::UnknownParentNode`] if its parent is.
	pub fn working_path(&self, node: NodeId) -> RouterResult<Option<String>> {
		let entry = self
			.inner
			.stack
			.get(node)
			.ok_or(RouterError::NodeDisposed(node))?;
		self.inner
			.stack
			.working_path_for(entry.parent(), &self.current_path())
	}

	/// Navigates to `to` when the working path seen under `parent` equals
	/// `from`. `to` is resolved against the current path, like any other
	/// navigation target. Returns whether a navigation was committed.
	///
	/// # Errors
	///
	/// Returns [`RouterError::UnknownParentNode`] if `parent` is not
	/// registered, or any error from [`Router::navigate`].
	pub fn redirect(&self, parent: Option<NodeId>, from: &str, to: &str) -> RouterResult<bool> {
		let working = self
			.inner
			.stack
			.working_path_for(parent, &self.current_path())?;
		let at_from = match working.as_deref() {
			Some("") => from == "/",
			Some(path) => path == from,
			None => false,
		};
		if !at_from {
			return Ok(false);
		}
		tracing::debug!(parent = ?parent, from, to, "redirecting");
		self.navigate(to)
	}

	pub(crate) fn compiler(&self) -> &PatternCompiler {
		match &self.inner.compiler {
			CompilerRef::Global => PatternCompiler::global(),
			CompilerRef::Owned(compiler) => compiler,
		}
	}

	pub(crate) fn is_current(&self, sequence: u64) -> bool {
		self.inner.sequence.load(Ordering::SeqCst) == sequence
	}

	/// Reconciles every node against the current path.
	pub(crate) fn reconcile(&self) -> RouterResult<usize> {
		let sequence = self.inner.sequence.load(Ordering::SeqCst);
		let path = self.current_path();
		self.inner
			.stack
			.reconcile_all(&path, || self.is_current(sequence))
	}

	pub(crate) fn remove_node(&self, node: NodeId) {
		if self.inner.stack.remove(node).is_some() {
			tracing::debug!(node = %node, "router node disposed");
		}
	}
}

impl Default for Router {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Router {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Router")
			.field("current_path", &self.current_path())
			.field("settings", &self.inner.settings)
			.field("stack", &self.inner.stack)
			.field("interceptors", &self.inner.interceptors)
			.finish()
	}
}

/// Builder for [`Router`].
#[derive(Default)]
pub struct RouterBuilder {
	settings: RouterSettings,
	history: Option<Arc<dyn HistoryBackend>>,
	query_sink: Option<Arc<dyn QueryParamSink>>,
	compiler: Option<Arc<PatternCompiler>>,
}

impl RouterBuilder {
	/// Uses the given settings.
	pub fn settings(mut self, settings: RouterSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Persists committed paths to `history` and takes the initial path from
	/// its location.
	pub fn history(mut self, history: Arc<dyn HistoryBackend>) -> Self {
		self.history = Some(history);
		self
	}

	/// Forwards query parameters supplied with navigations to `sink`.
	pub fn query_sink(mut self, sink: Arc<dyn QueryParamSink>) -> Self {
		self.query_sink = Some(sink);
		self
	}

	/// Uses a private pattern cache instead of the process-wide one.
	pub fn compiler(mut self, compiler: Arc<PatternCompiler>) -> Self {
		self.compiler = Some(compiler);
		self
	}

	/// Builds the router.
	///
	/// The initial path is the history location with the base path stripped,
	/// or the configured initial path when there is no history or it has no
	/// location. Either way it is canonicalized the same way navigation
	/// targets are, so navigating to it again is a no-op.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidSettings`] if the settings fail
	/// validation and [`RouterError::InvalidTarget`] if the initial path
	/// does not resolve.
	pub fn build(self) -> RouterResult<Router> {
		self.settings.validate()?;
		let settings = self.settings.clone();
		let raw = self
			.history
			.as_ref()
			.and_then(|history| history.location())
			.map(|location| strip_base(settings.base_path(), &location))
			.unwrap_or_else(|| settings.initial_path().to_string());
		let initial = resolve_target("/", &raw)?;
		Ok(self.assemble(settings, initial))
	}

	fn assemble(self, settings: RouterSettings, initial: String) -> Router {
		tracing::debug!(initial = %initial, base_path = settings.base_path(), "router created");
		Router {
			inner: Arc::new(RouterInner {
				settings,
				current_path: Mutex::new(initial),
				sequence: AtomicU64::new(0),
				history: self.history,
				query_sink: self.query_sink,
				interceptors: InterceptorChain::new(),
				stack: RouterStack::default(),
				compiler: self
					.compiler
					.map_or(CompilerRef::Global, CompilerRef::Owned),
			}),
		}
	}
}

impl std::fmt::Debug for RouterBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouterBuilder")
			.field("settings", &self.settings)
			.field("history", &self.history.is_some())
			.field("query_sink", &self.query_sink.is_some())
			.finish()
	}
}

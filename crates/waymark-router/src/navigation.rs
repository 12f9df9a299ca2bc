//! The navigation pipeline: resolve, intercept, commit, reconcile.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use url::Url;

use crate::error::{RouterError, RouterResult};
use crate::history::{NavigationType, strip_base, with_base};
use crate::router::Router;

/// Origin used to run paths through URL resolution. Only the path of the
/// result is kept.
const RESOLUTION_ORIGIN: &str = "http://waymark.invalid";

/// Query parameters forwarded alongside a navigation.
pub type QueryParams = BTreeMap<String, String>;

/// Query parameter update carried by a [`NavigationIntent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryUpdate {
	/// Parameters to apply.
	pub params: QueryParams,
	/// Replace the whole set instead of merging into it.
	pub replace: bool,
}

/// One navigation request.
///
/// # Example
///
/// ```
/// use waymark_router::{NavigationIntent, QueryParams};
///
/// let mut query = QueryParams::new();
/// query.insert("page".to_string(), "2".to_string());
///
/// let intent = NavigationIntent::new("../list")
/// 	.replace(true)
/// 	.query_params(query, false);
/// assert_eq!(intent.target(), "../list");
/// assert!(intent.is_replace());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
	target: String,
	replace: bool,
	query: Option<QueryUpdate>,
}

impl NavigationIntent {
	/// Navigation to `target`, absolute or relative to the current path.
	pub fn new(target: impl Into<String>) -> Self {
		Self {
			target: target.into(),
			replace: false,
			query: None,
		}
	}

	/// Replace the current history entry instead of pushing a new one.
	pub fn replace(mut self, replace: bool) -> Self {
		self.replace = replace;
		self
	}

	/// Forward `params` to the query collaborator once the navigation commits.
	pub fn query_params(mut self, params: QueryParams, replace: bool) -> Self {
		self.query = Some(QueryUpdate { params, replace });
		self
	}

	/// The requested target, before resolution.
	pub fn target(&self) -> &str {
		&self.target
	}

	/// Whether the current history entry is replaced.
	pub fn is_replace(&self) -> bool {
		self.replace
	}

	/// Query parameter update to forward on commit.
	pub fn query(&self) -> Option<&QueryUpdate> {
		self.query.as_ref()
	}

	fn history_type(&self) -> NavigationType {
		if self.replace {
			NavigationType::Replace
		} else {
			NavigationType::Push
		}
	}
}

impl From<&str> for NavigationIntent {
	fn from(target: &str) -> Self {
		Self::new(target)
	}
}

impl From<String> for NavigationIntent {
	fn from(target: String) -> Self {
		Self::new(target)
	}
}

/// Receiver of query parameters supplied with navigations. Encoding them
/// into the host's location is the sink's business.
pub trait QueryParamSink: Send + Sync {
	/// Merges `params` into the current set, or replaces it when `replace`
	/// is set.
	fn set_query_params(&self, params: &QueryParams, replace: bool);
}

/// In-memory query parameter store.
#[derive(Debug, Default)]
pub struct MemoryQueryParams {
	params: Mutex<QueryParams>,
	updates: AtomicUsize,
}

impl MemoryQueryParams {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the current parameters.
	pub fn get(&self) -> QueryParams {
		self.params.lock().clone()
	}

	/// How many updates were applied.
	pub fn update_count(&self) -> usize {
		self.updates.load(Ordering::SeqCst)
	}
}

impl QueryParamSink for MemoryQueryParams {
	fn set_query_params(&self, params: &QueryParams, replace: bool) {
		let mut current = self.params.lock();
		if replace {
			*current = params.clone();
		} else {
			current.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
		}
		self.updates.fetch_add(1, Ordering::SeqCst);
	}
}

/// Resolves `target` against `current` with standard relative-URL rules.
pub(crate) fn resolve_target(current: &str, target: &str) -> RouterResult<String> {
	Url::parse(RESOLUTION_ORIGIN)
		.and_then(|origin| origin.join(current))
		.and_then(|base| base.join(target))
		.map(|resolved| resolved.path().to_string())
		.map_err(|source| RouterError::InvalidTarget {
			target: target.to_string(),
			base: current.to_string(),
			source,
		})
}

impl Router {
	/// Navigates to a new path.
	///
	/// The target is resolved against the current path and folded through
	/// the interceptor chain; a guard's output is resolved against the
	/// current path as well, so guards may return relative paths. If the
	/// result equals the current path nothing happens. Otherwise the path is committed, persisted to the history
	/// backend, every node is reconciled, and any query parameters are
	/// forwarded. Returns whether this call committed a navigation.
	///
	/// Guards, handlers and subscribers may navigate re-entrantly. A nested
	/// navigation that commits first supersedes this one: the outer call then
	/// stops reconciling and does not forward its query parameters.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidTarget`] or
	/// [`RouterError::InterceptorFailure`] before any state changes, or
	/// [`RouterError::UnknownParentNode`] after the commit when a nested node
	/// has lost its parent.
	pub fn navigate(&self, intent: impl Into<NavigationIntent>) -> RouterResult<bool> {
		let intent = intent.into();
		let from = self.current_path();
		let target = resolve_target(&from, intent.target())?;
		let guarded = self.inner.interceptors.intercept(&from, &target)?;
		let to = resolve_target(&from, &guarded)?;

		if to == from {
			tracing::trace!(from = %from, target = %target, "navigation cancelled or unchanged");
			return Ok(false);
		}

		let Some(sequence) = self.commit(&from, &to, intent.history_type()) else {
			return Ok(false);
		};
		self.finish(sequence, &to, intent.query())?;
		Ok(true)
	}

	/// Applies a location change reported by the host (back/forward).
	///
	/// The location is canonicalized like a navigation target, then runs the
	/// same interceptor, commit and reconcile pipeline as
	/// [`Router::navigate`] without pushing a history entry. When a guard
	/// cancels the change or fails, the host location is restored to the
	/// current path with `replace`; when a guard redirects, the redirected
	/// path replaces the host entry. Returns whether a navigation was
	/// committed.
	///
	/// # Errors
	///
	/// Same as [`Router::navigate`].
	pub fn handle_location_change(&self, location: &str) -> RouterResult<bool> {
		let base = self.inner.settings.base_path();
		let path = resolve_target("/", &strip_base(base, location))?;
		let from = self.current_path();
		if path == from {
			return Ok(false);
		}

		let to = match self
			.inner
			.interceptors
			.intercept(&from, &path)
			.and_then(|guarded| resolve_target(&from, &guarded))
		{
			Ok(to) => to,
			Err(err) => {
				self.persist(&from, NavigationType::Replace);
				return Err(err);
			}
		};

		if to == from {
			tracing::debug!(from = %from, location, "location change cancelled, restoring");
			self.persist(&from, NavigationType::Replace);
			return Ok(false);
		}

		let history_type = if to == path {
			NavigationType::Pop
		} else {
			NavigationType::Replace
		};
		let Some(sequence) = self.commit(&from, &to, history_type) else {
			return Ok(false);
		};
		self.finish(sequence, &to, None)?;
		Ok(true)
	}

	/// Swaps the current path from `from` to `to` and persists it. Returns the
	/// navigation's sequence number, or `None` when the current path is no
	/// longer `from`.
	pub(crate) fn commit(&self, from: &str, to: &str, history_type: NavigationType) -> Option<u64> {
		let sequence = {
			let mut current = self.inner.current_path.lock();
			if *current != from {
				tracing::debug!(from, to, current = current.as_str(), "navigation superseded before commit");
				return None;
			}
			*current = to.to_string();
			self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1
		};
		tracing::debug!(from, to, ?history_type, sequence, "navigation committed");
		self.persist(to, history_type);
		Some(sequence)
	}

	fn persist(&self, path: &str, history_type: NavigationType) {
		let Some(history) = &self.inner.history else {
			return;
		};
		let location = with_base(self.inner.settings.base_path(), path);
		match history_type {
			NavigationType::Push => history.push(&location),
			NavigationType::Replace => history.replace(&location),
			NavigationType::Pop => {}
		}
	}

	fn finish(
		&self,
		sequence: u64,
		path: &str,
		query: Option<&QueryUpdate>,
	) -> RouterResult<()> {
		let changed = self
			.inner
			.stack
			.reconcile_all(path, || self.is_current(sequence))?;
		tracing::trace!(path, changed, "reconciliation finished");

		if !self.is_current(sequence) {
			tracing::debug!(path, "navigation superseded by nested navigation");
			return Ok(());
		}
		if let (Some(update), Some(sink)) = (query, &self.inner.query_sink) {
			sink.set_query_params(&update.params, update.replace);
		}
		Ok(())
	}
}

//! Registry of active router nodes and the reconciliation pass over them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{RouterError, RouterResult};
use crate::node::NodeId;

/// Type-erased view of a node, so one stack can hold nodes whose handlers
/// produce different result types.
pub(crate) trait StackEntry: Send + Sync {
	fn id(&self) -> NodeId;

	fn parent(&self) -> Option<NodeId>;

	/// Path handed to child nodes: the remainder of the last match when that
	/// match was a prefix (wildcard) route, otherwise `None`.
	fn handoff(&self) -> Option<String>;

	/// Recomputes the match for `working` (`None` forces "no match") and
	/// returns whether the outcome changed.
	fn reconcile(&self, working: Option<&str>) -> bool;

	/// Marks the node disposed. Returns `false` if it already was.
	fn dispose(&self) -> bool;

	fn is_disposed(&self) -> bool;
}

/// Active nodes keyed by id.
///
/// Ids are handed out in increasing order and a parent must exist when a
/// child is created, so iterating in id order visits parents before their
/// children.
#[derive(Default)]
pub(crate) struct RouterStack {
	nodes: Mutex<BTreeMap<NodeId, Arc<dyn StackEntry>>>,
	next_id: AtomicU64,
}

impl RouterStack {
	pub(crate) fn next_id(&self) -> NodeId {
		NodeId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
	}

	pub(crate) fn insert(&self, entry: Arc<dyn StackEntry>) {
		self.nodes.lock().insert(entry.id(), entry);
	}

	pub(crate) fn remove(&self, id: NodeId) -> Option<Arc<dyn StackEntry>> {
		self.nodes.lock().remove(&id)
	}

	pub(crate) fn get(&self, id: NodeId) -> Option<Arc<dyn StackEntry>> {
		self.nodes.lock().get(&id).cloned()
	}

	pub(crate) fn len(&self) -> usize {
		self.nodes.lock().len()
	}

	fn snapshot(&self) -> Vec<Arc<dyn StackEntry>> {
		self.nodes.lock().values().cloned().collect()
	}

	/// Resolves the working path of a node with the given parent.
	///
	/// # Errors
	///
	/// Returns [`RouterError::UnknownParentNode`] if the parent is not
	/// registered.
	pub(crate) fn working_path_for(
		&self,
		parent: Option<NodeId>,
		global: &str,
	) -> RouterResult<Option<String>> {
		match parent {
			None => Ok(Some(global.to_string())),
			Some(parent) => self
				.get(parent)
				.map(|entry| entry.handoff())
				.ok_or(RouterError::UnknownParentNode { parent }),
		}
	}

	/// Reconciles every registered node against `path`, parents first.
	///
	/// Nodes removed while the pass runs are skipped. The pass stops as soon
	/// as `still_current` reports that a nested navigation has superseded
	/// `path`. A node whose parent is missing is left untouched; the pass
	/// continues and the first such error is returned at the end.
	pub(crate) fn reconcile_all(
		&self,
		path: &str,
		still_current: impl Fn() -> bool,
	) -> RouterResult<usize> {
		let mut changed = 0;
		let mut first_error = None;

		for entry in self.snapshot() {
			if !still_current() {
				tracing::trace!(path, "reconciliation superseded by nested navigation");
				break;
			}
			if entry.is_disposed() {
				continue;
			}
			match self.working_path_for(entry.parent(), path) {
				Ok(working) => {
					if entry.reconcile(working.as_deref()) {
						changed += 1;
					}
				}
				Err(err) => {
					tracing::warn!(node = %entry.id(), error = %err, "cannot resolve router node");
					first_error.get_or_insert(err);
				}
			}
		}

		match first_error {
			Some(err) => Err(err),
			None => Ok(changed),
		}
	}
}

impl std::fmt::Debug for RouterStack {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouterStack")
			.field("nodes", &self.nodes.lock().keys().collect::<Vec<_>>())
			.finish()
	}
}

//! Navigation interceptors.
//!
//! Every navigation attempt is folded through the registered guards, most
//! recently registered first. A guard returns the next candidate path:
//! returning the candidate unchanged lets it through, returning another path
//! redirects, and returning the path the navigation started from cancels it.
//! Once a guard cancels, older guards are not consulted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{BoxError, RouterError, RouterResult};

/// Identity of one interceptor registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(u64);

impl InterceptorId {
	#[cfg(test)]
	pub(crate) fn from_raw(raw: u64) -> Self {
		Self(raw)
	}
}

impl std::fmt::Display for InterceptorId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "interceptor#{}", self.0)
	}
}

type Guard = Arc<dyn Fn(&str, &str) -> Result<String, BoxError> + Send + Sync>;

struct Entry {
	id: InterceptorId,
	key: Option<String>,
	guard: Guard,
}

#[derive(Default)]
struct ChainInner {
	/// Most recently registered first.
	entries: Mutex<Vec<Entry>>,
	next_id: AtomicU64,
}

/// Ordered registry of navigation guards.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct InterceptorChain {
	inner: Arc<ChainInner>,
}

impl std::fmt::Debug for InterceptorChain {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InterceptorChain")
			.field("ids", &self.ids())
			.finish()
	}
}

impl InterceptorChain {
	/// Creates an empty chain.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an infallible guard `(from, candidate) -> next_candidate`.
	pub fn register<G>(&self, guard: G) -> InterceptorHandle
	where
		G: Fn(&str, &str) -> String + Send + Sync + 'static,
	{
		self.insert(
			None,
			Arc::new(move |from: &str, to: &str| Ok::<String, BoxError>(guard(from, to))),
		)
	}

	/// Registers a guard that may fail. A failure aborts the navigation and
	/// is returned to the caller of `navigate`.
	pub fn register_fallible<G>(&self, guard: G) -> InterceptorHandle
	where
		G: Fn(&str, &str) -> Result<String, BoxError> + Send + Sync + 'static,
	{
		self.insert(None, Arc::new(guard))
	}

	/// Registers a guard under a caller-chosen key.
	///
	/// Registering the same key again puts the new guard in front; the older
	/// registration stays until it is removed separately.
	pub fn register_keyed<G>(&self, key: impl Into<String>, guard: G) -> InterceptorHandle
	where
		G: Fn(&str, &str) -> String + Send + Sync + 'static,
	{
		self.insert(
			Some(key.into()),
			Arc::new(move |from: &str, to: &str| Ok::<String, BoxError>(guard(from, to))),
		)
	}

	fn insert(&self, key: Option<String>, guard: Guard) -> InterceptorHandle {
		let id = InterceptorId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		tracing::debug!(%id, key = key.as_deref(), "registered interceptor");
		self.inner.entries.lock().insert(0, Entry { id, key, guard });
		InterceptorHandle {
			id,
			chain: Arc::downgrade(&self.inner),
		}
	}

	/// Removes a registration. Returns whether anything was removed.
	pub fn unregister(&self, id: InterceptorId) -> bool {
		remove_by_id(&self.inner, id)
	}

	/// Removes the most recent registration made under `key`.
	pub fn unregister_key(&self, key: &str) -> bool {
		let mut entries = self.inner.entries.lock();
		match entries.iter().position(|e| e.key.as_deref() == Some(key)) {
			Some(index) => {
				let entry = entries.remove(index);
				tracing::debug!(id = %entry.id, key, "unregistered interceptor");
				true
			}
			None => false,
		}
	}

	/// Registered ids, most recent first.
	pub fn ids(&self) -> Vec<InterceptorId> {
		self.inner.entries.lock().iter().map(|e| e.id).collect()
	}

	/// Number of registered guards.
	pub fn len(&self) -> usize {
		self.inner.entries.lock().len()
	}

	/// Whether no guard is registered.
	pub fn is_empty(&self) -> bool {
		self.inner.entries.lock().is_empty()
	}

	fn is_registered(&self, id: InterceptorId) -> bool {
		self.inner.entries.lock().iter().any(|e| e.id == id)
	}

	/// Folds `to` through every guard and returns the resolved path.
	///
	/// Guards run without the registry locked, so a guard may register,
	/// unregister or navigate. A guard removed while the fold is running is
	/// skipped.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InterceptorFailure`] if a fallible guard fails.
	pub fn intercept(&self, from: &str, to: &str) -> RouterResult<String> {
		let snapshot: Vec<(InterceptorId, Guard)> = self
			.inner
			.entries
			.lock()
			.iter()
			.map(|e| (e.id, Arc::clone(&e.guard)))
			.collect();

		let mut candidate = to.to_string();
		for (id, guard) in snapshot {
			if candidate == from {
				break;
			}
			if !self.is_registered(id) {
				continue;
			}
			let next =
				guard(from, &candidate).map_err(|source| RouterError::InterceptorFailure {
					interceptor: id,
					from: from.to_string(),
					to: candidate.clone(),
					source,
				})?;
			if next != candidate {
				tracing::debug!(
					%id,
					from,
					to = %candidate,
					next = %next,
					"interceptor changed navigation target"
				);
			}
			candidate = next;
		}
		Ok(candidate)
	}
}

fn remove_by_id(inner: &ChainInner, id: InterceptorId) -> bool {
	let mut entries = inner.entries.lock();
	match entries.iter().position(|e| e.id == id) {
		Some(index) => {
			entries.remove(index);
			tracing::debug!(%id, "unregistered interceptor");
			true
		}
		None => false,
	}
}

/// Handle returned by interceptor registration.
///
/// Dropping the handle does not unregister the guard.
#[derive(Debug, Clone)]
pub struct InterceptorHandle {
	id: InterceptorId,
	chain: Weak<ChainInner>,
}

impl InterceptorHandle {
	/// The registration's id.
	pub fn id(&self) -> InterceptorId {
		self.id
	}

	/// Removes the guard. Calling it again has no effect.
	pub fn unregister(&self) -> bool {
		self.chain
			.upgrade()
			.is_some_and(|inner| remove_by_id(&inner, self.id))
	}
}

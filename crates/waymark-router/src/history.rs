//! Host location / history backends.
//!
//! The engine treats the host's location as an opaque "current path" slot.
//! Interactive hosts implement [`HistoryBackend`]; non-interactive hosts can
//! either use [`MemoryHistory`] or configure no backend at all, in which case
//! the router keeps the current path purely in memory.

use parking_lot::Mutex;

/// How a location change reached the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationType {
	/// New history entry.
	Push,
	/// Current history entry replaced.
	Replace,
	/// Back/forward traversal reported by the host.
	Pop,
}

/// The host's location/history mechanism.
pub trait HistoryBackend: Send + Sync {
	/// Current location, if the host has one.
	fn location(&self) -> Option<String>;

	/// Appends a new history entry.
	fn push(&self, location: &str);

	/// Replaces the current history entry.
	fn replace(&self, location: &str);
}

#[derive(Debug)]
struct Entries {
	stack: Vec<String>,
	index: usize,
}

/// In-memory history stack.
#[derive(Debug)]
pub struct MemoryHistory {
	entries: Mutex<Entries>,
}

impl MemoryHistory {
	/// Creates a history with a single entry.
	pub fn new(initial: impl Into<String>) -> Self {
		Self {
			entries: Mutex::new(Entries {
				stack: vec![initial.into()],
				index: 0,
			}),
		}
	}

	/// Moves one entry back and returns the new location, if any.
	///
	/// Like a browser, this only moves the cursor; the router learns about it
	/// through [`Router::handle_location_change`](crate::Router::handle_location_change).
	pub fn back(&self) -> Option<String> {
		let mut entries = self.entries.lock();
		if entries.index == 0 {
			return None;
		}
		entries.index -= 1;
		Some(entries.stack[entries.index].clone())
	}

	/// Moves one entry forward and returns the new location, if any.
	pub fn forward(&self) -> Option<String> {
		let mut entries = self.entries.lock();
		if entries.index + 1 >= entries.stack.len() {
			return None;
		}
		entries.index += 1;
		Some(entries.stack[entries.index].clone())
	}

	/// All entries, oldest first.
	pub fn entries(&self) -> Vec<String> {
		self.entries.lock().stack.clone()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.lock().stack.len()
	}

	/// Always false; a history holds at least its initial entry.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().stack.is_empty()
	}
}

impl Default for MemoryHistory {
	fn default() -> Self {
		Self::new("/")
	}
}

impl HistoryBackend for MemoryHistory {
	fn location(&self) -> Option<String> {
		let entries = self.entries.lock();
		entries.stack.get(entries.index).cloned()
	}

	fn push(&self, location: &str) {
		let mut entries = self.entries.lock();
		let keep = entries.index + 1;
		entries.stack.truncate(keep);
		entries.stack.push(location.to_string());
		entries.index = entries.stack.len() - 1;
	}

	fn replace(&self, location: &str) {
		let mut entries = self.entries.lock();
		let index = entries.index;
		entries.stack[index] = location.to_string();
	}
}

/// Joins a base path and a router path into a host location.
pub(crate) fn with_base(base: &str, path: &str) -> String {
	if base.is_empty() {
		path.to_string()
	} else {
		format!("{}{}", base, path)
	}
}

/// Strips the base path from a host location. Locations outside the base
/// are returned unchanged.
pub(crate) fn strip_base(base: &str, location: &str) -> String {
	if base.is_empty() {
		return location.to_string();
	}
	match location.strip_prefix(base) {
		Some("") => "/".to_string(),
		Some(rest) if rest.starts_with('/') => rest.to_string(),
		_ => location.to_string(),
	}
}

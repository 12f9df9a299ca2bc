//! Interceptor that hands the navigation decision to the caller.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RouterResult;
use crate::interceptor::InterceptorHandle;
use crate::router::Router;

/// Cancels every navigation and remembers its target until the caller
/// decides what to do with it.
///
/// Typical use is a "discard unsaved changes?" prompt: show the prompt while
/// [`intercepted_path`](Self::intercepted_path) is set, then either
/// [`confirm`](Self::confirm) or [`reset`](Self::reset).
///
/// # Example
///
/// ```
/// use waymark_router::{ControlledInterceptor, Router};
///
/// let router = Router::new();
/// let guard = ControlledInterceptor::new(&router);
///
/// router.navigate("/leave").unwrap();
/// assert_eq!(router.current_path(), "/");
/// assert_eq!(guard.intercepted_path().as_deref(), Some("/leave"));
///
/// guard.confirm().unwrap();
/// assert_eq!(router.current_path(), "/leave");
/// ```
#[derive(Debug)]
pub struct ControlledInterceptor {
	router: Router,
	handle: InterceptorHandle,
	intercepted: Arc<Mutex<Option<String>>>,
}

impl ControlledInterceptor {
	/// Registers the interceptor on `router`.
	pub fn new(router: &Router) -> Self {
		let intercepted = Arc::new(Mutex::new(None));
		let slot = Arc::clone(&intercepted);
		let handle = router.register_interceptor(move |from, to| {
			*slot.lock() = Some(to.to_string());
			from.to_string()
		});
		Self {
			router: router.clone(),
			handle,
			intercepted,
		}
	}

	/// Target of the last cancelled navigation.
	pub fn intercepted_path(&self) -> Option<String> {
		self.intercepted.lock().clone()
	}

	/// Stops intercepting and navigates to the last intercepted target.
	/// Returns whether a navigation was committed.
	///
	/// # Errors
	///
	/// Any error from [`Router::navigate`].
	pub fn confirm(&self) -> RouterResult<bool> {
		self.handle.unregister();
		let target = self.intercepted.lock().take();
		match target {
			Some(target) => self.router.navigate(target),
			None => Ok(false),
		}
	}

	/// Forgets the intercepted target; interception continues.
	pub fn reset(&self) {
		self.intercepted.lock().take();
	}

	/// Stops intercepting without navigating.
	pub fn stop(&self) -> bool {
		self.handle.unregister()
	}
}

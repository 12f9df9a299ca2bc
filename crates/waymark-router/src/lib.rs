//! Client-side navigation engine.
//!
//! A [`Router`] owns the current path, an [`InterceptorChain`] that gates
//! every path transition, and a stack of router nodes. Each node holds an
//! ordered [`RouteTable`]; on every committed navigation each node matches its
//! working path (first match wins), invokes the matched handler once per
//! distinct outcome, and notifies its subscribers only when the outcome
//! changed.
//!
//! Nodes nest: a node created under a parent only receives a working path
//! while the parent is matched by a wildcard route such as `/cat/:id*`, and
//! then matches against the remainder the parent left over.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use waymark_router::{RouteTable, Router};
//!
//! type Greeter = Arc<dyn Fn(&str) -> String + Send + Sync>;
//!
//! let router = Router::new();
//! let parent = router
//! 	.create_node(
//! 		None,
//! 		RouteTable::new()
//! 			.route("/", |_| "home".to_string())
//! 			.route("/cat/:id*", |p| format!("cat {}", p.get("id").unwrap_or_default())),
//! 	)
//! 	.unwrap();
//! let child = router
//! 	.create_node(
//! 		Some(parent.id()),
//! 		RouteTable::new().route("/", |_| -> Greeter {
//! 			Arc::new(|name: &str| format!("Welcome to {}", name))
//! 		}),
//! 	)
//! 	.unwrap();
//!
//! router.navigate("/cat/foo/").unwrap();
//! assert_eq!(parent.result().as_deref(), Some("cat foo"));
//! let greet = child.result().unwrap();
//! assert_eq!(greet("foo"), "Welcome to foo");
//! ```
//!
//! ## Pattern Grammar
//!
//! - `:name` captures one path segment; names are `[A-Za-z_][A-Za-z0-9_]*`
//! - `*` as the last character makes a prefix route that hands the rest of
//!   the path to nested nodes; as the first character it drops the start
//!   anchor; `*` alone matches everything
//! - everything else is literal text
//!
//! ## Re-entrancy
//!
//! Guards, handlers and subscribers run without internal locks held and may
//! navigate, register interceptors or dispose nodes. A nested navigation
//! supersedes the one that triggered it.

pub mod controlled;
pub mod error;
pub mod history;
pub mod interceptor;
pub mod navigation;
pub mod node;
pub mod params;
pub mod pattern;
pub mod router;
pub mod settings;

mod stack;

pub use controlled::ControlledInterceptor;
pub use error::{BoxError, PathError, RouterError, RouterResult};
pub use history::{HistoryBackend, MemoryHistory, NavigationType};
pub use interceptor::{InterceptorChain, InterceptorHandle, InterceptorId};
pub use navigation::{MemoryQueryParams, NavigationIntent, QueryParamSink, QueryParams, QueryUpdate};
pub use node::{NodeHandle, NodeId, NodeStatus, RouteChange, RouteHandler, RouteTable, SubscriptionId};
pub use params::PathParams;
pub use pattern::{CompiledMatcher, PatternCompiler, PatternMatch};
pub use router::{Router, RouterBuilder};
pub use settings::RouterSettings;

/// Re-export commonly used types
pub mod prelude {
	pub use crate::{
		ControlledInterceptor, NavigationIntent, NodeHandle, NodeId, PathParams, RouteChange,
		RouteTable, Router, RouterError, RouterResult, RouterSettings,
	};
}

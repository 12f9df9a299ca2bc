//! # Waymark
//!
//! Client-side navigation engine: route patterns with parameter capture,
//! nested router nodes that each own a sub-segment of the path, and an
//! interceptor chain that can cancel or redirect every navigation.
//!
//! This crate is a facade over [`waymark_router`]; everything lives there and
//! is re-exported here.
//!
//! ```
//! use waymark::prelude::*;
//!
//! let router = Router::new();
//! let node = router
//! 	.create_node(None, RouteTable::new().route("/users/:id", |p| p.parse::<u64>("id").ok()))
//! 	.unwrap();
//!
//! router.navigate("/users/42").unwrap();
//! assert_eq!(node.result(), Some(Some(42)));
//! ```

pub use waymark_router::*;

/// Re-export commonly used types
pub mod prelude {
	pub use waymark_router::prelude::*;
}

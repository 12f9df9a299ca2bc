//! Router configuration.

use serde::Deserialize;

use crate::error::{RouterError, RouterResult};

/// Settings for one routing tree.
///
/// # Examples
///
/// ```
/// use waymark_router::RouterSettings;
///
/// let settings = RouterSettings::from_toml_str(
/// 	r#"
/// 	base_path = "/app"
/// 	initial_path = "/login"
/// 	"#,
/// )
/// .unwrap();
/// assert_eq!(settings.base_path(), "/app");
///
/// let custom = RouterSettings::default().with_initial_path("/home");
/// assert_eq!(custom.initial_path(), "/home");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterSettings {
	base_path: String,
	initial_path: String,
}

impl Default for RouterSettings {
	fn default() -> Self {
		Self {
			base_path: String::new(),
			initial_path: "/".to_string(),
		}
	}
}

impl RouterSettings {
	/// Parses settings from a TOML document and validates them.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidSettings`] if the document does not parse
	/// or a value fails validation.
	pub fn from_toml_str(input: &str) -> RouterResult<Self> {
		let settings: Self =
			toml::from_str(input).map_err(|e| RouterError::InvalidSettings(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}

	/// Sets the base path prepended to every persisted location.
	pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
		self.base_path = base_path.into();
		self
	}

	/// Sets the path used when the host has no location.
	pub fn with_initial_path(mut self, initial_path: impl Into<String>) -> Self {
		self.initial_path = initial_path.into();
		self
	}

	/// Base path; empty when the router owns the whole location.
	pub fn base_path(&self) -> &str {
		&self.base_path
	}

	/// Path used when the host has no location.
	pub fn initial_path(&self) -> &str {
		&self.initial_path
	}

	/// Checks the invariants the router relies on.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidSettings`] if the base path is neither
	/// empty nor an absolute path without a trailing slash, or if the initial
	/// path is not absolute.
	pub fn validate(&self) -> RouterResult<()> {
		if !self.base_path.is_empty()
			&& (!self.base_path.starts_with('/') || self.base_path.ends_with('/'))
		{
			return Err(RouterError::InvalidSettings(format!(
				"base_path '{}' must start with '/' and must not end with '/'",
				self.base_path
			)));
		}
		if !self.initial_path.starts_with('/') {
			return Err(RouterError::InvalidSettings(format!(
				"initial_path '{}' must start with '/'",
				self.initial_path
			)));
		}
		Ok(())
	}
}

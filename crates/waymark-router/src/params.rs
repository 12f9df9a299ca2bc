//! Path parameters captured by a matched route pattern.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::PathError;

/// Parameters extracted from a path by a compiled matcher.
///
/// Holds both the named mapping and the values in the order their
/// placeholders appear in the pattern. Equality only considers the named
/// mapping, so two captures compare equal regardless of key order.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
	params: HashMap<String, String>,
	values: Vec<String>,
}

impl PathParams {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds parameters by zipping names with captured values in order.
	pub(crate) fn from_captures<'a>(
		names: &[String],
		values: impl IntoIterator<Item = &'a str>,
	) -> Self {
		let values: Vec<String> = values.into_iter().map(str::to_string).collect();
		let params = names.iter().cloned().zip(values.iter().cloned()).collect();
		Self { params, values }
	}

	/// Returns the raw value of a parameter.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}

	/// Parses a parameter into a typed value.
	///
	/// # Errors
	///
	/// Returns [`PathError::Missing`] if the parameter was not captured and
	/// [`PathError::ParseError`] if the value does not parse as `T`.
	pub fn parse<T>(&self, name: &str) -> Result<T, PathError>
	where
		T: FromStr,
		T::Err: std::fmt::Display,
	{
		let raw = self
			.get(name)
			.ok_or_else(|| PathError::Missing(name.to_string()))?;
		raw.parse::<T>().map_err(|e| PathError::ParseError {
			name: name.to_string(),
			param_type: std::any::type_name::<T>(),
			raw_value: raw.to_string(),
			reason: e.to_string(),
		})
	}

	/// Captured values in pattern order.
	pub fn values(&self) -> &[String] {
		&self.values
	}

	/// Iterates over `(name, value)` pairs in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Number of captured parameters.
	pub fn len(&self) -> usize {
		self.params.len()
	}

	/// Whether no parameters were captured.
	pub fn is_empty(&self) -> bool {
		self.params.is_empty()
	}
}

impl PartialEq for PathParams {
	fn eq(&self, other: &Self) -> bool {
		self.params == other.params
	}
}

impl Eq for PathParams {}

impl<K, V> FromIterator<(K, V)> for PathParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut out = Self::new();
		for (k, v) in iter {
			let v = v.into();
			out.values.push(v.clone());
			out.params.insert(k.into(), v);
		}
		out
	}
}

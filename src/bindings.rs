//! Ordered mapping of output columns to directory attributes.
use serde_json::Value;

use crate::error::MalformedBindingError;

/// The columns exported when the settings do not declare any bindings.
const DEFAULT_BINDINGS: [(&str, &str); 3] =
	[("domain_name", "sAMAccountName"), ("unit", "department"), ("email", "mail")];

/// An ordered mapping from logical field name (the output column) to the name
/// of the directory attribute holding its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBindings(Vec<(String, String)>);

impl FieldBindings {
	/// Iterate over `(logical_name, attribute)` pairs in column order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(name, attr)| (name.as_str(), attr.as_str()))
	}

	/// The logical field names in column order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.iter().map(|(name, _)| name)
	}

	/// The distinct directory attributes referenced by the bindings, in column
	/// order. This is the attribute list requested from the server.
	#[must_use]
	pub fn attributes(&self) -> Vec<String> {
		let mut attributes: Vec<String> = Vec::with_capacity(self.0.len());
		for (_, attr) in self.iter() {
			if !attributes.iter().any(|known| known.eq_ignore_ascii_case(attr)) {
				attributes.push(attr.to_owned());
			}
		}
		attributes
	}

	/// Serialize into the settings file representation
	/// `{name: [index, attribute]}`, numbering the bindings from zero.
	#[must_use]
	pub fn to_json(&self) -> Value {
		self.0
			.iter()
			.enumerate()
			.map(|(index, (name, attr))| {
				(name.clone(), Value::from(vec![Value::from(index), Value::from(attr.as_str())]))
			})
			.collect::<serde_json::Map<_, _>>()
			.into()
	}
}

impl Default for FieldBindings {
	fn default() -> Self {
		DEFAULT_BINDINGS.into_iter().collect()
	}
}

impl<N: Into<String>, A: Into<String>> FromIterator<(N, A)> for FieldBindings {
	fn from_iter<T: IntoIterator<Item = (N, A)>>(iter: T) -> Self {
		Self(iter.into_iter().map(|(name, attr)| (name.into(), attr.into())).collect())
	}
}

/// Parse the `field_bindings` payload of a settings document.
///
/// Returns `Ok(None)` when the payload is absent, `null` or an empty mapping,
/// in which case the caller should fall back to [`FieldBindings::default`].
/// Otherwise the bindings are ordered by their declared index; bindings
/// sharing an index keep their order of appearance in the document.
pub fn resolve_bindings(
	raw: Option<&Value>,
) -> Result<Option<FieldBindings>, MalformedBindingError> {
	let map = match raw {
		None | Some(Value::Null) => return Ok(None),
		Some(Value::Object(map)) if map.is_empty() => return Ok(None),
		Some(Value::Object(map)) => map,
		Some(_) => {
			return Err(MalformedBindingError {
				name: String::new(),
				reason: "field bindings must be a mapping",
			})
		}
	};

	let mut parsed = Vec::with_capacity(map.len());
	for (name, value) in map {
		let malformed = |reason| MalformedBindingError { name: name.clone(), reason };
		let Value::Array(pair) = value else {
			return Err(malformed("expected an [index, attribute] pair"));
		};
		let [index, attr, ..] = pair.as_slice() else {
			return Err(malformed("expected an [index, attribute] pair"));
		};
		let index = index.as_i64().ok_or_else(|| malformed("the index must be an integer"))?;
		let attr = attr.as_str().ok_or_else(|| malformed("the attribute must be a string"))?;
		parsed.push((index, name.clone(), attr.to_owned()));
	}

	// Stable, so equal indices keep document order.
	parsed.sort_by_key(|(index, _, _)| *index);
	Ok(Some(parsed.into_iter().map(|(_, name, attr)| (name, attr)).collect()))
}

//! Directory entries as returned by a search, and the sources yielding them.
use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ldap3::SearchEntry;

use crate::error::Error;

/// A single entry returned by the directory server.
///
/// Attribute names are matched case-insensitively, like attribute descriptions
/// in LDAP. Values which are not valid UTF-8 are stored base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
	/// Distinguished name of the entry
	dn: String,
	/// Attribute values, keyed by the lowercased attribute name
	attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
	/// Create an entry without any attributes.
	#[must_use]
	pub fn new(dn: impl Into<String>) -> Self {
		Self { dn: dn.into(), attrs: HashMap::new() }
	}

	/// Add values for an attribute, replacing any previous ones.
	#[must_use]
	pub fn with_attr<V: Into<String>>(
		mut self,
		attr: &str,
		values: impl IntoIterator<Item = V>,
	) -> Self {
		self.attrs.insert(attr.to_ascii_lowercase(), values.into_iter().map(Into::into).collect());
		self
	}

	/// The distinguished name of the entry.
	#[must_use]
	pub fn dn(&self) -> &str {
		&self.dn
	}

	/// All values of an attribute, or `None` if the entry does not carry the
	/// attribute at all. An attribute may be present with no values.
	#[must_use]
	pub fn get(&self, attr: &str) -> Option<&[String]> {
		self.attrs.get(&attr.to_ascii_lowercase()).map(Vec::as_slice)
	}
}

impl From<SearchEntry> for DirectoryEntry {
	fn from(entry: SearchEntry) -> Self {
		let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
		for (attr, values) in entry.attrs {
			attrs.entry(attr.to_ascii_lowercase()).or_default().extend(values);
		}
		for (attr, values) in entry.bin_attrs {
			attrs
				.entry(attr.to_ascii_lowercase())
				.or_default()
				.extend(values.iter().map(|value| STANDARD.encode(value)));
		}
		Self { dn: entry.dn, attrs }
	}
}

/// A forward-only, single-pass producer of directory entries.
#[async_trait]
pub trait EntrySource {
	/// Pull the next entry. `Ok(None)` marks the end of the sequence.
	async fn next_entry(&mut self) -> Result<Option<DirectoryEntry>, Error>;
}

#[async_trait]
impl EntrySource for VecDeque<DirectoryEntry> {
	async fn next_entry(&mut self) -> Result<Option<DirectoryEntry>, Error> {
		Ok(self.pop_front())
	}
}

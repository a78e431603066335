//! Export person entries from an LDAP directory server to a CSV file.
//!
//! A run resolves [`Settings`] from a JSON settings file and command line
//! [`Overrides`], binds to the directory server, performs a paged search and
//! writes one CSV row per entry. Which attributes end up in which column is
//! controlled by the [`FieldBindings`]: an ordered mapping from output column
//! name to directory attribute. Entries lacking any of the bound attributes are
//! skipped rather than failing the run.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//!
//! use ldap_export::{import, Overrides, Settings};
//!
//! let settings = Settings::resolve(
//!     &Overrides::default(),
//!     r#"{
//!         "ldap_username": "cn=admin,dc=example,dc=org",
//!         "ldap_password": "verysecret",
//!         "ldap_server": "localhost",
//!         "ldap_port": 636,
//!         "use_ssl": true,
//!         "search_base": "ou=people,dc=example,dc=org",
//!         "field_bindings": {
//!             "login": [1, "uid"],
//!             "email": [2, "mail"]
//!         }
//!     }"#,
//! )?;
//!
//! let summary = import(&settings, Path::new("users.csv")).await?;
//! println!("{} of {} entries saved", summary.saved, summary.seen);
//! # Ok(())
//! # }
//! ```
//!
//! # Output format
//! Rows are separated by CRLF and columns by `;`. There is no header row.
//! Values containing the delimiter, a double quote or a line break are quoted,
//! with embedded quotes doubled.

pub mod bindings;
mod certificate;
pub mod entry;
pub mod error;
pub mod export;
mod import;
pub mod ldap;
pub mod settings;

pub use ldap3;

pub use crate::{
	bindings::{resolve_bindings, FieldBindings},
	entry::{DirectoryEntry, EntrySource},
	error::{Error, MalformedBindingError, SettingsError},
	export::ExportSummary,
	import::import,
	ldap::PagedEntries,
	settings::{ConnectionConfig, Overrides, Settings, TLSConfig},
};

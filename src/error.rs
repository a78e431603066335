//! Error codes

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The connection to the directory server could not be established.
	#[error("Failed to connect to the server: {0}")]
	Connect(#[source] ldap3::LdapError),
	/// The server rejected the credentials or the bind operation failed.
	#[error("Failed to bind as {user}: {source}")]
	Bind {
		/// The user the bind was attempted with
		user: String,
		/// The underlying protocol error
		#[source]
		source: ldap3::LdapError,
	},
	/// The password is empty, which the server would accept as an anonymous
	/// bind. Nothing has been sent to the server.
	#[error("Refusing to bind as {user} with an empty password")]
	EmptyPassword {
		/// The user the bind would have been attempted with
		user: String,
	},
	/// The search could not be started, or failed while retrieving entries.
	#[error("Failed to retrieve directory entries: {0}")]
	Search(#[source] ldap3::LdapError),
	/// The output file could not be opened or written to.
	#[error("Failed to write the output file: {0}")]
	Output(#[from] csv::Error),
	/// Retrieving the server certificate for the preview failed.
	#[error("Failed to fetch the server certificate: {0}")]
	Certificate(String),
	/// The contents of a configuration value did not conform to the expected
	/// syntax.
	#[error("Malformed data: {0}")]
	Invalid(String),
	/// Serializing settings failed.
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	/// Filesystem or socket I/O failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Errors produced while resolving [`Settings`](crate::Settings).
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
	/// The settings file could not be read.
	#[error("Failed to read {path}: {source}")]
	Read {
		/// Path of the settings file
		path: String,
		/// The underlying I/O error
		#[source]
		source: std::io::Error,
	},
	/// The settings document is not valid JSON, or not a JSON object.
	#[error("Failed to parse settings: {0}")]
	Parse(#[from] serde_json::Error),
	/// A required field is missing and was not given on the command line.
	#[error("Can't find {0} in the settings")]
	Missing(&'static str),
	/// A field is present but has the wrong type or an out-of-range value.
	#[error("Invalid value for {field}: expected {expected}")]
	InvalidValue {
		/// Name of the offending field
		field: &'static str,
		/// Description of the accepted values
		expected: &'static str,
	},
	/// The field bindings could not be parsed.
	#[error(transparent)]
	MalformedBinding(#[from] MalformedBindingError),
}

/// A field binding entry was not of the form `name: [index, attribute]`. The
/// whole binding set is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed field binding {name:?}: {reason}")]
pub struct MalformedBindingError {
	/// Logical name of the offending binding, empty if the payload itself was
	/// not a mapping
	pub name: String,
	/// What is wrong with it
	pub reason: &'static str,
}

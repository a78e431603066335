//! Settings for an export run, resolved from a JSON document and command line
//! overrides.
use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use ldap3::LdapConnSettings;
use native_tls::{Certificate, TlsConnector};
use serde::{Deserialize, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Value};
use tracing::debug;
use url::Url;

use crate::{
	bindings::{resolve_bindings, FieldBindings},
	error::{Error, SettingsError},
};

/// Password value requesting an interactive prompt.
pub const PASSWORD_PROMPT: &str = "*";

/// Filter selecting the entries to export unless the settings name another.
pub const DEFAULT_SEARCH_FILTER: &str = "(objectClass=person)";

/// Number of entries requested per page unless the settings name another.
pub const DEFAULT_PAGE_SIZE: i32 = 10;

/// The resolved configuration of one export run.
///
/// A value is produced once by [`Settings::resolve`] (or
/// [`Settings::default`]) and not modified afterwards, except for supplying
/// an interactively entered password with [`Settings::with_password`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	/// The user to bind as
	username: String,
	/// The password to bind with, or [`PASSWORD_PROMPT`]
	password: String,
	/// Hostname or IP address of the directory server
	host: String,
	/// Port of the directory server
	port: u16,
	/// Whether to connect over TLS
	use_tls: bool,
	/// The DN under which to search
	search_base: String,
	/// The filter selecting exported entries
	search_filter: String,
	/// Entries per page of the paged search
	page_size: i32,
	/// Output columns and the attributes they are read from
	field_bindings: FieldBindings,
	/// Timeouts and TLS parameters
	connection: ConnectionConfig,
}

/// Values given on the command line. Each one that is set takes precedence
/// over the settings document.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	/// Replaces `ldap_username`
	pub username: Option<String>,
	/// Replaces `ldap_password`
	pub password: Option<String>,
	/// Replaces `ldap_server`
	pub server: Option<String>,
	/// Replaces `ldap_port`
	pub port: Option<u16>,
	/// Replaces `search_base`
	pub search_base: Option<String>,
}

/// Configuration for how to connect to the LDAP server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
	/// Timeout to establish a connection and to bind, in seconds.
	pub timeout: u64,

	/// TLS config
	pub tls: TLSConfig,
}

/// TLS Configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TLSConfig {
	/// Use StartTLS extended operation for establishing a secure connection,
	/// rather than TLS on a dedicated port.
	pub starttls: bool,

	/// Disable verification of TLS certificates
	pub no_tls_verify: bool,

	/// TLS root certificates path
	#[serde(skip_serializing_if = "Option::is_none")]
	pub root_certificates_path: Option<PathBuf>,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self { timeout: 10, tls: TLSConfig::default() }
	}
}

impl ConnectionConfig {
	/// The connect and bind timeout.
	#[must_use]
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout)
	}

	/// Create a [`LdapConnSettings`] based on this [`ConnectionConfig`]
	pub(crate) async fn to_settings(&self) -> Result<LdapConnSettings, Error> {
		let mut settings = LdapConnSettings::new();

		settings = settings.set_conn_timeout(self.timeout());
		settings = settings.set_starttls(self.tls.starttls);
		settings = settings.set_no_tls_verify(self.tls.no_tls_verify);

		if let Some(path) = &self.tls.root_certificates_path {
			let mut connector = TlsConnector::builder();

			let root_certificate =
				Certificate::from_pem(tokio::fs::read(path).await?.as_slice())
					.map_err(|_| Error::Invalid("Could not read root certificate".to_owned()))?;
			connector.add_root_certificate(root_certificate);
			connector.danger_accept_invalid_certs(self.tls.no_tls_verify);

			let connector = connector.build().map_err(|_| {
				Error::Invalid("Could not build TlsConnector with custom root certs".to_owned())
			})?;
			settings = settings.set_connector(connector);
		}
		Ok(settings)
	}
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			username: "EXAMPLE\\user42".to_owned(),
			password: PASSWORD_PROMPT.to_owned(),
			host: "dc.example.com".to_owned(),
			port: 636,
			use_tls: true,
			search_base: "OU=Company,DC=example,DC=com".to_owned(),
			search_filter: DEFAULT_SEARCH_FILTER.to_owned(),
			page_size: DEFAULT_PAGE_SIZE,
			field_bindings: FieldBindings::default(),
			connection: ConnectionConfig::default(),
		}
	}
}

impl Settings {
	/// Read the settings file at `path` and resolve it with
	/// [`Settings::resolve`].
	pub fn from_file(path: &Path, overrides: &Overrides) -> Result<Self, SettingsError> {
		debug!("Passed JSON file with settings: {}", path.display());
		let document = std::fs::read_to_string(path)
			.map_err(|source| SettingsError::Read { path: path.display().to_string(), source })?;
		Self::resolve(overrides, &document)
	}

	/// Merge a JSON settings document with command line overrides.
	///
	/// Every required key must be present in the document unless it is
	/// overridden; the first one missing is reported. No partially resolved
	/// settings are ever returned. Never prompts, even if the password is
	/// [`PASSWORD_PROMPT`].
	pub fn resolve(overrides: &Overrides, document: &str) -> Result<Self, SettingsError> {
		let document: Map<String, Value> = serde_json::from_str(document)?;

		let username = required(
			&document,
			"ldap_username",
			overrides.username.as_ref(),
			"a string",
			as_string,
		)?;
		let password = required(
			&document,
			"ldap_password",
			overrides.password.as_ref(),
			"a string",
			as_string,
		)?;
		let host =
			required(&document, "ldap_server", overrides.server.as_ref(), "a string", as_string)?;
		let port = required(
			&document,
			"ldap_port",
			overrides.port.as_ref(),
			"a port number between 1 and 65535",
			|value| {
				value.as_u64().and_then(|port| u16::try_from(port).ok()).filter(|&port| port != 0)
			},
		)?;
		let use_tls = required(&document, "use_ssl", None, "a boolean", Value::as_bool)?;
		let search_base = required(
			&document,
			"search_base",
			overrides.search_base.as_ref(),
			"a string",
			as_string,
		)?;
		let field_bindings =
			document.get("field_bindings").ok_or(SettingsError::Missing("field_bindings"))?;
		let field_bindings = resolve_bindings(Some(field_bindings))?.unwrap_or_else(|| {
			debug!("No field bindings given, using the default bindings.");
			FieldBindings::default()
		});

		let search_filter = optional(&document, "search_filter", "a string", as_string)?
			.unwrap_or_else(|| DEFAULT_SEARCH_FILTER.to_owned());
		let page_size = optional(&document, "page_size", "a positive page size", |value| {
			value.as_i64().and_then(|size| i32::try_from(size).ok()).filter(|size| *size > 0)
		})?
		.unwrap_or(DEFAULT_PAGE_SIZE);
		let connection = optional(&document, "connection", "a connection object", |value| {
			serde_json::from_value::<ConnectionConfig>(value.clone()).ok()
		})?
		.unwrap_or_default();

		Ok(Self {
			username,
			password,
			host,
			port,
			use_tls,
			search_base,
			search_filter,
			page_size,
			field_bindings,
			connection,
		})
	}

	/// Serialize as a settings document, the inverse of [`Settings::resolve`].
	/// Keys are sorted and indented by four spaces.
	pub fn to_json(&self) -> Result<String, Error> {
		let mut document = Map::new();
		document.insert("connection".to_owned(), serde_json::to_value(&self.connection)?);
		document.insert("field_bindings".to_owned(), self.field_bindings.to_json());
		document.insert("ldap_password".to_owned(), self.password.clone().into());
		document.insert("ldap_port".to_owned(), self.port.into());
		document.insert("ldap_server".to_owned(), self.host.clone().into());
		document.insert("ldap_username".to_owned(), self.username.clone().into());
		document.insert("page_size".to_owned(), self.page_size.into());
		document.insert("search_base".to_owned(), self.search_base.clone().into());
		document.insert("search_filter".to_owned(), self.search_filter.clone().into());
		document.insert("use_ssl".to_owned(), self.use_tls.into());

		let mut out = Vec::new();
		let mut serializer =
			serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
		document.serialize(&mut serializer)?;
		String::from_utf8(out).map_err(|err| Error::Invalid(err.to_string()))
	}

	/// Whether the password has to be entered interactively before binding.
	#[must_use]
	pub fn needs_password_prompt(&self) -> bool {
		self.password == PASSWORD_PROMPT
	}

	/// Replace the password, typically with one entered interactively.
	#[must_use]
	pub fn with_password(self, password: String) -> Self {
		Self { password, ..self }
	}

	/// The user to bind as.
	#[must_use]
	pub fn username(&self) -> &str {
		&self.username
	}

	/// The password to bind with.
	#[must_use]
	pub fn password(&self) -> &str {
		&self.password
	}

	/// Hostname or IP address of the directory server.
	#[must_use]
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Port of the directory server.
	#[must_use]
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Whether to connect over TLS.
	#[must_use]
	pub fn use_tls(&self) -> bool {
		self.use_tls
	}

	/// The DN under which to search.
	#[must_use]
	pub fn search_base(&self) -> &str {
		&self.search_base
	}

	/// The filter selecting exported entries.
	#[must_use]
	pub fn search_filter(&self) -> &str {
		&self.search_filter
	}

	/// Entries per page of the paged search.
	#[must_use]
	pub fn page_size(&self) -> i32 {
		self.page_size
	}

	/// Output columns and the attributes they are read from.
	#[must_use]
	pub fn field_bindings(&self) -> &FieldBindings {
		&self.field_bindings
	}

	/// Timeouts and TLS parameters.
	#[must_use]
	pub fn connection(&self) -> &ConnectionConfig {
		&self.connection
	}

	/// The URL to connect to. Uses the `ldaps` scheme for TLS on a dedicated
	/// port, `ldap` otherwise (including StartTLS).
	pub fn url(&self) -> Result<Url, Error> {
		let scheme = if self.use_tls && !self.connection.tls.starttls { "ldaps" } else { "ldap" };
		let host = if self.host.contains(':') && !self.host.starts_with('[') {
			format!("[{}]", self.host)
		} else {
			self.host.clone()
		};
		Url::parse(&format!("{scheme}://{host}:{}", self.port))
			.map_err(|err| Error::Invalid(format!("Invalid server address {}: {err}", self.host)))
	}
}

/// Read a required field, preferring the command line value.
fn required<T: Clone>(
	document: &Map<String, Value>,
	field: &'static str,
	overridden: Option<&T>,
	expected: &'static str,
	convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<T, SettingsError> {
	if let Some(value) = overridden {
		debug!("Using {field} from command line parameters.");
		return Ok(value.clone());
	}
	let value = document.get(field).ok_or(SettingsError::Missing(field))?;
	convert(value).ok_or(SettingsError::InvalidValue { field, expected })
}

/// Read a field that may be left out of the document.
fn optional<T>(
	document: &Map<String, Value>,
	field: &'static str,
	expected: &'static str,
	convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<Option<T>, SettingsError> {
	document
		.get(field)
		.map(|value| convert(value).ok_or(SettingsError::InvalidValue { field, expected }))
		.transpose()
}

/// Converter for string fields.
fn as_string(value: &Value) -> Option<String> {
	value.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used)]

	use std::{io::ErrorKind, path::PathBuf};

	use serde_json::json;

	use super::{ConnectionConfig, Overrides, Settings, TLSConfig};
	use crate::error::{Error, SettingsError};

	fn scenario() -> serde_json::Value {
		json!({
			"ldap_server": "192.168.78.12",
			"ldap_port": 44445,
			"use_ssl": true,
			"ldap_username": "infotecs\\Admin",
			"ldap_password": "Qwerty1",
			"search_base": "DC=infotecs",
			"field_bindings": {
				"email": [1, "mail"],
				"phone": [2, "extensionAttribute7"],
				"login": [3, "sAMAccountName"],
				"description": [4, "department"]
			}
		})
	}

	#[test]
	fn resolves_scenario() {
		let settings = Settings::resolve(&Overrides::default(), &scenario().to_string()).unwrap();

		assert_eq!(settings.host(), "192.168.78.12");
		assert_eq!(settings.port(), 44445);
		assert!(settings.use_tls());
		assert_eq!(settings.username(), "infotecs\\Admin");
		assert_eq!(settings.password(), "Qwerty1");
		assert_eq!(settings.search_base(), "DC=infotecs");
		assert_eq!(settings.search_filter(), "(objectClass=person)");
		assert_eq!(settings.page_size(), 10);
		assert_eq!(settings.field_bindings().iter().count(), 4);
		assert_eq!(settings.field_bindings().iter().next(), Some(("email", "mail")));
		assert!(!settings.needs_password_prompt());
	}

	#[test]
	fn command_line_wins() {
		let mut document = scenario();
		document["ldap_username"] = json!("fileuser");
		let overrides = Overrides {
			username: Some("clioverride".to_owned()),
			password: Some("secret".to_owned()),
			server: Some("ldap.example.org".to_owned()),
			port: Some(389),
			search_base: Some("dc=example,dc=org".to_owned()),
		};
		let settings = Settings::resolve(&overrides, &document.to_string()).unwrap();

		assert_eq!(settings.username(), "clioverride");
		assert_eq!(settings.password(), "secret");
		assert_eq!(settings.host(), "ldap.example.org");
		assert_eq!(settings.port(), 389);
		assert_eq!(settings.search_base(), "dc=example,dc=org");
	}

	#[test]
	fn override_covers_missing_field() {
		let mut document = scenario();
		document.as_object_mut().unwrap().remove("ldap_username");

		let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();
		assert!(matches!(err, SettingsError::Missing("ldap_username")));

		let overrides = Overrides { username: Some("admin".to_owned()), ..Overrides::default() };
		let settings = Settings::resolve(&overrides, &document.to_string()).unwrap();
		assert_eq!(settings.username(), "admin");
	}

	#[test]
	fn missing_fields_are_named() {
		for field in [
			"ldap_username",
			"ldap_password",
			"ldap_server",
			"ldap_port",
			"use_ssl",
			"search_base",
			"field_bindings",
		] {
			let mut document = scenario();
			document.as_object_mut().unwrap().remove(field);
			let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();

			assert!(matches!(err, SettingsError::Missing(missing) if missing == field), "{err}");
			assert_eq!(err.to_string(), format!("Can't find {field} in the settings"));
		}
	}

	#[test]
	fn invalid_values() {
		let mut document = scenario();
		document["ldap_port"] = json!(70000);
		let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();
		assert!(matches!(err, SettingsError::InvalidValue { field: "ldap_port", .. }));

		let mut document = scenario();
		document["ldap_port"] = json!(0);
		let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Invalid value for ldap_port: expected a port number between 1 and 65535"
		);

		let mut document = scenario();
		document["use_ssl"] = json!("yes");
		let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();
		assert!(matches!(err, SettingsError::InvalidValue { field: "use_ssl", .. }));

		let mut document = scenario();
		document["page_size"] = json!(0);
		let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();
		assert!(matches!(err, SettingsError::InvalidValue { field: "page_size", .. }));
	}

	#[test]
	fn unparsable_document() {
		let err = Settings::resolve(&Overrides::default(), "{ \"ldap_server\": ").unwrap_err();
		assert!(matches!(err, SettingsError::Parse(_)));

		let err = Settings::resolve(&Overrides::default(), "[1, 2]").unwrap_err();
		assert!(matches!(err, SettingsError::Parse(_)));
	}

	#[test]
	fn malformed_binding_fails_resolution() {
		let mut document = scenario();
		document["field_bindings"]["phone"] = json!([2]);
		let err = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap_err();

		assert!(matches!(
			err,
			SettingsError::MalformedBinding(ref binding) if binding.name == "phone"
		));
	}

	#[test]
	fn empty_bindings_use_default() {
		let mut document = scenario();
		document["field_bindings"] = json!({});
		let settings = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap();

		assert_eq!(
			settings.field_bindings().names().collect::<Vec<_>>(),
			["domain_name", "unit", "email"]
		);
	}

	#[test]
	fn defaults_round_trip() {
		let defaults = Settings::default();
		let json = defaults.to_json().unwrap();
		let resolved = Settings::resolve(&Overrides::default(), &json).unwrap();

		assert_eq!(resolved, defaults);
		assert!(resolved.needs_password_prompt());
		assert!(json.starts_with("{\n    \"connection\": {"), "{json}");
	}

	#[test]
	fn round_trip_keeps_overrides() {
		let json = Settings::default().to_json().unwrap();
		let overrides =
			Overrides { username: Some("clioverride".to_owned()), ..Overrides::default() };
		let resolved = Settings::resolve(&overrides, &json).unwrap();

		assert_eq!(resolved.username(), "clioverride");
		assert_eq!(resolved.host(), Settings::default().host());
	}

	#[test]
	fn with_password_replaces_prompt() {
		let settings = Settings::default().with_password("hunter2".to_owned());

		assert!(!settings.needs_password_prompt());
		assert_eq!(settings.password(), "hunter2");
	}

	#[test]
	fn connection_block() {
		let mut document = scenario();
		document["connection"] = json!({ "timeout": 3, "tls": { "starttls": true } });
		let settings = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap();

		assert_eq!(settings.connection().timeout, 3);
		assert!(settings.connection().tls.starttls);
		assert!(!settings.connection().tls.no_tls_verify);
		assert_eq!(settings.url().unwrap().as_str(), "ldap://192.168.78.12:44445");
	}

	#[test]
	fn url_scheme() {
		let settings = Settings::resolve(&Overrides::default(), &scenario().to_string()).unwrap();
		assert_eq!(settings.url().unwrap().as_str(), "ldaps://192.168.78.12:44445");

		let mut document = scenario();
		document["use_ssl"] = json!(false);
		document["ldap_server"] = json!("::1");
		let settings = Settings::resolve(&Overrides::default(), &document.to_string()).unwrap();
		assert_eq!(settings.url().unwrap().as_str(), "ldap://[::1]:44445");
	}

	#[test]
	fn from_file_reports_path() {
		let err = Settings::from_file(&PathBuf::from("does/not/exist.json"), &Overrides::default())
			.unwrap_err();

		assert!(matches!(
			err,
			SettingsError::Read { ref path, .. } if path == "does/not/exist.json"
		));
	}

	#[tokio::test]
	async fn test_tls_config() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let garbage = dir.path().join("RootCA.crt");
		std::fs::write(&garbage, "not a certificate")?;

		// no custom root certificate
		ConnectionConfig::default().to_settings().await?;

		// invalid crt test
		assert!(matches!(
			ConnectionConfig {
				tls: TLSConfig {
					root_certificates_path: Some(garbage),
					starttls: false,
					no_tls_verify: false,
				},
				timeout: 5,
			}
			.to_settings()
			.await
			.err()
			.unwrap(),
			Error::Invalid(_)
		));

		// invalid path test
		assert!(matches!(
			ConnectionConfig {
				tls: TLSConfig {
					root_certificates_path: Some(PathBuf::from("invalid_path")),
					starttls: false,
					no_tls_verify: false,
				},
				timeout: 5,
			}
			.to_settings()
			.await
			.err()
			.unwrap(),
			Error::Io(io_err) if io_err.kind() == ErrorKind::NotFound
		));

		Ok(())
	}
}

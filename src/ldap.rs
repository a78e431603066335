//! Client for connecting to LDAP and streaming search results

use std::fmt;

use async_trait::async_trait;
use ldap3::{
	adapters::{Adapter, EntriesOnly, PagedResults},
	LdapConnAsync, LdapError, Scope, SearchEntry, SearchStream,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
	certificate::fetch_server_certificate,
	entry::{DirectoryEntry, EntrySource},
	error::Error,
	settings::Settings,
};

/// A paged search in progress. Entries are pulled from the server one page
/// at a time, in the order the server returns them.
pub struct PagedEntries {
	/// The search, yielding entries only (no referrals or intermediate
	/// messages)
	stream: SearchStream<'static, String, Vec<String>>,
	/// Handle of the bound connection, used to unbind when done
	ldap: ldap3::Ldap,
	/// The task driving the connection
	conn: JoinHandle<()>,
	/// Whether the server has sent the final result of the search
	exhausted: bool,
}

impl fmt::Debug for PagedEntries {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PagedEntries").field("exhausted", &self.exhausted).finish_non_exhaustive()
	}
}

/// Connect to the directory server named in the settings, bind, and start a
/// paged search for the attributes referenced by the field bindings.
///
/// An empty password is refused before anything is sent: servers treat such a
/// simple bind as anonymous and report success.
///
/// When TLS is used on a dedicated port, the server certificate is fetched and
/// logged first. Failing to do so is not an error.
pub async fn fetch_entries(settings: &Settings) -> Result<PagedEntries, Error> {
	if settings.password().is_empty() {
		return Err(Error::EmptyPassword { user: settings.username().to_owned() });
	}
	if settings.use_tls() && !settings.connection().tls.starttls {
		log_server_certificate(settings).await;
	}

	let (conn, mut ldap) = connect(settings).await?;
	let conn = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			warn!("Ldap connection error {err}");
		}
	});

	if let Err(source) = bind(&mut ldap, settings).await {
		conn.abort();
		return Err(Error::Bind { user: settings.username().to_owned(), source });
	}
	debug!("Bound to {} as {}", settings.host(), settings.username());

	let adapters: Vec<Box<dyn Adapter<'static, String, Vec<String>>>> =
		vec![Box::new(EntriesOnly::new()), Box::new(PagedResults::new(settings.page_size()))];
	let attributes = settings.field_bindings().attributes();
	debug!(
		"Searching {} for {} with attributes {attributes:?}",
		settings.search_base(),
		settings.search_filter()
	);
	let stream = match ldap
		.streaming_search_with(
			adapters,
			settings.search_base(),
			Scope::Subtree,
			settings.search_filter(),
			attributes,
		)
		.await
	{
		Ok(stream) => stream,
		Err(err) => {
			conn.abort();
			return Err(Error::Search(err));
		}
	};

	Ok(PagedEntries { stream, ldap, conn, exhausted: false })
}

impl PagedEntries {
	/// End the search and the session. The final search result is only
	/// checked if every entry has been pulled; otherwise the search is simply
	/// dropped along with the connection.
	pub async fn finish(mut self) -> Result<(), Error> {
		let result = self.stream.finish().await;
		let outcome = if self.exhausted {
			result.success().map(drop).map_err(Error::Search)
		} else {
			debug!("Search ended before the last page was retrieved");
			Ok(())
		};

		if let Err(err) = self.ldap.unbind().await {
			warn!("Failed to unbind: {err}");
		}
		if let Err(err) = self.conn.await {
			warn!("Failed to join background task: {err}");
		}
		outcome
	}
}

#[async_trait]
impl EntrySource for PagedEntries {
	async fn next_entry(&mut self) -> Result<Option<DirectoryEntry>, Error> {
		if self.exhausted {
			return Ok(None);
		}
		match self.stream.next().await.map_err(Error::Search)? {
			Some(entry) => Ok(Some(SearchEntry::construct(entry).into())),
			None => {
				self.exhausted = true;
				Ok(None)
			}
		}
	}
}

/// Create a connection to the ldap server named in the settings.
async fn connect(settings: &Settings) -> Result<(LdapConnAsync, ldap3::Ldap), Error> {
	let conn_settings = settings.connection().to_settings().await?;
	let url = settings.url()?;
	debug!("Connecting to {url}");
	LdapConnAsync::from_url_with_settings(conn_settings, &url).await.map_err(Error::Connect)
}

/// Authenticate with a simple bind.
async fn bind(ldap: &mut ldap3::Ldap, settings: &Settings) -> Result<(), LdapError> {
	ldap.with_timeout(settings.connection().timeout())
		.simple_bind(settings.username(), settings.password())
		.await?
		.success()?;
	Ok(())
}

/// Log the certificate presented by the server.
async fn log_server_certificate(settings: &Settings) {
	let (host, port) = (settings.host(), settings.port());
	match fetch_server_certificate(host, port, settings.connection().timeout()).await {
		Ok(pem) => info!("Server certificate of {host}:{port}:\n{pem}"),
		Err(err) => warn!("While trying to get the server certificate: {err}"),
	}
}

//! One complete export run: fetch entries from the directory and write them
//! to a CSV file.
use std::path::Path;

use tracing::warn;

use crate::{
	error::Error,
	export::{export, ExportSummary},
	ldap::fetch_entries,
	settings::Settings,
};

/// Run the export described by `settings`, writing rows to `output_path`.
///
/// The output file is only opened once the bind has succeeded, so a failed
/// connection or bind leaves no file behind. The password must already be
/// resolved; a [`PASSWORD_PROMPT`](crate::settings::PASSWORD_PROMPT) value is
/// sent to the server as is.
pub async fn import(settings: &Settings, output_path: &Path) -> Result<ExportSummary, Error> {
	let mut entries = fetch_entries(settings).await?;

	let exported = export(&mut entries, settings.field_bindings(), output_path).await;
	let finished = entries.finish().await;
	settle(exported, finished)
}

/// Combine the outcome of the export with the one of closing the search. The
/// export error wins; a second failure while closing is logged.
fn settle(
	exported: Result<ExportSummary, Error>,
	finished: Result<(), Error>,
) -> Result<ExportSummary, Error> {
	match (exported, finished) {
		(Ok(summary), Ok(())) => Ok(summary),
		(Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
		(Err(err), Err(finish_err)) => {
			warn!("Failed to end the search after an aborted export: {finish_err}");
			Err(err)
		}
	}
}

//! Serialization of directory entries into CSV rows.
use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{debug, info};

use crate::{
	bindings::FieldBindings,
	entry::{DirectoryEntry, EntrySource},
	error::Error,
};

/// Field delimiter of the output file.
pub const DELIMITER: u8 = b';';

/// Counts reported at the end of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
	/// Entries pulled from the source
	pub seen: usize,
	/// Entries written as rows
	pub saved: usize,
}

/// An entry did not carry one of the bound attributes, so no row can be built
/// from it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{dn} has no {attribute} attribute")]
pub struct MissingAttribute {
	/// Distinguished name of the entry
	pub dn: String,
	/// The attribute that was not found
	pub attribute: String,
}

/// Build the row for an entry: one column per binding, in binding order.
///
/// Multiple values are joined with `", "`. An attribute present without any
/// value yields an empty column, an absent one fails the whole row.
pub fn project(
	entry: &DirectoryEntry,
	bindings: &FieldBindings,
) -> Result<Vec<String>, MissingAttribute> {
	bindings
		.iter()
		.map(|(_, attribute)| {
			entry.get(attribute).map(|values| values.join(", ")).ok_or_else(|| MissingAttribute {
				dn: entry.dn().to_owned(),
				attribute: attribute.to_owned(),
			})
		})
		.collect()
}

/// Write every entry of `entries` that carries all bound attributes to a CSV
/// file at `output_path`, one row per entry.
///
/// The file is created (or truncated) before the first entry is pulled; if
/// that fails, the source is left untouched. Entries lacking an attribute are
/// skipped and only show up in the difference between the returned counts.
pub async fn export<S: EntrySource>(
	entries: &mut S,
	bindings: &FieldBindings,
	output_path: &Path,
) -> Result<ExportSummary, Error> {
	let mut table = WriterBuilder::new()
		.delimiter(DELIMITER)
		.has_headers(false)
		.quote_style(QuoteStyle::Necessary)
		.terminator(Terminator::CRLF)
		.from_path(output_path)?;
	debug!(
		"Writing columns {:?} to {}",
		bindings.names().collect::<Vec<_>>(),
		output_path.display()
	);

	let mut summary = ExportSummary::default();
	loop {
		let entry = match entries.next_entry().await {
			Ok(Some(entry)) => entry,
			Ok(None) => break,
			Err(err) => {
				table.flush().map_err(csv::Error::from)?;
				return Err(err);
			}
		};
		summary.seen += 1;

		match project(&entry, bindings) {
			Ok(row) => {
				table.write_record(&row)?;
				summary.saved += 1;
			}
			Err(missing) => debug!("Skipping entry: {missing}"),
		}
	}
	table.flush().map_err(csv::Error::from)?;

	info!("{} entries found.", summary.seen);
	Ok(summary)
}

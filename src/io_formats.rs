//! Stage-output formats: "versions" and "restored", each a UTF-8 text
//! file with one `key ⊕ TAB ⊕ JSON(value)` line per key. Written (not read
//! back) by the orchestrator so a run can be audited after the fact.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{Error, ResultExt};
use crate::record::{Action, ActionSummary, VersionRecord};

async fn write_tsv_lines<'a, I>(path: &Path, lines: I) -> Result<(), Error>
where
	I: IntoIterator<Item = (&'a str, String)>,
{
	let mut file = tokio::fs::File::create(path)
		.await
		.err_context(format!("unable to create {}", path.display()))?;
	for (key, json) in lines {
		let line = format!("{}\t{}\n", key, json);
		file.write_all(line.as_bytes())
			.await
			.err_context(format!("unable to write {}", path.display()))?;
	}
	Ok(())
}

/// Write the "versions" stage output: the Selector's one target record per key.
pub async fn write_versions(dir: &Path, targets: &[(String, VersionRecord)]) -> Result<(), Error> {
	tokio::fs::create_dir_all(dir)
		.await
		.err_context(format!("unable to create {}", dir.display()))?;
	let mut lines = Vec::with_capacity(targets.len());
	for (key, record) in targets {
		lines.push((key.as_str(), serde_json::to_string(record)?));
	}
	write_tsv_lines(&dir.join("versions"), lines).await
}

/// Write the "restored" stage output: one Action/error per key. `Noop`
/// actions are intentionally suppressed from this output.
pub async fn write_restored(dir: &Path, action_log: &[(String, ActionSummary)]) -> Result<(), Error> {
	tokio::fs::create_dir_all(dir)
		.await
		.err_context(format!("unable to create {}", dir.display()))?;
	let mut lines = Vec::with_capacity(action_log.len());
	for (key, summary) in action_log {
		if matches!(summary, ActionSummary::Applied(Action::Noop)) {
			continue;
		}
		lines.push((key.as_str(), serde_json::to_string(summary)?));
	}
	write_tsv_lines(&dir.join("restored"), lines).await
}

//! Produce the finite sequence of prefixes the Lister fans
//! out over.

use std::path::Path;

use tokio::io::AsyncBufReadExt;

use crate::error::{Error, ResultExt};

/// If `path` is `None`, the sequence is the single empty prefix (list the
/// entire source prefix). Otherwise every non-empty line of the file, in
/// file order, with empty lines ignored. Fails the whole run before any
/// listing starts if the path is given but unreadable.
pub async fn read_prefixes(path: Option<&Path>) -> Result<Vec<String>, Error> {
	let path = match path {
		None => return Ok(vec![String::new()]),
		Some(p) => p,
	};

	let file = tokio::fs::File::open(path)
		.await
		.err_context(format!("unable to read prefix file {}", path.display()))?;
	let mut lines = tokio::io::BufReader::new(file).lines();

	let mut prefixes = Vec::new();
	while let Some(line) = lines
		.next_line()
		.await
		.err_context(format!("unable to read prefix file {}", path.display()))?
	{
		if !line.is_empty() {
			prefixes.push(line);
		}
	}
	Ok(prefixes)
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write;

	#[tokio::test]
	async fn no_path_yields_single_empty_prefix() {
		let prefixes = read_prefixes(None).await.unwrap();
		assert_eq!(prefixes, vec!["".to_string()]);
	}

	#[tokio::test]
	async fn reads_non_empty_lines_in_order() {
		let mut f = tempfile::NamedTempFile::new().unwrap();
		writeln!(f, "prefix1/").unwrap();
		writeln!(f).unwrap();
		writeln!(f, "prefix2/").unwrap();
		write!(f, "prefix3").unwrap(); // no trailing newline on last line
		f.flush().unwrap();

		let prefixes = read_prefixes(Some(f.path())).await.unwrap();
		assert_eq!(prefixes, vec!["prefix1/", "prefix2/", "prefix3"]);
	}

	#[tokio::test]
	async fn unreadable_path_fails() {
		let res = read_prefixes(Some(Path::new("/nonexistent/does/not/exist"))).await;
		assert!(res.is_err());
	}
}

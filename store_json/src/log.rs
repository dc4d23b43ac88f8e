//! The append-only transaction log (`transactions.jsonl`).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use sanka_store::Transaction;

use crate::JsonStoreError;

/// Entries read back from the log, plus a note if a torn tail was dropped.
pub(crate) struct LoadedLog {
    pub entries: Vec<Transaction>,
    pub torn_tail: Option<String>,
}

/// Read every entry of the log at `path`.
///
/// A final line that does not parse is treated as an interrupted append: it is
/// cut off the file and reported. An unparseable line anywhere else is
/// corruption.
pub(crate) fn read_log(path: &Path) -> Result<LoadedLog, JsonStoreError> {
    if !path.exists() {
        return Ok(LoadedLog {
            entries: Vec::new(),
            torn_tail: None,
        });
    }
    let file = File::open(path).map_err(|e| JsonStoreError::io(path, e))?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()
        .map_err(|e| JsonStoreError::io(path, e))?;

    let mut entries = Vec::with_capacity(lines.len());
    let mut good_bytes: u64 = 0;
    let last = lines.len().saturating_sub(1);
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            good_bytes += line.len() as u64 + 1;
            continue;
        }
        match serde_json::from_str::<Transaction>(line) {
            Ok(tx) => {
                entries.push(tx);
                good_bytes += line.len() as u64 + 1;
            }
            Err(e) if idx == last => {
                let file = OpenOptions::new()
                    .write(true)
                    .open(path)
                    .map_err(|e| JsonStoreError::io(path, e))?;
                file.set_len(good_bytes)
                    .map_err(|e| JsonStoreError::io(path, e))?;
                return Ok(LoadedLog {
                    entries,
                    torn_tail: Some(format!(
                        "dropped unreadable final log line {}: {e}",
                        idx + 1
                    )),
                });
            }
            Err(e) => {
                return Err(JsonStoreError::CorruptLog {
                    line: idx + 1,
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(LoadedLog {
        entries,
        torn_tail: None,
    })
}

/// Append one entry and flush it to disk.
pub(crate) fn append_entry(path: &Path, tx: &Transaction) -> Result<(), JsonStoreError> {
    let mut line = serde_json::to_vec(tx)?;
    line.push(b'\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| JsonStoreError::io(path, e))?;
    file.write_all(&line)
        .and_then(|_| file.sync_data())
        .map_err(|e| JsonStoreError::io(path, e))
}

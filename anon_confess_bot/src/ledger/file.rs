//! On-disk layout of the ledger.
//!
//! The file is a single JSON object with a few fixed keys, plus one key per
//! posting, named after its number:
//!
//! ```json
//! {
//!     "count": 3,
//!     "blocked": [1001],
//!     "blocked_anon_numbers": ["1"],
//!     "1": 1001,
//!     "2": 1002,
//!     "3": 1001
//! }
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{Ledger, LedgerError, PostingNumber, SubmitterId};

#[derive(Deserialize)]
struct LedgerFileIn {
    count: u64,
    #[serde(default)]
    blocked: Vec<SubmitterId>,
    #[serde(default)]
    blocked_anon_numbers: Vec<String>,
    /// Everything else. Keys are only known to be strings at this point.
    #[serde(flatten)]
    postings: BTreeMap<String, SubmitterId>,
}

#[derive(Serialize)]
struct LedgerFileOut<'a> {
    count: u64,
    blocked: &'a BTreeSet<SubmitterId>,
    blocked_anon_numbers: Vec<String>,
    #[serde(flatten)]
    postings: &'a BTreeMap<PostingNumber, SubmitterId>,
}

fn parse_number_key(key: &str) -> Result<PostingNumber, LedgerError> {
    // Leading zeros or signs would turn into a different key on the next save.
    let number: u64 = key
        .parse()
        .ok()
        .filter(|x: &u64| *x != 0 && x.to_string() == key)
        .ok_or_else(|| LedgerError::Corrupt(format!("\"{key}\" is not an anon number")))?;
    Ok(PostingNumber(number))
}

impl TryFrom<LedgerFileIn> for Ledger {
    type Error = LedgerError;

    fn try_from(file: LedgerFileIn) -> Result<Self, Self::Error> {
        let mut postings = BTreeMap::new();
        for (key, submitter) in file.postings {
            let number = parse_number_key(&key)?;
            if number.0 > file.count {
                return Err(LedgerError::Corrupt(format!(
                    "anon id {number} is past the count of {}",
                    file.count
                )));
            }
            postings.insert(number, submitter);
        }

        // Older files may have duplicates in these lists. Sets take care of it.
        let mut blocked_users: BTreeSet<SubmitterId> = file.blocked.into_iter().collect();
        let mut blocked_numbers = BTreeSet::new();

        for key in &file.blocked_anon_numbers {
            let number = parse_number_key(key)?;
            let Some(submitter) = postings.get(&number) else {
                return Err(LedgerError::Corrupt(format!(
                    "blocked anon id {number} has no posting"
                )));
            };
            if blocked_users.insert(*submitter) {
                log::warn!(
                    "Blocked anon id {} belongs to {}, who was not blocked. Blocking them.",
                    number,
                    submitter
                );
            }
            blocked_numbers.insert(number);
        }

        // Anyone blocked without a blocked number to show for it could never be unblocked.
        blocked_users.retain(|submitter| {
            let has_number = blocked_numbers
                .iter()
                .any(|number| postings.get(number) == Some(submitter));
            if !has_number {
                log::warn!(
                    "{} is blocked without any blocked anon id. Unblocking them.",
                    submitter
                );
            }
            has_number
        });

        Ok(Ledger {
            count: file.count,
            postings,
            blocked_users,
            blocked_numbers,
        })
    }
}

impl<'a> From<&'a Ledger> for LedgerFileOut<'a> {
    fn from(ledger: &'a Ledger) -> Self {
        LedgerFileOut {
            count: ledger.count,
            blocked: &ledger.blocked_users,
            blocked_anon_numbers: ledger
                .blocked_numbers
                .iter()
                .map(|x| x.0.to_string())
                .collect(),
            postings: &ledger.postings,
        }
    }
}

pub fn from_json(data: &[u8]) -> Result<Ledger, LedgerError> {
    let file: LedgerFileIn = serde_json::from_slice(data)?;
    Ledger::try_from(file)
}

/// Serializes with 4-space indentation, which is what the file always had.
pub fn to_json(ledger: &Ledger) -> Result<Vec<u8>, LedgerError> {
    let mut output = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut output, formatter);
    LedgerFileOut::from(ledger).serialize(&mut serializer)?;
    output.push(b'\n');
    Ok(output)
}

/// Reads the ledger from this file. A file that doesn't exist is an empty ledger.
pub fn load(path: &Path) -> Result<Ledger, LedgerError> {
    match std::fs::read(path) {
        Ok(data) => from_json(&data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No ledger at {}, starting a new one.", path.display());
            Ok(Ledger::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Replaces the file with `data`, such that anyone reading it sees either
/// the old contents or the new ones, never a mix.
///
/// Writes a temporary file next to it, then renames it over.
pub fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tempfile = NamedTempFile::new_in(dir)?;
    tempfile.write_all(data)?;
    tempfile.as_file().sync_all()?;
    tempfile.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_legacy_file() {
        // Written by an append-only version that didn't de-duplicate.
        let data = br#"{
            "count": 3,
            "blocked": [1001, 1001],
            "blocked_anon_numbers": ["1", "3", "1"],
            "1": 1001,
            "2": 1002,
            "3": 1001
        }"#;

        let ledger = from_json(data).unwrap();
        assert_eq!(ledger.count(), 3);
        assert_eq!(ledger.submitter_of(PostingNumber(2)), Some(SubmitterId(1002)));
        assert!(ledger.is_blocked(SubmitterId(1001)));
        assert!(!ledger.is_blocked(SubmitterId(1002)));
        assert_eq!(
            ledger.blocked_numbers().collect::<Vec<_>>(),
            vec![PostingNumber(1), PostingNumber(3)]
        );
    }

    #[test]
    fn reads_fresh_file() {
        let ledger = from_json(br#"{"count": 0, "blocked": [], "blocked_anon_numbers": []}"#)
            .unwrap();
        assert_eq!(ledger, Ledger::new());
    }

    #[test]
    fn writes_numbers_in_order() {
        let mut ledger = Ledger::new();
        for _ in 0..11 {
            ledger.submit(SubmitterId(5)).unwrap();
        }
        ledger.block(PostingNumber(10)).unwrap();
        ledger.block(PostingNumber(2)).unwrap();

        let json = String::from_utf8(to_json(&ledger).unwrap()).unwrap();
        assert!(json.starts_with("{\n    \"count\": 11,\n"));
        assert!(json.contains("\"blocked_anon_numbers\": [\n        \"2\",\n        \"10\"\n    ]"));
        let two = json.find("\"2\": 5").unwrap();
        let ten = json.find("\"10\": 5").unwrap();
        assert!(two < ten);

        assert_eq!(from_json(json.as_bytes()).unwrap(), ledger);
    }

    #[test]
    fn repairs_unblocked_submitter() {
        let ledger = from_json(
            br#"{"count": 1, "blocked": [], "blocked_anon_numbers": ["1"], "1": 1001}"#,
        )
        .unwrap();
        assert!(ledger.is_blocked(SubmitterId(1001)));
    }

    #[test]
    fn drops_block_without_number() {
        let ledger = from_json(
            br#"{"count": 2, "blocked": [1001, 1002], "blocked_anon_numbers": ["2"], "1": 1001, "2": 1002}"#,
        )
        .unwrap();
        assert!(!ledger.is_blocked(SubmitterId(1001)));
        assert!(ledger.is_blocked(SubmitterId(1002)));

        // Written back without the stray entry.
        let json = String::from_utf8(to_json(&ledger).unwrap()).unwrap();
        assert!(json.contains("\"blocked\": [\n        1002\n    ]"));
    }

    #[test]
    fn full_count_loads_but_takes_no_more() {
        let mut ledger = from_json(
            br#"{"count": 18446744073709551615, "blocked": [], "blocked_anon_numbers": []}"#,
        )
        .unwrap();
        assert_eq!(ledger.count(), u64::MAX);
        assert!(matches!(
            ledger.submit(SubmitterId(1)),
            Err(LedgerError::Exhausted)
        ));
    }

    #[test]
    fn rejects_corrupt_files() {
        let corrupt: &[&[u8]] = &[
            br#"{"count": 1, "blocked": [], "blocked_anon_numbers": ["2"], "1": 1001}"#,
            br#"{"count": 1, "blocked": [], "blocked_anon_numbers": [], "2": 1001}"#,
            br#"{"count": 1, "blocked": [], "blocked_anon_numbers": [], "01": 1001}"#,
            br#"{"count": 1, "blocked": [], "blocked_anon_numbers": [], "hi": 1001}"#,
            br#"{"count": 1, "blocked": [], "blocked_anon_numbers": [], "0": 1001}"#,
        ];
        for data in corrupt {
            assert!(
                matches!(from_json(data), Err(LedgerError::Corrupt(_))),
                "{}",
                String::from_utf8_lossy(data)
            );
        }

        assert!(matches!(
            from_json(br#"{"blocked": []}"#),
            Err(LedgerError::Json(_))
        ));
        assert!(matches!(
            from_json(br#"{"count": 1, "1": "alice"}"#),
            Err(LedgerError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = load(&dir.path().join("storage.json")).unwrap();
        assert_eq!(ledger, Ledger::new());
    }

    #[test]
    fn atomic_write_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        write_atomically(&path, b"first").unwrap();
        write_atomically(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        // No temporary files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

use std::path::PathBuf;

use tokio::sync::Mutex;

use super::{file, Ledger, LedgerError, PostingNumber, SubmitterId};

/// Owner of the ledger and its file.
///
/// Every operation holds the lock for its whole read-modify-persist cycle,
/// and works on a copy of the ledger that only replaces the in-memory one
/// once the file was written. If persisting fails, nothing changes.
pub struct LedgerStore {
    path: PathBuf,
    ledger: Mutex<Ledger>,
}

impl LedgerStore {
    /// Loads the ledger from this file, or starts an empty one if it doesn't exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<LedgerStore, LedgerError> {
        let path = path.into();
        let load_path = path.clone();
        let ledger = tokio::task::spawn_blocking(move || file::load(&load_path))
            .await
            .map_err(std::io::Error::other)??;

        log::info!(
            "Loaded ledger from {} with {} postings and {} blocked anon ids.",
            path.display(),
            ledger.count(),
            ledger.blocked_numbers().count()
        );

        Ok(LedgerStore {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    /// Runs `action` on a copy of the ledger and persists the result, if it changed.
    async fn transaction<T>(
        &self,
        action: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        // Held until the end of this function.
        let mut ledger = self.ledger.lock().await;

        let mut working = ledger.clone();
        let output = action(&mut working)?;

        if working != *ledger {
            let data = file::to_json(&working)?;
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || file::write_atomically(&path, &data))
                .await
                .map_err(std::io::Error::other)??;
            *ledger = working;
        }

        Ok(output)
    }

    /// Assigns the next posting number to this submitter, unless they're blocked.
    pub async fn submit(&self, submitter: SubmitterId) -> Result<PostingNumber, LedgerError> {
        let number = self.transaction(|ledger| ledger.submit(submitter)).await?;
        log::debug!("Assigned anon id {} to {}", number, submitter);
        Ok(number)
    }

    /// Blocks whoever is behind this number. Returns who that is.
    pub async fn block(&self, number: PostingNumber) -> Result<SubmitterId, LedgerError> {
        self.transaction(|ledger| ledger.block(number)).await
    }

    /// Lifts the block made through this number. Returns who it was on.
    pub async fn unblock(&self, number: PostingNumber) -> Result<SubmitterId, LedgerError> {
        self.transaction(|ledger| ledger.unblock(number)).await
    }

    pub async fn blocked_numbers(&self) -> Vec<PostingNumber> {
        self.ledger.lock().await.blocked_numbers().collect()
    }

    pub async fn is_blocked(&self, submitter: SubmitterId) -> bool {
        self.ledger.lock().await.is_blocked(submitter)
    }

    /// A copy of the ledger as it is right now.
    #[cfg(test)]
    pub async fn snapshot(&self) -> Ledger {
        self.ledger.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const ALICE: SubmitterId = SubmitterId(1001);
    const BOB: SubmitterId = SubmitterId(1002);

    #[tokio::test]
    async fn survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = LedgerStore::open(&path).await.unwrap();
        assert_eq!(store.submit(ALICE).await.unwrap(), PostingNumber(1));
        assert_eq!(store.submit(BOB).await.unwrap(), PostingNumber(2));
        assert_eq!(store.submit(ALICE).await.unwrap(), PostingNumber(3));
        store.block(PostingNumber(2)).await.unwrap();
        let before = store.snapshot().await;
        drop(store);

        let store = LedgerStore::open(&path).await.unwrap();
        assert_eq!(store.snapshot().await, before);
        assert!(store.is_blocked(BOB).await);
        assert_eq!(store.blocked_numbers().await, vec![PostingNumber(2)]);
        assert_eq!(store.submit(ALICE).await.unwrap(), PostingNumber(4));
    }

    #[tokio::test]
    async fn alice_and_bob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("storage.json"))
            .await
            .unwrap();

        assert_eq!(store.submit(ALICE).await.unwrap(), PostingNumber(1));
        assert_eq!(store.submit(BOB).await.unwrap(), PostingNumber(2));
        assert_eq!(store.block(PostingNumber(1)).await.unwrap(), ALICE);
        assert!(matches!(
            store.submit(ALICE).await,
            Err(LedgerError::Blocked)
        ));
        assert_eq!(store.unblock(PostingNumber(1)).await.unwrap(), ALICE);
        assert_eq!(store.submit(ALICE).await.unwrap(), PostingNumber(3));
    }

    #[tokio::test]
    async fn rejections_leave_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = LedgerStore::open(&path).await.unwrap();

        store.submit(ALICE).await.unwrap();
        let written = std::fs::read(&path).unwrap();

        assert!(matches!(
            store.block(PostingNumber(5)).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            store.unblock(PostingNumber(1)).await,
            Err(LedgerError::NotFound(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), written);
    }

    #[tokio::test]
    async fn failed_persist_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // The directory doesn't exist, so no file can be written there.
        let path = dir.path().join("missing").join("storage.json");
        let store = LedgerStore::open(&path).await.unwrap();

        assert!(matches!(
            store.submit(ALICE).await,
            Err(LedgerError::Io(_))
        ));
        assert_eq!(store.snapshot().await, Ledger::new());
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, b"{ this is not json").unwrap();

        assert!(matches!(
            LedgerStore::open(&path).await,
            Err(LedgerError::Json(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submits_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = Arc::new(LedgerStore::open(&path).await.unwrap());

        let handles = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.submit(SubmitterId(i)).await.unwrap() })
            })
            .collect::<Vec<_>>();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().0);
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=32).collect::<Vec<_>>());

        let reloaded = LedgerStore::open(&path).await.unwrap().snapshot().await;
        assert_eq!(reloaded.count(), 32);
        assert_eq!(reloaded, store.snapshot().await);
    }
}

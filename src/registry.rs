//! Keyed registry of live browser sessions.
//!
//! Each session pairs one launched browser with an append-only page list.
//! The map lock is only held for lookups and inserts; launches and closes
//! run outside it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::core::{BrowserDriver, LaunchProfile};
use crate::errors::{Result, ScenaristError};

pub struct Session<B: BrowserDriver> {
    pub key: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
    browser: Mutex<B>,
    pages: Mutex<Vec<Arc<B::Page>>>,
    scenario_gate: Mutex<()>,
}

impl<B: BrowserDriver> Session<B> {
    fn new(key: &str, browser: B) -> Self {
        Self {
            key: key.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            browser: Mutex::new(browser),
            pages: Mutex::new(Vec::new()),
            scenario_gate: Mutex::new(()),
        }
    }

    /// Resolve the page at `index`. An index equal to the current count
    /// opens a fresh page; anything beyond that is rejected rather than
    /// silently mis-indexed.
    pub async fn page(&self, index: usize) -> Result<Arc<B::Page>> {
        let mut pages = self.pages.lock().await;

        if index < pages.len() {
            return Ok(Arc::clone(&pages[index]));
        }
        if index == pages.len() {
            let page = self.browser.lock().await.new_page().await?;
            let page = Arc::new(page);
            pages.push(Arc::clone(&page));
            info!(key = %self.key, index, "opened new page");
            return Ok(page);
        }
        Err(ScenaristError::InvalidPageIndex {
            index,
            pages: pages.len(),
        })
    }

    pub async fn page_count(&self) -> usize {
        self.pages.lock().await.len()
    }

    /// At most one scenario runs against a session at a time; callers hold
    /// this guard for the duration of a run.
    pub async fn lock_scenario(&self) -> MutexGuard<'_, ()> {
        self.scenario_gate.lock().await
    }

    pub async fn close(&self) -> Result<()> {
        self.browser.lock().await.close().await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub key: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub pages: usize,
}

pub struct SessionRegistry<B: BrowserDriver> {
    sessions: Mutex<HashMap<String, Arc<Session<B>>>>,
}

impl<B: BrowserDriver> SessionRegistry<B> {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Launch `browser` with `profile` and register it under `key`.
    ///
    /// The duplicate check runs before the launch and again at insert time;
    /// a concurrent create that loses the insert closes its browser and
    /// reports the duplicate.
    pub async fn create(&self, key: &str, mut browser: B, profile: &LaunchProfile) -> Result<()> {
        if self.sessions.lock().await.contains_key(key) {
            return Err(ScenaristError::DuplicateKey(key.to_string()));
        }

        browser.launch(profile).await?;

        let session = Arc::new(Session::new(key, browser));

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(key) {
            drop(sessions);
            warn!(key, "concurrent create lost the race, closing surplus browser");
            if let Err(e) = session.close().await {
                warn!(key, error = %e, "failed to close surplus browser");
            }
            return Err(ScenaristError::DuplicateKey(key.to_string()));
        }
        info!(key, id = %session.id, "session registered");
        sessions.insert(key.to_string(), session);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Arc<Session<B>>> {
        self.sessions
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ScenaristError::UnknownSession(key.to_string()))
    }

    pub async fn resolve_page(&self, key: &str, index: usize) -> Result<Arc<B::Page>> {
        self.get(key).await?.page(index).await
    }

    /// Remove the session and close its browser. The entry leaves the map
    /// before the close runs, so a failing close can never leave a dangling
    /// key behind.
    pub async fn destroy(&self, key: &str) -> Result<()> {
        let session = self
            .sessions
            .lock()
            .await
            .remove(key)
            .ok_or_else(|| ScenaristError::UnknownSession(key.to_string()))?;

        info!(key, id = %session.id, "session destroyed");
        session.close().await
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.sessions.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session<B>>> = self.sessions.lock().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(SessionInfo {
                key: session.key.clone(),
                id: session.id.clone(),
                created_at: session.created_at,
                pages: session.page_count().await,
            });
        }
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }
}

impl<B: BrowserDriver> Default for SessionRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrowser;

    fn profile() -> LaunchProfile {
        LaunchProfile::default()
    }

    #[tokio::test]
    async fn create_rejects_duplicate_keys() {
        let registry = SessionRegistry::new();
        registry
            .create("k1", MockBrowser::default(), &profile())
            .await
            .unwrap();

        let second = MockBrowser::default();
        let err = registry
            .create("k1", second, &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, ScenaristError::DuplicateKey(k) if k == "k1"));

        // the original session is still there
        assert!(registry.contains("k1").await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn resolve_page_reuses_and_appends() {
        let registry = SessionRegistry::new();
        let browser = MockBrowser::default();
        let behavior = browser.behavior.clone();
        registry.create("k1", browser, &profile()).await.unwrap();

        let first = registry.resolve_page("k1", 0).await.unwrap();
        let again = registry.resolve_page("k1", 0).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(behavior.pages_created(), 1);

        registry.resolve_page("k1", 1).await.unwrap();
        assert_eq!(behavior.pages_created(), 2);
    }

    #[tokio::test]
    async fn resolve_page_rejects_index_beyond_end() {
        let registry = SessionRegistry::new();
        registry
            .create("k1", MockBrowser::default(), &profile())
            .await
            .unwrap();

        let err = registry.resolve_page("k1", 1).await.unwrap_err();
        assert!(matches!(
            err,
            ScenaristError::InvalidPageIndex { index: 1, pages: 0 }
        ));

        // index 0 still creates the first page afterwards
        registry.resolve_page("k1", 0).await.unwrap();
        let err = registry.resolve_page("k1", 2).await.unwrap_err();
        assert!(matches!(
            err,
            ScenaristError::InvalidPageIndex { index: 2, pages: 1 }
        ));
    }

    #[tokio::test]
    async fn destroy_evicts_and_closes() {
        let registry = SessionRegistry::new();
        let browser = MockBrowser::default();
        let behavior = browser.behavior.clone();
        registry.create("k1", browser, &profile()).await.unwrap();

        registry.destroy("k1").await.unwrap();
        assert!(behavior.closed());
        assert!(!registry.contains("k1").await);

        let err = registry.resolve_page("k1", 0).await.unwrap_err();
        assert!(matches!(err, ScenaristError::UnknownSession(k) if k == "k1"));

        let err = registry.destroy("k1").await.unwrap_err();
        assert!(matches!(err, ScenaristError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn destroy_evicts_even_when_close_fails() {
        let registry = SessionRegistry::new();
        let browser = MockBrowser::default();
        browser.behavior.fail_close();
        registry.create("k1", browser, &profile()).await.unwrap();

        assert!(registry.destroy("k1").await.is_err());
        // no dangling entry despite the close failure
        assert!(!registry.contains("k1").await);
    }

    #[tokio::test]
    async fn snapshot_lists_sessions() {
        let registry = SessionRegistry::new();
        registry
            .create("b", MockBrowser::default(), &profile())
            .await
            .unwrap();
        registry
            .create("a", MockBrowser::default(), &profile())
            .await
            .unwrap();
        registry.resolve_page("a", 0).await.unwrap();

        let infos = registry.snapshot().await;
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].key, "a");
        assert_eq!(infos[0].pages, 1);
        assert_eq!(infos[1].key, "b");
        assert_eq!(infos[1].pages, 0);
    }
}

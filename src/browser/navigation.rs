use std::time::{Duration, Instant};

use crate::core::PageDriver;
use crate::errors::{Result, ScenaristError};

/// Installs fetch/XHR counters so quiescence can be observed. Idempotent;
/// re-running after a navigation simply reinstalls on the fresh document.
const INSTALL_COUNTERS: &str = r#"
    (function() {
        if (window.__scenaristNet) return true;
        window.__scenaristNet = { inflight: 0 };
        const bump = (d) => { window.__scenaristNet.inflight += d; };

        const originalFetch = window.fetch;
        window.fetch = function(...args) {
            bump(1);
            return originalFetch.apply(this, args).then(
                (response) => { bump(-1); return response; },
                (error) => { bump(-1); throw error; }
            );
        };

        const originalOpen = XMLHttpRequest.prototype.open;
        XMLHttpRequest.prototype.open = function(...args) {
            bump(1);
            this.addEventListener('loadend', () => bump(-1));
            return originalOpen.apply(this, args);
        };

        return true;
    })()
"#;

const PROBE_STATE: &str = r#"
    (function() {
        const net = window.__scenaristNet || { inflight: 0 };
        return { ready: document.readyState === 'complete', inflight: net.inflight };
    })()
"#;

/// Block until the document is complete and no tracked request is in
/// flight, polling every 100ms up to `timeout_ms`.
pub async fn wait_for_quiescence<P: PageDriver + ?Sized>(page: &P, timeout_ms: u64) -> Result<()> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    page.evaluate(INSTALL_COUNTERS).await?;

    while start.elapsed() < timeout {
        let state = page.evaluate(PROBE_STATE).await?;
        let ready = state
            .get("ready")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let inflight = state
            .get("inflight")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        if ready && inflight <= 0 {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Err(ScenaristError::Timeout(format!(
        "page did not reach network idle within {timeout_ms}ms"
    )))
}

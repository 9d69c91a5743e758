//! Browser lifecycle and the per-run page pool
//!
//! A run owns exactly one page for its whole lifetime; the pool bounds how
//! many runs hold pages at once. Acquisition is scoped: the guard closes
//! the page on every exit path.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chromium::ChromiumDriver;
use crate::config::BrowserLaunchConfig;
use crate::error::AdapterError;
use crate::stealth;

pub struct BrowserPool {
    browser: Mutex<Browser>,
    config: BrowserLaunchConfig,
    slots: Arc<Semaphore>,
    event_loop: JoinHandle<()>,
}

impl BrowserPool {
    /// Launch one browser process backing up to `max_parallel` pages.
    pub async fn launch(
        config: BrowserLaunchConfig,
        max_parallel: usize,
    ) -> Result<Self, AdapterError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let browser_config = builder
            .build()
            .map_err(AdapterError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AdapterError::Launch(e.to_string()))?;

        // The handler stream must be drained for CDP traffic to flow.
        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(error = %err, "browser handler error");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            config,
            slots: Arc::new(Semaphore::new(max_parallel.max(1))),
            event_loop,
        })
    }

    /// Acquire a fresh page, waiting for a slot if the pool is saturated.
    pub async fn acquire(&self) -> Result<PageGuard, AdapterError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| AdapterError::Internal("pool closed".to_string()))?;

        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?;

        if self.config.stealth {
            stealth::apply(&page).await?;
        }

        let driver = ChromiumDriver::new(
            page,
            Duration::from_millis(self.config.nav_timeout_ms),
        );
        debug!("page acquired from pool");
        Ok(PageGuard {
            driver: Some(driver),
            _permit: permit,
        })
    }

    pub async fn shutdown(&self) {
        if let Err(err) = self.browser.lock().await.close().await {
            warn!(error = %err, "browser close failed");
        }
        self.event_loop.abort();
    }
}

/// Scoped page ownership: exactly one run holds this at a time; the page is
/// closed on drop whether the run passed, failed, or was cancelled.
pub struct PageGuard {
    driver: Option<ChromiumDriver>,
    _permit: OwnedSemaphorePermit,
}

impl PageGuard {
    pub fn driver(&self) -> &ChromiumDriver {
        self.driver
            .as_ref()
            .expect("driver present until drop")
    }

    /// Close the page eagerly instead of waiting for drop.
    pub async fn release(mut self) {
        if let Some(driver) = self.driver.take() {
            driver.close().await;
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            // Best effort: detach the close from the dropping task.
            tokio::spawn(async move {
                driver.close().await;
            });
        }
    }
}

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use engine_logging::{engine_debug, engine_warn};
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::fingerprint::Fingerprint;
use crate::types::{FailureKind, FetchError};

const LAUNCH_ARGS: [&str; 9] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-extensions",
    "--disable-background-networking",
    "--no-first-run",
    "--disable-popup-blocking",
];

/// One isolated browser process with its own throwaway profile.
///
/// `close` is the normal teardown path. `Drop` covers every other path
/// (early return, panic, cancelled future): it stops the CDP handler task,
/// and dropping the `Browser` kills the child process.
pub(crate) struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    closed: bool,
    _profile: TempDir,
}

impl BrowserSession {
    pub(crate) async fn launch(
        executable: &Path,
        headless: bool,
        fingerprint: &Fingerprint,
        launch_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let profile = TempDir::new().map_err(|err| {
            FetchError::new(FailureKind::Error, format!("browser profile dir: {err}"))
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .viewport(Some(CdpViewport {
                width: fingerprint.viewport.width,
                height: fingerprint.viewport.height,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .window_size(fingerprint.viewport.width, fingerprint.viewport.height)
            .args(LAUNCH_ARGS)
            .arg(format!("--user-agent={}", fingerprint.user_agent));
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|err| FetchError::new(FailureKind::Error, format!("browser config: {err}")))?;

        let (browser, mut handler) = tokio::time::timeout(launch_timeout, Browser::launch(config))
            .await
            .map_err(|_| {
                FetchError::new(
                    FailureKind::Timeout,
                    format!("browser launch timed out after {}s", launch_timeout.as_secs()),
                )
            })?
            .map_err(|err| FetchError::new(FailureKind::Error, format!("browser launch: {err}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        engine_debug!("Browser session launched with profile {:?}", profile.path());

        Ok(Self {
            browser,
            handler,
            closed: false,
            _profile: profile,
        })
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close the browser, killing the process if it has not exited
    /// within `deadline`.
    pub(crate) async fn close(mut self, deadline: Duration) {
        let shutdown = shut_down(&mut self.browser, deadline).await;
        self.handler.abort();
        self.closed = true;
        engine_debug!("Browser session closed: {:?}", shutdown);
    }
}

#[async_trait]
trait Teardown: Send {
    /// Ask the process to exit and wait until it has.
    async fn close_gracefully(&mut self) -> Result<(), String>;
    async fn force_kill(&mut self) -> Result<(), String>;
}

#[async_trait]
impl Teardown for Browser {
    async fn close_gracefully(&mut self) -> Result<(), String> {
        self.close().await.map_err(|err| format!("close: {err}"))?;
        self.wait().await.map_err(|err| format!("wait for exit: {err}"))?;
        Ok(())
    }

    async fn force_kill(&mut self) -> Result<(), String> {
        match self.kill().await {
            Some(Err(err)) => Err(err.to_string()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Shutdown {
    Graceful,
    Killed(String),
}

async fn shut_down<T: Teardown>(target: &mut T, deadline: Duration) -> Shutdown {
    let reason = match tokio::time::timeout(deadline, target.close_gracefully()).await {
        Ok(Ok(())) => return Shutdown::Graceful,
        Ok(Err(reason)) => reason,
        Err(_) => format!("timed out after {}ms", deadline.as_millis()),
    };
    engine_warn!("Browser did not shut down cleanly ({}); killing it", reason);
    if let Err(err) = target.force_kill().await {
        engine_warn!("Killing the browser failed: {}", err);
    }
    Shutdown::Killed(reason)
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        if !self.closed {
            engine_warn!("Browser session dropped without close; killing the browser process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    enum Behavior {
        Clean,
        Fails,
        Hangs,
    }

    struct StubProcess {
        behavior: Behavior,
        killed: bool,
    }

    impl StubProcess {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                killed: false,
            }
        }
    }

    #[async_trait]
    impl Teardown for StubProcess {
        async fn close_gracefully(&mut self) -> Result<(), String> {
            match self.behavior {
                Behavior::Clean => Ok(()),
                Behavior::Fails => Err("close: websocket closed".into()),
                Behavior::Hangs => std::future::pending().await,
            }
        }

        async fn force_kill(&mut self) -> Result<(), String> {
            self.killed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn clean_close_does_not_kill() {
        let mut process = StubProcess::new(Behavior::Clean);
        let shutdown = shut_down(&mut process, Duration::from_secs(5)).await;
        assert_eq!(shutdown, Shutdown::Graceful);
        assert!(!process.killed);
    }

    #[tokio::test]
    async fn failed_close_falls_back_to_kill() {
        let mut process = StubProcess::new(Behavior::Fails);
        let shutdown = shut_down(&mut process, Duration::from_secs(5)).await;
        assert_eq!(shutdown, Shutdown::Killed("close: websocket closed".into()));
        assert!(process.killed);
    }

    #[tokio::test]
    async fn hung_exit_is_bounded_by_the_deadline() {
        let mut process = StubProcess::new(Behavior::Hangs);
        let started = Instant::now();
        let shutdown = shut_down(&mut process, Duration::from_millis(50)).await;

        assert_eq!(shutdown, Shutdown::Killed("timed out after 50ms".into()));
        assert!(process.killed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

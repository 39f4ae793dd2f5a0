//! Process-wide runtime initialization.
//!
//! A [`Runtime`] is created once at startup and handed to
//! [`crate::ProstT5Model::load`]; models borrow it, so it cannot be torn down
//! while weights are still loaded.
use crate::runtime::Backend;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

static LOGGING: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumaStrategy {
    #[default]
    Disabled,
    Distribute,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Show runtime logs. When false only errors are printed.
    pub verbose: bool,
    pub numa: NumaStrategy,
}

pub struct Runtime<B: Backend> {
    backend: B,
    options: RuntimeOptions,
}

impl<B: Backend> Runtime<B> {
    pub fn init(backend: B, options: RuntimeOptions) -> Result<Self> {
        init_logging(options.verbose);
        backend.init(&options)?;
        info!(backend = backend.name(), numa = ?options.numa, "runtime initialized");
        Ok(Self { backend, options })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }
}

impl<B: Backend> Drop for Runtime<B> {
    fn drop(&mut self) {
        self.backend.shutdown();
        debug!(backend = self.backend.name(), "runtime released");
    }
}

/// Install the stderr subscriber. Only the first call has an effect and an
/// application that already installed its own subscriber keeps it.
/// `RUST_LOG` overrides the verbosity.
fn init_logging(verbose: bool) {
    LOGGING.get_or_init(|| {
        let default = if verbose {
            "ferritin_prostt5=debug,info"
        } else {
            "error"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::stub::StubBackend;

    #[test]
    fn test_runtime_init_twice() {
        let first = Runtime::init(StubBackend::default(), RuntimeOptions::default()).unwrap();
        let second = Runtime::init(
            StubBackend::default(),
            RuntimeOptions {
                verbose: true,
                numa: NumaStrategy::Distribute,
            },
        )
        .unwrap();
        assert!(!first.options().verbose);
        assert_eq!(second.options().numa, NumaStrategy::Distribute);
        assert_eq!(first.backend().name(), "stub");
    }

    #[test]
    fn test_backend_shutdown_on_drop() {
        let backend = StubBackend::default();
        let shutdowns = backend.shutdown_count();
        let runtime = Runtime::init(backend, RuntimeOptions::default()).unwrap();
        assert_eq!(shutdowns.load(std::sync::atomic::Ordering::SeqCst), 0);
        drop(runtime);
        assert_eq!(shutdowns.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

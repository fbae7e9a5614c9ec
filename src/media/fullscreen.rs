//! Fullscreen presentation toggle

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};

/// Display surface that may support fullscreen
#[async_trait]
pub trait FullscreenCapability: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn enter(&self) -> Result<()>;

    async fn exit(&self) -> Result<()>;
}

/// Capability of a terminal or service without a display
pub struct NoDisplay;

#[async_trait]
impl FullscreenCapability for NoDisplay {
    fn is_supported(&self) -> bool {
        false
    }

    async fn enter(&self) -> Result<()> {
        Err(AppError::Unsupported("fullscreen".to_string()))
    }

    async fn exit(&self) -> Result<()> {
        Err(AppError::Unsupported("fullscreen".to_string()))
    }
}

pub struct FullscreenController {
    capability: Arc<dyn FullscreenCapability>,
    active: AtomicBool,
}

impl FullscreenController {
    pub fn new(capability: Arc<dyn FullscreenCapability>) -> Self {
        Self {
            capability,
            active: AtomicBool::new(false),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_supported()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn enter(&self) -> Result<()> {
        self.ensure_supported()?;
        self.capability.enter().await?;
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn exit(&self) -> Result<()> {
        self.ensure_supported()?;
        self.capability.exit().await?;
        self.active.store(false, Ordering::Release);
        Ok(())
    }

    /// Enter or leave; returns the new fullscreen flag
    pub async fn toggle(&self) -> Result<bool> {
        if self.is_fullscreen() {
            self.exit().await?;
        } else {
            self.enter().await?;
        }
        Ok(self.is_fullscreen())
    }

    /// Record a change made outside the controller (e.g. the user pressed Esc)
    pub fn observe(&self, fullscreen: bool) {
        debug!("Fullscreen changed externally: {}", fullscreen);
        self.active.store(fullscreen, Ordering::Release);
    }

    fn ensure_supported(&self) -> Result<()> {
        if self.capability.is_supported() {
            Ok(())
        } else {
            Err(AppError::Unsupported("fullscreen".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Window {
        fail_enter: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FullscreenCapability for Window {
        fn is_supported(&self) -> bool {
            true
        }

        async fn enter(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_enter.load(Ordering::SeqCst) {
                return Err(AppError::Media("request rejected".to_string()));
            }
            Ok(())
        }

        async fn exit(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_toggle_round() {
        let window = Arc::new(Window::default());
        let fullscreen = FullscreenController::new(window.clone());

        assert!(fullscreen.toggle().await.unwrap());
        assert!(!fullscreen.toggle().await.unwrap());
        assert_eq!(window.calls.load(Ordering::SeqCst), 2);

        fullscreen.observe(true);
        assert!(!fullscreen.toggle().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_enter_keeps_windowed() {
        let window = Arc::new(Window::default());
        window.fail_enter.store(true, Ordering::SeqCst);
        let fullscreen = FullscreenController::new(window);

        assert!(fullscreen.enter().await.is_err());
        assert!(!fullscreen.is_fullscreen());
    }

    #[tokio::test]
    async fn test_unsupported_display() {
        let fullscreen = FullscreenController::new(Arc::new(NoDisplay));
        assert!(!fullscreen.is_supported());
        assert!(matches!(
            fullscreen.toggle().await,
            Err(AppError::Unsupported(_))
        ));
    }
}

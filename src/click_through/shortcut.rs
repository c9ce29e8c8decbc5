//! Global click-through shortcut
//!
//! The accelerator is registered once at startup and must be released at
//! teardown so its action (which holds a runtime handle) is dropped.

use crate::core::error::Result;

/// Action fired when the accelerator is pressed
pub type ShortcutAction = Box<dyn Fn() + Send + 'static>;

/// Platform global-shortcut facility
pub trait ShortcutBackend {
    fn register(&mut self, accelerator: &str, action: ShortcutAction) -> Result<()>;

    fn unregister(&mut self, accelerator: &str) -> Result<()>;
}

/// Registration state of the click-through accelerator
#[derive(Debug, Clone)]
pub struct ClickThroughShortcut {
    accelerator: String,
    registered: bool,
}

impl ClickThroughShortcut {
    pub fn new(accelerator: impl Into<String>) -> Self {
        Self {
            accelerator: accelerator.into(),
            registered: false,
        }
    }

    pub fn accelerator(&self) -> &str {
        &self.accelerator
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Bind `action` to the accelerator; a second call is a no-op
    pub fn register<B, F>(&mut self, backend: &mut B, action: F) -> Result<()>
    where
        B: ShortcutBackend + ?Sized,
        F: Fn() + Send + 'static,
    {
        if self.registered {
            return Ok(());
        }
        backend.register(&self.accelerator, Box::new(action))?;
        self.registered = true;
        tracing::info!("Registered click-through shortcut {}", self.accelerator);
        Ok(())
    }

    /// Release the accelerator; returns whether anything was unregistered
    pub fn unregister<B>(&mut self, backend: &mut B) -> Result<bool>
    where
        B: ShortcutBackend + ?Sized,
    {
        if !self.registered {
            return Ok(false);
        }
        backend.unregister(&self.accelerator)?;
        self.registered = false;
        tracing::info!("Unregistered click-through shortcut {}", self.accelerator);
        Ok(true)
    }
}

//! Synthetic input injection
//!
//! The executor presses and releases [`PhysicalInput`]s through the
//! [`InputInjector`] trait; each OS gets its own implementation behind it.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

use crate::catalog::PhysicalInput;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InjectionError {
    #[error("No platform mapping for {0}")]
    UnmappedInput(PhysicalInput),

    #[error("OS rejected synthetic input for {input}: {reason}")]
    Os { input: PhysicalInput, reason: String },

    #[error("Input injection is not supported: {0}")]
    Unsupported(String),
}

pub type InjectionResult<T> = Result<T, InjectionError>;

/// Sends press/release events for one input at a time.
pub trait InputInjector {
    fn press(&mut self, input: &PhysicalInput) -> InjectionResult<()>;

    fn release(&mut self, input: &PhysicalInput) -> InjectionResult<()>;

    fn name(&self) -> &'static str;
}

impl<T: InputInjector + ?Sized> InputInjector for Box<T> {
    fn press(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        (**self).press(input)
    }

    fn release(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        (**self).release(input)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Logs what would be sent and touches nothing.
#[derive(Debug, Default)]
pub struct DryRunInjector {
    pub presses: usize,
    pub releases: usize,
}

impl InputInjector for DryRunInjector {
    fn press(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        self.presses += 1;
        tracing::info!("[dry-run] press {}", input);
        Ok(())
    }

    fn release(&mut self, input: &PhysicalInput) -> InjectionResult<()> {
        self.releases += 1;
        tracing::info!("[dry-run] release {}", input);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

/// The injector for the current OS, or [`DryRunInjector`] where none exists.
pub fn platform_injector() -> Box<dyn InputInjector + Send> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::SendInputInjector::new())
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(macos::CoreGraphicsInjector::new())
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        tracing::warn!("No input injector for this platform, falling back to dry-run");
        Box::new(DryRunInjector::default())
    }
}

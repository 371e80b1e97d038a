//! Component lifecycle shared by rules, matchers, policies and engines.
//!
//! Components are assembled on the build path, initialized once, and then
//! treated as read-only for the lifetime of their configuration generation.
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initialized ──destroy()──▶ Destroyed
//!       │                              │
//!   (mutable)                     (read-only)
//! ```

use crate::error::ConfigError;

/// Lifecycle state of a configurable component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentState {
    /// Built but not yet initialized; may still be modified.
    #[default]
    Uninitialized,
    /// Initialized and read-only.
    Initialized,
    /// Destroyed; unusable.
    Destroyed,
}

impl ComponentState {
    /// Transition to `Initialized`.
    ///
    /// Initializing twice is a no-op. Initializing a destroyed component fails.
    pub fn initialize(&mut self, component: &str) -> Result<(), ConfigError> {
        match self {
            Self::Destroyed => Err(ConfigError::Destroyed {
                component: component.to_string(),
            }),
            _ => {
                *self = Self::Initialized;
                Ok(())
            }
        }
    }

    /// Transition to `Destroyed`.
    pub fn destroy(&mut self) {
        *self = Self::Destroyed;
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized)
    }

    /// Fail unless the component is initialized and not destroyed.
    pub fn ensure_usable(&self, component: &str) -> Result<(), ConfigError> {
        match self {
            Self::Initialized => Ok(()),
            Self::Uninitialized => Err(ConfigError::NotInitialized {
                component: component.to_string(),
            }),
            Self::Destroyed => Err(ConfigError::Destroyed {
                component: component.to_string(),
            }),
        }
    }

    /// Fail unless the component can still be modified.
    pub fn ensure_mutable(&self, component: &str) -> Result<(), ConfigError> {
        match self {
            Self::Uninitialized => Ok(()),
            Self::Initialized => Err(ConfigError::immutable(component)),
            Self::Destroyed => Err(ConfigError::Destroyed {
                component: component.to_string(),
            }),
        }
    }
}

/// A component with an explicit initialize/validate/destroy lifecycle.
///
/// Implementations cascade each call to the components they contain.
pub trait Component {
    /// Identifier used in diagnostics.
    fn component_id(&self) -> &str;

    /// Check configuration and freeze the component.
    fn initialize(&mut self) -> Result<(), ConfigError>;

    /// Release the component. It cannot be used afterwards.
    fn destroy(&mut self);

    /// Check that the component, and everything it contains, is usable.
    fn validate(&self) -> Result<(), ConfigError>;

    fn is_initialized(&self) -> bool;
}

//! Per-request view of a port descriptor.

use std::ops::Deref;
use std::sync::Arc;

use crate::port::descriptor::PortDescriptor;
use crate::port::setting::{SettingError, SettingValue};

/// A request-scoped handle on a shared [`PortDescriptor`].
///
/// Reads go straight to the shared descriptor. The first override clones it,
/// so changes made by inbound pipes stay private to the current request.
#[derive(Debug, Clone)]
pub struct PortView {
    descriptor: Arc<PortDescriptor>,
    overridden: bool,
}

impl PortView {
    pub fn new(descriptor: Arc<PortDescriptor>) -> Self {
        Self {
            descriptor,
            overridden: false,
        }
    }

    /// Override a setting for the rest of this request.
    pub fn set(&mut self, key: &str, value: Option<SettingValue>) -> Result<(), SettingError> {
        Arc::make_mut(&mut self.descriptor).settings.set(key, value)?;
        if !self.overridden {
            tracing::trace!(port = %self.descriptor.target(), key, "Port setting overridden");
        }
        self.overridden = true;
        Ok(())
    }

    pub fn is_overridden(&self) -> bool {
        self.overridden
    }
}

impl Deref for PortView {
    type Target = PortDescriptor;

    fn deref(&self) -> &PortDescriptor {
        &self.descriptor
    }
}

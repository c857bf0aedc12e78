//! Port descriptors and handler registration.
//!
//! A port is one routable handler method. Its descriptor is resolved once at
//! assembly time and shared; each request gets a [`PortView`] that inbound
//! pipes may override without touching the shared copy.

pub mod descriptor;
pub mod handler;
pub mod setting;
pub mod view;

pub use descriptor::{PortDescriptor, PortSettings};
pub use handler::{BindError, DeclaredPorts, Output, Page, PortCall, PortCatalog, PortMethod, PortTable};
pub use setting::{Merge, SettingError, SettingKind, SettingSpec, SettingValue};
pub use view::PortView;

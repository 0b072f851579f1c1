//! Element and connection types, their capability tables, and the
//! registry that ties a type tag to a driver.

pub mod capability;
pub mod driver;
pub mod drivers;
pub mod element_type;
pub mod error;
pub mod model;
pub mod registry;
pub mod state;

pub mod prelude {
    pub use crate::capability::{capabilities_for, ElementCapabilities};
    pub use crate::driver::ElementDriver;
    pub use crate::element_type::{ConnectionConcept, ElementTypeTag};
    pub use crate::error::ElementError;
    pub use crate::model::{Connection, Element};
    pub use crate::registry::{AlwaysAvailable, ElementRegistry, HostCapabilityProbe};
    pub use crate::state::{ElementAction, ElementState};
}

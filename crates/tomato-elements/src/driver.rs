use async_trait::async_trait;
use serde_json::{Map, Value};
use tomato_core::measurement::Measurement;

use crate::capability::ElementCapabilities;
use crate::error::ElementError;
use crate::state::ElementAction;

/// The behavior a registered element type supplies beyond its capability
/// tables: how to execute an action on the underlying resource, and how to
/// sample its current usage.
///
/// A driver is stateless with respect to any one element — the element's
/// own attribute bag (`attrs`) and accounting state (`usage_state`) are
/// passed in and mutated in place, the same way `updateUsage`/action
/// handlers in the original per-type modules took the element instance as
/// their only argument.
#[async_trait]
pub trait ElementDriver: Send + Sync {
    fn capabilities(&self) -> ElementCapabilities;

    /// Execute `action` against `attrs`, the element's current attribute
    /// bag. Implementations may read and write `attrs` (e.g. `prepare`
    /// allocating a `vmid`) but must not change the element's state — the
    /// caller applies the state transition once this returns successfully.
    async fn execute(
        &self,
        action: &ElementAction,
        attrs: &mut Map<String, Value>,
    ) -> Result<(), ElementError>;

    /// Take one usage sample. `attrs` carries the `last_<metric>` baseline
    /// state used by [`Measurement::update_continuous`] between calls.
    /// Elements that hold no resources before `prepare` return a zeroed
    /// measurement rather than erroring — sampling a `Created` element is
    /// a no-op, not a fault.
    async fn sample_usage(&self, attrs: &mut Map<String, Value>) -> Measurement;
}

/// A driver for a type with no resource footprint of its own (pure
/// interface/endpoint types). It accepts every action capability tables
/// allow it (there are none) and always reports zero usage.
pub struct NullDriver {
    caps: ElementCapabilities,
}

impl NullDriver {
    pub fn new(caps: ElementCapabilities) -> Self {
        Self { caps }
    }
}

#[async_trait]
impl ElementDriver for NullDriver {
    fn capabilities(&self) -> ElementCapabilities {
        self.caps.clone()
    }

    async fn execute(
        &self,
        _action: &ElementAction,
        _attrs: &mut Map<String, Value>,
    ) -> Result<(), ElementError> {
        Ok(())
    }

    async fn sample_usage(&self, _attrs: &mut Map<String, Value>) -> Measurement {
        Measurement::zero()
    }
}

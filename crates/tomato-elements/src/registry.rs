use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::{ElementDriver, NullDriver};
use crate::drivers::{KvmqmDriver, NetworkDriver, OpenvzDriver, RepyDriver};
use crate::element_type::ElementTypeTag;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("element type {0} is not registered")]
    NotRegistered(ElementTypeTag),
    #[error("element type {0} is already registered")]
    AlreadyRegistered(ElementTypeTag),
}

/// Probes whether a host can actually run a given element type. A real
/// deployment asks the kernel/hypervisor; tests and the default probe used
/// by `register_available` simply say yes to everything, mirroring a host
/// with every driver installed.
pub trait HostCapabilityProbe: Send + Sync {
    fn is_available(&self, typ: ElementTypeTag) -> bool;
}

pub struct AlwaysAvailable;

impl HostCapabilityProbe for AlwaysAvailable {
    fn is_available(&self, _typ: ElementTypeTag) -> bool {
        true
    }
}

/// Maps a type tag to the driver that implements it. Types are registered
/// once at process startup, gated on a host-capability probe — a host
/// without KVM support simply never registers `kvmqm`, and later lookups
/// for that type report `NotRegistered` exactly as they would for a typo.
#[derive(Default)]
pub struct ElementRegistry {
    drivers: HashMap<ElementTypeTag, Arc<dyn ElementDriver>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        typ: ElementTypeTag,
        driver: Arc<dyn ElementDriver>,
    ) -> Result<(), RegistryError> {
        if self.drivers.contains_key(&typ) {
            return Err(RegistryError::AlreadyRegistered(typ));
        }
        tracing::info!(%typ, "registered element driver");
        self.drivers.insert(typ, driver);
        Ok(())
    }

    pub fn get(&self, typ: ElementTypeTag) -> Result<Arc<dyn ElementDriver>, RegistryError> {
        self.drivers
            .get(&typ)
            .cloned()
            .ok_or(RegistryError::NotRegistered(typ))
    }

    pub fn is_registered(&self, typ: ElementTypeTag) -> bool {
        self.drivers.contains_key(&typ)
    }

    pub fn list(&self) -> Vec<ElementTypeTag> {
        self.drivers.keys().copied().collect()
    }

    pub fn unregister(&mut self, typ: ElementTypeTag) -> Result<(), RegistryError> {
        self.drivers
            .remove(&typ)
            .map(|_| ())
            .ok_or(RegistryError::NotRegistered(typ))
    }

    /// Builds a registry by probing `probe` for every type this workspace
    /// ships a driver for, skipping any the host reports as unavailable.
    pub fn register_available(probe: &dyn HostCapabilityProbe) -> Self {
        use ElementTypeTag::*;

        let mut registry = Self::new();
        let candidates: Vec<(ElementTypeTag, Arc<dyn ElementDriver>)> = vec![
            (Kvmqm, Arc::new(KvmqmDriver)),
            (
                KvmqmInterface,
                Arc::new(NullDriver::new(crate::capability::capabilities_for(
                    KvmqmInterface,
                ))),
            ),
            (Openvz, Arc::new(OpenvzDriver)),
            (
                OpenvzInterface,
                Arc::new(NullDriver::new(crate::capability::capabilities_for(
                    OpenvzInterface,
                ))),
            ),
            (Repy, Arc::new(RepyDriver)),
            (
                RepyInterface,
                Arc::new(NullDriver::new(crate::capability::capabilities_for(
                    RepyInterface,
                ))),
            ),
            (TincVpn, Arc::new(NetworkDriver::new(TincVpn))),
            (
                TincEndpoint,
                Arc::new(NullDriver::new(crate::capability::capabilities_for(
                    TincEndpoint,
                ))),
            ),
            (UdpEndpoint, Arc::new(NetworkDriver::new(UdpEndpoint))),
            (
                ExternalNetwork,
                Arc::new(NetworkDriver::new(ExternalNetwork)),
            ),
            (
                ExternalNetworkEndpoint,
                Arc::new(NullDriver::new(crate::capability::capabilities_for(
                    ExternalNetworkEndpoint,
                ))),
            ),
        ];

        for (typ, driver) in candidates {
            if probe.is_available(typ) {
                let _ = registry.register(typ, driver);
            } else {
                tracing::warn!(%typ, "host capability probe failed, skipping driver registration");
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyKvm;
    impl HostCapabilityProbe for DenyKvm {
        fn is_available(&self, typ: ElementTypeTag) -> bool {
            !matches!(typ, ElementTypeTag::Kvmqm)
        }
    }

    #[test]
    fn probe_gates_registration() {
        let registry = ElementRegistry::register_available(&DenyKvm);
        assert!(!registry.is_registered(ElementTypeTag::Kvmqm));
        assert!(registry.is_registered(ElementTypeTag::Openvz));
    }

    #[test]
    fn double_register_is_rejected() {
        let mut registry = ElementRegistry::new();
        registry
            .register(ElementTypeTag::Repy, Arc::new(RepyDriver))
            .unwrap();
        let result = registry.register(ElementTypeTag::Repy, Arc::new(RepyDriver));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_lookup_fails() {
        let registry = ElementRegistry::new();
        assert!(registry.get(ElementTypeTag::Openvz).is_err());
    }
}

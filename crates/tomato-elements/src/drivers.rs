//! Per-type drivers.
//!
//! These read host-reported counters out of the element's own attribute
//! bag (`_observed_cputime`, `_observed_traffic`, ...) rather than touching
//! any real hypervisor or network probe — the probe itself is a host-side
//! concern this workspace does not implement (see Non-goals). What lives
//! here is the accounting shape every device type needs: cumulative
//! counters go through [`Measurement::update_continuous`], instantaneous
//! readings are taken as-is.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tomato_core::measurement::Measurement;

use crate::capability::{capabilities_for, ElementCapabilities};
use crate::element_type::ElementTypeTag;
use crate::error::ElementError;
use crate::state::ElementAction;

fn observed(attrs: &Map<String, Value>, key: &str) -> f64 {
    attrs.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// `kvmqm` — a full virtual machine. Reports cputime (cumulative) and
/// memory (instantaneous, matching its `ram` attribute's working set).
pub struct KvmqmDriver;

#[async_trait]
impl super::driver::ElementDriver for KvmqmDriver {
    fn capabilities(&self) -> ElementCapabilities {
        capabilities_for(ElementTypeTag::Kvmqm)
    }

    async fn execute(
        &self,
        _action: &ElementAction,
        _attrs: &mut Map<String, Value>,
    ) -> Result<(), ElementError> {
        Ok(())
    }

    async fn sample_usage(&self, attrs: &mut Map<String, Value>) -> Measurement {
        let cputime_raw = observed(attrs, "_observed_cputime");
        let traffic_raw = observed(attrs, "_observed_traffic");
        Measurement {
            cputime: Measurement::update_continuous("cputime", cputime_raw, attrs),
            memory: observed(attrs, "_observed_memory"),
            diskspace: 0.0,
            traffic: Measurement::update_continuous("traffic", traffic_raw, attrs),
        }
    }
}

/// `openvz` — a container. Disk usage is read from the diskspace probe,
/// never derived from the `ram` attribute (the one documented point where
/// the original per-type module disagreed with itself).
pub struct OpenvzDriver;

#[async_trait]
impl super::driver::ElementDriver for OpenvzDriver {
    fn capabilities(&self) -> ElementCapabilities {
        capabilities_for(ElementTypeTag::Openvz)
    }

    async fn execute(
        &self,
        _action: &ElementAction,
        _attrs: &mut Map<String, Value>,
    ) -> Result<(), ElementError> {
        Ok(())
    }

    async fn sample_usage(&self, attrs: &mut Map<String, Value>) -> Measurement {
        let cputime_raw = observed(attrs, "_observed_cputime");
        let traffic_raw = observed(attrs, "_observed_traffic");
        Measurement {
            cputime: Measurement::update_continuous("cputime", cputime_raw, attrs),
            memory: observed(attrs, "_observed_memory"),
            diskspace: observed(attrs, "_observed_diskspace"),
            traffic: Measurement::update_continuous("traffic", traffic_raw, attrs),
        }
    }
}

/// `repy` — a sandboxed process; lighter resource footprint than a full
/// container, no disk accounting.
pub struct RepyDriver;

#[async_trait]
impl super::driver::ElementDriver for RepyDriver {
    fn capabilities(&self) -> ElementCapabilities {
        capabilities_for(ElementTypeTag::Repy)
    }

    async fn execute(
        &self,
        _action: &ElementAction,
        _attrs: &mut Map<String, Value>,
    ) -> Result<(), ElementError> {
        Ok(())
    }

    async fn sample_usage(&self, attrs: &mut Map<String, Value>) -> Measurement {
        let cputime_raw = observed(attrs, "_observed_cputime");
        Measurement {
            cputime: Measurement::update_continuous("cputime", cputime_raw, attrs),
            memory: observed(attrs, "_observed_memory"),
            diskspace: 0.0,
            traffic: 0.0,
        }
    }
}

/// `tinc_vpn` / `udp_endpoint` / `external_network` — pure network
/// plumbing. Only traffic accounting applies.
pub struct NetworkDriver {
    typ: ElementTypeTag,
}

impl NetworkDriver {
    pub fn new(typ: ElementTypeTag) -> Self {
        Self { typ }
    }
}

#[async_trait]
impl super::driver::ElementDriver for NetworkDriver {
    fn capabilities(&self) -> ElementCapabilities {
        capabilities_for(self.typ)
    }

    async fn execute(
        &self,
        _action: &ElementAction,
        _attrs: &mut Map<String, Value>,
    ) -> Result<(), ElementError> {
        Ok(())
    }

    async fn sample_usage(&self, attrs: &mut Map<String, Value>) -> Measurement {
        let traffic_raw = observed(attrs, "_observed_traffic");
        Measurement {
            cputime: 0.0,
            memory: 0.0,
            diskspace: 0.0,
            traffic: Measurement::update_continuous("traffic", traffic_raw, attrs),
        }
    }
}

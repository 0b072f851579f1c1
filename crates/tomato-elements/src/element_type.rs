use serde::{Deserialize, Serialize};
use std::fmt;

/// The type tag an element or connection registers under.
///
/// Interface types (`*Interface`) are the child elements a device type
/// creates one of per network attachment point; they are never created
/// directly by a caller, only as a side effect of attaching a connection
/// concept to their parent (see [`crate::capability::ElementCapabilities::children`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementTypeTag {
    Kvmqm,
    KvmqmInterface,
    Openvz,
    OpenvzInterface,
    Repy,
    RepyInterface,
    TincVpn,
    TincEndpoint,
    UdpEndpoint,
    ExternalNetwork,
    ExternalNetworkEndpoint,
}

impl ElementTypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementTypeTag::Kvmqm => "kvmqm",
            ElementTypeTag::KvmqmInterface => "kvmqm_interface",
            ElementTypeTag::Openvz => "openvz",
            ElementTypeTag::OpenvzInterface => "openvz_interface",
            ElementTypeTag::Repy => "repy",
            ElementTypeTag::RepyInterface => "repy_interface",
            ElementTypeTag::TincVpn => "tinc_vpn",
            ElementTypeTag::TincEndpoint => "tinc_endpoint",
            ElementTypeTag::UdpEndpoint => "udp_endpoint",
            ElementTypeTag::ExternalNetwork => "external_network",
            ElementTypeTag::ExternalNetworkEndpoint => "external_network_endpoint",
        }
    }

    /// Whether this type only ever exists as a child of another element.
    pub fn is_interface(&self) -> bool {
        matches!(
            self,
            ElementTypeTag::KvmqmInterface
                | ElementTypeTag::OpenvzInterface
                | ElementTypeTag::RepyInterface
                | ElementTypeTag::TincEndpoint
                | ElementTypeTag::ExternalNetworkEndpoint
        )
    }
}

impl fmt::Display for ElementTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The connection concept an interface-bearing element type can attach to.
/// Grouping by concept rather than by exact type lets a `tinc_vpn` endpoint
/// connect to anything else that speaks the same concept instead of
/// enumerating every valid pair by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionConcept {
    Bridge,
    Tinc,
}

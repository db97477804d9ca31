use std::collections::BTreeMap;

use crate::crd::free5gc::{NetworkAttachment, NetworkSpec};

/// Multus pod annotation listing secondary networks.
pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";

/// 3GPP reference points that may carry a secondary attachment.
///
/// Declaration order is the composition priority: control-plane-adjacent
/// interfaces first, then user plane, then inter-function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interface {
    /// N2, NGAP towards the RAN
    Control,
    /// N4, PFCP between SMF and UPF
    Signaling,
    /// N3, GTP-U from the RAN
    UserPlane,
    /// N6, towards the data network
    Internet,
    /// N9, UPF to UPF (ULCL only)
    InterFunction,
}

impl Interface {
    pub fn attachment(self, network: &NetworkSpec) -> Option<&NetworkAttachment> {
        match self {
            Interface::Control => network.n2_network.as_ref(),
            Interface::Signaling => network.n4_network.as_ref(),
            Interface::UserPlane => network.n3_network.as_ref(),
            Interface::Internet => network.n6_network.as_ref(),
            Interface::InterFunction => network.n9_network.as_ref(),
        }
    }
}

/// Compose the networks annotation value from optional attachments.
///
/// Slots are ordered by interface priority regardless of input order, absent
/// or unnamed attachments are skipped and repeated names collapse to the
/// first occurrence. Returns `None` when nothing is attached so the caller
/// drops the key instead of writing an empty value.
pub fn compose<'a, I>(slots: I) -> Option<String>
where
    I: IntoIterator<Item = (Interface, Option<&'a NetworkAttachment>)>,
{
    let mut slots: Vec<_> = slots.into_iter().collect();
    slots.sort_by_key(|(iface, _)| *iface);

    let mut names: Vec<&str> = Vec::new();
    for (_, attachment) in slots {
        let Some(name) = attachment.map(|a| a.name.trim()) else {
            continue;
        };
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        None
    } else {
        Some(names.join(","))
    }
}

/// Compose the annotation for a workload class attached to `interfaces`.
pub fn compose_for(
    network: &NetworkSpec,
    interfaces: &[Interface],
) -> Option<String> {
    compose(interfaces.iter().map(|i| (*i, i.attachment(network))))
}

/// Set or remove the networks annotation so the map always reflects the
/// freshly composed value. An emptied map collapses to `None`.
pub fn set_networks_annotation(
    annotations: &mut Option<BTreeMap<String, String>>,
    value: Option<&str>,
) {
    match value {
        Some(v) => {
            annotations
                .get_or_insert_with(BTreeMap::new)
                .insert(NETWORKS_ANNOTATION.to_string(), v.to_string());
        }
        None => {
            if let Some(map) = annotations.as_mut() {
                map.remove(NETWORKS_ANNOTATION);
                if map.is_empty() {
                    *annotations = None;
                }
            }
        }
    }
}

//! Per-radio and per-link configuration accessed by the planner.
//!
//! Configuration lives in two layers. The user layer holds operator
//! overrides and is never rewritten by the planner unless explicitly asked
//! to clear it; the auto layer holds planner output. Merged reads let the
//! user layer win field by field.

use crate::error::{TopologyError, TopologyResult};
use crate::link_group::LinkGroupHelper;
use crate::model::{Link, Node};
use crate::view::TopologyView;
use meshplan_core::{
    Channel, GolayIdx, PlannerConfig, Polarity, CHANNEL_RANGE, CONTROL_SUPERFRAME_MAX,
    CONTROL_SUPERFRAME_UNSET, DEFAULT_CHANNEL, GOLAY_COLORS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Radio MAC to polarity.
pub type MacToPolarity = BTreeMap<String, Polarity>;

/// Which layer(s) a read consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Operator overrides only
    UserOnly,
    /// Planner output only
    AutoOnly,
    /// User layer over auto layer
    Merged,
}

/// Which layer a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Operator overrides
    User,
    /// Planner output
    Auto,
}

/// Configuration accessors used by the planner.
///
/// Implementors supply per-radio and per-link primitives; the link-level
/// helpers are derived from them.
pub trait ConfigStore {
    /// Polarity of one radio.
    fn radio_polarity(&self, node_name: &str, mac: &str, mode: ReadMode) -> Option<Polarity>;

    /// Write (or clear, with `None`) the polarity of one radio.
    fn set_radio_polarity(
        &mut self,
        node_name: &str,
        mac: &str,
        polarity: Option<Polarity>,
        layer: ConfigLayer,
    ) -> TopologyResult<()>;

    /// Channel of one radio. Out-of-range stored values read as `None`.
    fn radio_channel(&self, node_name: &str, mac: &str, mode: ReadMode) -> Option<Channel>;

    /// Write (or clear) the channel of one radio.
    fn set_radio_channel(
        &mut self,
        node_name: &str,
        mac: &str,
        channel: Option<Channel>,
        layer: ConfigLayer,
    ) -> TopologyResult<()>;

    /// Golay pair a node uses towards a responder radio.
    fn node_link_golay(
        &self,
        node_name: &str,
        responder_mac: &str,
        mode: ReadMode,
    ) -> Option<GolayIdx>;

    /// Write (or clear) the Golay pair a node uses towards a responder.
    fn set_node_link_golay(
        &mut self,
        node_name: &str,
        responder_mac: &str,
        golay: Option<GolayIdx>,
        layer: ConfigLayer,
    ) -> TopologyResult<()>;

    /// Control superframe a node uses towards a responder radio.
    fn node_link_control_superframe(
        &self,
        node_name: &str,
        responder_mac: &str,
        mode: ReadMode,
    ) -> Option<u8>;

    /// Write (or clear) the control superframe towards a responder.
    fn set_node_link_control_superframe(
        &mut self,
        node_name: &str,
        responder_mac: &str,
        value: Option<u8>,
        layer: ConfigLayer,
    ) -> TopologyResult<()>;

    /// Channels the planner may hand out. Never empty.
    fn enabled_channels(&self) -> BTreeSet<Channel>;

    /// Channel shared by both ends of a link, if they agree.
    fn link_channel(&self, link: &Link, mode: ReadMode) -> Option<Channel> {
        if link.a_node_mac.is_empty() || link.z_node_mac.is_empty() {
            return None;
        }
        let a = self.radio_channel(&link.a_node_name, &link.a_node_mac, mode);
        let z = self.radio_channel(&link.z_node_name, &link.z_node_mac, mode);
        match (a, z) {
            (Some(a), Some(z)) if a == z => Some(a),
            _ => None,
        }
    }

    /// Set the channel on both radios of a link.
    fn set_link_channel(
        &mut self,
        link: &Link,
        channel: Option<Channel>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        tracing::debug!(
            link = %link.name,
            layer = ?layer,
            channel = ?channel,
            "Setting link channel"
        );
        if !link.a_node_mac.is_empty() {
            self.set_radio_channel(&link.a_node_name, &link.a_node_mac, channel, layer)?;
        }
        if !link.z_node_mac.is_empty() {
            self.set_radio_channel(&link.z_node_name, &link.z_node_mac, channel, layer)?;
        }
        Ok(())
    }

    /// Golay pair shared by both ends of a link, if they agree and are set.
    fn link_golay(&self, link: &Link, mode: ReadMode) -> Option<GolayIdx> {
        if link.a_node_mac.is_empty() || link.z_node_mac.is_empty() {
            return None;
        }
        let a = self.node_link_golay(&link.a_node_name, &link.z_node_mac, mode);
        let z = self.node_link_golay(&link.z_node_name, &link.a_node_mac, mode);
        match (a, z) {
            (Some(a), Some(z)) if a == z && !a.is_unset() => Some(a),
            _ => None,
        }
    }

    /// Set the Golay pair on both ends of a link.
    fn set_link_golay(
        &mut self,
        link: &Link,
        golay: Option<GolayIdx>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        tracing::debug!(
            link = %link.name,
            layer = ?layer,
            golay = ?golay,
            "Setting link golay"
        );
        if !link.z_node_mac.is_empty() {
            self.set_node_link_golay(&link.a_node_name, &link.z_node_mac, golay, layer)?;
        }
        if !link.a_node_mac.is_empty() {
            self.set_node_link_golay(&link.z_node_name, &link.a_node_mac, golay, layer)?;
        }
        Ok(())
    }

    /// Control superframe values of the two ends of a link.
    fn link_control_superframe(&self, link: &Link, mode: ReadMode) -> (Option<u8>, Option<u8>) {
        (
            self.node_link_control_superframe(&link.a_node_name, &link.z_node_mac, mode),
            self.node_link_control_superframe(&link.z_node_name, &link.a_node_mac, mode),
        )
    }

    /// Set the control superframe on both ends of a link.
    fn set_link_control_superframe(
        &mut self,
        link: &Link,
        value: Option<u8>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        tracing::debug!(
            link = %link.name,
            layer = ?layer,
            control_superframe = ?value,
            "Setting link control superframe"
        );
        if !link.z_node_mac.is_empty() {
            self.set_node_link_control_superframe(
                &link.a_node_name,
                &link.z_node_mac,
                value,
                layer,
            )?;
        }
        if !link.a_node_mac.is_empty() {
            self.set_node_link_control_superframe(
                &link.z_node_name,
                &link.a_node_mac,
                value,
                layer,
            )?;
        }
        Ok(())
    }

    /// Polarity of every radio on the given nodes that has one.
    fn polarities(&self, nodes: &[Node], mode: ReadMode) -> MacToPolarity {
        let mut polarities = MacToPolarity::new();
        for node in nodes {
            for mac in &node.wlan_macs {
                if let Some(polarity) = self.radio_polarity(&node.name, mac, mode) {
                    polarities.insert(mac.clone(), polarity);
                }
            }
        }
        polarities
    }

    /// Remove every user polarity override on the given nodes.
    fn clear_user_polarities(&mut self, nodes: &[Node]) -> TopologyResult<()> {
        for node in nodes {
            for mac in &node.wlan_macs {
                self.set_radio_polarity(&node.name, mac, None, ConfigLayer::User)?;
            }
        }
        Ok(())
    }

    /// Auto-assigned channels currently in use by some link group.
    fn used_channels(&self, topology: &dyn TopologyView) -> BTreeSet<Channel> {
        LinkGroupHelper::get_link_groups(topology)
            .values()
            .filter_map(|links| links.iter().next())
            .filter_map(|name| topology.link(name))
            .filter_map(|link| self.link_channel(link, ReadMode::AutoOnly))
            .collect()
    }
}

/// Radio-level parameters of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadioParams {
    /// TDMA polarity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    /// RF channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

/// Link-level parameters towards one responder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkParams {
    /// Golay pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golay: Option<GolayIdx>,
    /// Control superframe slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_superframe: Option<u8>,
}

/// Overrides of one node within one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOverrides {
    /// Defaults for every radio of the node
    #[serde(default)]
    pub radio_base: RadioParams,
    /// Per-radio overrides, keyed by radio MAC
    #[serde(default)]
    pub radios: BTreeMap<String, RadioParams>,
    /// Defaults for every link of the node
    #[serde(default)]
    pub link_base: LinkParams,
    /// Per-link overrides, keyed by responder MAC
    #[serde(default)]
    pub links: BTreeMap<String, LinkParams>,
}

impl NodeOverrides {
    fn radio<T>(&self, mac: &str, field: impl Fn(&RadioParams) -> Option<T>) -> Option<T> {
        self.radios
            .get(mac)
            .and_then(&field)
            .or_else(|| field(&self.radio_base))
    }

    fn link<T>(&self, responder_mac: &str, field: impl Fn(&LinkParams) -> Option<T>) -> Option<T> {
        self.links
            .get(responder_mac)
            .and_then(&field)
            .or_else(|| field(&self.link_base))
    }

    fn is_empty(&self) -> bool {
        *self == NodeOverrides::default()
    }
}

/// Node name to overrides, for one layer.
pub type LayerOverrides = BTreeMap<String, NodeOverrides>;

/// Both layers as a single serializable document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Enabled channels
    #[serde(default)]
    pub enabled_channels: BTreeSet<Channel>,
    /// Operator overrides
    #[serde(default)]
    pub user: LayerOverrides,
    /// Planner output
    #[serde(default)]
    pub auto: LayerOverrides,
}

/// `ConfigStore` backed by in-memory override maps.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryConfigStore {
    enabled_channels: BTreeSet<Channel>,
    user: LayerOverrides,
    auto: LayerOverrides,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new(BTreeSet::from([DEFAULT_CHANNEL]))
    }
}

impl InMemoryConfigStore {
    /// Empty store with the given enabled channels.
    pub fn new(enabled_channels: BTreeSet<Channel>) -> Self {
        let mut store = Self {
            enabled_channels: BTreeSet::new(),
            user: LayerOverrides::new(),
            auto: LayerOverrides::new(),
        };
        store.set_enabled_channels(enabled_channels);
        store
    }

    /// Empty store following the planner configuration's channel policy.
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.channels.enabled_set())
    }

    /// Replace the enabled channel set; invalid entries are dropped.
    pub fn set_enabled_channels(&mut self, channels: BTreeSet<Channel>) {
        let mut valid: BTreeSet<Channel> = channels
            .into_iter()
            .filter(|channel| CHANNEL_RANGE.contains(channel))
            .collect();
        if valid.is_empty() {
            valid.insert(DEFAULT_CHANNEL);
        }
        self.enabled_channels = valid;
    }

    /// Overrides of one layer.
    pub fn layer(&self, layer: ConfigLayer) -> &LayerOverrides {
        match layer {
            ConfigLayer::User => &self.user,
            ConfigLayer::Auto => &self.auto,
        }
    }

    /// Replace a node's overrides in one layer wholesale.
    pub fn set_node_overrides(
        &mut self,
        node_name: &str,
        overrides: NodeOverrides,
        layer: ConfigLayer,
    ) {
        let map = self.layer_mut(layer);
        if overrides.is_empty() {
            map.remove(node_name);
        } else {
            map.insert(node_name.to_string(), overrides);
        }
    }

    /// Export both layers.
    pub fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            enabled_channels: self.enabled_channels.clone(),
            user: self.user.clone(),
            auto: self.auto.clone(),
        }
    }

    /// Import both layers.
    pub fn from_document(document: ConfigDocument) -> Self {
        let mut store = Self::new(document.enabled_channels);
        store.user = document.user;
        store.auto = document.auto;
        store
    }

    /// Serialize both layers as JSON.
    pub fn to_json(&self) -> TopologyResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Load both layers from JSON.
    pub fn from_json(json: &str) -> TopologyResult<Self> {
        let document: ConfigDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document))
    }

    fn layer_mut(&mut self, layer: ConfigLayer) -> &mut LayerOverrides {
        match layer {
            ConfigLayer::User => &mut self.user,
            ConfigLayer::Auto => &mut self.auto,
        }
    }

    fn read<T>(
        &self,
        node_name: &str,
        mode: ReadMode,
        field: impl Fn(&NodeOverrides) -> Option<T>,
    ) -> Option<T> {
        let user = || self.user.get(node_name).and_then(&field);
        let auto = || self.auto.get(node_name).and_then(&field);
        match mode {
            ReadMode::UserOnly => user(),
            ReadMode::AutoOnly => auto(),
            ReadMode::Merged => user().or_else(auto),
        }
    }

    fn write(
        &mut self,
        node_name: &str,
        layer: ConfigLayer,
        update: impl FnOnce(&mut NodeOverrides),
    ) {
        let map = self.layer_mut(layer);
        let overrides = map.entry(node_name.to_string()).or_default();
        update(overrides);
        overrides.radios.retain(|_, params| *params != RadioParams::default());
        overrides.links.retain(|_, params| *params != LinkParams::default());
        if overrides.is_empty() {
            map.remove(node_name);
        }
    }
}

fn invalid_value(param: &'static str, value: impl ToString, target: String) -> TopologyError {
    TopologyError::InvalidValue {
        param,
        value: value.to_string(),
        target,
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn radio_polarity(&self, node_name: &str, mac: &str, mode: ReadMode) -> Option<Polarity> {
        self.read(node_name, mode, |o| o.radio(mac, |r| r.polarity))
    }

    fn set_radio_polarity(
        &mut self,
        node_name: &str,
        mac: &str,
        polarity: Option<Polarity>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        self.write(node_name, layer, |o| {
            o.radios.entry(mac.to_string()).or_default().polarity = polarity;
        });
        Ok(())
    }

    fn radio_channel(&self, node_name: &str, mac: &str, mode: ReadMode) -> Option<Channel> {
        self.read(node_name, mode, |o| o.radio(mac, |r| r.channel))
            .filter(|channel| CHANNEL_RANGE.contains(channel))
    }

    fn set_radio_channel(
        &mut self,
        node_name: &str,
        mac: &str,
        channel: Option<Channel>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        if let Some(value) = channel {
            if !CHANNEL_RANGE.contains(&value) {
                return Err(invalid_value("channel", value, format!("{}/{}", node_name, mac)));
            }
        }
        self.write(node_name, layer, |o| {
            o.radios.entry(mac.to_string()).or_default().channel = channel;
        });
        Ok(())
    }

    fn node_link_golay(
        &self,
        node_name: &str,
        responder_mac: &str,
        mode: ReadMode,
    ) -> Option<GolayIdx> {
        self.read(node_name, mode, |o| o.link(responder_mac, |l| l.golay))
    }

    fn set_node_link_golay(
        &mut self,
        node_name: &str,
        responder_mac: &str,
        golay: Option<GolayIdx>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        if let Some(value) = golay {
            let known = |idx: u8| GOLAY_COLORS.contains(&idx);
            if !value.is_unset() && !(known(value.tx) && known(value.rx)) {
                return Err(invalid_value(
                    "golay",
                    value,
                    format!("{}->{}", node_name, responder_mac),
                ));
            }
        }
        self.write(node_name, layer, |o| {
            o.links.entry(responder_mac.to_string()).or_default().golay = golay;
        });
        Ok(())
    }

    fn node_link_control_superframe(
        &self,
        node_name: &str,
        responder_mac: &str,
        mode: ReadMode,
    ) -> Option<u8> {
        self.read(node_name, mode, |o| {
            o.link(responder_mac, |l| l.control_superframe)
        })
    }

    fn set_node_link_control_superframe(
        &mut self,
        node_name: &str,
        responder_mac: &str,
        value: Option<u8>,
        layer: ConfigLayer,
    ) -> TopologyResult<()> {
        if let Some(sf) = value {
            if sf > CONTROL_SUPERFRAME_MAX && sf != CONTROL_SUPERFRAME_UNSET {
                return Err(invalid_value(
                    "control superframe",
                    sf,
                    format!("{}->{}", node_name, responder_mac),
                ));
            }
        }
        self.write(node_name, layer, |o| {
            o.links
                .entry(responder_mac.to_string())
                .or_default()
                .control_superframe = value;
        });
        Ok(())
    }

    fn enabled_channels(&self) -> BTreeSet<Channel> {
        self.enabled_channels.clone()
    }
}

//! Per-link configuration gate run before a link is brought up.

use crate::channel::ChannelHelper;
use crate::control_superframe::ControlSuperframeHelper;
use crate::error::AssignResult;
use crate::golay::GolayHelper;
use crate::interference::InterferenceHelper;
use crate::polarity::PolarityHelper;
use meshplan_topology::{ConfigStore, Link, ReadMode, TopologyView};
use rand::Rng;
use serde::Serialize;
use std::fmt;

/// A link parameter checked by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkParam {
    /// Radio polarity on both ends
    Polarity,
    /// Channel on both ends
    Channel,
    /// Golay code on both ends
    Golay,
    /// Control superframe slot on both ends
    ControlSuperframe,
}

impl fmt::Display for LinkParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkParam::Polarity => "polarity",
            LinkParam::Channel => "channel",
            LinkParam::Golay => "golay",
            LinkParam::ControlSuperframe => "control superframe",
        };
        f.write_str(name)
    }
}

/// Outcome of gating one link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkConfigReport {
    /// Parameters that were invalid and have been fixed, in check order
    pub repaired: Vec<LinkParam>,
    /// Parameter that could not be fixed; later ones were not checked
    pub failed: Option<LinkParam>,
}

impl LinkConfigReport {
    /// Whether the link may be brought up.
    pub fn is_valid(&self) -> bool {
        self.failed.is_none()
    }
}

/// Checks and repairs the configuration of single links.
pub struct LinkConfigValidator<R> {
    channel: ChannelHelper,
    golay: GolayHelper,
    rng: R,
}

impl<R: Rng> LinkConfigValidator<R> {
    /// Validator with the given interference model and colour randomness.
    pub fn new(interference: InterferenceHelper, rng: R) -> Self {
        Self {
            channel: ChannelHelper::new(interference.clone()),
            golay: GolayHelper::new(interference),
            rng,
        }
    }

    /// Repair polarity, channel, Golay and control superframe in that order.
    ///
    /// Stops at the first parameter that cannot be made valid. Repairs made
    /// before that point stay in the auto layer.
    pub fn validate_link_config(
        &mut self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        link: &Link,
    ) -> AssignResult<LinkConfigReport> {
        let mut report = LinkConfigReport::default();
        if !link.is_wireless() {
            return Ok(report);
        }

        for param in [
            LinkParam::Polarity,
            LinkParam::Channel,
            LinkParam::Golay,
            LinkParam::ControlSuperframe,
        ] {
            if Self::is_valid(topology, &*config, link, param) {
                continue;
            }
            if self.repair(topology, config, link, param)? {
                tracing::warn!(link = %link.name, param = %param, "Repaired invalid link config");
                report.repaired.push(param);
            } else {
                tracing::error!(link = %link.name, param = %param, "Invalid link config");
                report.failed = Some(param);
                break;
            }
        }
        Ok(report)
    }

    fn is_valid(
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        link: &Link,
        param: LinkParam,
    ) -> bool {
        if !link.has_radio_macs() {
            return true;
        }
        match param {
            LinkParam::Polarity => PolarityHelper::is_valid_link_polarity(
                config.radio_polarity(&link.a_node_name, &link.a_node_mac, ReadMode::Merged),
                config.radio_polarity(&link.z_node_name, &link.z_node_mac, ReadMode::Merged),
            ),
            LinkParam::Channel => ChannelHelper::is_valid_link_channel(
                config.radio_channel(&link.a_node_name, &link.a_node_mac, ReadMode::Merged),
                config.radio_channel(&link.z_node_name, &link.z_node_mac, ReadMode::Merged),
            ),
            LinkParam::Golay => GolayHelper::is_valid_link_golay(
                config.node_link_golay(&link.a_node_name, &link.z_node_mac, ReadMode::Merged),
                config.node_link_golay(&link.z_node_name, &link.a_node_mac, ReadMode::Merged),
            ),
            LinkParam::ControlSuperframe => {
                let (a, z) = config.link_control_superframe(link, ReadMode::Merged);
                ControlSuperframeHelper::is_valid_link_control_superframe(
                    topology, config, link, a, z,
                )
            }
        }
    }

    fn repair(
        &mut self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        link: &Link,
        param: LinkParam,
    ) -> AssignResult<bool> {
        match param {
            LinkParam::Polarity => PolarityHelper::assign_link_polarity(topology, config, link),
            LinkParam::Channel => {
                self.channel
                    .assign_link_channel(topology, config, link, &mut self.rng)
            }
            LinkParam::Golay => self
                .golay
                .assign_link_golay(topology, config, link, &mut self.rng),
            LinkParam::ControlSuperframe => {
                ControlSuperframeHelper::assign_link_control_superframe(topology, config, link)
            }
        }
    }
}

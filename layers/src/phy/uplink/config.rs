//! Configuration for the uplink PHY core, nested under the binary's existing
//! YAML/TOML configuration (see `gnb/src/config.rs`), not a parallel system.

use serde::{Deserialize, Serialize};

fn default_nof_ul_rg() -> usize {
    4
}

fn default_max_concurrency() -> usize {
    4
}

fn default_nof_harq_ids() -> usize {
    16
}

fn default_max_codeblocks_per_harq() -> usize {
    32
}

/// HARQ-id space and codeblock budget handed to the (external) rate-matching
/// buffer pool at construction time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RxBufferConfig {
    #[serde(default = "default_nof_harq_ids")]
    pub nof_harq_ids: usize,
    #[serde(default = "default_max_codeblocks_per_harq")]
    pub max_codeblocks_per_harq: usize,
}

impl Default for RxBufferConfig {
    fn default() -> Self {
        Self {
            nof_harq_ids: default_nof_harq_ids(),
            max_codeblocks_per_harq: default_max_codeblocks_per_harq(),
        }
    }
}

/// Recognised configuration keys for the uplink core, enumerated in SPEC_FULL.md §6.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UplinkCoreConfig {
    /// Uplink bandwidth in resource blocks, 1..275.
    pub ul_bw_rb: u16,
    /// Number of receive antenna ports, 1..4.
    pub nof_rx_ports: u8,
    /// Maximum PUSCH spatial layers, 1..4.
    pub pusch_max_nof_layers: u8,
    /// Bitmask over numerologies 0..4 that are active on this carrier.
    pub active_scs: u8,
    /// Depth of the resource-grid pool.
    #[serde(default = "default_nof_ul_rg")]
    pub nof_ul_rg: usize,
    /// Maximum concurrent tasks accepted per executor.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub rx_buffer_config: RxBufferConfig,
}

impl Default for UplinkCoreConfig {
    fn default() -> Self {
        Self {
            ul_bw_rb: 106,
            nof_rx_ports: 2,
            pusch_max_nof_layers: 2,
            active_scs: 0b0000_0010, // numerology 1 (30 kHz) active
            nof_ul_rg: default_nof_ul_rg(),
            max_concurrency: default_max_concurrency(),
            rx_buffer_config: RxBufferConfig::default(),
        }
    }
}

impl UplinkCoreConfig {
    /// Structural validation of the enumerated keys; configuration outside
    /// SRS/PUSCH/PUCCH/PRACH parameters is not this crate's concern.
    pub fn is_valid(&self) -> bool {
        (1..=275).contains(&self.ul_bw_rb)
            && (1..=4).contains(&self.nof_rx_ports)
            && (1..=4).contains(&self.pusch_max_nof_layers)
            && self.nof_ul_rg >= 1
            && self.max_concurrency >= 1
    }

    pub fn is_numerology_active(&self, numerology: u8) -> bool {
        numerology < 5 && (self.active_scs & (1 << numerology)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(UplinkCoreConfig::default().is_valid());
    }

    #[test]
    fn rejects_out_of_range_bandwidth() {
        let mut cfg = UplinkCoreConfig::default();
        cfg.ul_bw_rb = 276;
        assert!(!cfg.is_valid());
    }

    #[test]
    fn numerology_bitmask_lookup() {
        let cfg = UplinkCoreConfig::default();
        assert!(cfg.is_numerology_active(1));
        assert!(!cfg.is_numerology_active(0));
    }
}

/*++

Licensed under the Apache-2.0 license.

File Name:

   config.rs

Abstract:

    File contains utilities for parsing configuration files

--*/

use std::path::Path;

use anyhow::{anyhow, Context};
use sensor_prov_gen::DebugEntitlementParams;
use sensor_prov_types::{LifecycleState, RootOfTrust};
use serde_derive::{Deserialize, Serialize};

/// Debug Entitlement Configuration
#[derive(Default, Serialize, Deserialize)]
pub(crate) struct EntitlementConfig {
    pub root_of_trust: String,

    pub lifecycle_state: String,

    #[serde(default)]
    pub key_cert: bool,

    #[serde(default)]
    pub rma: bool,

    pub sw_version: u32,

    pub cert_version: u32,

    pub soc_id: String,

    pub enabler_mask: String,

    pub enabler_lock: String,

    pub developer_mask: String,
}

fn decode_hex<const N: usize>(field: &str, value: &str) -> anyhow::Result<[u8; N]> {
    let bytes = hex::decode(value).with_context(|| format!("{field} is not valid hex"))?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| anyhow!("{field} must be {N} bytes, found {}", bytes.len()))
}

impl EntitlementConfig {
    pub fn root_of_trust(&self) -> anyhow::Result<RootOfTrust> {
        Ok(self.root_of_trust.parse()?)
    }

    pub fn params(&self) -> anyhow::Result<DebugEntitlementParams> {
        Ok(DebugEntitlementParams {
            key_cert: self.key_cert,
            sw_version: self.sw_version,
            cert_version: self.cert_version,
            soc_id: decode_hex("soc_id", &self.soc_id)?,
            enabler_mask: decode_hex("enabler_mask", &self.enabler_mask)?,
            enabler_lock: decode_hex("enabler_lock", &self.enabler_lock)?,
            developer_mask: decode_hex("developer_mask", &self.developer_mask)?,
            lcs: self.lifecycle_state.parse::<LifecycleState>()?,
            rma: self.rma,
        })
    }
}

/// Load Debug Entitlement Configuration from file
pub(crate) fn load_entitlement_config(path: &Path) -> anyhow::Result<EntitlementConfig> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    let config: EntitlementConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}

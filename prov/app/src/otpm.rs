/*++

Licensed under the Apache-2.0 license.

File Name:

   otpm.rs

Abstract:

    File contains the OTPM inspection command.

--*/

use std::path::Path;

use anyhow::Context;
use sensor_prov_serde::OtpmImage;
use sensor_prov_types::OtpmHeaderWord;

/// One line per record: word offset, asset type and payload length
fn describe(image: &OtpmImage, offsets: &[usize]) -> Vec<String> {
    offsets
        .iter()
        .map(|&offset| {
            let header = OtpmHeaderWord(image.words()[offset]);
            format!(
                "{offset:6}  type {:#06x}  {} words",
                header.asset_type(),
                header.length()
            )
        })
        .collect()
}

/// Run the otpm-index command
pub(crate) fn otpm_index(path: &Path, asset_type: Option<u16>) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let image = OtpmImage::from_le_bytes(&bytes)?;

    let offsets = match asset_type {
        Some(asset_type) => match image.find_latest_asset(asset_type) {
            Some(offset) => vec![offset],
            None => {
                log::info!("No record of type {asset_type:#06x}");
                return Ok(());
            }
        },
        None => image.index(),
    };
    for line in describe(&image, &offsets) {
        println!("{line}");
    }
    Ok(())
}

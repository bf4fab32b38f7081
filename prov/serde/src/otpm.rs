/*++

Licensed under the Apache-2.0 license.

File Name:

   otpm.rs

Abstract:

    File contains the indexer for OTPM snapshots read back from a device.

--*/

use log::debug;
use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_types::OtpmHeaderWord;

use crate::NvmRecord;

const IMAGE: &str = "OTPM image";

/// Word-addressed OTPM snapshot
///
/// Records are laid out back to back as a header word followed by `length`
/// payload words. Scanning stops at the first zero header word or at the end
/// of the buffer. OTPM is append-only, so when a type occurs more than once
/// the last occurrence supersedes the earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpmImage {
    words: Vec<u32>,
}

impl OtpmImage {
    pub fn new(words: &[u32]) -> Self {
        Self {
            words: words.to_vec(),
        }
    }

    /// Build an image from a little-endian byte dump
    pub fn from_le_bytes(bytes: &[u8]) -> ProvResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(ProvError::malformed(
                IMAGE,
                format!("length {} is not a multiple of 4", bytes.len()),
            ));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { words })
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Word offsets of every record, in scan order
    pub fn index(&self) -> Vec<usize> {
        let mut offsets = Vec::new();
        let mut offset = 0;
        while let Some(&word) = self.words.get(offset) {
            if word == 0 {
                break;
            }
            let header = OtpmHeaderWord(word);
            debug!(
                "OTPM record at word {offset}: type {:#06x}, {} words",
                header.asset_type(),
                header.length()
            );
            offsets.push(offset);
            offset += header.length() as usize + 1;
        }
        offsets
    }

    /// Offsets of every record of `asset_type`, ascending
    pub fn find_asset(&self, asset_type: u16) -> Vec<usize> {
        self.index()
            .into_iter()
            .filter(|&offset| {
                OtpmHeaderWord(self.words[offset]).asset_type() == u32::from(asset_type)
            })
            .collect()
    }

    /// Offset of the authoritative record of `asset_type`
    pub fn find_latest_asset(&self, asset_type: u16) -> Option<usize> {
        self.find_asset(asset_type).last().copied()
    }

    /// Returns the record at `offset`, header word included.
    ///
    /// `offset` must come from [`OtpmImage::index`]; a header whose declared
    /// length runs past the end of the image is reported as malformed.
    pub fn extract_asset(&self, offset: usize) -> ProvResult<&[u32]> {
        let word = *self.words.get(offset).ok_or_else(|| {
            ProvError::malformed(
                IMAGE,
                format!("offset {offset} is beyond {} words", self.words.len()),
            )
        })?;
        let end = offset + OtpmHeaderWord(word).length() as usize + 1;
        self.words.get(offset..end).ok_or_else(|| {
            ProvError::malformed(
                IMAGE,
                format!(
                    "record at {offset} ends at word {end}, image has {} words",
                    self.words.len()
                ),
            )
        })
    }

    /// Returns the record at `offset` as little-endian bytes
    pub fn extract_asset_bytes(&self, offset: usize) -> ProvResult<Vec<u8>> {
        Ok(self
            .extract_asset(offset)?
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect())
    }

    /// Decode the record at `offset` as a typed record. The OTPM header word
    /// shares its layout with the typed record header.
    pub fn decode_asset(&self, offset: usize) -> ProvResult<NvmRecord> {
        let bytes = self.extract_asset_bytes(offset)?;
        let (record, _) = NvmRecord::decode(&bytes)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPE_A: u16 = 0x0003;
    const TYPE_B: u16 = 0x0004;

    fn header(asset_type: u16, length: u16) -> u32 {
        OtpmHeaderWord::new(asset_type, length).0
    }

    fn synthetic_image() -> OtpmImage {
        OtpmImage::new(&[
            header(TYPE_A, 3),
            1,
            2,
            3,
            header(TYPE_B, 1),
            4,
            header(TYPE_A, 2),
            5,
            6,
            0,
            0xffff_ffff,
        ])
    }

    #[test]
    fn test_index() {
        assert_eq!(synthetic_image().index(), vec![0, 4, 6]);
    }

    #[test]
    fn test_find_asset() {
        let image = synthetic_image();
        assert_eq!(image.find_asset(TYPE_A), vec![0, 6]);
        assert_eq!(image.find_asset(TYPE_B), vec![4]);
        assert_eq!(image.find_latest_asset(TYPE_A), Some(6));
        assert_eq!(image.find_latest_asset(0x0007), None);
    }

    #[test]
    fn test_extract_asset() {
        let image = synthetic_image();
        assert_eq!(image.extract_asset(6).unwrap(), &[header(TYPE_A, 2), 5, 6]);
        assert_eq!(image.extract_asset(4).unwrap(), &[header(TYPE_B, 1), 4]);
        assert_eq!(
            image.extract_asset_bytes(4).unwrap(),
            [0x04, 0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_index_without_terminator() {
        let image = OtpmImage::new(&[header(TYPE_B, 0), header(TYPE_A, 1), 7]);
        assert_eq!(image.index(), vec![0, 1]);
        assert!(OtpmImage::default().index().is_empty());
    }

    #[test]
    fn test_truncated_record() {
        let image = OtpmImage::new(&[header(TYPE_B, 1), 4, header(TYPE_A, 8), 1]);
        // Scanning stays permissive; extraction does not.
        assert_eq!(image.index(), vec![0, 2]);
        assert!(matches!(
            image.extract_asset(2),
            Err(ProvError::Malformed { .. })
        ));
        assert!(image.extract_asset(10).is_err());
    }

    #[test]
    fn test_from_le_bytes() {
        let image =
            OtpmImage::from_le_bytes(&[0x03, 0x00, 0x01, 0x00, 0xaa, 0xbb, 0xcc, 0xdd]).unwrap();
        assert_eq!(image.words(), &[header(TYPE_A, 1), 0xddccbbaa]);
        assert!(OtpmImage::from_le_bytes(&[0; 5]).is_err());
    }

    #[test]
    fn test_decode_asset() {
        let image = OtpmImage::new(&[header(TYPE_B, 1), 4, header(4, 4), 10, 20, 30, 40]);
        assert_eq!(
            image.decode_asset(2).unwrap(),
            NvmRecord::TrngCharacterization(crate::TrngCharacterizationRecord {
                values: [10, 20, 30, 40]
            })
        );
    }
}

use binrw::binread;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GmdcError, Result};

use super::reader::BinaryReader;

/// RCOL version mark of the one GMDC layout this importer understands.
pub const GMDC_FILE_TYPE: u32 = 0xFFFF0001;
pub const SUPPORTED_FILE_TYPES: &[u32] = &[GMDC_FILE_TYPE];

pub const GMDC_BLOCK_NAME: &str = "cGeometryDataContainer";
pub const GMDC_BLOCK_ID: u32 = 0xAC4F8687;

const FILE_LINK_LEN: usize = 16;

/// Reference to another resource in the package (texture, skeleton...).
#[binread]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[br(little)]
pub struct FileLink {
    pub group: u32,
    pub instance: u32,
    pub resource: u32,
    pub type_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub file_type: u32,
    pub links: Vec<FileLink>,
    pub type_ids: Vec<u32>,
    pub block_name: String,
    pub block_id: u32,
    pub block_version: u32,
}

impl Header {
    /// Reads the header. The signature is checked before anything else is
    /// consumed, so an unsupported file fails after exactly four bytes.
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let file_type = reader.read_u32()?;
        if !SUPPORTED_FILE_TYPES.contains(&file_type) {
            return Err(GmdcError::UnsupportedFormat { file_type });
        }

        let link_count = reader.read_u32()?;
        let mut links = Vec::with_capacity(reader.capacity_for(link_count, FILE_LINK_LEN));
        for _ in 0..link_count {
            links.push(reader.read_struct::<FileLink>(FILE_LINK_LEN)?);
        }

        let item_count = reader.read_u32()?;
        let mut type_ids = Vec::with_capacity(reader.capacity_for(item_count, 4));
        for _ in 0..item_count {
            type_ids.push(reader.read_u32()?);
        }

        let block_name = reader.read_string()?;
        let block_id = reader.read_u32()?;
        let block_version = reader.read_u32()?;

        if block_name != GMDC_BLOCK_NAME || block_id != GMDC_BLOCK_ID {
            warn!(
                block_name = %block_name,
                block_id = %format!("{:#010x}", block_id),
                "unexpected RCOL block, decoding as GMDC anyway"
            );
        }
        debug!(
            links = links.len(),
            items = type_ids.len(),
            block_version,
            "read GMDC header"
        );

        Ok(Header {
            file_type,
            links,
            type_ids,
            block_name,
            block_id,
            block_version,
        })
    }
}

/// Decode only the header of a GMDC buffer.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    Header::read(&mut BinaryReader::new(bytes))
}

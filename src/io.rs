//! Compressed tag-tree bytes.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use quartz_nbt::io::Flavor;
use quartz_nbt::NbtCompound;
use std::io::Write;

use crate::error::Result;

/// Default compression level for schematic serialization.
pub const DEFAULT_COMPRESSION: flate2::Compression = flate2::Compression::new(6);

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads a root compound and its name. Gzip input is detected by its magic
/// bytes; anything else is parsed as an uncompressed tree.
pub fn read_nbt_bytes(data: &[u8]) -> Result<(NbtCompound, String)> {
    let reader = std::io::BufReader::with_capacity(1 << 20, data);
    if data.starts_with(&GZIP_MAGIC) {
        let mut gz = GzDecoder::new(reader);
        Ok(quartz_nbt::io::read_nbt(&mut gz, Flavor::Uncompressed)?)
    } else {
        let mut reader = reader;
        Ok(quartz_nbt::io::read_nbt(&mut reader, Flavor::Uncompressed)?)
    }
}

pub fn write_nbt_bytes(root: &NbtCompound, root_name: &str) -> Result<Vec<u8>> {
    write_nbt_bytes_with_compression(root, root_name, DEFAULT_COMPRESSION)
}

pub fn write_nbt_bytes_with_compression(
    root: &NbtCompound,
    root_name: &str,
    compression: flate2::Compression,
) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), compression);
    quartz_nbt::io::write_nbt(&mut encoder, Some(root_name), root, Flavor::Uncompressed)?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

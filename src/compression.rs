//! Condition text compression
//!
//! 긴 클리어 조건 텍스트를 zlib(deflate) + Base64 문자열로 저장한다.

use std::io::{Read, Write};

use base64::{engine::general_purpose, Engine as _};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{StoreError, StoreResult};

/// 문자열 압축 → Base64
pub fn zip_string(input: &str) -> StoreResult<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(general_purpose::STANDARD.encode(compressed))
}

/// Base64 → 압축 해제
pub fn decompress_condition(encoded: &str) -> StoreResult<String> {
    let compressed = general_purpose::STANDARD.decode(encoded.trim())?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|e| StoreError::InvalidOperation(format!("decompressed text is not UTF-8: {}", e)))
}

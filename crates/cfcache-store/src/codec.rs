// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cfcache_core::sha256_hex;
use cfcache_model::{Complex32, CoordinateDescriptor, ImageRecord, Pixels};
use serde::{Deserialize, Serialize};

use crate::fs_io::write_atomic_file;
use crate::{StoreError, StoreErrorCode};

pub const IMAGE_FORMAT: &str = "cfcache-image";
pub const IMAGE_FORMAT_VERSION: u32 = 1;

/// Reads and writes n-dimensional images with embedded coordinate metadata.
///
/// Implementations must fail a read with [`StoreErrorCode::NotFound`] when the
/// file is absent and [`StoreErrorCode::CorruptPayload`] when it cannot be
/// decoded; the kernel store relies on that distinction.
pub trait ImageCodec: Send + Sync {
    fn write_image(&self, path: &Path, record: &ImageRecord) -> Result<(), StoreError>;
    fn read_image(&self, path: &Path) -> Result<ImageRecord, StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageContainer {
    format: String,
    version: u32,
    shape: Vec<usize>,
    pixel_kind: String,
    coordinates: CoordinateDescriptor,
    payload_sha256: String,
    /// Base64 of the little-endian pixel bytes.
    payload: String,
}

/// Default codec: a JSON container carrying the raw little-endian pixel
/// bytes and their SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonImageCodec;

fn encode_pixels(pixels: &Pixels) -> Vec<u8> {
    match pixels {
        Pixels::Complex(values) => values
            .iter()
            .flat_map(|c| c.re.to_le_bytes().into_iter().chain(c.im.to_le_bytes()))
            .collect(),
        Pixels::Real(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn decode_floats(bytes: &[u8], path: &Path) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::at(
            StoreErrorCode::CorruptPayload,
            path,
            format!("payload length {} is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| {
            let mut word = [0_u8; 4];
            word.copy_from_slice(chunk);
            f32::from_le_bytes(word)
        })
        .collect())
}

fn decode_pixels(kind: &str, bytes: &[u8], path: &Path) -> Result<Pixels, StoreError> {
    let floats = decode_floats(bytes, path)?;
    match kind {
        "complex32" => {
            if floats.len() % 2 != 0 {
                return Err(StoreError::at(
                    StoreErrorCode::CorruptPayload,
                    path,
                    "complex payload holds an odd number of floats",
                ));
            }
            Ok(Pixels::Complex(
                floats
                    .chunks_exact(2)
                    .map(|pair| Complex32::new(pair[0], pair[1]))
                    .collect(),
            ))
        }
        "float32" => Ok(Pixels::Real(floats)),
        other => Err(StoreError::at(
            StoreErrorCode::CorruptPayload,
            path,
            format!("unknown pixel kind {other:?}"),
        )),
    }
}

impl ImageCodec for JsonImageCodec {
    fn write_image(&self, path: &Path, record: &ImageRecord) -> Result<(), StoreError> {
        record
            .validate()
            .map_err(|e| StoreError::at(StoreErrorCode::Validation, path, e.to_string()))?;
        let raw = encode_pixels(&record.pixels);
        let container = ImageContainer {
            format: IMAGE_FORMAT.to_string(),
            version: IMAGE_FORMAT_VERSION,
            shape: record.shape.clone(),
            pixel_kind: record.pixels.kind().to_string(),
            coordinates: record.coordinates.clone(),
            payload_sha256: sha256_hex(&raw),
            payload: STANDARD.encode(&raw),
        };
        let bytes = serde_json::to_vec(&container)
            .map_err(|e| StoreError::at(StoreErrorCode::Internal, path, e.to_string()))?;
        write_atomic_file(path, &bytes)
    }

    fn read_image(&self, path: &Path) -> Result<ImageRecord, StoreError> {
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, &e))?;
        let corrupt = |msg: String| StoreError::at(StoreErrorCode::CorruptPayload, path, msg);
        let container: ImageContainer = serde_json::from_slice(&bytes)
            .map_err(|e| corrupt(format!("unreadable container: {e}")))?;
        if container.format != IMAGE_FORMAT || container.version != IMAGE_FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported image format {} v{}",
                container.format, container.version
            )));
        }
        let raw = STANDARD
            .decode(container.payload.as_bytes())
            .map_err(|e| corrupt(format!("payload is not base64: {e}")))?;
        let actual = sha256_hex(&raw);
        if actual != container.payload_sha256 {
            return Err(corrupt(format!(
                "payload checksum mismatch: expected {}, got {actual}",
                container.payload_sha256
            )));
        }
        let record = ImageRecord {
            shape: container.shape,
            pixels: decode_pixels(&container.pixel_kind, &raw, path)?,
            coordinates: container.coordinates,
        };
        record.validate().map_err(|e| corrupt(e.to_string()))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageCodec, JsonImageCodec};
    use crate::StoreErrorCode;
    use cfcache_model::{Complex32, CoordinateDescriptor, ImageRecord, Pixels};
    use tempfile::tempdir;

    fn coords() -> CoordinateDescriptor {
        CoordinateDescriptor {
            origin: [0, 0],
            reference_pixel: [1.0, 1.0],
            reference_value: [0.0, 0.0],
            increment: [0.25, 0.25],
            reference_frequency_hz: 1.4e9,
        }
    }

    #[test]
    fn complex_pixels_survive_bit_exact() {
        let tmp = tempdir().expect("tmp");
        let path = tmp.path().join("CF0_0");
        let values = vec![
            Complex32::new(0.1, -0.2),
            Complex32::new(f32::MIN_POSITIVE, 3.5e-7),
            Complex32::new(-0.0, 1.0 / 3.0),
            Complex32::new(7.0, 8.0),
        ];
        let record = ImageRecord {
            shape: vec![2, 2, 1],
            pixels: Pixels::Complex(values),
            coordinates: coords(),
        };
        JsonImageCodec.write_image(&path, &record).expect("write");
        let back = JsonImageCodec.read_image(&path).expect("read");
        assert_eq!(back, record);
    }

    #[test]
    fn tampered_payload_is_corrupt() {
        let tmp = tempdir().expect("tmp");
        let path = tmp.path().join("avgPB");
        let record = ImageRecord {
            shape: vec![2],
            pixels: Pixels::Real(vec![1.0, 2.0]),
            coordinates: coords(),
        };
        JsonImageCodec.write_image(&path, &record).expect("write");
        let mut doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        doc["payload_sha256"] = serde_json::Value::String("0".repeat(64));
        std::fs::write(&path, serde_json::to_vec(&doc).expect("encode")).expect("rewrite");

        let err = JsonImageCodec.read_image(&path).expect_err("checksum");
        assert_eq!(err.code, StoreErrorCode::CorruptPayload);
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn missing_and_garbage_files_are_distinguished() {
        let tmp = tempdir().expect("tmp");
        let missing = JsonImageCodec
            .read_image(&tmp.path().join("CF0_9"))
            .expect_err("missing");
        assert_eq!(missing.code, StoreErrorCode::NotFound);

        let garbage = tmp.path().join("CF0_1");
        std::fs::write(&garbage, [0xff_u8, 0xfe, 0x00, 0x01]).expect("write");
        let err = JsonImageCodec.read_image(&garbage).expect_err("garbage");
        assert_eq!(err.code, StoreErrorCode::CorruptPayload);
    }
}

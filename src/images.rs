//! Image Cache: decode PNG/JPEG bytes into a PDF `/Image` XObject, deduping
//! identical source bytes within one generation (spec.md §4 image handling).
//!
//! JPEG passes through untouched behind `/DCTDecode` (the JPEG bytes already
//! are a valid PDF image filter stream); PNG is decoded to raw RGB/RGBA
//! samples and re-compressed with `flate2`, the same re-encode-losslessly
//! shape `KH178-PDFCore`'s `embed_image` uses for its non-DCTDecode path,
//! generalized here to produce the dict from decoded pixels rather than
//! trusting a pre-built `Image` struct.

use std::collections::HashMap;
use std::hash::Hasher;
use std::io::Write;

use fnv::FnvHasher;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView};
use lopdf::{Dictionary, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::object_table::ObjectTable;

fn fnv_key(bytes: &[u8]) -> u64 {
    let mut h = FnvHasher::default();
    h.write(bytes);
    h.finish()
}

/// A decoded image ready to be written as one or two PDF objects (an image
/// XObject, plus a separate `/SMask` object when the source had alpha).
struct DecodedImage {
    width: u32,
    height: u32,
    /// Flate-compressed, or DCT-compressed-passthrough, color samples.
    color_data: Vec<u8>,
    color_filter: &'static str,
    color_space: &'static str,
    bits_per_component: u8,
    /// Flate-compressed 8-bit alpha samples, one byte per pixel, if any.
    alpha_data: Option<Vec<u8>>,
}

fn decode(bytes: &[u8]) -> Result<DecodedImage> {
    if is_jpeg(bytes) {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(|e| Error::ImageDecode(format!("invalid JPEG: {e}")))?;
        let (width, height) = img.dimensions();
        return Ok(DecodedImage {
            width,
            height,
            color_data: bytes.to_vec(),
            color_filter: "DCTDecode",
            color_space: if img.color().has_color() { "DeviceRGB" } else { "DeviceGray" },
            bits_per_component: 8,
            alpha_data: None,
        });
    }

    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .map_err(|e| Error::ImageDecode(format!("invalid PNG: {e}")))?;
    let (width, height) = img.dimensions();

    let (color_data, alpha_data) = match &img {
        DynamicImage::ImageRgba8(rgba) => {
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            for px in rgba.pixels() {
                rgb.extend_from_slice(&px.0[0..3]);
                alpha.push(px.0[3]);
            }
            (rgb, Some(alpha))
        }
        other => {
            let rgb = other.to_rgb8().into_raw();
            (rgb, None)
        }
    };

    Ok(DecodedImage {
        width,
        height,
        color_data: deflate(&color_data),
        color_filter: "FlateDecode",
        color_space: "DeviceRGB",
        bits_per_component: 8,
        alpha_data: alpha_data.map(|a| deflate(&a)),
    })
}

fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}

/// Process-wide-shareable, but built fresh per generation since images are
/// supplied inline in the template rather than registered ahead of time.
/// Dedupes by an FNV-1a hash of the source bytes so a logo repeated across
/// many pages is embedded exactly once.
#[derive(Default)]
pub struct ImageCache {
    by_hash: HashMap<u64, ObjectId>,
}

impl ImageCache {
    pub fn new() -> Self {
        ImageCache::default()
    }

    /// Decode (if not already cached), emit the XObject (and SMask, if any),
    /// and return the image XObject's id plus its pixel dimensions for the
    /// layout engine's aspect-ratio calculations.
    pub fn intern(&mut self, bytes: &[u8], objects: &mut ObjectTable) -> Result<(ObjectId, u32, u32)> {
        let key = fnv_key(bytes);
        if let Some(&id) = self.by_hash.get(&key) {
            let dims = match objects.get(id) {
                Some(Object::Stream(s)) => (
                    s.dict.get(b"Width").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0) as u32,
                    s.dict.get(b"Height").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0) as u32,
                ),
                _ => (0, 0),
            };
            return Ok((id, dims.0, dims.1));
        }

        let decoded = decode(bytes)?;
        let (width, height) = (decoded.width, decoded.height);

        let smask_id = if let Some(alpha) = &decoded.alpha_data {
            let mut smask_dict = Dictionary::new();
            smask_dict.set("Type", Object::Name(b"XObject".to_vec()));
            smask_dict.set("Subtype", Object::Name(b"Image".to_vec()));
            smask_dict.set("Width", Object::Integer(width as i64));
            smask_dict.set("Height", Object::Integer(height as i64));
            smask_dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
            smask_dict.set("BitsPerComponent", Object::Integer(8));
            smask_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            let stream = Stream {
                dict: smask_dict,
                content: alpha.clone(),
                allows_compression: false,
                start_position: None,
            };
            Some(objects.add(Object::Stream(stream)))
        } else {
            None
        };

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(width as i64));
        dict.set("Height", Object::Integer(height as i64));
        dict.set("ColorSpace", Object::Name(decoded.color_space.as_bytes().to_vec()));
        dict.set("BitsPerComponent", Object::Integer(decoded.bits_per_component as i64));
        dict.set("Filter", Object::Name(decoded.color_filter.as_bytes().to_vec()));
        if let Some(smask_id) = smask_id {
            dict.set("SMask", Object::Reference(smask_id));
        }

        let stream = Stream {
            dict,
            content: decoded.color_data,
            allows_compression: false,
            start_position: None,
        };
        let id = objects.add(Object::Stream(stream));
        self.by_hash.insert(key, id);
        Ok((id, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_pixel_png() -> Vec<u8> {
        // 1x1 opaque red PNG, generated once and checked in as bytes so
        // tests don't depend on an encoder round-trip.
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 0]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_intern_dedupes_identical_bytes() {
        let mut cache = ImageCache::new();
        let mut objects = ObjectTable::new();
        let png = one_pixel_png();
        let (id1, w, h) = cache.intern(&png, &mut objects).unwrap();
        let (id2, _, _) = cache.intern(&png, &mut objects).unwrap();
        assert_eq!(id1, id2);
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn test_invalid_bytes_error() {
        let mut cache = ImageCache::new();
        let mut objects = ObjectTable::new();
        assert!(cache.intern(b"not an image", &mut objects).is_err());
    }
}

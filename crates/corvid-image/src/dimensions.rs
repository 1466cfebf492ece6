//! Minimal format sniffers for reading image dimensions straight out of
//! base64-encoded payloads, grounded in `terminal_image.py`'s
//! `get_{png,jpeg,gif,webp}_dimensions`.

use base64::Engine as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width_px: u32,
    pub height_px: u32,
}

fn decode(base64_data: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD.decode(base64_data).ok()
}

pub fn get_png_dimensions(base64_data: &str) -> Option<ImageDimensions> {
    let buf = decode(base64_data)?;
    if buf.len() < 24 || &buf[0..4] != b"\x89PNG" {
        return None;
    }
    let width = u32::from_be_bytes(buf[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(buf[20..24].try_into().ok()?);
    Some(ImageDimensions { width_px: width, height_px: height })
}

pub fn get_jpeg_dimensions(base64_data: &str) -> Option<ImageDimensions> {
    let buf = decode(base64_data)?;
    if buf.len() < 2 || buf[0] != 0xFF || buf[1] != 0xD8 {
        return None;
    }
    let mut offset = 2usize;
    while offset + 9 < buf.len() {
        if buf[offset] != 0xFF {
            offset += 1;
            continue;
        }
        let marker = buf[offset + 1];
        if (0xC0..=0xC2).contains(&marker) {
            let height = u16::from_be_bytes(buf[offset + 5..offset + 7].try_into().ok()?);
            let width = u16::from_be_bytes(buf[offset + 7..offset + 9].try_into().ok()?);
            return Some(ImageDimensions { width_px: width as u32, height_px: height as u32 });
        }
        if offset + 4 > buf.len() {
            return None;
        }
        let length = u16::from_be_bytes(buf[offset + 2..offset + 4].try_into().ok()?) as usize;
        if length < 2 {
            return None;
        }
        offset += 2 + length;
    }
    None
}

pub fn get_gif_dimensions(base64_data: &str) -> Option<ImageDimensions> {
    let buf = decode(base64_data)?;
    if buf.len() < 10 {
        return None;
    }
    let sig = &buf[0..6];
    if sig != b"GIF87a" && sig != b"GIF89a" {
        return None;
    }
    let width = u16::from_le_bytes(buf[6..8].try_into().ok()?);
    let height = u16::from_le_bytes(buf[8..10].try_into().ok()?);
    Some(ImageDimensions { width_px: width as u32, height_px: height as u32 })
}

pub fn get_webp_dimensions(base64_data: &str) -> Option<ImageDimensions> {
    let buf = decode(base64_data)?;
    if buf.len() < 30 || &buf[0..4] != b"RIFF" || &buf[8..12] != b"WEBP" {
        return None;
    }
    let chunk = &buf[12..16];
    if chunk == b"VP8 " {
        let width = u16::from_le_bytes(buf[26..28].try_into().ok()?) & 0x3FFF;
        let height = u16::from_le_bytes(buf[28..30].try_into().ok()?) & 0x3FFF;
        Some(ImageDimensions { width_px: width as u32, height_px: height as u32 })
    } else if chunk == b"VP8L" {
        if buf.len() < 25 {
            return None;
        }
        let bits = u32::from_le_bytes(buf[21..25].try_into().ok()?);
        let width = (bits & 0x3FFF) + 1;
        let height = ((bits >> 14) & 0x3FFF) + 1;
        Some(ImageDimensions { width_px: width, height_px: height })
    } else if chunk == b"VP8X" {
        let width = (buf[24] as u32 | (buf[25] as u32) << 8 | (buf[26] as u32) << 16) + 1;
        let height = (buf[27] as u32 | (buf[28] as u32) << 8 | (buf[29] as u32) << 16) + 1;
        Some(ImageDimensions { width_px: width, height_px: height })
    } else {
        None
    }
}

pub fn get_image_dimensions(base64_data: &str, mime_type: &str) -> Option<ImageDimensions> {
    match mime_type {
        "image/png" => get_png_dimensions(base64_data),
        "image/jpeg" => get_jpeg_dimensions(base64_data),
        "image/gif" => get_gif_dimensions(base64_data),
        "image/webp" => get_webp_dimensions(base64_data),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn png_dimensions_parsed() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend([0, 0, 0, 13]); // IHDR chunk length
        bytes.extend(b"IHDR");
        bytes.extend(100u32.to_be_bytes());
        bytes.extend(50u32.to_be_bytes());
        let dims = get_png_dimensions(&b64(&bytes)).unwrap();
        assert_eq!(dims, ImageDimensions { width_px: 100, height_px: 50 });
    }

    #[test]
    fn gif_dimensions_parsed() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend(80u16.to_le_bytes());
        bytes.extend(40u16.to_le_bytes());
        bytes.extend([0, 0]);
        let dims = get_gif_dimensions(&b64(&bytes)).unwrap();
        assert_eq!(dims, ImageDimensions { width_px: 80, height_px: 40 });
    }

    #[test]
    fn non_matching_signature_returns_none() {
        assert!(get_png_dimensions(&b64(b"not a png at all........")).is_none());
    }
}

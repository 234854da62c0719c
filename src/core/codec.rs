use crate::domain::model::{EnhancementRequest, EnhancementSettings, PageMetadata};
use crate::utils::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const BASE64_MARKER: &str = "base64,";

/// 伺服器期望的格式：`base64,<data>`
pub fn encode_image_data(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(BASE64_MARKER.len() + bytes.len().div_ceil(3) * 4);
    encoded.push_str(BASE64_MARKER);
    STANDARD.encode_string(bytes, &mut encoded);
    encoded
}

/// 接受純 base64、`base64,<data>` 與 `data:<mime>;base64,<data>`
pub fn decode_image_data(data: &str) -> Result<Vec<u8>> {
    let payload = match data.find(BASE64_MARKER) {
        Some(index) => &data[index + BASE64_MARKER.len()..],
        None => data,
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(cleaned)?)
}

pub fn build_request(
    metadata: &PageMetadata,
    image_bytes: &[u8],
    settings: &EnhancementSettings,
) -> EnhancementRequest {
    EnhancementRequest {
        image_name: metadata.image_name.clone(),
        image_data: encode_image_data(image_bytes),
        image_url: metadata.image_url.clone(),
        source_id: metadata.source_id.clone(),
        title: metadata.title.clone(),
        chapter_label: metadata.chapter_label.clone(),
        colorize: settings.use_colorizer,
        denoise: settings.use_denoiser,
        upscale: settings.use_upscaler,
        denoise_sigma: settings.denoiser_sigma,
        cache: settings.use_server_cache,
    }
}

/// 動態圖不送去增強
pub fn is_animated(bytes: &[u8]) -> bool {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return gif_is_animated(bytes);
    }

    if bytes.len() >= 21 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        // VP8X header: byte 20 flags, bit 1 = animation
        return &bytes[12..16] == b"VP8X" && bytes[20] & 0x02 != 0;
    }

    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return png_has_actl(bytes);
    }

    false
}

const GIF_EXTENSION: u8 = 0x21;
const GIF_IMAGE_DESCRIPTOR: u8 = 0x2C;
const GIF_TRAILER: u8 = 0x3B;
const GIF_APPLICATION_LABEL: u8 = 0xFF;

/// 依區塊結構走訪：有迴圈用的 application extension，或超過一個 image descriptor。
/// 資料截斷時以目前看到的內容判斷。
fn gif_is_animated(bytes: &[u8]) -> bool {
    // header(6) + logical screen descriptor(7)
    let Some(&screen_flags) = bytes.get(10) else {
        return false;
    };
    let mut offset = 13 + color_table_len(screen_flags);
    let mut frames = 0;

    while let Some(&introducer) = bytes.get(offset) {
        match introducer {
            GIF_EXTENSION => {
                let Some(&label) = bytes.get(offset + 1) else {
                    return false;
                };
                offset += 2;
                if label == GIF_APPLICATION_LABEL && is_looping_application(&bytes[offset..]) {
                    return true;
                }
                match skip_sub_blocks(bytes, offset) {
                    Some(next) => offset = next,
                    None => return false,
                }
            }
            GIF_IMAGE_DESCRIPTOR => {
                frames += 1;
                if frames > 1 {
                    return true;
                }
                let Some(&image_flags) = bytes.get(offset + 9) else {
                    return false;
                };
                // descriptor(10) + local color table + LZW minimum code size(1)
                offset += 10 + color_table_len(image_flags) + 1;
                match skip_sub_blocks(bytes, offset) {
                    Some(next) => offset = next,
                    None => return false,
                }
            }
            GIF_TRAILER => break,
            _ => break,
        }
    }

    false
}

fn color_table_len(flags: u8) -> usize {
    if flags & 0x80 == 0 {
        0
    } else {
        3 * (1 << ((flags & 0x07) + 1))
    }
}

/// 第一個 sub-block 是 11 bytes 的應用程式識別碼
fn is_looping_application(block: &[u8]) -> bool {
    match block.get(..12) {
        Some([11, identifier @ ..]) => identifier == b"NETSCAPE2.0" || identifier == b"ANIMEXTS1.0",
        _ => false,
    }
}

/// 回傳 block terminator 之後的位置
fn skip_sub_blocks(bytes: &[u8], mut offset: usize) -> Option<usize> {
    loop {
        let size = *bytes.get(offset)? as usize;
        offset += 1;
        if size == 0 {
            return Some(offset);
        }
        offset += size;
    }
}

fn png_has_actl(bytes: &[u8]) -> bool {
    let mut offset = 8;
    while offset + 8 <= bytes.len() {
        let length = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as usize;
        let chunk_type = &bytes[offset + 4..offset + 8];
        match chunk_type {
            b"acTL" => return true,
            b"IDAT" | b"IEND" => return false,
            _ => {}
        }
        offset = match offset.checked_add(12 + length) {
            Some(next) => next,
            None => return false,
        };
    }
    false
}

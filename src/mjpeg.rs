// MJPEG stream reader: splits multipart/x-mixed-replace bodies into JPEG frames.
//
// Only used to learn the stream's native frame size; decoding and display
// of the video itself is left to whatever consumes the stream URL.

use futures::StreamExt;

use crate::error::{HubError, HubResult};

/// Extract the `boundary` parameter from a `multipart/x-mixed-replace` content type.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        // Some servers repeat the leading dashes in the header.
        let value = value.strip_prefix("--").unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Largest part body accepted, declared or buffered.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Largest part header block accepted.
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Incremental multipart splitter. Feed it body chunks in arrival order and
/// pull complete part bodies out with [`MultipartReader::next_frame`].
///
/// Bytes before the first delimiter are discarded, and a part larger than
/// [`MAX_FRAME_BYTES`] is an error, so the buffer stays bounded.
#[derive(Debug)]
pub struct MultipartReader {
    delimiter: Vec<u8>,
    buf: Vec<u8>,
}

impl MultipartReader {
    pub fn new(boundary: &str) -> Self {
        Self {
            delimiter: format!("--{boundary}").into_bytes(),
            buf: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete part body, if the buffer holds one.
    ///
    /// A part with a `Content-Length` header is complete once that many body
    /// bytes arrived; otherwise it ends at the next delimiter.
    pub fn next_frame(&mut self) -> HubResult<Option<Vec<u8>>> {
        let Some(start) = find(&self.buf, &self.delimiter) else {
            // Keep only a tail that could still be the start of a delimiter.
            let keep = self.delimiter.len().saturating_sub(1).min(self.buf.len());
            self.buf.drain(..self.buf.len() - keep);
            return Ok(None);
        };
        if start > 0 {
            self.buf.drain(..start);
        }

        let after_delim = self.delimiter.len();
        let Some(header_len) = find(&self.buf[after_delim..], b"\r\n\r\n") else {
            if self.buf.len() - after_delim > MAX_HEADER_BYTES {
                return Err(HubError::Stream("part headers too long".into()));
            }
            return Ok(None);
        };
        let header_end = after_delim + header_len;
        let headers = String::from_utf8_lossy(&self.buf[after_delim..header_end]).into_owned();
        let body_start = header_end + 4;

        let body_end = match content_length(&headers) {
            Some(len) => {
                if len > MAX_FRAME_BYTES {
                    return Err(HubError::Stream(format!(
                        "part declares {len} bytes, limit is {MAX_FRAME_BYTES}"
                    )));
                }
                let end = body_start + len;
                if self.buf.len() < end {
                    return Ok(None);
                }
                end
            }
            None => {
                let Some(next) = find(&self.buf[body_start..], &self.delimiter) else {
                    if self.buf.len() - body_start > MAX_FRAME_BYTES {
                        return Err(HubError::Stream(format!(
                            "no part delimiter within {MAX_FRAME_BYTES} bytes"
                        )));
                    }
                    return Ok(None);
                };
                let next = next + body_start;
                // Strip the CRLF that precedes the next delimiter.
                if self.buf[body_start..next].ends_with(b"\r\n") {
                    next - 2
                } else {
                    next
                }
            }
        };

        let frame = self.buf[body_start..body_end].to_vec();
        self.buf.drain(..body_end);
        Ok(Some(frame))
    }
}

fn content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read `(width, height)` from a JPEG's start-of-frame marker.
pub fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut i = 2;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        if marker == 0xFF {
            // Fill byte.
            i += 1;
            continue;
        }
        i += 2;
        // Markers without a length field.
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if i + 2 > data.len() {
            return None;
        }
        let len = u16::from_be_bytes([data[i], data[i + 1]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if i + 7 > data.len() {
                return None;
            }
            let height = u16::from_be_bytes([data[i + 3], data[i + 4]]) as u32;
            let width = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            return Some((width, height));
        }
        if len < 2 {
            return None;
        }
        i += len;
    }
    None
}

/// Read the stream until the first complete frame whose size can be decoded.
pub async fn first_frame_size(response: reqwest::Response) -> HubResult<(u32, u32)> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let boundary = boundary_from_content_type(&content_type).ok_or_else(|| {
        HubError::Stream(format!("not a multipart stream: '{content_type}'"))
    })?;

    let mut reader = MultipartReader::new(&boundary);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        reader.push(&chunk?);
        while let Some(frame) = reader.next_frame()? {
            if let Some(size) = jpeg_dimensions(&frame) {
                return Ok(size);
            }
            tracing::debug!("skipping undecodable MJPEG part of {} bytes", frame.len());
        }
    }
    Err(HubError::Stream("stream ended before the first frame".into()))
}

//! Torrent payload checks and info-hash extraction

use sha1::{Digest, Sha1};

use super::TrackerError;
use crate::domain::RemoteIdentity;

/// Bytes inspected when sniffing for an HTML page
const SNIFF_LEN: usize = 1024;
/// Nesting limit for the bencode scanner
const MAX_DEPTH: usize = 64;

/// True when the body is an HTML document rather than a torrent
pub fn looks_like_html(body: &[u8]) -> bool {
    let head = &body[..body.len().min(SNIFF_LEN)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let trimmed = head.trim_start();
    trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") || head.contains("<!doctype html>")
}

/// Accept a downloaded body only if it looks like a bencoded torrent
pub fn validate_payload(body: Vec<u8>) -> Result<Vec<u8>, TrackerError> {
    if body.is_empty() {
        return Err(TrackerError::NotAPayload("empty body".to_string()));
    }
    if looks_like_html(&body) {
        return Err(TrackerError::NotAPayload("got an HTML page".to_string()));
    }
    if body[0] != b'd' {
        return Err(TrackerError::NotAPayload("not a bencoded dictionary".to_string()));
    }
    Ok(body)
}

/// SHA-1 of the raw `info` dictionary, the BitTorrent v1 info-hash
pub fn info_hash(torrent: &[u8]) -> Result<RemoteIdentity, TrackerError> {
    let (start, end) = info_span(torrent).ok_or_else(|| TrackerError::Parse("torrent has no info dictionary".to_string()))?;
    let digest = Sha1::digest(&torrent[start..end]);
    RemoteIdentity::parse(&hex::encode(digest)).map_err(|e| TrackerError::Parse(e.to_string()))
}

/// Byte range of the value stored under the top-level `info` key
fn info_span(data: &[u8]) -> Option<(usize, usize)> {
    if data.first() != Some(&b'd') {
        return None;
    }
    let mut pos = 1;
    while *data.get(pos)? != b'e' {
        let (key_start, key_end) = string_span(data, pos)?;
        let value_start = key_end;
        let value_end = skip_value(data, value_start, 1)?;
        if &data[key_start..key_end] != b"info" {
            pos = value_end;
            continue;
        }
        if data.get(value_start) != Some(&b'd') {
            return None;
        }
        return Some((value_start, value_end));
    }
    None
}

/// Returns (content_start, end) of a `<len>:<bytes>` string at `pos`
fn string_span(data: &[u8], pos: usize) -> Option<(usize, usize)> {
    let colon = pos + data.get(pos..)?.iter().position(|&b| b == b':')?;
    let digits = std::str::from_utf8(&data[pos..colon]).ok()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let len: usize = digits.parse().ok()?;
    let start = colon + 1;
    let end = start.checked_add(len)?;
    (end <= data.len()).then_some((start, end))
}

/// Position just past the value starting at `pos`
fn skip_value(data: &[u8], pos: usize, depth: usize) -> Option<usize> {
    if depth > MAX_DEPTH {
        return None;
    }
    match *data.get(pos)? {
        b'i' => {
            let end = pos + data.get(pos..)?.iter().position(|&b| b == b'e')?;
            Some(end + 1)
        }
        b'l' => {
            let mut cur = pos + 1;
            while *data.get(cur)? != b'e' {
                cur = skip_value(data, cur, depth + 1)?;
            }
            Some(cur + 1)
        }
        b'd' => {
            let mut cur = pos + 1;
            while *data.get(cur)? != b'e' {
                let (_, key_end) = string_span(data, cur)?;
                cur = skip_value(data, key_end, depth + 1)?;
            }
            Some(cur + 1)
        }
        b'0'..=b'9' => string_span(data, pos).map(|(_, end)| end),
        _ => None,
    }
}

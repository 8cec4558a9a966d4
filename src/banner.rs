//! The Banner Negotiator (spec.md §4.2). The teacher's `handshake.rs`
//! parsed the identification line with `read_until(reader, b'\n', ...)` and
//! a single `starts_with(b"SSH-2.0-")` check, hardcoding v2-only. Spec.md
//! §4.2 asks for the full v1/v1.99/v2 dialect detection and OpenSSH vendor
//! sniffing the teacher never implemented; this module builds that out in
//! the same "scan a line, then inspect it" shape.

use crate::error::{HandshakeError, Result};

/// Historical limit this core enforces on receipt (spec.md §6): the
/// identification string may be up to 255 bytes per RFC 4253, but this
/// core keeps libssh's tighter 128-byte limit.
const MAX_BANNER_LEN: usize = 128;

/// Accumulates bytes from successive `on_data` chunks until a full banner
/// line (or the too-large error) is seen. Splitting a valid banner across
/// any number of chunks yields the same result as feeding it whole
/// (spec.md §8).
#[derive(Default)]
pub struct BannerDecoder {
    buf: Vec<u8>,
}

impl BannerDecoder {
    pub fn new() -> BannerDecoder {
        BannerDecoder { buf: Vec::new() }
    }

    /// Feeds `data`, consuming from it only the bytes that belong to the
    /// banner line. Returns `(consumed, banner)`: `banner` is `Some` once
    /// a `\n` has been seen, at which point no further bytes of `data`
    /// belong to this decoder (the packet decoder takes over for the
    /// remainder, per spec.md §4.1 "replacement of the active decoder
    /// happens synchronously during advance").
    pub fn feed(&mut self, data: &[u8]) -> Result<(usize, Option<Vec<u8>>)> {
        if let Some(nl) = data.iter().position(|&b| b == b'\n') {
            let consumed = nl + 1;
            self.buf.extend_from_slice(&data[..consumed]);
            if self.buf.len() > MAX_BANNER_LEN {
                return Err(HandshakeError::BannerTooLarge);
            }
            let mut line = std::mem::take(&mut self.buf);
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok((consumed, Some(line)));
        }

        if self.buf.len() + data.len() > MAX_BANNER_LEN {
            return Err(HandshakeError::BannerTooLarge);
        }

        self.buf.extend_from_slice(data);
        Ok((data.len(), None))
    }
}

/// What `analyze` (spec.md §4.2 step 1-2) extracts from a parsed banner
/// line before version selection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerDialect {
    pub peer_speaks_v1: bool,
    pub peer_speaks_v2: bool,
}

/// Parses the `SSH-<version>-...` prefix and determines which major
/// version(s) the peer speaks (spec.md §4.2 step 1).
pub fn analyze(banner: &[u8]) -> Result<BannerDialect> {
    if banner.len() < 5 || &banner[..4] != b"SSH-" {
        return Err(HandshakeError::ProtocolMismatch(String::from_utf8_lossy(banner).into_owned()));
    }

    match banner[4] {
        b'1' => {
            // "SSH-1.99-..." also speaks v2; anything else starting with
            // "SSH-1." is v1-only.
            let speaks_v2 = banner.len() > 6 && banner[6] == b'9';
            Ok(BannerDialect { peer_speaks_v1: true, peer_speaks_v2: speaks_v2 })
        }
        b'2' => Ok(BannerDialect { peer_speaks_v1: false, peer_speaks_v2: true }),
        _ => Err(HandshakeError::ProtocolMismatch(String::from_utf8_lossy(banner).into_owned())),
    }
}

/// Picks the major version to actually run, given what the peer speaks
/// and what the local config allows (spec.md §4.2 step 3).
pub fn choose_version(dialect: BannerDialect, allow_v1: bool, allow_v2: bool) -> Result<u8> {
    if dialect.peer_speaks_v2 && allow_v2 {
        Ok(2)
    } else if dialect.peer_speaks_v1 && allow_v1 {
        Ok(1)
    } else {
        Err(HandshakeError::NoUsableVersion)
    }
}

/// Parses `major.minor` out of an `OpenSSH_<major>.<minor>` substring
/// (spec.md §4.2 step 2). Spec.md §9 flags the source's fixed-offset
/// (`+8`, `+10`) parsing as fragile for two-digit majors; this rework
/// resolves that Open Question conservatively with a numeric scan instead,
/// so "OpenSSH_10.2" parses correctly where fixed offsets would not.
/// Parse errors are non-fatal: the caller simply leaves the vendor field
/// unset.
pub fn parse_openssh_vendor(banner: &[u8]) -> Option<(u32, u32)> {
    const MARKER: &[u8] = b"OpenSSH_";
    let start = find_subslice(banner, MARKER)? + MARKER.len();
    let rest = &banner[start..];

    let (major_digits, after_major) = take_digits(rest);
    if major_digits.is_empty() || after_major.first() != Some(&b'.') {
        return None;
    }
    let (minor_digits, _) = take_digits(&after_major[1..]);
    if minor_digits.is_empty() {
        return None;
    }

    let major = std::str::from_utf8(major_digits).ok()?.parse().ok()?;
    let minor = std::str::from_utf8(minor_digits).ok()?.parse().ok()?;
    Some((major, minor))
}

fn take_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let n = s.iter().take_while(|b| b.is_ascii_digit()).count();
    (&s[..n], &s[n..])
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeds_banner_in_one_chunk() {
        let mut dec = BannerDecoder::new();
        let (consumed, banner) = dec.feed(b"SSH-2.0-OpenSSH_7.9p1\r\n").unwrap();
        assert_eq!(consumed, 23);
        assert_eq!(banner.unwrap(), b"SSH-2.0-OpenSSH_7.9p1");
    }

    #[test]
    fn feeds_banner_split_across_chunks_matches_whole() {
        let whole = b"SSH-2.0-OpenSSH_7.9p1\r\n";
        let mut dec = BannerDecoder::new();
        let mut result = None;
        for chunk in whole.chunks(3) {
            let (_, banner) = dec.feed(chunk).unwrap();
            if banner.is_some() {
                result = banner;
            }
        }
        assert_eq!(result.unwrap(), b"SSH-2.0-OpenSSH_7.9p1");
    }

    #[test]
    fn too_large_without_newline_is_fatal() {
        let mut dec = BannerDecoder::new();
        let data = vec![b'a'; 130];
        assert!(matches!(dec.feed(&data), Err(HandshakeError::BannerTooLarge)));
    }

    #[test]
    fn scenario_openssh_banner_selects_v2_and_vendor() {
        let banner = b"SSH-2.0-OpenSSH_7.9p1";
        let dialect = analyze(banner).unwrap();
        assert_eq!(choose_version(dialect, false, true).unwrap(), 2);
        assert_eq!(parse_openssh_vendor(banner), Some((7, 9)));
    }

    #[test]
    fn scenario_ssh_1_99_with_v2_only_config_selects_v2() {
        let dialect = analyze(b"SSH-1.99-Foo").unwrap();
        assert_eq!(choose_version(dialect, false, true).unwrap(), 2);
    }

    #[test]
    fn scenario_ssh_1_5_with_v2_only_config_is_fatal() {
        let dialect = analyze(b"SSH-1.5-Old").unwrap();
        assert!(matches!(choose_version(dialect, false, true), Err(HandshakeError::NoUsableVersion)));
    }

    #[test]
    fn non_ssh_banner_is_protocol_mismatch() {
        assert!(matches!(analyze(b"HTTP/1.1 200 OK"), Err(HandshakeError::ProtocolMismatch(_))));
    }

    #[test]
    fn two_digit_major_vendor_version_parses() {
        assert_eq!(parse_openssh_vendor(b"SSH-2.0-OpenSSH_10.2"), Some((10, 2)));
    }

    #[test]
    fn malformed_vendor_substring_is_non_fatal() {
        assert_eq!(parse_openssh_vendor(b"SSH-2.0-OpenSSH_not_a_version"), None);
    }
}

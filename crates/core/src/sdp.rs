//! Minimal SDP inspection for the offer
//!
//! Only `m=` and `a=ssrc` lines are read or rewritten. Full syntax
//! validation belongs to the media engine.

use crate::media::{MediaDescriptor, MediaKind};
use crate::{Error, Result};

/// One `m=` section of a session description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    /// `Some` for audio/video sections, `None` for anything else (e.g. application)
    pub kind: Option<MediaKind>,
    /// Payload types listed on the `m=` line
    pub payload_types: Vec<u8>,
    /// SSRCs declared with `a=ssrc:` (deduplicated, in order)
    pub ssrcs: Vec<u32>,
}

impl MediaSection {
    /// Whether this section carries the descriptor's payload type and SSRC
    pub fn is_bound_to(&self, descriptor: &MediaDescriptor) -> bool {
        self.kind == Some(descriptor.kind)
            && self.payload_types.contains(&descriptor.payload_type)
            && self.ssrcs.contains(&descriptor.ssrc)
    }
}

fn parse_kind(token: &str) -> Option<MediaKind> {
    match token {
        "video" => Some(MediaKind::Video),
        "audio" => Some(MediaKind::Audio),
        _ => None,
    }
}

fn parse_media_line(rest: &str) -> MediaSection {
    let mut tokens = rest.split_whitespace();
    let kind = tokens.next().and_then(parse_kind);
    let payload_types = tokens.skip(2).filter_map(|t| t.parse().ok()).collect();
    MediaSection {
        kind,
        payload_types,
        ssrcs: Vec::new(),
    }
}

fn parse_ssrc_value(line: &str) -> Option<u32> {
    line.strip_prefix("a=ssrc:")?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// List the media sections of `sdp` in order
pub fn media_sections(sdp: &str) -> Vec<MediaSection> {
    let mut sections: Vec<MediaSection> = Vec::new();

    for line in sdp.lines() {
        if let Some(rest) = line.strip_prefix("m=") {
            sections.push(parse_media_line(rest));
        } else if let Some(ssrc) = parse_ssrc_value(line) {
            if let Some(section) = sections.last_mut() {
                if !section.ssrcs.contains(&ssrc) {
                    section.ssrcs.push(ssrc);
                }
            }
        }
    }

    sections
}

/// Rewrite the SSRCs declared in `sdp` to the caller-assigned ones
///
/// The i-th audio/video section is bound to `descriptors[i]`. A section
/// without any `a=ssrc` line gets a `cname` line for its descriptor.
pub fn declare_ssrcs(sdp: &str, descriptors: &[MediaDescriptor]) -> Result<String> {
    let sections: Vec<MediaSection> = media_sections(sdp)
        .into_iter()
        .filter(|s| s.kind.is_some())
        .collect();

    if sections.len() != descriptors.len() {
        return Err(Error::NegotiationError(format!(
            "offer has {} media sections, expected {}",
            sections.len(),
            descriptors.len()
        )));
    }
    for (index, (section, descriptor)) in sections.iter().zip(descriptors).enumerate() {
        if section.kind != Some(descriptor.kind) {
            return Err(Error::NegotiationError(format!(
                "media section {} is {:?}, expected {}",
                index, section.kind, descriptor.kind
            )));
        }
    }

    let separator = if sdp.contains("\r\n") { "\r\n" } else { "\n" };
    let mut out: Vec<String> = Vec::new();
    // Index into `descriptors` of the section being copied
    let mut current: Option<usize> = None;
    let mut next = 0usize;
    let mut section_has_ssrc = false;

    let close_section = |out: &mut Vec<String>, current: Option<usize>, has_ssrc: bool| {
        if let (Some(index), false) = (current, has_ssrc) {
            let d = &descriptors[index];
            out.push(format!("a=ssrc:{} cname:{}", d.ssrc, d.track_id));
        }
    };

    for line in sdp.lines() {
        if let Some(rest) = line.strip_prefix("m=") {
            close_section(&mut out, current, section_has_ssrc);
            section_has_ssrc = false;
            current = if parse_media_line(rest).kind.is_some() {
                next += 1;
                Some(next - 1)
            } else {
                None
            };
            out.push(line.to_string());
            continue;
        }

        match current {
            Some(index) => {
                let ssrc = descriptors[index].ssrc;
                let primary = sections[index].ssrcs.first().copied();
                out.push(rewrite_ssrc_line(line, primary, ssrc));
                if line.starts_with("a=ssrc:") {
                    section_has_ssrc = true;
                }
            }
            None => out.push(line.to_string()),
        }
    }
    close_section(&mut out, current, section_has_ssrc);

    let mut rewritten = out.join(separator);
    if sdp.ends_with('\n') {
        rewritten.push_str(separator);
    }
    Ok(rewritten)
}

fn rewrite_ssrc_line(line: &str, primary: Option<u32>, ssrc: u32) -> String {
    let Some(primary) = primary else {
        return line.to_string();
    };

    if let Some(rest) = line.strip_prefix("a=ssrc:") {
        let (value, attribute) = rest.split_once(' ').unwrap_or((rest, ""));
        if value.parse::<u32>().ok() == Some(primary) {
            return if attribute.is_empty() {
                format!("a=ssrc:{}", ssrc)
            } else {
                format!("a=ssrc:{} {}", ssrc, attribute)
            };
        }
    } else if let Some(rest) = line.strip_prefix("a=ssrc-group:") {
        let rewritten: Vec<String> = rest
            .split(' ')
            .map(|token| match token.parse::<u32>() {
                Ok(value) if value == primary => ssrc.to_string(),
                _ => token.to_string(),
            })
            .collect();
        return format!("a=ssrc-group:{}", rewritten.join(" "));
    }

    line.to_string()
}

//! Timeline links embedded in emergency QR codes.
//!
//! Shape: `{origin}/member/{member_id}?tab=timeline[&pmh={token}]`.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::codec::{self, DecodeError};
use crate::models::MemberId;

pub const TIMELINE_TAB: &str = "timeline";
pub const HISTORY_PARAM: &str = "pmh";

/// Characters escaped in the member id path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Not a member link: {0}")]
    NotAMemberLink(String),

    #[error("Invalid medical history token: {0}")]
    Decode(#[from] DecodeError),
}

/// Build the timeline link for a member.
///
/// Blank history (after trimming) leaves the `pmh` parameter out entirely.
pub fn build_timeline_link(
    origin: &str,
    member_id: &MemberId,
    medical_history: Option<&str>,
) -> String {
    let origin = origin.trim().trim_end_matches('/');
    let id = utf8_percent_encode(member_id.as_str(), PATH_SEGMENT);
    let mut link = format!("{origin}/member/{id}?tab={TIMELINE_TAB}");

    if let Some(history) = medical_history.map(str::trim).filter(|h| !h.is_empty()) {
        link.push('&');
        link.push_str(HISTORY_PARAM);
        link.push('=');
        link.push_str(&codec::encode_history(history));
    }
    link
}

/// A parsed timeline link, as seen by the page that receives a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineLink {
    pub origin: String,
    pub member_id: MemberId,
    pub tab: Option<String>,
    pub medical_history: Option<String>,
}

/// Parse a scanned link back into member id and decoded history.
pub fn parse_timeline_link(link: &str) -> Result<TimelineLink, LinkError> {
    let url = Url::parse(link).map_err(|e| LinkError::InvalidUrl(e.to_string()))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let raw_id = match segments.as_slice() {
        ["member", id] => *id,
        _ => return Err(LinkError::NotAMemberLink(url.path().to_string())),
    };
    let decoded_id = percent_encoding::percent_decode_str(raw_id)
        .decode_utf8()
        .map_err(|_| LinkError::NotAMemberLink(raw_id.to_string()))?;
    let member_id = MemberId::new(decoded_id.into_owned())
        .map_err(|e| LinkError::NotAMemberLink(e.to_string()))?;

    let mut tab = None;
    let mut medical_history = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "tab" => tab = Some(value.into_owned()),
            HISTORY_PARAM if !value.trim().is_empty() => {
                medical_history = Some(codec::decode_history(&value)?);
            }
            _ => {}
        }
    }

    Ok(TimelineLink {
        origin: url.origin().ascii_serialization(),
        member_id,
        tab,
        medical_history,
    })
}

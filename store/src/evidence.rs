//! Evidence attachment storage trait.

use crate::StoreError;
use chrono::DateTime;
use sanka_types::{blake2b_256, MemberId, Timestamp};
use serde::{Deserialize, Serialize};

/// A photo attachment as received from the capture widget.
#[derive(Clone, PartialEq, Eq)]
pub struct EvidenceUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for EvidenceUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Where a stored attachment lives and what it hashed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Hex Blake2b-256 of the attachment bytes.
    pub digest: String,
    /// Backend-specific name the attachment was stored under.
    pub stored_name: String,
    pub content_type: String,
    pub size: u64,
}

impl EvidenceRef {
    /// Describe `upload` as stored under `stored_name`.
    pub fn for_upload(upload: &EvidenceUpload, stored_name: String) -> Self {
        Self {
            digest: hex::encode(blake2b_256(&upload.bytes)),
            stored_name,
            content_type: upload.content_type.clone(),
            size: upload.bytes.len() as u64,
        }
    }
}

/// Name an attachment `{member}_{YYYYmmddHHMMSS}_{file}`.
///
/// The client file name is reduced to ASCII letters, digits, `.`, `-` and
/// `_`; any directory part is dropped.
pub fn evidence_file_name(member: &MemberId, file_name: &str, at: Timestamp) -> String {
    let stamp = i64::try_from(at.as_secs())
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_else(|| "00000000000000".to_string());
    format!(
        "{}_{}_{}",
        sanitize_component(member.as_str()),
        stamp,
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = sanitize_component(base);
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "evidence".to_string()
    } else {
        cleaned
    }
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Trait for persisting evidence attachments.
pub trait EvidenceStore {
    fn save_evidence(
        &self,
        member: &MemberId,
        upload: &EvidenceUpload,
        at: Timestamp,
    ) -> Result<EvidenceRef, StoreError>;

    fn load_evidence(&self, stored_name: &str) -> Result<Vec<u8>, StoreError>;
}

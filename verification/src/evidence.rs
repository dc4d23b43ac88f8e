//! Evidence attachment checks.

use sanka_store::EvidenceUpload;

use crate::VerificationError;

/// Accept only a non-empty `image/*` attachment of at most `max_bytes`.
pub fn validate_evidence(
    upload: Option<&EvidenceUpload>,
    max_bytes: usize,
) -> Result<&EvidenceUpload, VerificationError> {
    let upload = match upload {
        Some(u) if !u.bytes.is_empty() => u,
        _ => return Err(VerificationError::MissingEvidence),
    };
    let content_type = upload.content_type.trim().to_ascii_lowercase();
    let is_image = content_type
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty());
    if !is_image {
        return Err(VerificationError::InvalidEvidence(format!(
            "content type {:?} is not an image",
            upload.content_type
        )));
    }
    if upload.bytes.len() > max_bytes {
        return Err(VerificationError::InvalidEvidence(format!(
            "{} bytes exceeds the {max_bytes} byte limit",
            upload.bytes.len()
        )));
    }
    Ok(upload)
}

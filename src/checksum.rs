use crate::constants::{CHECKSUM_CLOSE, CHECKSUM_OPEN};

/// Calculate MD5 checksum of content
pub fn calculate_checksum(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

/// `/*CHECKSUM<checksum>CHECKSUM*/`, embedded in generated trigger bodies.
pub fn checksum_comment(checksum: &str) -> String {
    format!("{}{}{}", CHECKSUM_OPEN, checksum, CHECKSUM_CLOSE)
}

/// Pulls the checksum back out of a trigger body, if one was embedded.
pub fn extract_checksum(body: &str) -> Option<&str> {
    let start = body.find(CHECKSUM_OPEN)? + CHECKSUM_OPEN.len();
    let len = body[start..].find(CHECKSUM_CLOSE)?;
    Some(&body[start..start + len])
}

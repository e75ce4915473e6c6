//! Content-type detection from magic bytes.

/// Returned when the buffer's signature is not recognised.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Sniff the MIME type of `data` from its leading bytes.
pub fn sniff(data: &[u8]) -> &'static str {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .unwrap_or(OCTET_STREAM)
}

/// Conventional file extension for a sniffed type, `bin` when unknown.
pub fn extension_for(data: &[u8]) -> &'static str {
    infer::get(data)
        .map(|kind| kind.extension())
        .unwrap_or("bin")
}

//! Storage path conventions and public-URL resolution.
//!
//! Uploads land at `product{id}/{file_name}` inside the configured bucket.
//! Public URLs follow the Supabase shape
//! `{endpoint}/storage/v1/object/public/{bucket}/{path}` with every path
//! segment percent-encoded on its own, so the `/` separators stay literal
//! while everything inside a segment is URL-safe.

use crate::config::StorageConfig;
use reqwest::Url;

/// Storage-relative location recovered from a public URL, in both the
/// still-encoded and the fully decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePathInfo {
    pub encoded_path: String,
    pub decoded_path: String,
}

/// Conventional per-product upload path.
pub fn build_upload_path(product_id: i64, file_name: &str) -> String {
    format!("product{product_id}/{file_name}")
}

/// Percent-encode each `/`-delimited segment independently.
pub fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`encode_object_path`]. A segment that fails to decode as
/// UTF-8 is kept as-is rather than dropped.
pub fn decode_object_path(encoded: &str) -> String {
    encoded
        .split('/')
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Public download URL for a storage-relative path.
pub fn build_public_url(config: &StorageConfig, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        config.url,
        urlencoding::encode(&config.bucket),
        encode_object_path(path)
    )
}

/// Recover the storage-relative path behind a public URL.
///
/// `None` means the URL is not ours to manage: unparseable, a different
/// origin, or outside the public prefix of the configured bucket. Pure and
/// side-effect-free; the deletion reconciler relies on it to tell owned
/// objects from external images.
pub fn resolve_public_url(config: &StorageConfig, url: &str) -> Option<StoragePathInfo> {
    let parsed = Url::parse(url).ok()?;
    let endpoint = Url::parse(&config.url).ok()?;
    if parsed.origin() != endpoint.origin() {
        return None;
    }

    let prefix = format!(
        "/storage/v1/object/public/{}/",
        urlencoding::encode(&config.bucket)
    );
    let encoded = parsed.path().strip_prefix(prefix.as_str())?;
    if encoded.is_empty() {
        return None;
    }

    Some(StoragePathInfo {
        encoded_path: encoded.to_string(),
        decoded_path: decode_object_path(encoded),
    })
}

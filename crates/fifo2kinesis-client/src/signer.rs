//! AWS Signature Version 4 request signing.
//!
//! Implements the canonical-request / string-to-sign / derived-key chain from
//! the SigV4 specification, scoped to what the client needs: POST bodies to a
//! single endpoint with a fixed header set. Header names passed in must
//! already be lowercase.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Compute the `Authorization` header value for a request.
///
/// `headers` must contain every header that participates in the signature
/// (at minimum `host` and `x-amz-date`), with lowercase names.
#[allow(clippy::too_many_arguments)]
pub(crate) fn sign_request(
    credentials: &Credentials,
    method: &str,
    path: &str,
    query: &str,
    headers: &[(String, String)],
    payload: &[u8],
    region: &str,
    service: &str,
    at: DateTime<Utc>,
) -> String {
    let amz_date = format_amz_date(&at);
    let date_stamp = format_date_stamp(&at);
    let scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);

    let (canonical, signed_headers) = canonical_request(method, path, query, headers, payload);
    let to_sign = string_to_sign(&amz_date, &scope, &canonical);
    let key = derive_signing_key(&credentials.secret_access_key, &date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    )
}

/// `YYYYMMDD'T'HHMMSS'Z'` timestamp used in `x-amz-date`.
pub(crate) fn format_amz_date(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_date_stamp(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}

/// Build the canonical request and the `SignedHeaders` list.
fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &[(String, String)],
    payload: &[u8],
) -> (String, String) {
    let mut sorted: Vec<&(String, String)> = headers.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = sorted
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers: String = sorted
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let payload_hash = hex::encode(Sha256::digest(payload));
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, path, query, canonical_headers, signed_headers, payload_hash
    );
    (canonical, signed_headers)
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

/// HMAC key chain: date -> region -> service -> "aws4_request".
fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

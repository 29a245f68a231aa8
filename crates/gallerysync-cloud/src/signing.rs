//! AWS Signature Version 4
//!
//! Signs a request in four steps:
//!
//! 1. Build the canonical request (method, path, sorted query, signed
//!    headers and the payload hash)
//! 2. Build the string to sign from the timestamp, the credential scope and
//!    the SHA-256 of the canonical request
//! 3. Derive the signing key by chaining HMAC-SHA256 over the date, region,
//!    service and `aws4_request`
//! 4. HMAC the string to sign with that key and assemble the
//!    `Authorization` header
//!
//! The signer is generic over the headers it signs so it can be checked
//! against the published AWS examples.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Format of the `x-amz-date` header
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// SHA-256 of the empty payload
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Access key pair
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"********")
            .finish()
    }
}

/// A request as seen by the signer
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    /// Absolute path, already URI-encoded
    pub path: &'a str,
    /// Raw (unencoded) query parameters
    pub query: &'a [(&'a str, &'a str)],
    /// Headers to sign; names are lowercased and values trimmed by the signer
    pub headers: &'a [(&'a str, &'a str)],
    /// Hex SHA-256 of the body, as sent in `x-amz-content-sha256`
    pub payload_sha256: &'a str,
}

/// Result of signing a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Value for the `Authorization` header
    pub authorization: String,
    /// Hex signature alone
    pub signature: String,
    /// `;`-joined list of signed header names
    pub signed_headers: String,
}

/// Hex SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encodes per the SigV4 rules (RFC 3986 unreserved set kept)
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Sorted, lowercased and trimmed copy of the headers
fn normalized_headers(headers: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            (name.to_ascii_lowercase(), value)
        })
        .collect();
    normalized.sort();
    normalized
}

/// Builds the canonical request string
pub fn canonical_request(request: &SignableRequest<'_>) -> String {
    let mut query: Vec<(String, String)> = request
        .query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    query.sort();
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let headers = normalized_headers(request.headers);
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.path,
        canonical_query,
        canonical_headers,
        signed_headers,
        request.payload_sha256
    )
}

/// `{date}/{region}/{service}/aws4_request`
pub fn credential_scope(datetime: DateTime<Utc>, region: &str, service: &str) -> String {
    format!(
        "{}/{}/{}/aws4_request",
        datetime.format("%Y%m%d"),
        region,
        service
    )
}

/// Builds the string to sign from a canonical request
pub fn string_to_sign(datetime: DateTime<Utc>, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        datetime.format(AMZ_DATE_FORMAT),
        scope,
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Derives the signing key for a day, region and service
pub fn signing_key(secret: &str, datetime: DateTime<Utc>, region: &str, service: &str) -> Vec<u8> {
    let date = datetime.format("%Y%m%d").to_string();
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Signs a request and returns the `Authorization` header value
pub fn sign(
    request: &SignableRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    datetime: DateTime<Utc>,
) -> Signature {
    let canonical = canonical_request(request);
    let scope = credential_scope(datetime, region, service);
    let to_sign = string_to_sign(datetime, &scope, &canonical);

    let key = signing_key(&credentials.secret_access_key, datetime, region, service);
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes()));

    let signed_headers = normalized_headers(request.headers)
        .into_iter()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(";");

    let authorization = format!(
        "{} Credential={}/{},SignedHeaders={},Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    );

    Signature {
        authorization,
        signature,
        signed_headers,
    }
}

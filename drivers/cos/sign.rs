//! COS请求签名 / COS request signature (q-sign-algorithm=sha1)
//!
//! SignKey     = HMAC-SHA1(SecretKey, KeyTime)
//! HttpString  = method\npath\nparams\nheaders\n
//! StringToSign = sha1\nKeyTime\nSHA1(HttpString)\n
//! Signature   = HMAC-SHA1(SignKey, StringToSign)

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

type HmacSha1 = Hmac<Sha1>;

fn hmac_sha1_hex(key: &[u8], data: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn sha1_hex(data: &str) -> String {
    hex::encode(Sha1::digest(data.as_bytes()))
}

/// Lowercase + encode keys, encode values, sort by key / 规范化键值对
fn canonical_pairs(pairs: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).to_lowercase(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    out.sort();
    out
}

/// Request signer / 请求签名器
#[derive(Debug, Clone)]
pub struct Signer {
    secret_id: String,
    secret_key: String,
}

impl Signer {
    pub fn new(secret_id: &str, secret_key: &str) -> Self {
        Self {
            secret_id: secret_id.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Build the `Authorization` value valid in `[start, end]` (Unix seconds) / 生成签名
    ///
    /// `path` is the unencoded request path starting with `/`.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        params: &BTreeMap<String, String>,
        headers: &BTreeMap<String, String>,
        start: i64,
        end: i64,
    ) -> String {
        let key_time = format!("{};{}", start, end);
        let sign_key = hmac_sha1_hex(self.secret_key.as_bytes(), &key_time);

        let params = canonical_pairs(params);
        let headers = canonical_pairs(headers);

        let join = |pairs: &[(String, String)]| {
            pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&")
        };
        let key_list = |pairs: &[(String, String)]| {
            pairs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>().join(";")
        };

        let http_string = format!(
            "{}\n{}\n{}\n{}\n",
            method.to_lowercase(),
            path,
            join(&params),
            join(&headers)
        );
        let string_to_sign = format!("sha1\n{}\n{}\n", key_time, sha1_hex(&http_string));
        let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign);

        format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={}&q-key-time={}&q-header-list={}&q-url-param-list={}&q-signature={}",
            self.secret_id,
            key_time,
            key_time,
            key_list(&headers),
            key_list(&params),
            signature
        )
    }
}

// token.rs - Short tokens appended to outbound API requests

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Derives `hex(hash(prefix + input + postfix))[..size]`.
///
/// `kind` selects the hash: "MD5" or "SHA256". Anything else yields an empty
/// token, which leaves the request URL unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TokenMaker {
    #[serde(rename = "Type")]
    pub kind: String,
    pub prefix: String,
    pub postfix: String,
    pub size: usize,
}

impl TokenMaker {
    pub fn make_token(&self, input: &str) -> String {
        let full = format!("{}{}{}", self.prefix, input, self.postfix);
        let digest = match self.kind.as_str() {
            "MD5" => format!("{:x}", Md5::digest(full.as_bytes())),
            "SHA256" => format!("{:x}", Sha256::digest(full.as_bytes())),
            _ => return String::new(),
        };
        digest.chars().take(self.size).collect()
    }
}

//! EIP-4361 sign-in message parsing and serialization.

use chrono::DateTime;
use std::fmt;
use std::str::FromStr;
use url::Url;

use super::{valid_address, SiweError};

const PREAMBLE_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const MIN_NONCE_LENGTH: usize = 8;

/// Parsed sign-in message. Field order on the wire is fixed; optional
/// trailing fields (expiration, request id, resources) are accepted and
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    /// As written by the wallet; not yet normalized.
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
}

impl FromStr for SiweMessage {
    type Err = SiweError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = input.lines().collect();
        if lines.len() < 3 {
            return Err(SiweError::Malformed("too short"));
        }

        let domain = lines[0]
            .strip_suffix(PREAMBLE_SUFFIX)
            .ok_or(SiweError::Malformed("missing preamble"))?
            .to_string();
        if domain.is_empty() {
            return Err(SiweError::Malformed("empty domain"));
        }

        let address = lines[1].to_string();
        if !valid_address(&address) {
            return Err(SiweError::Malformed("invalid address"));
        }

        if !lines[2].is_empty() {
            return Err(SiweError::Malformed("missing separator"));
        }

        // Optional statement block between the address and the field list.
        let (statement, mut index) = match lines.get(3) {
            Some(line) if line.starts_with("URI: ") => (None, 3),
            Some(line) if !line.is_empty() => {
                if lines.get(4).is_some_and(|next| !next.is_empty()) {
                    return Err(SiweError::Malformed("unterminated statement"));
                }
                (Some((*line).to_string()), 5)
            }
            Some(_) => (None, 4),
            None => return Err(SiweError::Malformed("missing fields")),
        };

        let mut field = |prefix: &'static str, name: &'static str| -> Result<String, SiweError> {
            let line = lines.get(index).ok_or(SiweError::Malformed(name))?;
            let value = line.strip_prefix(prefix).ok_or(SiweError::Malformed(name))?;
            index += 1;
            Ok(value.to_string())
        };

        let uri = field("URI: ", "missing URI")?;
        let version = field("Version: ", "missing version")?;
        let chain_id_raw = field("Chain ID: ", "missing chain id")?;
        let nonce = field("Nonce: ", "missing nonce")?;
        let issued_at = field("Issued At: ", "missing issued-at")?;

        if Url::parse(&uri).is_err() {
            return Err(SiweError::Malformed("invalid URI"));
        }
        if version != "1" {
            return Err(SiweError::Malformed("unsupported version"));
        }
        let chain_id = chain_id_raw
            .parse::<u64>()
            .map_err(|_| SiweError::Malformed("invalid chain id"))?;
        if nonce.len() < MIN_NONCE_LENGTH || !nonce.chars().all(char::is_alphanumeric) {
            return Err(SiweError::Malformed("invalid nonce"));
        }
        if DateTime::parse_from_rfc3339(&issued_at).is_err() {
            return Err(SiweError::Malformed("invalid issued-at"));
        }

        Ok(Self {
            domain,
            address,
            statement,
            uri,
            version,
            chain_id,
            nonce,
            issued_at,
        })
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{PREAMBLE_SUFFIX}", self.domain)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
            writeln!(f)?;
        }
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(f, "Issued At: {}", self.issued_at)
    }
}

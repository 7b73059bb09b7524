//! Authentication handshake for the control channel.
//!
//! Supports the four daemon-side methods: NULL, HASHEDPASSWORD, COOKIE, and
//! SAFECOOKIE. Method selection prefers the challenge/response SAFECOOKIE
//! handshake, falling back to plain cookie, then password, then NULL.

use crate::error::{ControlError, Result};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

/// HMAC key for the hash the server sends to prove cookie knowledge.
const SERVER_HASH_KEY: &[u8] = b"Tor safe cookie authentication server-to-controller hash";
/// HMAC key for the hash the client sends back.
const CLIENT_HASH_KEY: &[u8] = b"Tor safe cookie authentication controller-to-server hash";

/// Authentication methods a daemon can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Open access, no credential needed.
    Null,
    /// Password checked against a stored hash.
    HashedPassword,
    /// Cookie-file authentication.
    Cookie,
    /// HMAC challenge/response over the cookie.
    SafeCookie,
}

impl AuthMethod {
    /// Parse a method keyword from a PROTOCOLINFO AUTH line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NULL" => Some(AuthMethod::Null),
            "HASHEDPASSWORD" => Some(AuthMethod::HashedPassword),
            "COOKIE" => Some(AuthMethod::Cookie),
            "SAFECOOKIE" => Some(AuthMethod::SafeCookie),
            _ => None,
        }
    }
}

/// The daemon's answer to PROTOCOLINFO.
#[derive(Debug, Clone)]
pub struct ProtocolInfo {
    /// Control protocol version (1 for every daemon in the wild).
    pub protocol_version: u32,
    /// Daemon software version string.
    pub server_version: String,
    /// Advertised authentication methods.
    pub auth_methods: Vec<AuthMethod>,
    /// Advertised cookie file path, when cookie methods are available.
    pub cookie_file: Option<String>,
}

impl ProtocolInfo {
    /// Parse the line texts of a PROTOCOLINFO reply.
    pub fn parse(lines: &[String]) -> Result<Self> {
        let mut info = ProtocolInfo {
            protocol_version: 1,
            server_version: String::new(),
            auth_methods: Vec::new(),
            cookie_file: None,
        };

        for line in lines {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("PROTOCOLINFO ") {
                info.protocol_version = rest.trim().parse().unwrap_or(1);
            } else if let Some(rest) = line.strip_prefix("AUTH ") {
                // AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE="/run/tor/control.authcookie"
                for part in rest.split_whitespace() {
                    if let Some(methods) = part.strip_prefix("METHODS=") {
                        info.auth_methods
                            .extend(methods.split(',').filter_map(AuthMethod::parse));
                    } else if let Some(file) = part.strip_prefix("COOKIEFILE=") {
                        info.cookie_file = Some(file.trim_matches('"').to_string());
                    }
                }
            } else if let Some(rest) = line.strip_prefix("VERSION ") {
                if let Some(ver) = rest.strip_prefix("Tor=") {
                    info.server_version = ver.trim_matches('"').to_string();
                }
            }
        }

        Ok(info)
    }

    /// Whether the given method is advertised.
    pub fn supports(&self, method: AuthMethod) -> bool {
        self.auth_methods.contains(&method)
    }
}

/// Credentials for one authentication attempt. Lifetime is bounded to the
/// handshake; nothing here is retained by the controller afterwards.
#[derive(Debug, Clone, Default)]
pub enum AuthCredential {
    /// No credential (NULL method).
    #[default]
    None,
    /// Password for the HASHEDPASSWORD method.
    Password(String),
    /// Cookie file to read and present.
    CookieFile(String),
    /// Raw 32-byte cookie.
    CookieData(Vec<u8>),
    /// SAFECOOKIE challenge/response using the given cookie file.
    SafeCookie {
        /// Path to the cookie file.
        cookie_path: String,
    },
}

/// Pick a credential from advertised methods and local material.
///
/// Priority: SAFECOOKIE with a readable cookie, then COOKIE, then password
/// (when one was supplied), then NULL. `cookie_override` replaces the
/// advertised cookie path when set.
pub fn choose_credential(
    info: &ProtocolInfo,
    password: Option<&str>,
    cookie_override: Option<&Path>,
) -> Result<AuthCredential> {
    let cookie_path = cookie_override
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| info.cookie_file.clone())
        .filter(|p| Path::new(p).is_file());

    if let Some(cookie_path) = cookie_path {
        if info.supports(AuthMethod::SafeCookie) {
            return Ok(AuthCredential::SafeCookie { cookie_path });
        }
        if info.supports(AuthMethod::Cookie) {
            return Ok(AuthCredential::CookieFile(cookie_path));
        }
    }
    if info.supports(AuthMethod::HashedPassword) {
        if let Some(password) = password {
            return Ok(AuthCredential::Password(password.to_string()));
        }
    }
    if info.supports(AuthMethod::Null) {
        return Ok(AuthCredential::None);
    }

    Err(ControlError::Authentication(
        "no usable authentication method: daemon advertises none matching local credentials"
            .to_string(),
    ))
}

/// Read and validate a 32-byte authentication cookie.
pub fn read_cookie_file(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| {
        ControlError::Authentication(format!(
            "failed to read cookie file '{}': {}",
            path.display(),
            e
        ))
    })?;

    if data.len() != 32 {
        return Err(ControlError::Authentication(format!(
            "cookie file has length {}, expected 32",
            data.len()
        )));
    }

    Ok(data)
}

/// Generate a 32-byte client nonce for the SAFECOOKIE handshake.
pub fn generate_client_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn safecookie_hmac(key: &[u8], cookie: &[u8], client_nonce: &[u8], server_nonce: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(cookie);
    mac.update(client_nonce);
    mac.update(server_nonce);

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&mac.finalize().into_bytes());
    hash
}

/// The hash the server must present: HMAC over cookie, client nonce, and
/// server nonce with the server-to-controller key.
pub fn compute_server_hash(cookie: &[u8], client_nonce: &[u8], server_nonce: &[u8]) -> [u8; 32] {
    safecookie_hmac(SERVER_HASH_KEY, cookie, client_nonce, server_nonce)
}

/// The hash the client sends in AUTHENTICATE, with the controller-to-server
/// key.
pub fn compute_client_hash(cookie: &[u8], client_nonce: &[u8], server_nonce: &[u8]) -> [u8; 32] {
    safecookie_hmac(CLIENT_HASH_KEY, cookie, client_nonce, server_nonce)
}

/// Verify the server's hash in constant time.
pub fn verify_server_hash(
    cookie: &[u8],
    client_nonce: &[u8],
    server_nonce: &[u8],
    presented: &[u8],
) -> bool {
    let expected = compute_server_hash(cookie, client_nonce, server_nonce);
    constant_time_eq(&expected, presented)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parse `SERVERHASH=` and `SERVERNONCE=` from an AUTHCHALLENGE reply line.
pub fn parse_authchallenge_response(text: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut server_hash = None;
    let mut server_nonce = None;

    for part in text.split_whitespace() {
        if let Some(hash) = part.strip_prefix("SERVERHASH=") {
            server_hash = Some(hex::decode(hash).map_err(|e| {
                ControlError::Protocol(format!("invalid SERVERHASH hex: {}", e))
            })?);
        } else if let Some(nonce) = part.strip_prefix("SERVERNONCE=") {
            server_nonce = Some(hex::decode(nonce).map_err(|e| {
                ControlError::Protocol(format!("invalid SERVERNONCE hex: {}", e))
            })?);
        }
    }

    let server_hash =
        server_hash.ok_or_else(|| ControlError::Protocol("missing SERVERHASH".to_string()))?;
    let server_nonce =
        server_nonce.ok_or_else(|| ControlError::Protocol("missing SERVERNONCE".to_string()))?;

    for (name, value) in [("SERVERHASH", &server_hash), ("SERVERNONCE", &server_nonce)] {
        if value.len() != 32 {
            return Err(ControlError::Protocol(format!(
                "invalid {} length: {}",
                name,
                value.len()
            )));
        }
    }

    Ok((server_hash, server_nonce))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn info_with(methods: &[AuthMethod], cookie_file: Option<&str>) -> ProtocolInfo {
        ProtocolInfo {
            protocol_version: 1,
            server_version: "0.4.8.12".to_string(),
            auth_methods: methods.to_vec(),
            cookie_file: cookie_file.map(String::from),
        }
    }

    fn temp_cookie() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[7u8; 32]).unwrap();
        f
    }

    #[test]
    fn method_keywords() {
        assert_eq!(AuthMethod::parse("NULL"), Some(AuthMethod::Null));
        assert_eq!(AuthMethod::parse("safecookie"), Some(AuthMethod::SafeCookie));
        assert_eq!(AuthMethod::parse("HASHEDPASSWORD"), Some(AuthMethod::HashedPassword));
        assert_eq!(AuthMethod::parse("OTHER"), None);
    }

    #[test]
    fn protocolinfo_parsing() {
        let lines = vec![
            "PROTOCOLINFO 1".to_string(),
            "AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE=\"/run/tor/control.authcookie\"".to_string(),
            "VERSION Tor=\"0.4.8.12\"".to_string(),
            "OK".to_string(),
        ];
        let info = ProtocolInfo::parse(&lines).unwrap();
        assert_eq!(info.protocol_version, 1);
        assert_eq!(info.server_version, "0.4.8.12");
        assert!(info.supports(AuthMethod::Cookie));
        assert!(info.supports(AuthMethod::SafeCookie));
        assert!(!info.supports(AuthMethod::Null));
        assert_eq!(
            info.cookie_file.as_deref(),
            Some("/run/tor/control.authcookie")
        );
    }

    #[test]
    fn selection_prefers_safecookie() {
        let cookie = temp_cookie();
        let path = cookie.path().to_str().unwrap();
        let info = info_with(
            &[AuthMethod::Null, AuthMethod::Cookie, AuthMethod::SafeCookie],
            Some(path),
        );
        let chosen = choose_credential(&info, Some("pw"), None).unwrap();
        assert!(matches!(chosen, AuthCredential::SafeCookie { .. }));
    }

    #[test]
    fn selection_falls_back_to_cookie_then_password_then_null() {
        let cookie = temp_cookie();
        let path = cookie.path().to_str().unwrap();

        let info = info_with(&[AuthMethod::Cookie, AuthMethod::Null], Some(path));
        assert!(matches!(
            choose_credential(&info, None, None).unwrap(),
            AuthCredential::CookieFile(_)
        ));

        // Cookie advertised but unreadable: password wins.
        let info = info_with(
            &[AuthMethod::Cookie, AuthMethod::HashedPassword],
            Some("/nonexistent/cookie"),
        );
        assert!(matches!(
            choose_credential(&info, Some("pw"), None).unwrap(),
            AuthCredential::Password(_)
        ));

        let info = info_with(&[AuthMethod::Null], None);
        assert!(matches!(
            choose_credential(&info, None, None).unwrap(),
            AuthCredential::None
        ));

        let info = info_with(&[AuthMethod::HashedPassword], None);
        assert!(choose_credential(&info, None, None).is_err());
    }

    #[test]
    fn cookie_file_length_checked() {
        let mut short = tempfile::NamedTempFile::new().unwrap();
        short.write_all(&[1u8; 16]).unwrap();
        assert!(read_cookie_file(short.path()).is_err());

        let ok = temp_cookie();
        assert_eq!(read_cookie_file(ok.path()).unwrap(), vec![7u8; 32]);
    }

    #[test]
    fn nonces_are_random() {
        assert_ne!(generate_client_nonce(), generate_client_nonce());
    }

    #[test]
    fn safecookie_hashes() {
        let cookie = [0u8; 32];
        let client_nonce = [1u8; 32];
        let server_nonce = [2u8; 32];

        let server = compute_server_hash(&cookie, &client_nonce, &server_nonce);
        let client = compute_client_hash(&cookie, &client_nonce, &server_nonce);
        assert_ne!(server, client);

        assert!(verify_server_hash(&cookie, &client_nonce, &server_nonce, &server));
        assert!(!verify_server_hash(&cookie, &client_nonce, &server_nonce, &client));
        assert!(!verify_server_hash(&cookie, &client_nonce, &server_nonce, &server[..16]));
    }

    #[test]
    fn authchallenge_parsing() {
        let hash = "AA".repeat(32);
        let nonce = "BB".repeat(32);
        let (h, n) = parse_authchallenge_response(&format!(
            "AUTHCHALLENGE SERVERHASH={} SERVERNONCE={}",
            hash, nonce
        ))
        .unwrap();
        assert_eq!(h, vec![0xAA; 32]);
        assert_eq!(n, vec![0xBB; 32]);

        assert!(parse_authchallenge_response("AUTHCHALLENGE SERVERNONCE=AA").is_err());
        assert!(parse_authchallenge_response(&format!(
            "AUTHCHALLENGE SERVERHASH=ZZ SERVERNONCE={}",
            nonce
        ))
        .is_err());
    }
}

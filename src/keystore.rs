//! Client authorization keys for restricted onion services.
//!
//! Each restricted service gets one x25519 key pair, generated from the
//! system CSPRNG and persisted in the daemon's `ClientOnionAuthDir` file
//! format: one `<service>.auth_private` file per service containing
//! `<service>:descriptor:x25519:<base32 secret>`. Files are written with
//! owner-only permissions; that is a security invariant of the store, not
//! a convenience.

use crate::error::{ControlError, Result};
use crate::types::OnionAddress;
use data_encoding::{BASE32_NOPAD, BASE64};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use x25519_dalek::{PublicKey, StaticSecret};

const AUTH_FILE_SUFFIX: &str = ".auth_private";
const KEY_TYPE: &str = "descriptor:x25519";

/// An x25519 client authorization key pair for one onion service.
///
/// The private scalar stays inside this value; it leaves only through
/// [`AuthKeyPair::secret_base64`] on its way into the registration command,
/// and through the store's own persistence. It is never logged.
#[derive(Clone)]
pub struct AuthKeyPair {
    service: OnionAddress,
    secret: [u8; 32],
}

impl AuthKeyPair {
    fn new(service: OnionAddress, secret: [u8; 32]) -> Self {
        Self { service, secret }
    }

    /// The service this key pair unlocks.
    pub fn service(&self) -> &OnionAddress {
        &self.service
    }

    /// The public point, derived from the private scalar.
    pub fn public_key(&self) -> [u8; 32] {
        *PublicKey::from(&StaticSecret::from(self.secret)).as_bytes()
    }

    /// Base32 public key, as used in server-side `.auth` files.
    pub fn public_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.public_key())
    }

    /// Base64 private scalar, as the registration command expects it.
    pub fn secret_base64(&self) -> String {
        BASE64.encode(&self.secret)
    }

    fn auth_private_line(&self) -> String {
        format!(
            "{}:{}:{}",
            self.service.service_id(),
            KEY_TYPE,
            BASE32_NOPAD.encode(&self.secret)
        )
    }
}

impl fmt::Debug for AuthKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeyPair")
            .field("service", &self.service)
            .field("public", &self.public_base32())
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl PartialEq for AuthKeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service && self.secret == other.secret
    }
}

impl Eq for AuthKeyPair {}

/// Directory-backed store of per-service authorization key pairs.
#[derive(Debug, Clone)]
pub struct OnionAuthStore {
    dir: PathBuf,
}

impl OnionAuthStore {
    /// Open a store at `dir`, creating the directory (owner-only) if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        restrict_dir_permissions(&dir)?;
        Ok(Self { dir })
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the persisted key pair for a service, or generate and persist
    /// a fresh one. Idempotent: repeated calls, including across process
    /// restarts, return the same pair.
    pub fn ensure_key(&self, service: &OnionAddress) -> Result<AuthKeyPair> {
        if let Some(existing) = self.load(service)? {
            return Ok(existing);
        }

        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let pair = AuthKeyPair::new(service.clone(), secret);
        self.persist(&pair)?;
        Ok(pair)
    }

    /// Load the persisted key pair for a service, if one exists.
    pub fn load(&self, service: &OnionAddress) -> Result<Option<AuthKeyPair>> {
        let path = self.key_path(service);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse_auth_private(contents.trim()).map(Some)
    }

    /// Delete persisted key material for a service. Returns whether a key
    /// existed.
    pub fn forget_key(&self, service: &OnionAddress) -> Result<bool> {
        match fs::remove_file(self.key_path(service)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Services with persisted keys, in no particular order.
    pub fn list(&self) -> Result<Vec<OnionAddress>> {
        let mut services = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(service) = name.strip_suffix(AUTH_FILE_SUFFIX) {
                services.push(OnionAddress::new(service));
            }
        }
        Ok(services)
    }

    fn key_path(&self, service: &OnionAddress) -> PathBuf {
        self.dir
            .join(format!("{}{}", service.service_id(), AUTH_FILE_SUFFIX))
    }

    fn persist(&self, pair: &AuthKeyPair) -> Result<()> {
        let path = self.key_path(&pair.service);
        fs::write(&path, pair.auth_private_line() + "\n")?;
        restrict_file_permissions(&path)?;
        Ok(())
    }
}

/// Parse a `<service>:descriptor:x25519:<base32>` record.
fn parse_auth_private(line: &str) -> Result<AuthKeyPair> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != 4 || fields[1] != "descriptor" || fields[2] != "x25519" {
        return Err(ControlError::Parse(format!(
            "malformed client auth record: '{}'",
            line
        )));
    }

    let raw = BASE32_NOPAD
        .decode(fields[3].trim().as_bytes())
        .map_err(|e| ControlError::Parse(format!("invalid client auth key encoding: {}", e)))?;
    let secret: [u8; 32] = raw
        .try_into()
        .map_err(|_| ControlError::Parse("client auth key is not 32 bytes".to_string()))?;

    Ok(AuthKeyPair::new(OnionAddress::new(fields[0]), secret))
}

#[cfg(unix)]
fn restrict_dir_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

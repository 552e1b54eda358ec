//! Artifact signing utility.
//!
//! # Usage
//!
//! ```bash
//! sign_artifacts keygen --out-seed <path> [--out-pub <path>] [--force]
//! sign_artifacts sign <artifact_dir>
//! ```
//!
//! `sign` writes `artifacts.sig`, an Ed25519 signature over the exact bytes of
//! `manifest.json`. The signing seed (base64, 32 bytes) is read from
//! `CARDIORISK_SIGNING_KEY_B64_FD` or `CARDIORISK_SIGNING_KEY_B64_FILE`; debug
//! builds also accept `CARDIORISK_SIGNING_KEY_B64`.
//!
//! # Security
//!
//! - Key generation uses OS entropy (OsRng)
//! - Seed material is zeroized after use
//! - The seed file is created with 0600 permissions (Unix only)

use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use cardiorisk::adapters::artifacts::{sign_manifest, MANIFEST_FILE};

const KEY_FD_ENV: &str = "CARDIORISK_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "CARDIORISK_SIGNING_KEY_B64_FILE";
const KEY_ENV_DEV: &str = "CARDIORISK_SIGNING_KEY_B64";

const USAGE: &str = "Usage:\n  sign_artifacts keygen --out-seed <path> [--out-pub <path>] [--force]\n  sign_artifacts sign <artifact_dir>";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn non_empty_secret(raw: &str) -> Result<Zeroizing<String>> {
    let secret = raw.trim_end_matches(['\n', '\r']).to_string();
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(secret))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        let fd: i32 = fd_str.trim().parse().map_err(|_| anyhow!("Invalid key FD"))?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        std::io::Read::read_to_string(&mut file, &mut buf)
            .context("Failed reading signing key from FD")?;
        return non_empty_secret(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return non_empty_secret(&content);
    }

    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV_DEV) {
            return non_empty_secret(&v);
        }
    }

    bail!(
        "Missing signing key. Provide {KEY_FD_ENV} or {KEY_FILE_ENV} ({KEY_ENV_DEV} only in debug builds)."
    )
}

fn read_signing_seed() -> Result<Seed> {
    let b64 = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );
    let seed: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        )
    })?;
    Ok(Seed(seed))
}

fn write_new_file(path: &Path, contents: &[u8], mode: u32, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(contents)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn keygen(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut out_seed: Option<PathBuf> = None;
    let mut out_pub: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-seed" => out_seed = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "--out-pub" => out_pub = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "--force" => force = true,
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }
    let out_seed = out_seed.ok_or_else(|| anyhow!(USAGE))?;

    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);
    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();

    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    write_new_file(&out_seed, seed_b64.as_bytes(), 0o600, force)?;
    println!("Wrote signing seed (base64) to {out_seed:?}");
    if let Some(pub_path) = &out_pub {
        // Public key is non-secret; allow read access.
        write_new_file(pub_path, pub_b64.as_bytes(), 0o644, force)?;
        println!("Wrote public key (base64) to {pub_path:?}");
    }
    println!("PUBKEY (hex)={}", to_hex(verifying_key.as_bytes()));
    Ok(())
}

fn sign(mut args: impl Iterator<Item = String>) -> Result<()> {
    let dir = PathBuf::from(args.next().ok_or_else(|| anyhow!(USAGE))?);
    if args.next().is_some() {
        bail!(USAGE);
    }
    if !dir.join(MANIFEST_FILE).is_file() {
        bail!("No {MANIFEST_FILE} in {dir:?}; run train_model first");
    }

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    let sig_path = sign_manifest(&dir, &signing_key)?;

    println!("Wrote signature: {sig_path:?}");
    println!(
        "PUBKEY (base64)={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("keygen") => keygen(args),
        Some("sign") => sign(args),
        Some("-h" | "--help") => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

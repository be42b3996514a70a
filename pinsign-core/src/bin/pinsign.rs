// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// pinsign - command-line front end
//
//   pinsign keygen --pin 1234 --media-root /media/usb
//   pinsign sign contract.pdf --pin 1234
//   pinsign verify contract_signed.json --public-key public_key.pem

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pinsign_core::{KeyStore, KeyVault, SignResult, Signer, SignerConfig, Verifier};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "pinsign")]
#[command(about = "Sign documents with a PIN-protected RSA key")]
#[command(version)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mount point of the removable medium holding `private_encrypted.key`.
    #[arg(long, global = true)]
    media_root: Option<PathBuf>,

    /// Encrypted private key; overrides `--media-root`.
    #[arg(long, global = true)]
    private_key: Option<PathBuf>,

    /// Where the public key is written by `keygen`.
    #[arg(long, global = true)]
    public_key_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a keypair and encrypt the private key with a PIN.
    Keygen {
        #[arg(long, env = "PINSIGN_PIN", hide_env_values = true)]
        pin: String,
    },
    /// Sign a document; writes `<stem>_signed.json` next to it.
    Sign {
        document: PathBuf,
        #[arg(long, env = "PINSIGN_PIN", hide_env_values = true)]
        pin: String,
    },
    /// Verify a signed document against a public key.
    Verify {
        signed_document: PathBuf,
        /// Defaults to the configured public key path.
        #[arg(long)]
        public_key: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}

fn load_config(cli: &Cli) -> SignResult<SignerConfig> {
    let mut config = match &cli.config {
        Some(path) => SignerConfig::load(path)?,
        None => SignerConfig::default(),
    };
    if let Some(root) = &cli.media_root {
        config.private_key_path = SignerConfig::for_media_root(root).private_key_path;
    }
    if let Some(path) = &cli.private_key {
        config.private_key_path = path.clone();
    }
    if let Some(path) = &cli.public_key_out {
        config.public_key_path = path.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> SignResult<bool> {
    let config = load_config(&cli)?;
    let key_store = KeyStore::from_config(&config);

    match cli.command {
        Command::Keygen { pin } => {
            let vault = KeyVault::new(config.rsa_key_bits);
            key_store.generate(&pin, &vault)?;
            println!("Keys generated and saved.");
            println!("  private key: {}", key_store.private_key_path.display());
            println!("  public key:  {}", key_store.public_key_path.display());
            Ok(true)
        }
        Command::Sign { document, pin } => {
            let out_path = Signer::new(config.signer_id).sign_file(&document, &pin, &key_store)?;
            println!("Signed document written to {}", out_path.display());
            Ok(true)
        }
        Command::Verify {
            signed_document,
            public_key,
        } => {
            let public_key = public_key.unwrap_or(config.public_key_path);
            let valid = Verifier::new().verify_file(&signed_document, &public_key)?;
            if valid {
                println!("Signature is valid.");
            } else {
                println!("Signature is INVALID.");
            }
            Ok(valid)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_root_sets_private_key_path() {
        let cli = Cli::parse_from([
            "pinsign",
            "--media-root",
            "/media/usb",
            "keygen",
            "--pin",
            "1234",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(
            config.private_key_path,
            PathBuf::from("/media/usb/private_encrypted.key")
        );
    }

    #[test]
    fn test_private_key_overrides_media_root() {
        let cli = Cli::parse_from([
            "pinsign",
            "--media-root",
            "/media/usb",
            "--private-key",
            "/tmp/other.key",
            "verify",
            "doc_signed.json",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.private_key_path, PathBuf::from("/tmp/other.key"));
    }
}

/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point for the sensor provisioning application

--*/

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use sensor_prov_types::{KeyName, RootOfTrust};
use simple_logger::SimpleLogger;

mod cert;
mod config;
mod keys;
mod otpm;
mod wrap;

#[derive(Parser)]
#[command(name = "sensor-prov", version, about = "Image sensor provisioning tools")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key set and save it to a directory
    GenKeys {
        /// Output key directory
        #[arg(long)]
        out: PathBuf,

        /// Save the published test key set instead of fresh random keys
        #[arg(long)]
        test_keys: bool,

        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Wrap an asset payload for a root of trust
    WrapAsset {
        #[arg(long)]
        keys: PathBuf,

        #[arg(long)]
        root_of_trust: RootOfTrust,

        #[arg(long, value_parser = parse_u32)]
        asset_id: u32,

        /// Asset payload
        #[arg(long = "in")]
        input: PathBuf,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Wrap a stored key for transfer to the device
    WrapKey {
        #[arg(long)]
        keys: PathBuf,

        #[arg(long)]
        root_of_trust: RootOfTrust,

        #[arg(long)]
        key: KeyName,

        /// Asset id; for kpicv, the 128-bit HBK0 value
        #[arg(long, value_parser = parse_u128)]
        asset_id: u128,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Build an RSA public key certificate
    PubkeyCert {
        #[arg(long)]
        keys: PathBuf,

        /// Subject key pair
        #[arg(long)]
        key: KeyName,

        /// Signing key pair; the subject signs its own certificate if absent
        #[arg(long)]
        signer: Option<KeyName>,

        #[arg(long, value_parser = parse_u32)]
        authority: u32,

        #[arg(long, value_parser = parse_u32)]
        purpose: u32,

        #[arg(long, value_parser = parse_u32)]
        version: u32,

        #[arg(long, value_parser = parse_u32)]
        number: u32,

        /// Emit the certificate as a typed NVM record
        #[arg(long)]
        record: bool,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Build a secure-boot debug entitlement certificate chain
    DebugEntitlement {
        #[arg(long)]
        keys: PathBuf,

        /// Entitlement configuration (TOML)
        #[arg(long)]
        config: PathBuf,

        /// PKCS#8 PEM key signing the developer certificate
        #[arg(long)]
        developer_key: Option<PathBuf>,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// List the records of an OTPM snapshot
    OtpmIndex {
        /// Little-endian OTPM dump
        #[arg(long)]
        image: PathBuf,

        /// Report only the authoritative record of this type
        #[arg(long, value_parser = parse_u16)]
        asset_type: Option<u16>,
    },

    /// Store a password (read from stdin) in a password file
    StorePassword {
        #[arg(long)]
        password_file: PathBuf,
    },
}

fn parse_u128(s: &str) -> Result<u128, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u128::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    }
}

fn parse_u32(s: &str) -> anyhow::Result<u32> {
    Ok(u32::try_from(parse_u128(s)?)?)
}

fn parse_u16(s: &str) -> anyhow::Result<u16> {
    Ok(u16::try_from(parse_u128(s)?)?)
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    let result = match cli.cmd {
        Commands::GenKeys {
            out,
            test_keys,
            password_file,
        } => keys::gen_keys(&out, test_keys, password_file.as_deref()),
        Commands::WrapAsset {
            keys,
            root_of_trust,
            asset_id,
            input,
            out,
            password_file,
        } => wrap::wrap_asset(
            &keys,
            password_file.as_deref(),
            root_of_trust,
            asset_id,
            &input,
            &out,
        ),
        Commands::WrapKey {
            keys,
            root_of_trust,
            key,
            asset_id,
            out,
            password_file,
        } => wrap::wrap_key(
            &keys,
            password_file.as_deref(),
            root_of_trust,
            key,
            asset_id,
            &out,
        ),
        Commands::PubkeyCert {
            keys,
            key,
            signer,
            authority,
            purpose,
            version,
            number,
            record,
            out,
            password_file,
        } => cert::pubkey_cert(
            &keys,
            password_file.as_deref(),
            key,
            signer,
            sensor_prov_gen::RsaCertParams {
                authority,
                purpose,
                version,
                number,
            },
            record,
            &out,
        ),
        Commands::DebugEntitlement {
            keys,
            config,
            developer_key,
            out,
            password_file,
        } => cert::debug_entitlement(
            &keys,
            password_file.as_deref(),
            &config,
            developer_key.as_deref(),
            &out,
        ),
        Commands::OtpmIndex { image, asset_type } => otpm::otpm_index(&image, asset_type),
        Commands::StorePassword { password_file } => keys::store_password(&password_file),
    };

    result.unwrap_or_else(|e| {
        log::error!("Error: {:#}", e);
        std::process::exit(1);
    });
}

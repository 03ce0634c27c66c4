//! pqrelay command-line tools.
//!
//! # Usage
//!
//! ```bash
//! # Generate an ML-KEM-768 key pair (alice.pub / alice.key, base64)
//! pqrelay keygen --name alice --out-dir keys/
//!
//! # Encrypt a file for alice, then decrypt it
//! pqrelay encrypt --recipient keys/alice.pub --input note.txt --output note.bin
//! pqrelay decrypt --key keys/alice.key --input note.bin --output note.out
//!
//! # Run a full register / create / rotate / send flow on an in-memory ledger
//! pqrelay demo --members 3 --messages 5 --rotations 1
//! ```

mod commands;
mod demo;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pqrelay_core::ProtocolConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// pqrelay key management and group messaging tools
#[derive(Parser, Debug)]
#[command(name = "pqrelay")]
#[command(about = "Quantum-safe group key management and message encryption")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an ML-KEM-768 key pair
    Keygen {
        /// Base name for the `.pub` and `.key` files
        #[arg(short, long)]
        name: String,

        /// Directory to write the key files into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Encrypt a file for one recipient
    Encrypt {
        /// Recipient's public key file (base64)
        #[arg(short, long)]
        recipient: PathBuf,

        /// Plaintext file
        #[arg(short, long)]
        input: PathBuf,

        /// Ciphertext output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decrypt a file encrypted with `encrypt`
    Decrypt {
        /// Own private key file (base64)
        #[arg(short, long)]
        key: PathBuf,

        /// Ciphertext file
        #[arg(short, long)]
        input: PathBuf,

        /// Plaintext output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a scripted group session against an in-memory ledger
    Demo {
        /// Number of group members
        #[arg(long, default_value = "3")]
        members: u8,

        /// Messages to send (round-robin across members)
        #[arg(long, default_value = "5")]
        messages: usize,

        /// Key rotations to perform before sending
        #[arg(long, default_value = "1")]
        rotations: u64,

        #[command(flatten)]
        limits: LimitArgs,
    },
}

/// Protocol limits, mapped onto [`ProtocolConfig`]
#[derive(clap::Args, Debug)]
struct LimitArgs {
    /// Maximum members per group
    #[arg(long, default_value = "20")]
    max_members: usize,

    /// Maximum bytes per wrapped key
    #[arg(long, default_value = "1200")]
    max_wrapped_key_bytes: usize,

    /// Maximum bytes per message ciphertext
    #[arg(long, default_value = "1200")]
    max_ciphertext_bytes: usize,

    /// Maximum bytes per message nonce
    #[arg(long, default_value = "64")]
    max_nonce_bytes: usize,

    /// Key version assigned at group creation
    #[arg(long, default_value = "0")]
    initial_key_version: u64,
}

impl LimitArgs {
    fn into_config(self) -> ProtocolConfig {
        ProtocolConfig {
            max_members: self.max_members,
            max_wrapped_key_bytes: self.max_wrapped_key_bytes,
            max_ciphertext_bytes: self.max_ciphertext_bytes,
            max_nonce_bytes: self.max_nonce_bytes,
            initial_key_version: self.initial_key_version,
            ..ProtocolConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut rng = rand::rngs::OsRng;

    match args.command {
        Command::Keygen { name, out_dir } => {
            let (public, private) = commands::keygen(&name, &out_dir, &mut rng)?;
            tracing::info!(public = %public.display(), private = %private.display(), "key pair written");
        },
        Command::Encrypt { recipient, input, output } => {
            let written = commands::encrypt_file(&recipient, &input, &output, &mut rng)?;
            tracing::info!(bytes = written, output = %output.display(), "encrypted");
        },
        Command::Decrypt { key, input, output } => {
            let written = commands::decrypt_file(&key, &input, &output)?;
            tracing::info!(bytes = written, output = %output.display(), "decrypted");
        },
        Command::Demo { members, messages, rotations, limits } => {
            let plan = demo::DemoPlan { members, messages, rotations };
            let summary = demo::run(&plan, limits.into_config(), &mut rng)?;
            tracing::info!(
                group = %summary.group_id,
                key_version = summary.key_version,
                messages = summary.messages_read,
                "demo complete"
            );
        },
    }

    Ok(())
}

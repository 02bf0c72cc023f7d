use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Package VillageSQL extensions into .veb archives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a .veb package from a manifest and a compiled library
    Build {
        /// Extension manifest path
        #[arg(short, long, default_value = "vef.toml")]
        manifest: PathBuf,
        /// Compiled shared library to package
        #[arg(short, long)]
        library: PathBuf,
        /// Output package path (defaults to <name>.veb)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List the contents and manifest of a package
    Inspect {
        package: PathBuf,
    },
    /// Unpack into a scratch directory and verify checksums
    Verify {
        package: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            manifest,
            library,
            out,
        } => {
            let out = match out {
                Some(path) => path,
                None => {
                    let parsed = vef_pack::ExtensionManifest::load(&manifest)?;
                    PathBuf::from(format!("{}.veb", parsed.extension.name))
                }
            };
            let packed = vef_pack::pack(&manifest, &library, &out)?;
            println!(
                "built {} ({} v{})",
                out.display(),
                packed.extension.name,
                packed.extension.version
            );
        }
        Command::Inspect { package } => {
            let (manifest, entries) = vef_pack::inspect(&package)?;
            println!(
                "{} v{} - {}",
                manifest.extension.name,
                manifest.extension.version,
                manifest
                    .extension
                    .description
                    .as_deref()
                    .unwrap_or("no description")
            );
            for decl in &manifest.functions {
                let args: Vec<String> = decl.args.iter().map(|a| a.to_string()).collect();
                println!("  function {}({}) -> {}", decl.name, args.join(", "), decl.returns);
            }
            for entry in entries {
                println!("  {:>9}  {}", entry.size, entry.name);
            }
        }
        Command::Verify { package } => {
            let manifest = vef_pack::verify(&package)?;
            println!(
                "ok: {} v{}",
                manifest.extension.name, manifest.extension.version
            );
        }
    }
    Ok(())
}

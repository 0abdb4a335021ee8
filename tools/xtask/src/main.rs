//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::Command;

const SMOKE_STATE: &str = r#"{"outputs": {
  "gdpr_input_bucket": {"value": "smoke-input", "type": "string"},
  "gdpr_processed_bucket": {"value": "smoke-processed", "type": "string"},
  "gdpr_invocation_bucket": {"value": "smoke-invocation", "type": "string"}
}}"#;

const SMOKE_DATASET: &str = "name,email,age\nJohn,john@example.com,30\nJane,jane@example.com,25\n";
const SMOKE_EXPECTED: &str = "name,email,age\n***,***,30\n***,***,25\n";

#[derive(Parser)]
#[command(name = "xtask", about = "veil workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks locally
    Ci,
    /// Validate workspace conventions
    Lint,
    /// Run the CLI end to end against a scratch storage root
    Smoke,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
        Commands::Smoke => run_smoke(),
    }
}

fn run_ci() -> Result<()> {
    println!("Running CI checks...\n");

    run_cmd("cargo", &["fmt", "--check"])?;
    run_cmd("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    run_cmd("cargo", &["test", "--workspace"])?;
    run_cmd("cargo", &["doc", "--workspace", "--no-deps"])?;

    println!("\nAll CI checks passed!");
    Ok(())
}

fn run_lint() -> Result<()> {
    println!("Validating workspace conventions...\n");

    for entry in std::fs::read_dir("crates")? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("veil-") {
            anyhow::bail!("Crate '{}' does not follow veil-* naming", name);
        }

        let lib = entry.path().join("src/lib.rs");
        if lib.exists() {
            let source = std::fs::read_to_string(&lib)
                .with_context(|| format!("Failed to read {}", lib.display()))?;
            if !source.contains("#![forbid(unsafe_code)]") {
                anyhow::bail!("Crate '{}' must forbid unsafe code", name);
            }
        }
    }

    println!("All conventions validated!");
    Ok(())
}

fn run_smoke() -> Result<()> {
    let root = std::env::temp_dir().join(format!("veil-smoke-{}", std::process::id()));
    let write = |path: &str, contents: &str| -> Result<()> {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    };

    write("tf-state-gdpr-obfuscator-test/tf-state", SMOKE_STATE)?;
    write("smoke-input/people.csv", SMOKE_DATASET)?;

    let root_arg = root.to_string_lossy().to_string();
    let veil = ["run", "-q", "-p", "veil-cli", "--", "--storage-root", root_arg.as_str()];
    run_cmd("cargo", &[&veil[..], &["request", "--field", "name", "--field", "email"]].concat())?;
    run_cmd("cargo", &[&veil[..], &["run", "--compact"]].concat())?;

    let output = std::fs::read_to_string(root.join("smoke-processed/processed/people.csv"))
        .context("Redacted output missing")?;
    if output != SMOKE_EXPECTED {
        anyhow::bail!("Unexpected redacted output:\n{output}");
    }
    for transient in ["smoke-input", "smoke-invocation"] {
        if has_files(&root.join(transient))? {
            anyhow::bail!("Location '{transient}' was not cleared");
        }
    }

    std::fs::remove_dir_all(&root)?;
    println!("\nSmoke run passed!");
    Ok(())
}

fn has_files(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() || has_files(&entry.path())? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<()> {
    println!("$ {} {}", cmd, args.join(" "));
    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run: {} {}", cmd, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", cmd, args.join(" "));
    }
    Ok(())
}

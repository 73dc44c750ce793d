use std::fs;
use std::io::Read;

use anyhow::Context;
use clap::Parser;

use ifxgen::{translate, CommandTree, DialectVersion};

/// ifxgen - translate a JSON-encoded command tree to Informix-dialect SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON command tree, or '-' for stdin
    tree: String,

    /// Target dialect version (11.10 or 12.10)
    #[arg(long, default_value = "12.10")]
    dialect: String,
}

fn main() -> anyhow::Result<()> {
    // Defaults to WARN, override with RUST_LOG.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let version = match cli.dialect.as_str() {
        "11.10" => DialectVersion::V11_10,
        "12.10" => DialectVersion::V12_10,
        other => anyhow::bail!("unknown dialect version '{}'", other),
    };

    let source = if cli.tree == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading command tree from stdin")?;
        buffer
    } else {
        fs::read_to_string(&cli.tree).with_context(|| format!("reading {}", cli.tree))?
    };
    let tree: CommandTree =
        serde_json::from_str(&source).context("parsing command tree JSON")?;

    let result = translate(&tree, version).context("translating command tree")?;
    println!("{}", result.sql);
    if let Some(parameters) = &result.parameters {
        for parameter in parameters {
            eprintln!("-- {} = {:?}", parameter.name, parameter.value);
        }
    }
    Ok(())
}

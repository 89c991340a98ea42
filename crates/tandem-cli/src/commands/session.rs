//! Session file commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand, ValueEnum};
use tandem_session::{
    NonInteractive, PropertyValue, SaveOptions, SaveOutcome, SessionContext, SessionFile,
    SessionFormat, SessionState, format,
};

#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    command: SessionCommand,
}

/// On-disk format for CLI arguments
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliFormat {
    /// Pretty JSON document
    Document,
    /// Compact binary snapshot
    Snapshot,
}

impl From<CliFormat> for SessionFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Document => SessionFormat::Document,
            CliFormat::Snapshot => SessionFormat::Snapshot,
        }
    }
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Show a session's properties and tree
    Info {
        /// Session file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Create an empty session
    New {
        /// Session file to create
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Session id to stamp
        #[arg(long)]
        id: String,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set root properties and save
    Set {
        /// Session file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Session id to stamp
        #[arg(long)]
        id: String,

        /// Properties as key=value (true/false, integers and floats are typed)
        #[arg(value_name = "KEY=VALUE", value_parser = parse_key_val, required = true)]
        properties: Vec<(String, String)>,
    },

    /// Rewrite a session in another format
    Convert {
        /// Session file to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// File to write
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Format to write
        #[arg(long, value_enum, default_value = "document")]
        to: CliFormat,
    },
}

pub fn run(args: SessionArgs) -> anyhow::Result<()> {
    match args.command {
        SessionCommand::Info { file } => info(&file),
        SessionCommand::New { file, id, force } => create(&file, &id, force),
        SessionCommand::Set {
            file,
            id,
            properties,
        } => set(&file, &id, properties),
        SessionCommand::Convert { input, output, to } => convert(&input, &output, to.into()),
    }
}

/// Parse a `key=value` string for clap's `value_parser`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid property '{s}' (expected key=value)")),
    }
}

/// Types a command-line value: bools, then integers, then floats, else text.
fn parse_value(s: &str) -> PropertyValue {
    if let Ok(v) = s.parse::<bool>() {
        PropertyValue::Bool(v)
    } else if let Ok(v) = s.parse::<i64>() {
        PropertyValue::Int(v)
    } else if let Ok(v) = s.parse::<f64>()
        && v.is_finite()
    {
        PropertyValue::Float(v)
    } else {
        PropertyValue::Text(s.to_string())
    }
}

fn info(path: &Path) -> anyhow::Result<()> {
    let (state, stored_as) =
        format::read_file(path).with_context(|| format!("reading {}", path.display()))?;

    println!("File: {}", path.display());
    println!("Format: {stored_as}");
    println!("Nodes: {}", state.node_count());
    println!();
    print_tree(&state, 0);
    Ok(())
}

fn print_tree(state: &SessionState, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{}", state.kind);
    for (key, value) in &state.properties {
        println!("{indent}  {key} ({}) = {value}", value.type_name());
    }
    for child in &state.children {
        print_tree(child, depth + 1);
    }
}

fn create(path: &Path, id: &str, force: bool) -> anyhow::Result<()> {
    let ctx = SessionContext::new()?;
    let mut session = SessionFile::new(&ctx, id, None);
    session
        .save_as(path, force, &mut NonInteractive)
        .with_context(|| {
            if path.exists() && !force {
                format!("{} already exists (use --force to replace it)", path.display())
            } else {
                format!("creating {}", path.display())
            }
        })?;
    println!("Created {}", path.display());
    Ok(())
}

fn set(path: &Path, id: &str, properties: Vec<(String, String)>) -> anyhow::Result<()> {
    let ctx = SessionContext::new()?;
    let mut session = SessionFile::open(&ctx, path, id)
        .with_context(|| format!("opening {}", path.display()))?;
    for (key, value) in properties {
        session.set_property(key, parse_value(&value));
    }
    let outcome = session.save(SaveOptions::default(), &mut NonInteractive)?;
    if outcome == SaveOutcome::Saved {
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn convert(input: &Path, output: &Path, to: SessionFormat) -> anyhow::Result<()> {
    let (state, from) =
        format::read_file(input).with_context(|| format!("reading {}", input.display()))?;
    format::write_file(&state, output, to)?;
    println!("Converted {} ({from}) to {} ({to})", input.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("tempo=120").unwrap(),
            ("tempo".to_string(), "120".to_string())
        );
        assert_eq!(
            parse_key_val("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("true"), PropertyValue::Bool(true));
        assert_eq!(parse_value("-7"), PropertyValue::Int(-7));
        assert_eq!(parse_value("0.25"), PropertyValue::Float(0.25));
        assert_eq!(parse_value("inf"), PropertyValue::Text("inf".into()));
        assert_eq!(parse_value("Drums"), PropertyValue::Text("Drums".into()));
    }
}

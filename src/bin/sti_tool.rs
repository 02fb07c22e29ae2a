use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use stimap::{Hierarchy, HierarchyConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sti-tool")]
#[command(about = "Inspect and check single table inheritance hierarchies")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every type of the hierarchy with its discriminator
    Describe {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the type a row with the given discriminator loads as
    Resolve {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        value: String,
        #[arg(long)]
        declaring: Option<String>,
    },
    /// Build the hierarchy and report configuration errors
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Describe { config } => describe(&load(&config)?),
        Command::Resolve {
            config,
            value,
            declaring,
        } => resolve(&load(&config)?, &value, declaring.as_deref()),
        Command::Check { config } => {
            let hierarchy = load(&config)?;
            println!(
                "OK: {} types mapped onto '{}' (column '{}')",
                hierarchy.types().count(),
                hierarchy.table_name(),
                hierarchy.column_name()
            );
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Hierarchy> {
    let config = HierarchyConfig::from_path(path)
        .with_context(|| format!("Failed to read hierarchy config '{}'", path.display()))?;
    config
        .build()
        .with_context(|| format!("Invalid hierarchy in '{}'", path.display()))
}

fn describe(hierarchy: &Hierarchy) -> Result<()> {
    println!(
        "table '{}', column '{}', primary key '{}'",
        hierarchy.table_name(),
        hierarchy.column_name(),
        hierarchy.primary_key()
    );
    let root = hierarchy.root();
    let tree = std::iter::once(root).chain(hierarchy.descendants(root.name())?);
    for entity in tree {
        let depth = hierarchy.ancestors(entity.name())?.len() - 1;
        println!(
            "{:indent$}{} parent={} root={} sti={} query={} discriminator={}",
            "",
            entity.name(),
            entity.parent().unwrap_or("-"),
            entity.is_root(),
            entity.is_sti_enabled(),
            entity.query_kind().name(),
            entity.discriminator().unwrap_or("NULL"),
            indent = depth * 2
        );
    }
    Ok(())
}

fn resolve(hierarchy: &Hierarchy, value: &str, declaring: Option<&str>) -> Result<()> {
    let declaring = declaring.unwrap_or(hierarchy.root().name());
    let node = hierarchy
        .entity(declaring)
        .map_err(|_| anyhow!("Unknown declaring type '{}'", declaring))?;

    let resolved = if node.is_sti_enabled() {
        hierarchy.resolve(value).unwrap_or(node)
    } else {
        node
    };
    println!("{}", resolved.name());
    Ok(())
}

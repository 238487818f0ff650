use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use mstore_session::{read_only_tags, ObjectKind, ProductBehavior, StoreConfig};
use mstore_types::{tags, PropertyTag};

use crate::cli::*;
use crate::script::{self, Outcome, Script, StepReport};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::ReadOnlyTags(args) => cmd_read_only_tags(args, cli.format),
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&Path>, profile: Option<&str>) -> anyhow::Result<StoreConfig> {
    match (path, profile) {
        (Some(path), profile) => {
            let mut config = StoreConfig::load(path)?;
            if let Some(name) = profile {
                config.behavior = ProductBehavior::preset(name)?;
            }
            Ok(config)
        }
        (None, Some(name)) => Ok(StoreConfig::with_profile(name)?),
        (None, None) => Ok(StoreConfig::default()),
    }
}

fn parse_script(text: &str) -> anyhow::Result<Script> {
    serde_json::from_str(text).context("parsing scenario script")
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading {}", args.script.display()))?;
    let script = parse_script(&text)?;
    let profile = args.profile.as_deref().or(script.profile.as_deref());
    let config = load_config(args.config.as_deref(), profile)?;

    let reports = script::run(&script, config)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => print_reports(script.name.as_deref(), &reports),
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        bail!("{failed} of {} steps failed", reports.len());
    }
    Ok(())
}

fn print_reports(name: Option<&str>, reports: &[StepReport]) {
    if let Some(name) = name {
        println!("{}", name.bold());
    }
    for r in reports {
        let mark = if r.passed {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        let summary = match &r.outcome {
            Outcome::Ok { detail } => detail.normal(),
            Outcome::Error { name, message, .. } => format!("{name}: {message}").yellow(),
            Outcome::Mismatch { detail } => detail.red(),
        };
        println!("{mark} {:>3} {:<18} {summary}", r.index, r.op.cyan());
        if !r.passed {
            println!("        expected {}", r.expected.bold());
        }
    }
    let passed = reports.iter().filter(|r| r.passed).count();
    let tally = format!("{passed}/{} steps passed", reports.len());
    if passed == reports.len() {
        println!("{}", tally.green());
    } else {
        println!("{}", tally.red());
    }
}

fn cmd_read_only_tags(args: ReadOnlyTagsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let kind = match args.kind {
        KindArg::Message => ObjectKind::Message,
        KindArg::Attachment => ObjectKind::Attachment,
    };
    let entries = read_only_entries(kind);
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|(tag, after_first_save)| {
                    serde_json::json!({
                        "name": tags::name_of(*tag),
                        "tag": tag.to_string(),
                        "after_first_save": after_first_save,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            println!("Read-only properties of a {}:", kind.to_string().bold());
            for (tag, after_first_save) in entries {
                let name = tags::name_of(tag).unwrap_or("(unnamed)");
                if after_first_save {
                    println!(
                        "  {} {name} (once the message has been saved)",
                        tag.to_string().dimmed()
                    );
                } else {
                    println!("  {} {name}", tag.to_string().dimmed());
                }
            }
        }
    }
    Ok(())
}

/// Read-only tags of `kind`, each paired with whether it only becomes
/// read-only once the object has been saved.
fn read_only_entries(kind: ObjectKind) -> Vec<(PropertyTag, bool)> {
    let mut entries: Vec<_> = read_only_tags(kind).iter().map(|t| (*t, false)).collect();
    if kind == ObjectKind::Message {
        entries.push((tags::MESSAGE_FLAGS, true));
    }
    entries
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref(), args.profile.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

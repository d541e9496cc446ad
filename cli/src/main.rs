use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jsonschema_ts_core::{check, compile, compile_from_file, CompileOptions};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "jsonschema-ts")]
#[command(about = "Compile JSON Schema into TypeScript type declarations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON Schema into TypeScript declarations
    Compile {
        /// Input JSON Schema file (reads stdin when omitted or `-`)
        input: Option<PathBuf>,

        /// Output declarations file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the root declaration (defaults to the input file stem)
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Validate a JSON Schema without compiling it
    Check {
        /// Input JSON Schema file (reads stdin when omitted or `-`)
        input: Option<PathBuf>,
    },
}

#[derive(Args)]
struct OptionArgs {
    /// JSON file with compile options (kebab-case keys); flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replace the disclaimer comment at the top of the output
    #[arg(long)]
    banner_comment: Option<String>,

    /// Only declare the root; other named types are referenced by name
    #[arg(long)]
    no_declare_external: bool,

    /// Emit `export enum` instead of `export const enum`
    #[arg(long)]
    no_const_enums: bool,

    /// Declare `definitions` the root never references
    #[arg(long)]
    unreachable_definitions: bool,

    /// Do not load referenced files; emit their names as opaque types
    #[arg(long)]
    no_external_refs: bool,

    /// Max `$ref` hops followed for a single fragment
    #[arg(long)]
    max_depth: Option<usize>,

    /// Spaces per indentation level
    #[arg(long)]
    indent_width: Option<usize>,

    /// Indent with tabs
    #[arg(long)]
    use_tabs: bool,

    /// Omit trailing semicolons
    #[arg(long)]
    no_semi: bool,
}

impl OptionArgs {
    fn into_options(self) -> Result<CompileOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open config file: {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse config from: {}", path.display()))?
            }
            None => CompileOptions::default(),
        };

        if let Some(banner) = self.banner_comment {
            options.banner_comment = banner;
        }
        if self.no_declare_external {
            options.declare_externally_referenced = false;
        }
        if self.no_const_enums {
            options.enable_const_enums = false;
        }
        if self.unreachable_definitions {
            options.unreachable_definitions = true;
        }
        if self.no_external_refs {
            options.ref_options.external = false;
        }
        if let Some(max_depth) = self.max_depth {
            options.ref_options.max_depth = max_depth;
        }
        if let Some(indent_width) = self.indent_width {
            options.style.indent_width = indent_width;
        }
        if self.use_tabs {
            options.style.use_tabs = true;
        }
        if self.no_semi {
            options.style.semi = false;
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for the declarations
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compile {
            input,
            output,
            name,
            options,
        } => {
            let mut options = options.into_options()?;
            let input = input.filter(|path| path.as_os_str() != "-");

            let declarations = match (input, name) {
                (Some(path), None) => compile_from_file(&path, &options)
                    .map_err(|e| anyhow::Error::from(e).context("Compilation failed"))?,
                (input, name) => {
                    let schema = read_schema(input.as_deref())?;
                    if let Some(parent) = input.as_deref().and_then(Path::parent) {
                        if !parent.as_os_str().is_empty() {
                            options.cwd = parent.to_path_buf();
                        }
                    }
                    let name = name.unwrap_or_else(|| "Schema".to_string());
                    compile(&schema, &name, &options)
                        .map_err(|e| anyhow::Error::from(e).context("Compilation failed"))?
                }
            };

            write_text(&declarations, output.as_deref())?;
        }
        Commands::Check { input } => {
            let input = input.filter(|path| path.as_os_str() != "-");
            let schema = read_schema(input.as_deref())?;
            let name = input
                .as_deref()
                .and_then(Path::file_stem)
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Schema".to_string());

            check(&schema, &name).map_err(|e| anyhow::Error::from(e).context("Check failed"))?;
            println!("{name}: ok");
        }
    }

    Ok(())
}

fn read_schema(path: Option<&Path>) -> Result<Value> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse schema from: {}", path.display()))
        }
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read schema from stdin")?;
            serde_json::from_str(&text).context("Failed to parse schema from stdin")
        }
    }
}

fn write_text(text: &str, path: Option<&Path>) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    writer
        .write_all(text.as_bytes())
        .context("Failed to write declarations")?;
    writer.flush().context("Failed to flush output")?;
    Ok(())
}

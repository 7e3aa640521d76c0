//! Command-line entry point.

use std::path::PathBuf;

use anyhow::Context as _;
use certink_app::{GenerateOptions, OutputKind, PreviewOptions, load_config, run_generate, run_preview};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "certink", version, about = "Render certificates from a layout, a template and row data")]
struct Cli {
    /// Export settings JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output pixels per canvas pixel (overrides the config file).
    #[arg(long, global = true)]
    pixel_ratio: Option<f64>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the first row as a PNG.
    Preview(PreviewArgs),
    /// Render every row into an archive.
    Generate(GenerateArgs),
    /// List installed font families.
    Fonts,
}

#[derive(Parser, Debug)]
struct InputArgs {
    /// Layout JSON.
    #[arg(long)]
    layout: PathBuf,

    /// Template image replacing the layout background.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Rows JSON: {"headers": [...], "rows": [{...}]}.
    #[arg(long)]
    rows: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output PNG path.
    #[arg(long, default_value = "preview.png")]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Zip path, or a directory to place the archive in.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Write loose PNG files into `--out` instead of a zip.
    #[arg(long, default_value_t = false)]
    loose: bool,

    /// Only render the first N rows.
    #[arg(long)]
    count: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Preview(args) => {
            let config = load_config(cli.config.as_deref(), cli.pixel_ratio)?;
            run_preview(&PreviewOptions {
                layout: args.input.layout,
                template: args.input.template,
                rows: args.input.rows,
                out: args.out.clone(),
                config,
            })?;
            eprintln!("wrote {}", args.out.display());
        }
        Command::Generate(args) => {
            let config = load_config(cli.config.as_deref(), cli.pixel_ratio)?;
            let report = run_generate(&GenerateOptions {
                layout: args.input.layout,
                template: args.input.template,
                rows: args.input.rows,
                out: args.out,
                output: if args.loose { OutputKind::Directory } else { OutputKind::Zip },
                count: args.count,
                config,
            })
            .context("certificate generation failed")?;
            eprintln!("{}", report.summary());
        }
        Command::Fonts => {
            for family in certink_render::list_font_families() {
                println!("{family}");
            }
        }
    }
    Ok(())
}

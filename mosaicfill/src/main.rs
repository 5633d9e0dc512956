use anyhow::{bail, Context, Result};
use clap::Parser;
use mosaicfill::{run_session, DirectorySink, MosaicConfig, MosaicPipeline, ReplaySource, TemplateLayout};
use mosaicfill_common::OutputFormat;
use std::path::PathBuf;

/// Replay rectified mosaic frames and report stable patch colors
#[derive(Parser, Debug)]
#[command(name = "mosaicfill")]
#[command(about = "Classify and stabilize mosaic patch colors from recorded frames", long_about = None)]
struct Args {
    /// Layout reference image; repeat for several layouts, first one starts active
    #[arg(short, long = "layout", required = true)]
    layouts: Vec<PathBuf>,

    /// Display name for each layout, in the same order as --layout
    #[arg(short, long = "name")]
    names: Vec<String>,

    /// Frame manifest (JSON)
    #[arg(long)]
    frames: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "both")]
    format: FormatArg,

    /// Configuration overrides (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TrueType font for fill-ratio labels
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Png,
    Json,
    Both,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Both => OutputFormat::Both,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.names.len() > args.layouts.len() {
        bail!(
            "{} names given for {} layouts",
            args.names.len(),
            args.layouts.len()
        );
    }

    println!("MosaicFill - Patch Color Tracker");
    println!("================================");
    println!("Layouts: {}", args.layouts.len());
    println!("Frames: {}", args.frames.display());
    println!("Output: {}", args.output.display());
    println!("Format: {:?}", args.format);
    println!();

    // Step 1: Configuration
    println!("Step 1: Loading configuration...");
    let mut config = match &args.config {
        Some(path) => MosaicConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => MosaicConfig::default(),
    };
    if let Some(font) = args.font {
        config.render.font_path = Some(font);
    }

    // Step 2: Layouts
    println!("\nStep 2: Loading layouts...");
    let mut layouts = Vec::with_capacity(args.layouts.len());
    for (idx, path) in args.layouts.iter().enumerate() {
        let name = args.names.get(idx).cloned().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("layout-{}", idx))
        });
        let layout = TemplateLayout::from_reference_image(path, name, &config.layout)
            .with_context(|| format!("Failed to load layout {}", path.display()))?;
        println!(
            "  - [{}] {}: {} patches, {}x{}",
            idx,
            layout.name(),
            layout.patches().len(),
            layout.size().0,
            layout.size().1
        );
        layouts.push(layout);
    }

    let mut pipeline = MosaicPipeline::new(config, layouts).context("Failed to build pipeline")?;

    // Step 3: Frame source and sink
    println!("\nStep 3: Opening frame manifest...");
    let mut source = ReplaySource::open(&args.frames)
        .with_context(|| format!("Failed to open frames {}", args.frames.display()))?;
    println!("  {} frame(s) queued", source.remaining());
    let mut sink = DirectorySink::create(&args.output, args.format.into())
        .with_context(|| format!("Failed to prepare output {}", args.output.display()))?;

    // Step 4: Replay
    println!("\nStep 4: Processing frames...");
    let summary = run_session(&mut pipeline, &mut source, &mut sink).context("Replay failed")?;

    println!("\nProcessed {} frame(s)", summary.frames);
    println!("  Layout switches: {}", summary.layout_switches);
    println!("  Resets: {}", summary.resets);
    println!(
        "  Final layout: {} ({})",
        summary.final_layout,
        pipeline.layouts()[summary.final_layout].name()
    );
    println!("  Final rotation: {}", summary.final_rotation);
    if summary.quit {
        println!("  Stopped by quit command");
    }

    Ok(())
}

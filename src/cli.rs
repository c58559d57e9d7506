use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};

use crate::model::Drawing;
use crate::render::{data_to_svg, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "dwg2svg", version, about = "Convert a DWG drawing model to SVG")]
pub struct Args {
    /// Input drawing model (JSON) or '-' for stdin
    pub input: PathBuf,

    /// Output file. Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Only model-space, no paper-space
    #[arg(long = "mspace")]
    pub mspace: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let drawing = read_drawing(&args.input)?;
    let options = RenderOptions {
        mspace_only: args.mspace,
    };
    let svg = data_to_svg(&drawing, &options)?;

    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = args
                .output
                .as_deref()
                .context("output path required for png output")?;
            write_output_png(&svg, output)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_drawing(path: &Path) -> Result<Drawing> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return serde_json::from_str(&buf).context("failed to parse drawing model from stdin");
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse drawing model {}", path.display()))
}

fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            io::stdout().write_all(svg.as_bytes())?;
        }
    }
    Ok(())
}

fn write_output_png(svg: &str, output: &Path) -> Result<()> {
    let mut opt = usvg::Options::default();
    if let Some(size) = usvg::Size::from_wh(1024.0, 768.0) {
        opt.default_size = size;
    }
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn minimal_model_parses() {
        let json = r#"{
            "blocks": [
                { "handle": 31, "name": "*Model_Space", "entities": [] }
            ],
            "model_space": 0
        }"#;
        let drawing: Drawing = serde_json::from_str(json).unwrap();
        assert_eq!(drawing.blocks.len(), 1);
        assert!(drawing.paper_space.is_none());
    }
}

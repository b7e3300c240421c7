use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use inkdeck::export::progress::LogObserver;
use inkdeck::scene::surface::HeadlessSurface;
use inkdeck::selection::clipboard::MemoryClipboard;
use inkdeck::{
    Editor, EditorConfig, ExportOptions, FrameSink, GifSink, GifSinkOpts, PdfSink, PdfSinkOpts,
    Snapshot, StillsSink, StillsSinkOpts, StrokeAnimationOpts, StrokeAnimationSink, VideoSink,
    VideoSinkOpts,
};

#[derive(Parser, Debug)]
#[command(name = "inkdeck", version)]
struct Cli {
    /// Editor config JSON. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of a snapshot.
    Info(InfoArgs),
    /// Validate a snapshot, normalize slide frames and drop unreferenced files and fonts.
    Normalize(NormalizeArgs),
    /// Export every slide of a snapshot.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input snapshot.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct NormalizeArgs {
    /// Input snapshot.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output snapshot. Defaults to rewriting the input in place.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Stills,
    Gif,
    Video,
    Pdf,
    AnimatedSvg,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input snapshot.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long, value_enum)]
    format: Format,

    /// Output file (gif, video, pdf) or directory (stills, animated-svg).
    #[arg(long)]
    out: PathBuf,

    /// Per-slide delay for gif and video.
    #[arg(long)]
    delay_ms: Option<u32>,

    /// Output pixels per document pixel.
    #[arg(long)]
    scale: Option<f64>,

    /// Video frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Replay the deck until the video covers at least this long.
    #[arg(long)]
    loop_to_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = match &cli.config {
        Some(p) => EditorConfig::load(p)?,
        None => EditorConfig::default(),
    };
    match cli.cmd {
        Command::Info(args) => cmd_info(config, args),
        Command::Normalize(args) => cmd_normalize(config, args),
        Command::Export(args) => cmd_export(config, args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

type HeadlessEditor = Editor<HeadlessSurface, MemoryClipboard>;

fn open_deck(config: EditorConfig, path: &Path) -> anyhow::Result<HeadlessEditor> {
    let mut editor = Editor::new(config, HeadlessSurface::default(), MemoryClipboard::new());
    let snap = Snapshot::load(path)?;
    editor
        .import(&snap)
        .with_context(|| format!("import snapshot '{}'", path.display()))?;
    Ok(editor)
}

fn cmd_info(config: EditorConfig, args: InfoArgs) -> anyhow::Result<()> {
    let editor = open_deck(config, &args.in_path)?;
    let doc = editor.document();
    let size = doc.document_size();
    println!("name: {}", doc.filename());
    println!("size: {}x{}", size.width, size.height);
    println!("background: {}", doc.background_color());
    println!("slides: {}", doc.len());
    for (i, slide) in doc.slides().iter().enumerate() {
        println!("  {i}: {} ({} elements)", slide.id, slide.elements.len());
    }
    println!("files: {}", doc.files().len());
    println!("font families: {}", editor.fonts().len());
    Ok(())
}

fn cmd_normalize(config: EditorConfig, args: NormalizeArgs) -> anyhow::Result<()> {
    let editor = open_deck(config, &args.in_path)?;
    let out = args.out.unwrap_or(args.in_path);
    editor.save(&out)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_export(config: EditorConfig, args: ExportArgs) -> anyhow::Result<()> {
    let defaults = config.export.clone();
    let editor = open_deck(config, &args.in_path)?;
    let delay_ms = args.delay_ms.unwrap_or(defaults.frame_delay_ms);
    let opts = ExportOptions {
        scale: args.scale.unwrap_or(defaults.scale),
    };

    let mut sink: Box<dyn FrameSink> = match args.format {
        Format::Stills => Box::new(StillsSink::new(StillsSinkOpts::in_dir(&args.out))),
        Format::Gif => Box::new(GifSink::new(GifSinkOpts {
            out_path: Some(args.out.clone()),
            delay_ms,
        })),
        Format::Video => {
            let mut o = VideoSinkOpts::from_defaults(&args.out, &defaults);
            o.delay_ms = delay_ms;
            o.loop_to_ms = args.loop_to_ms;
            if let Some(fps) = args.fps {
                o.fps = fps;
            }
            Box::new(VideoSink::new(o))
        }
        Format::Pdf => Box::new(PdfSink::new(PdfSinkOpts {
            out_path: Some(args.out.clone()),
        })),
        Format::AnimatedSvg => Box::new(StrokeAnimationSink::new(StrokeAnimationOpts {
            out_dir: Some(args.out.clone()),
            ..StrokeAnimationOpts::default()
        })),
    };

    let mut observer = LogObserver;
    let report = editor.export(sink.as_mut(), opts, Some(&mut observer))?;
    eprintln!(
        "exported {} slides at {}x{} to {} in {:.2?}",
        report.slides,
        report.width,
        report.height,
        args.out.display(),
        report.elapsed
    );
    Ok(())
}

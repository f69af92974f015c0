use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use photomark::config::MAX_FONT_SIZE;
use photomark::{
    discover, report::ReportWriter, spawn_batch, Anchor, BatchProcessor, BatchResult, BatchSummary, Color, Compositor,
    NamingOption, OutputFormat, ProgressEvent, Settings, TemplateStore, TextSource,
};

/// Stamp a text or capture-date watermark onto images.
#[derive(Parser, Debug)]
#[command(name = "photomark", version)]
struct Cli {
    /// Image file or directory (searched recursively)
    input: Option<PathBuf>,

    /// Output directory (default: <parent>_watermark next to the input's folder)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Watermark text
    #[arg(short, long)]
    text: Option<String>,

    /// Use each image's capture date as the watermark
    #[arg(long)]
    auto_date: bool,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FONT_SIZE)))]
    font_size: Option<u32>,

    /// Font family, or a path to a .ttf/.otf/.ttc file
    #[arg(long)]
    font: Option<String>,

    /// #RRGGBB or a color name
    #[arg(long)]
    color: Option<String>,

    /// 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    opacity: Option<u8>,

    #[arg(long, value_enum)]
    position: Option<Anchor>,

    #[arg(long, allow_hyphen_values = true)]
    x_offset: Option<i32>,

    #[arg(long, allow_hyphen_values = true)]
    y_offset: Option<i32>,

    #[arg(long)]
    shadow: bool,

    #[arg(long)]
    outline: bool,

    #[arg(long)]
    bold: bool,

    #[arg(long)]
    italic: bool,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// JPEG quality 1-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    #[arg(long, value_enum)]
    naming: Option<NamingOption>,

    #[arg(long)]
    prefix: Option<String>,

    #[arg(long)]
    suffix: Option<String>,

    /// YAML settings file applied before templates and flags
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save the effective settings as a template
    #[arg(long, value_name = "NAME")]
    save_template: Option<String>,

    /// Load a template by name or file path
    #[arg(long, value_name = "NAME|FILE")]
    load_template: Option<String>,

    #[arg(long)]
    list_templates: bool,

    #[arg(long, value_name = "NAME")]
    delete_template: Option<String>,

    /// Print the effective settings and exit
    #[arg(long)]
    preview: bool,

    /// Append per-image results to a JSON Lines file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// -v info, -vv debug
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Flags given on the command line win over config files and templates.
    fn apply_to(&self, mut s: Settings) -> Result<Settings> {
        let wm = &mut s.watermark;
        if let Some(t) = &self.text {
            wm.text = t.clone();
        }
        if let Some(v) = self.font_size {
            wm.font_size = v;
        }
        if let Some(v) = &self.font {
            wm.font_family = v.clone();
        }
        if let Some(c) = &self.color {
            wm.color = Color::parse(c)?;
        }
        if let Some(v) = self.opacity {
            wm.opacity = v;
        }
        if let Some(v) = self.position {
            wm.position = v;
        }
        if let Some(v) = self.x_offset {
            wm.x_offset = v;
        }
        if let Some(v) = self.y_offset {
            wm.y_offset = v;
        }
        wm.shadow |= self.shadow;
        wm.outline |= self.outline;
        wm.bold |= self.bold;
        wm.italic |= self.italic;

        let ex = &mut s.export;
        if let Some(d) = &self.output {
            ex.output_dir = Some(d.clone());
        }
        if let Some(v) = self.format {
            ex.output_format = v;
        }
        if let Some(v) = self.quality {
            ex.jpeg_quality = v;
        }
        if let Some(v) = self.naming {
            ex.naming_option = v;
        }
        if let Some(v) = &self.prefix {
            ex.custom_prefix = v.clone();
        }
        if let Some(v) = &self.suffix {
            ex.custom_suffix = v.clone();
        }
        Ok(s.validated()?)
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_template(store: &TemplateStore, arg: &str, current: &Settings) -> Result<Settings> {
    let as_path = Path::new(arg);
    let settings = if as_path.extension().is_some_and(|e| e == "json") || as_path.is_file() {
        store.load(as_path, current)?
    } else {
        store.load_named(arg, current)?
    };
    println!("Loaded template: {arg}");
    Ok(settings)
}

async fn write_report(path: Option<&Path>, results: &[BatchResult]) -> Result<()> {
    let Some(path) = path else { return Ok(()) };
    let mut writer = ReportWriter::open(path.to_path_buf()).await?;
    writer.append_all(results).await?;
    println!("Report: {}", writer.path().display());
    Ok(())
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let store = TemplateStore::user_default()?;

    if cli.list_templates {
        let templates = store.list()?;
        if templates.is_empty() {
            println!("No templates in {}", store.root().display());
        }
        for t in templates {
            println!("  - {} (created {})", t.name, t.created_at.as_deref().unwrap_or("unknown"));
        }
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(name) = &cli.delete_template {
        store.delete(name)?;
        println!("Deleted template: {name}");
        return Ok(ExitCode::SUCCESS);
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::from_yaml_file(path)?,
        None => Settings::default(),
    };
    if let Some(arg) = &cli.load_template {
        settings = load_template(&store, arg, &settings)?;
    }
    let settings = cli.apply_to(settings)?;

    if cli.preview {
        print!("{}", serde_yaml::to_string(&settings)?);
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(name) = &cli.save_template {
        let path = store.save(name, &settings)?;
        println!("Saved template: {}", path.display());
    }

    let Some(input) = &cli.input else {
        if cli.save_template.is_some() {
            return Ok(ExitCode::SUCCESS);
        }
        bail!("no input given. Use --help for usage information.");
    };
    let items = discover(input)?;
    println!("Found {} image(s)", items.len());

    let text = if cli.auto_date {
        TextSource::CaptureDate
    } else if settings.watermark.text.is_empty() {
        warn!("no watermark text given, using capture dates");
        TextSource::CaptureDate
    } else {
        TextSource::Literal
    };

    let compositor = Arc::new(Compositor::for_spec(&settings.watermark));
    let processor = Arc::new(BatchProcessor::with_exif_dates(compositor));

    if items.len() == 1 {
        let item = &items[0];
        let outcome = processor.process_one(item, &settings, text);
        write_report(cli.report.as_deref(), &[BatchResult::from_result(&item.path, &outcome)]).await?;
        let dest = outcome.with_context(|| format!("failed to watermark {}", item.path.display()))?;
        println!("Wrote {}", dest.display());
        return Ok(ExitCode::SUCCESS);
    }

    let bar = progress_bar(items.len());
    let mut task = spawn_batch(processor, items, settings, text);
    while let Some(event) = task.next_event().await {
        if let ProgressEvent::Item { index, path, .. } = event {
            bar.set_position(index as u64);
            bar.set_message(path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        }
    }
    let results = task.join().await.context("batch worker panicked")?;
    bar.finish_and_clear();

    let summary = BatchSummary::of(&results);
    println!("Done: {}/{} images watermarked", summary.succeeded, summary.total());
    for r in &results {
        match (r.output(), r.error()) {
            (Some(out), _) if cli.verbose > 0 => println!("  ok   {} -> {}", r.input.display(), out.display()),
            (_, Some(err)) => println!("  fail {}: {err}", r.input.display()),
            _ => {}
        }
    }

    write_report(cli.report.as_deref(), &results).await?;

    Ok(if summary.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

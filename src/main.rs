use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use wallsort::config::Config;
use wallsort::db::{Database, WallpaperQuery, WallpaperRow};
use wallsort::error::{ensure_exists, WallsortError};
use wallsort::export::{export_rows, export_to_path, ExportFormat};
use wallsort::generate::{self, BatchReport, GenerateOptions, ImageOutcome, Outcome};
use wallsort::llm::LlmClient;
use wallsort::metadata::split_list;
use wallsort::scanner::{collect_files, has_image_extension, resolve_images, IndexOptions, IndexProgress, Indexer};
use wallsort::{logging, organize, sidecar};

/// Organize, describe and search a wallpaper collection.
#[derive(Parser, Debug)]
#[command(name = "wallsort", version, about)]
struct Cli {
    /// Config file (default: ~/.config/wallsort/config.toml)
    #[arg(long, global = true, env = "WALLSORT_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Index database, overriding the config
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rename files to lowercase, underscore-separated names
    Sanitize {
        path: Option<PathBuf>,
        /// Show what would change without renaming
        #[arg(short = 'n', long)]
        dry_run: bool,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Check that image contents match their extensions
    Validate {
        path: Option<PathBuf>,
        /// Rename mismatched files to the detected extension
        #[arg(long)]
        fix: bool,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show file counts, sizes and extensions
    Info {
        path: Option<PathBuf>,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Delete sidecars whose image is gone
    Cleanup {
        path: Option<PathBuf>,
        #[arg(short = 'n', long)]
        dry_run: bool,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Build or refresh the index from sidecars
    Index {
        path: Option<PathBuf>,
        #[arg(long)]
        no_recursive: bool,
        /// Drop index entries for images that no longer exist
        #[arg(long)]
        prune: bool,
        /// Clear the index before indexing
        #[arg(long)]
        rebuild: bool,
    },
    /// Query the index
    Get(GetArgs),
    /// Summarize the index
    Stats,
    /// Show or create the config file
    Config {
        /// Write a commented default config if none exists
        #[arg(long)]
        create: bool,
    },
    /// List models available from the configured provider
    Models,
    /// Rename images after a model-written description
    Describe {
        path: Option<PathBuf>,
        #[arg(short = 'n', long)]
        dry_run: bool,
        #[arg(short, long)]
        recursive: bool,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Read and write sidecar metadata
    Metadata {
        #[command(subcommand)]
        command: MetadataCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MetadataCommand {
    /// Print the sidecar of an image, or of every image in a directory
    Show {
        path: Option<PathBuf>,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Edit fields of an image's sidecar
    Set {
        path: PathBuf,
        #[arg(long)]
        description: Option<String>,
        /// Replace tags (comma-separated)
        #[arg(long, conflicts_with = "add_tags")]
        tags: Option<String>,
        /// Append tags (comma-separated)
        #[arg(long)]
        add_tags: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Generate full metadata with a vision model
    Generate {
        path: Option<PathBuf>,
        #[arg(short = 'n', long)]
        dry_run: bool,
        #[arg(short, long)]
        recursive: bool,
        /// Regenerate images that already have a description
        #[arg(long)]
        overwrite: bool,
        /// Keep filenames instead of renaming after the description
        #[arg(long)]
        no_rename: bool,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Refresh width, height and screen class in existing sidecars
    UpdateDimensions {
        path: Option<PathBuf>,
        #[arg(short = 'n', long)]
        dry_run: bool,
        #[arg(short, long)]
        recursive: bool,
    },
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// Model name, overriding the config
    #[arg(long)]
    model: Option<String>,
    /// Run the model on CPU (Ollama only)
    #[arg(long)]
    cpu: bool,
    /// Provider endpoint, overriding the config
    #[arg(long)]
    host: Option<String>,
}

#[derive(Args, Debug)]
struct GetArgs {
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    time: Option<String>,
    /// Recommended screen, e.g. 4K or "Ultrawide 1440p"
    #[arg(long)]
    screen: Option<String>,
    /// Search description, scene, style and subject
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    mood: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    min_width: Option<u32>,
    #[arg(long)]
    min_height: Option<u32>,
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    #[arg(short = 'R', long)]
    random: bool,
    /// One random match
    #[arg(short = '1', long)]
    one: bool,
    /// Print only paths
    #[arg(short, long)]
    paths_only: bool,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Write results to a file; the format follows its extension unless --format is given
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Json,
    Csv,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Csv => ExportFormat::Csv,
        }
    }
}

impl GetArgs {
    fn to_query(&self) -> WallpaperQuery {
        let query = WallpaperQuery {
            description: self.description.clone(),
            style: self.style.clone(),
            subject: self.subject.clone(),
            time_of_day: self.time.clone(),
            screen: self.screen.clone(),
            search: self.search.clone(),
            tag: self.tag.clone(),
            mood: self.mood.clone(),
            color: self.color.clone(),
            min_width: self.min_width,
            min_height: self.min_height,
            limit: self.limit,
            random: self.random,
        };
        if self.one {
            query.one()
        } else {
            query
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(None, cli.verbose) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let extensions = config.image_extensions();

    match cli.command {
        Command::Sanitize {
            path,
            dry_run,
            recursive,
        } => {
            let root = target_dir(path, &config)?;
            let files = collect_files(&root, recursive)?;
            let report = organize::sanitize_collection(&files, dry_run);
            for rename in &report.renamed {
                println!("{} -> {}", file_name(&rename.from), file_name(&rename.to));
            }
            for rename in &report.collisions {
                eprintln!("Skipped {}: {} already exists", file_name(&rename.from), file_name(&rename.to));
            }
            let verb = if dry_run { "Would rename" } else { "Renamed" };
            println!(
                "{} {} files ({} sidecars), {} collisions, {} failed",
                verb,
                report.renamed.len(),
                report.sidecars_moved,
                report.collisions.len(),
                report.failed.len()
            );
        }
        Command::Validate { path, fix, recursive } => {
            let root = target_dir(path, &config)?;
            let files = collect_files(&root, recursive)?;
            let report = organize::validate_collection(&files, &extensions, fix);
            for invalid in &report.invalid {
                match &invalid.fixed_to {
                    Some(to) => println!("{} -> {}", invalid.path.display(), file_name(to)),
                    None => println!("{} is actually .{}", invalid.path.display(), invalid.actual),
                }
            }
            for path in &report.not_images {
                println!("{} is not a recognised image", path.display());
            }
            println!(
                "{} valid, {} mismatched ({} fixed), {} not images, {} failed",
                report.valid,
                report.invalid.len(),
                report.fixed(),
                report.not_images.len(),
                report.failed.len()
            );
        }
        Command::Info { path, recursive } => {
            let root = target_dir(path, &config)?;
            let info = organize::collection_info(&root, recursive)?;
            println!("Files:       {}", info.total_files);
            println!("Total size:  {}", format_bytes(info.total_bytes));
            println!("With spaces: {}", info.with_spaces);
            for (ext, count) in &info.extensions {
                println!("  {:<16} {}", ext, count);
            }
        }
        Command::Cleanup {
            path,
            dry_run,
            recursive,
        } => {
            let root = target_dir(path, &config)?;
            let report = organize::cleanup_orphans(&root, recursive, dry_run)?;
            for path in &report.removed {
                println!("{}", path.display());
            }
            let verb = if dry_run { "Would delete" } else { "Deleted" };
            println!(
                "{} {} of {} sidecars ({})",
                verb,
                report.removed.len(),
                report.sidecars_found,
                format_bytes(report.bytes)
            );
        }
        Command::Index {
            path,
            no_recursive,
            prune,
            rebuild,
        } => {
            let root = target_dir(path, &config)?;
            let db = open_db(&config)?;
            let options = IndexOptions {
                recursive: !no_recursive,
                prune,
                rebuild,
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let report = Indexer::new(extensions).run(&db, &root, &options, Some(tx))?;
            for progress in rx.try_iter() {
                if let IndexProgress::Started { total_files } = progress {
                    tracing::debug!("Indexing {} candidate images", total_files);
                }
            }

            println!(
                "{} images found, {} indexed, {} unchanged, {} without sidecar",
                report.found, report.indexed, report.unchanged, report.without_sidecar
            );
            if let Some(pruned) = report.pruned {
                println!("{} stale entries pruned", pruned);
            }
        }
        Command::Get(args) => {
            let db = open_db(&config)?;
            let rows = db.query(&args.to_query())?;
            if rows.is_empty() {
                eprintln!("No wallpapers matched");
                return Ok(ExitCode::FAILURE);
            }
            print_rows(&rows, &args)?;
        }
        Command::Stats => {
            let db = open_db(&config)?;
            let stats = db.stats()?;
            println!("Wallpapers:       {}", stats.total);
            println!("With description: {}", stats.with_description);
            print_counts("Screens", &stats.by_screen);
            print_counts("Styles", &stats.by_style);
            print_counts("Subjects", &stats.by_subject);
            print_counts("Top tags", &stats.top_tags);
            print_counts("Top moods", &stats.top_moods);
            print_counts("Top colors", &stats.top_colors);
        }
        Command::Config { create } => {
            if create {
                if Config::create_default(&config_path)? {
                    println!("Created {}", config_path.display());
                } else {
                    println!("{} already exists", config_path.display());
                }
            } else {
                println!("Config:    {}", config_path.display());
                println!("Database:  {}", config.db_path.display());
                match &config.wallpaper_path {
                    Some(path) => println!("Wallpapers: {}", path.display()),
                    None => println!("Wallpapers: (not set)"),
                }
                println!("Provider:  {:?} at {}", config.llm.provider, config.llm.endpoint());
                println!("Model:     {}", config.llm.model);
                println!("Extensions: {}", extensions.join(", "));
            }
        }
        Command::Models => {
            let client = LlmClient::from_config(&config.llm);
            let models = client.list_models()?;
            for model in &models {
                match model.size_bytes {
                    Some(size) => println!("{} ({})", model.name, format_bytes(size)),
                    None => println!("{}", model.name),
                }
            }
            println!("{} models from {}", models.len(), client.provider_name());
        }
        Command::Describe {
            path,
            dry_run,
            recursive,
            llm,
        } => {
            let images = target_images(path, recursive, &extensions, &config)?;
            let client = llm_client(&mut config, &llm);
            let report = generate::describe_and_rename(&client, &images, dry_run, &mut print_outcome);
            print_batch(&report, dry_run);
        }
        Command::Metadata { command } => return run_metadata(command, &mut config, &extensions),
    }

    Ok(ExitCode::SUCCESS)
}

fn run_metadata(command: MetadataCommand, config: &mut Config, extensions: &[String]) -> Result<ExitCode> {
    match command {
        MetadataCommand::Show { path, recursive } => {
            let images = match &path {
                Some(file) if file.is_file() => vec![resolve_image(file, extensions)?],
                _ => target_images(path.clone(), recursive, extensions, config)?,
            };
            if images.is_empty() {
                eprintln!("No images found");
                return Ok(ExitCode::FAILURE);
            }

            let single = images.len() == 1;
            for image in &images {
                if !single {
                    println!("{}", image.display());
                }
                let indent = if single { "" } else { "  " };
                for line in metadata_lines(image) {
                    println!("{}{}", indent, line);
                }
            }
        }
        MetadataCommand::Set {
            path,
            description,
            tags,
            add_tags,
            source,
        } => {
            let path = resolve_image(&path, extensions)?;
            let mut meta = sidecar::read(&path);
            if let Some(description) = description {
                meta.description = description;
            }
            if let Some(tags) = tags {
                meta.tags = split_list(&tags);
            }
            if let Some(tags) = add_tags {
                meta.add_tags(split_list(&tags));
            }
            if let Some(source) = source {
                meta.source = source;
            }
            sidecar::write(&path, &meta)?;
            println!("Updated {}", sidecar::sidecar_path(&path).display());
        }
        MetadataCommand::Generate {
            path,
            dry_run,
            recursive,
            overwrite,
            no_rename,
            llm,
        } => {
            let images = target_images(path, recursive, extensions, config)?;
            let client = llm_client(config, &llm);
            let options = GenerateOptions {
                dry_run,
                overwrite,
                rename: !no_rename,
            };
            let report = generate::generate_metadata(&client, &images, &options, &mut print_outcome);
            print_batch(&report, dry_run);
        }
        MetadataCommand::UpdateDimensions {
            path,
            dry_run,
            recursive,
        } => {
            let images = target_images(path, recursive, extensions, config)?;
            let report = generate::update_dimensions(&images, dry_run, &mut print_outcome);
            print_batch(&report, dry_run);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Printable sidecar fields for `image`. A malformed sidecar reads as empty.
fn metadata_lines(image: &Path) -> Vec<String> {
    if !sidecar::has_sidecar(image) {
        return vec!["XMP: (not found)".to_string()];
    }
    let meta = sidecar::read(image);
    if meta.is_empty() {
        return vec!["(no metadata)".to_string()];
    }

    let fields = [
        ("Description", &meta.description),
        ("Scene", &meta.scene),
        ("Style", &meta.style),
        ("Time of day", &meta.time_of_day),
        ("Subject", &meta.subject),
        ("Source", &meta.source),
        ("AI model", &meta.ai_model),
        ("Screen", &meta.recommended_screen),
    ];
    let lists = [("Tags", &meta.tags), ("Mood", &meta.mood), ("Colors", &meta.colors)];

    let mut lines = Vec::new();
    for (label, value) in fields {
        if !value.is_empty() {
            lines.push(format!("{:<12} {}", format!("{}:", label), value));
        }
    }
    for (label, values) in lists {
        if !values.is_empty() {
            lines.push(format!("{:<12} {}", format!("{}:", label), values.join(", ")));
        }
    }
    if let (Some(width), Some(height)) = (meta.width, meta.height) {
        lines.push(format!("{:<12} {}x{}", "Size:", width, height));
    }
    lines
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    ensure_exists(path)?;
    Ok(path.canonicalize()?)
}

fn resolve_image(path: &Path, extensions: &[String]) -> Result<PathBuf> {
    let path = resolve_path(path)?;
    if !path.is_file() || !has_image_extension(&path, extensions) {
        return Err(WallsortError::UnsupportedImage(path).into());
    }
    Ok(path)
}

/// The directory named on the command line, else `wallpaper_path`.
fn target_dir(path: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    let path = path
        .or_else(|| config.wallpaper_path.clone())
        .ok_or_else(|| anyhow!("No path given and no wallpaper_path configured"))?;
    resolve_path(&path)
}

fn target_images(path: Option<PathBuf>, recursive: bool, extensions: &[String], config: &Config) -> Result<Vec<PathBuf>> {
    let root = target_dir(path, config)?;
    resolve_images(&root, recursive, extensions)
}

fn open_db(config: &Config) -> Result<Database> {
    let db = Database::open(&config.db_path)?;
    db.initialize()?;
    Ok(db)
}

fn llm_client(config: &mut Config, args: &LlmArgs) -> LlmClient {
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(host) = &args.host {
        config.llm.endpoint = Some(host.clone());
    }
    if args.cpu {
        config.llm.use_cpu = true;
    }
    let client = LlmClient::from_config(&config.llm);
    tracing::info!("Using {} model {}", client.provider_name(), client.model());
    client
}

/// The export format for `--output`: `--format` if given, else the file
/// extension, else JSON. A path without an extension gets the format's.
fn output_target(output: &Path, requested: Option<OutputFormat>) -> Result<(PathBuf, ExportFormat)> {
    let format = match (requested, output.extension()) {
        (Some(format), _) => format.into(),
        (None, Some(ext)) => ext.to_string_lossy().parse::<ExportFormat>()?,
        (None, None) => ExportFormat::default(),
    };
    let path = if output.extension().is_none() {
        output.with_extension(format.extension())
    } else {
        output.to_path_buf()
    };
    Ok((path, format))
}

fn print_rows(rows: &[WallpaperRow], args: &GetArgs) -> Result<()> {
    if let Some(output) = &args.output {
        let (path, format) = output_target(output, args.format)?;
        let count = export_to_path(rows, &path, format)?;
        println!("Exported {} wallpapers as {} to {}", count, format.name(), path.display());
        return Ok(());
    }
    if let Some(format) = args.format {
        export_rows(rows, io::stdout().lock(), format.into())?;
        return Ok(());
    }
    for row in rows {
        if args.paths_only {
            println!("{}", row.path);
            continue;
        }
        let screen = row.recommended_screen.as_deref().unwrap_or("-");
        let description = row.description.as_deref().unwrap_or("");
        println!("{}  [{}]  {}", row.path, screen, description);
    }
    Ok(())
}

fn print_outcome(item: &ImageOutcome) {
    let name = file_name(&item.image);
    match &item.outcome {
        Outcome::Done {
            path,
            renamed: true,
            ..
        } => println!("{} -> {}", name, file_name(path)),
        Outcome::Done { description, .. } => println!("{}: {}", name, description),
        Outcome::Unchanged => tracing::debug!("{} unchanged", name),
        Outcome::Skipped { reason } => eprintln!("Skipped {}: {}", name, reason),
        Outcome::Failed { error } => eprintln!("Failed {}: {}", name, error),
    }
}

fn print_batch(report: &BatchReport, dry_run: bool) {
    let prefix = if dry_run { "Dry run: " } else { "" };
    println!(
        "{}{} done ({} renamed), {} unchanged, {} skipped, {} failed",
        prefix,
        report.done(),
        report.renamed(),
        report.unchanged(),
        report.skipped(),
        report.failed()
    );
}

fn print_counts(title: &str, counts: &[(String, usize)]) {
    if counts.is_empty() {
        return;
    }
    println!("{}:", title);
    for (key, count) in counts {
        println!("  {:<24} {}", key, count);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use wallsort::ImageMetadata;

    #[test]
    fn test_metadata_lines_malformed_sidecar_reads_empty() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("a.png");
        fs::write(&image, b"").unwrap();
        fs::write(sidecar::sidecar_path(&image), "<x:xmpmeta><broken").unwrap();

        assert_eq!(metadata_lines(&image), vec!["(no metadata)"]);
    }

    #[test]
    fn test_metadata_lines() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("b.png");
        fs::write(&image, b"").unwrap();
        assert_eq!(metadata_lines(&image), vec!["XMP: (not found)"]);

        let meta = ImageMetadata {
            description: "golden hour".to_string(),
            tags: vec!["beach".to_string(), "sunset".to_string()],
            ..Default::default()
        };
        sidecar::write(&image, &meta).unwrap();
        assert_eq!(
            metadata_lines(&image),
            vec!["Description: golden hour", "Tags:        beach, sunset"]
        );
    }

    #[test]
    fn test_output_target() {
        let (path, format) = output_target(Path::new("walls.csv"), None).unwrap();
        assert_eq!((path, format), (PathBuf::from("walls.csv"), ExportFormat::Csv));

        let (path, format) = output_target(Path::new("walls"), Some(OutputFormat::Csv)).unwrap();
        assert_eq!((path, format), (PathBuf::from("walls.csv"), ExportFormat::Csv));

        let (path, format) = output_target(Path::new("walls"), None).unwrap();
        assert_eq!((path, format), (PathBuf::from("walls.json"), ExportFormat::Json));

        assert!(output_target(Path::new("walls.html"), None).is_err());
    }
}

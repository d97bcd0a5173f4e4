//! streambook - reorder e-book and comic archives for streaming

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, info};
use serde::Serialize;

use streambook::{Config, optimize, plan};

const ALLOWED_EXTENSIONS: &[&str] = &["cbr", "cbz", "epub"];

#[derive(Parser)]
#[command(name = "streambook")]
#[command(version, about = "Reorder EPUB and comic book archives for streaming", long_about = None)]
#[command(after_help = "EXAMPLES:
    streambook -i in -f book.epub -o out         Write out/book.epub in reading order
    streambook -i in -f 'My Comic (1).cbr' -o out  Write out/My_Comic_1.cbz
    streambook -i in -f book.epub --list         Print the resolved entry order")]
struct Cli {
    /// Base directory of the input file
    #[arg(short, long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Input file (CBR, CBZ, or EPUB), relative to the input directory
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Base directory for the output file
    #[arg(short, long, value_name = "DIR", required_unless_present = "list")]
    output_dir: Option<PathBuf>,

    /// Sort comic pages case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Keep the extraction directory instead of deleting it
    #[arg(long)]
    keep_temp: bool,

    /// Convert comic pages to WebP with cwebp
    #[arg(long)]
    webp: bool,

    /// Print the resolved entry order as JSON instead of writing
    #[arg(long)]
    list: bool,

    /// Increase logging verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Listing {
    file: String,
    archive_type: String,
    output: Option<String>,
    entries: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::new()
        .with_verbose(cli.verbose > 0)
        .with_case_sensitive_sort(cli.case_sensitive)
        .with_retain_temp_dir(cli.keep_temp)
        .with_convert_images(cli.webp);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

fn run(cli: &Cli, config: &Config) -> Result<(), String> {
    let input = cli.input_dir.join(&cli.file);
    validate_input(&input)?;
    info!("input file is {}", input.display());

    if cli.list {
        let prepared = plan(&input, config).map_err(|e| e.to_string())?;
        let output = cli
            .output_dir
            .as_ref()
            .map(|dir| prepared.output_path(&dir.join(&cli.file)));
        return print_listing(Listing {
            file: input.display().to_string(),
            archive_type: prepared.archive_type().to_string(),
            output: output.map(|p| p.display().to_string()),
            entries: prepared.entries(),
        });
    }

    let output_dir = cli
        .output_dir
        .as_ref()
        .ok_or_else(|| "--output-dir is required".to_string())?;
    validate_output_dir(output_dir)?;

    let outcome =
        optimize(&input, &output_dir.join(&cli.file), config).map_err(|e| e.to_string())?;
    println!("created {}", outcome.output.display());
    Ok(())
}

fn print_listing(listing: Listing) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&listing).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn validate_input(path: &Path) -> Result<(), String> {
    let meta = std::fs::metadata(path).map_err(|_| format!("'{}' does not exist", path.display()))?;
    if !meta.is_file() {
        return Err(format!("'{}' is not a regular file", path.display()));
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ALLOWED_EXTENSIONS.contains(&ext) {
        return Err(format!("'.{ext}' is an unknown extension"));
    }
    Ok(())
}

fn validate_output_dir(path: &Path) -> Result<(), String> {
    let meta = std::fs::metadata(path).map_err(|_| format!("'{}' does not exist", path.display()))?;
    if !meta.is_dir() {
        return Err(format!("'{}' is not a directory", path.display()));
    }
    Ok(())
}

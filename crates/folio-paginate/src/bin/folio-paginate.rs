//! Paginate an XHTML fragment from the command line.
//!
//! Usage:
//!   cargo run -p folio-paginate --features cli -- [OPTIONS] FILE
//!
//! Pages are printed in order, separated by a form-feed line. With `--json`
//! the whole run is printed as a JSON array of pages instead.
//!
//! Set `RUST_LOG=folio_paginate=debug` together with `--trace` to see
//! per-page fill statistics.

use std::path::PathBuf;
use std::process::ExitCode;

use folio_paginate::{
    paginate_markup, LineEstimateConfig, LineEstimateMeasurer, Page, PaginateOptions,
};

const DISPLAY_WIDTH: f32 = 480.0;
const DISPLAY_HEIGHT: f32 = 800.0;

fn usage() {
    eprintln!("Usage: folio-paginate [OPTIONS] FILE");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --height N       Page height in px (default: {DISPLAY_HEIGHT})");
    eprintln!("  --width N        Content width in px (default: {DISPLAY_WIDTH})");
    eprintln!("  --max-pages N    Stop after N pages");
    eprintln!("  --options FILE   Read pagination options from a JSON file");
    eprintln!("  --trace          Log per-page fill statistics at debug level");
    eprintln!("  --json           Print pages as a JSON array");
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let raw = value.ok_or_else(|| format!("{flag} expects a value"))?;
    raw.parse::<T>()
        .map_err(|_| format!("{flag}: invalid number {raw:?}"))
}

struct Args {
    file: PathBuf,
    options_file: Option<PathBuf>,
    height: Option<f32>,
    width: f32,
    max_pages: Option<usize>,
    trace: bool,
    json: bool,
}

fn parse_args(args: &[String]) -> Result<Option<Args>, String> {
    let mut file = None;
    let mut options_file = None;
    let mut height = None;
    let mut width = DISPLAY_WIDTH;
    let mut max_pages = None;
    let mut trace = false;
    let mut json = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--height" => {
                i += 1;
                height = Some(parse_number("--height", args.get(i))?);
            }
            "--width" => {
                i += 1;
                width = parse_number("--width", args.get(i))?;
            }
            "--max-pages" => {
                i += 1;
                max_pages = Some(parse_number("--max-pages", args.get(i))?);
            }
            "--options" => {
                i += 1;
                let path = args.get(i).ok_or("--options expects a file")?;
                options_file = Some(PathBuf::from(path));
            }
            "--trace" => trace = true,
            "--json" => json = true,
            "--help" | "-h" => return Ok(None),
            other if other.starts_with("--") => return Err(format!("unknown option {other}")),
            other => {
                if file.replace(PathBuf::from(other)).is_some() {
                    return Err("expected exactly one input file".to_string());
                }
            }
        }
        i += 1;
    }

    let file = file.ok_or("missing input file")?;
    Ok(Some(Args {
        file,
        options_file,
        height,
        width,
        max_pages,
        trace,
        json,
    }))
}

fn load_options(args: &Args) -> Result<PaginateOptions, String> {
    let mut opts = match &args.options_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("read {}: {}", path.display(), e))?;
            serde_json::from_str::<PaginateOptions>(&raw)
                .map_err(|e| format!("parse {}: {}", path.display(), e))?
        }
        None => PaginateOptions::default(),
    };
    if let Some(height) = args.height {
        opts = opts.with_page_height(height);
    }
    if let Some(max_pages) = args.max_pages {
        opts = opts.with_max_pages(max_pages);
    }
    if args.trace {
        opts = opts.with_trace(true);
    }
    Ok(opts)
}

fn run(args: &Args) -> Result<(), String> {
    let opts = load_options(args)?;
    let markup = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("read {}: {}", args.file.display(), e))?;

    let mut measurer = LineEstimateMeasurer::new(LineEstimateConfig::for_width(args.width))
        .with_container_height(DISPLAY_HEIGHT);
    let mut session = paginate_markup(&markup, &mut measurer, opts)
        .map_err(|e| format!("{}: {}", args.file.display(), e))?;

    let mut pages: Vec<Page> = Vec::with_capacity(8);
    session
        .drain_pages(|page| pages.push(page))
        .map_err(|e| format!("{}: {}", args.file.display(), e))?;
    log::info!(
        "{}: {} page(s), state {:?}",
        args.file.display(),
        pages.len(),
        session.state()
    );

    if args.json {
        let out = serde_json::to_string_pretty(&pages).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }
    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            println!("\u{000C}");
        }
        println!("{}", page.markup);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let parsed = match parse_args(&args) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            usage();
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("folio-paginate: {msg}");
            usage();
            return ExitCode::from(2);
        }
    };

    match run(&parsed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("folio-paginate: {msg}");
            ExitCode::FAILURE
        }
    }
}

//! Load one track log and print a session report.
//!
//! Run with: cargo run --example summarize_session -- <file.csv|file.gsd> [start] [size]

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use skidata::{
    open_parser, DataLoader, DataLoaderListener, LoadError, SessionSummary, SkiModeClassifier,
};

struct ConsoleListener;

impl DataLoaderListener for ConsoleListener {
    fn aborted(&mut self) {
        println!("Data loading aborted");
    }

    fn completed(&mut self, total: usize) {
        println!("{} element(s) loaded and processed", total);
    }

    fn empty_data(&mut self) {
        println!("Empty data");
    }

    fn error(&mut self, error: &LoadError) {
        eprintln!("Error: {}", error);
    }

    fn loading_complete(&mut self, count: usize) {
        println!("{} element(s) loaded", count);
    }

    fn processed_element(&mut self, count: usize, total: usize) {
        if count % 200 == 0 {
            println!("Element {} of {} processed", count, total);
        }
    }
}

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: summarize_session <file.csv|file.gsd> [start] [size]");
        return ExitCode::FAILURE;
    };
    let start: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let size: Option<usize> = args.next().and_then(|s| s.parse().ok());

    let started = Instant::now();

    let parser = match open_parser(&path) {
        Ok(parser) => parser,
        Err(e) => {
            eprintln!("Cannot open {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut builder = DataLoader::builder()
        .parser(parser)
        .processor(SkiModeClassifier)
        .listener(ConsoleListener)
        .start(start);
    if let Some(size) = size {
        builder = builder.max(size);
    }
    let loader = match builder.build() {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let data = match loader.load_data() {
        Ok(Some(data)) => data,
        _ => return ExitCode::FAILURE,
    };

    println!(
        "Loaded {} points in {} milliseconds.",
        data.len(),
        started.elapsed().as_millis()
    );
    println!("File: {}", path.display());
    println!("{}", SessionSummary::from_data(&data));

    ExitCode::SUCCESS
}

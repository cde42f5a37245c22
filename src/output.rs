use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ClearResult, InfoResult, IngestResult, ListResult, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

/// Prints `[pipeline] message` lines to stdout as the engine reports them.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        println!("{}", progress_line(&event));
    }
}

fn progress_line(event: &ProgressEvent) -> String {
    match event.elapsed {
        Some(elapsed) => format!(
            "[{}] {} ({:.1}s)",
            event.pipeline,
            event.message,
            elapsed.as_secs_f64()
        ),
        None => format!("[{}] {}", event.pipeline, event.message),
    }
}

impl ConsoleOutput {
    pub fn print_ingest(result: &IngestResult) {
        println!("Wrote provenance: {}", result.provenance_path);
    }

    pub fn print_list(result: &ListResult) {
        println!("Cache root: {}", result.cache_root);
        for entry in &result.pipelines {
            match &entry.created_at {
                Some(created_at) => println!("{:<22} ingested {created_at}", entry.pipeline),
                None => println!("{:<22} not ingested", entry.pipeline),
            }
        }
    }

    pub fn print_info(result: &InfoResult) {
        println!("Pipeline:   {}", result.pipeline);
        println!("Provenance: {}", result.provenance_path);
        println!("Created at: {}", result.created_at);
        for entry in &result.files {
            println!("  {:<9} {}", entry.status.as_str(), entry.dst);
        }
    }

    pub fn print_clear(result: &ClearResult) {
        if result.cleared {
            println!("Cleared cache for {}", result.pipeline);
        } else {
            println!("Nothing cached for {}", result.pipeline);
        }
    }
}

/// Silent while running; prints one JSON document per command.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_ingest(results: &[IngestResult]) -> io::Result<()> {
        Self::print_json(&results)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_info(result: &InfoResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_clear(result: &ClearResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

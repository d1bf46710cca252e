//! The interactive shell and the command handlers behind it.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use console::style;
use indicatif::HumanBytes;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use walkdir::WalkDir;

use paperdb_core::traits::DocumentLoader;
use paperdb_core::types::SearchQuery;
use paperdb_core::Error;
use paperdb_rag::{AnswerMode, SkipReason};

use crate::app::App;
use crate::commands::{self, Command, Target, HELP};
use crate::progress::ProgressObserver;
use crate::render::{colour_markers, preview};

const PREVIEW_CHARS: usize = 200;
const STATUS_SAMPLES: usize = 5;

enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    app: App,
    input: Lines<BufReader<Stdin>>,
}

impl Shell {
    pub fn new(app: App) -> Self {
        Self { app, input: BufReader::new(tokio::io::stdin()).lines() }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{}", style("Welcome to paperdb!").cyan());
        print_help();
        loop {
            print!("\n{} ", style(">").yellow());
            std::io::stdout().flush()?;
            let line = tokio::select! {
                line = self.input.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nUse 'exit' command to quit.");
                    continue;
                }
            };
            let Some(line) = line else {
                println!();
                break;
            };
            match self.dispatch(&line).await {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => println!("{}", style(format!("Error: {e}")).red()),
            }
        }
        println!("{}", style("Goodbye!").cyan());
        Ok(())
    }

    /// Run a single command line, failing the process on error.
    pub async fn run_once(&mut self, line: &str) -> Result<()> {
        self.dispatch(line).await?;
        Ok(())
    }

    async fn dispatch(&mut self, line: &str) -> paperdb_core::Result<Flow> {
        let Some(command) = commands::parse(line)? else {
            return Ok(Flow::Continue);
        };
        match command {
            Command::Ingest(folder) => self.ingest(&folder).await?,
            Command::Ask(question) => interruptible(self.ask(&question)).await?,
            Command::Search(query) => interruptible(self.search(&query)).await?,
            Command::Status => interruptible(self.status()).await?,
            Command::Invalidate(target) => self.invalidate(target).await?,
            Command::Settings => self.show_settings()?,
            Command::Help => print_help(),
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    async fn ingest(&self, folder: &Path) -> paperdb_core::Result<()> {
        let folder = paperdb_core::config::expand_path(folder.to_string_lossy());
        let observer = ProgressObserver::new();
        let result = self.app.pipeline.ingest_folder(&folder, &observer).await;
        observer.finish();
        let report = result?;

        if report.found == 0 {
            println!("{}", style("No PDF files found in the folder").yellow());
            return Ok(());
        }
        println!("\nFound {} PDF files.", report.found);
        if !report.skipped.is_empty() {
            println!("\nSkipped PDFs:");
            for skipped in &report.skipped {
                match &skipped.reason {
                    SkipReason::AlreadyIndexed => println!("- {} (already indexed)", skipped.name),
                    SkipReason::Duplicate { of } => println!("- {} (same content as {of})", skipped.name),
                }
            }
        }
        let attempted = report.succeeded + report.failed.len();
        if attempted == 0 {
            println!("\n{}", style("No new PDFs to process.").yellow());
        } else if report.failed.is_empty() {
            println!(
                "\n{}",
                style(format!(
                    "Successfully processed all {} new PDF files ({} chunks).",
                    report.succeeded, report.chunks_written
                ))
                .green()
            );
        } else {
            println!("\n{}", style("Ingestion completed with errors:").red());
            println!("Successful: {}", report.succeeded);
            println!("Failed: {}", report.failed.len());
            println!("\nErrors encountered:");
            for failure in &report.failed {
                println!("{}", style(format!("- {}: {}", failure.name, failure.reason)).red());
            }
        }
        Ok(())
    }

    async fn ask(&self, question: &str) -> paperdb_core::Result<()> {
        let answer = self.app.answers.answer(question).await?;
        println!("\n{}", style("Answer:").cyan());
        match answer.mode {
            AnswerMode::General => println!("{}", answer.render()),
            AnswerMode::Grounded => println!("{}", colour_markers(&answer.render())),
        }
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> paperdb_core::Result<()> {
        let hits = self.app.answers.retriever().search(query).await?;
        if hits.is_empty() {
            println!("{}", style("No matching chunks.").yellow());
            return Ok(());
        }
        for (i, hit) in hits.iter().enumerate() {
            let kind = if hit.chunk.is_figure { " [figure]" } else { "" };
            println!(
                "\n{}. {} (page {}){kind} score {:.3}",
                query.offset + i + 1,
                style(&hit.chunk.title).green(),
                hit.chunk.page_number,
                hit.score
            );
            println!("   {}", preview(&hit.chunk.text, PREVIEW_CHARS));
        }
        Ok(())
    }

    async fn status(&self) -> paperdb_core::Result<()> {
        let stats = self.app.store.stats().await?;
        println!("\n{}", style("Index Status:").cyan());
        println!("Total Chunks: {}", stats.chunk_count);
        println!("Total Documents: {}", stats.document_count);
        println!("Index Size: {}", HumanBytes(stats.size_bytes));

        let samples = self.app.store.sample(STATUS_SAMPLES).await?;
        if !samples.is_empty() {
            println!("\n{}", style("Sample Chunks:").cyan());
            for sample in samples {
                println!("\nID: {}", sample.id);
                println!("Source: {} (page {})", sample.chunk.title, sample.chunk.page_number);
                println!("Text Preview: {}", preview(&sample.chunk.text, PREVIEW_CHARS));
            }
        }
        Ok(())
    }

    async fn invalidate(&mut self, target: Target) -> paperdb_core::Result<()> {
        let path = match target {
            Target::All => {
                let warning = "WARNING: This will delete ALL documents from the index. Are you sure? (y/N): ";
                if !self.confirm(&style(warning).red().to_string()).await? {
                    println!("Operation cancelled.");
                    return Ok(());
                }
                let report = self.app.store.delete_all().await?;
                println!("\n{}", style("Deleted all documents from the index.").green());
                println!("Total deleted: {}", report.deleted);
                if report.failed > 0 {
                    println!("{}", style(format!("Failed deletions: {}", report.failed)).red());
                }
                return Ok(());
            }
            Target::Path(path) => paperdb_core::config::expand_path(path.to_string_lossy()),
        };

        let files = documents_at(self.app.loader.as_ref(), &path)?;
        if files.is_empty() {
            println!("{}", style("No PDF files found to invalidate.").yellow());
            return Ok(());
        }
        println!("\nFound {} documents to invalidate:", files.len());
        for file in &files {
            println!("- {}", file.display());
        }
        let question = style("\nAre you sure you want to invalidate these documents? (y/N): ").yellow().to_string();
        if !self.confirm(&question).await? {
            println!("Operation cancelled.");
            return Ok(());
        }

        // documents are identified by file name
        let ids: Vec<String> = files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        let report = self.app.store.delete_by_document_ids(&ids).await?;
        println!("\n{}", style("Invalidation complete:").green());
        println!("Documents processed: {}", ids.len());
        println!("Chunks deleted: {}", report.deleted);
        if report.failed > 0 {
            println!("{}", style(format!("Failed deletions: {}", report.failed)).red());
        }
        Ok(())
    }

    async fn confirm(&mut self, question: &str) -> paperdb_core::Result<bool> {
        print!("{question}");
        std::io::stdout().flush()?;
        let answer = self.input.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn show_settings(&self) -> paperdb_core::Result<()> {
        println!("\n{}", style("Current Configuration:").cyan());
        for group in self.app.settings.redacted_groups()? {
            println!("\n{}", style(format!("{} settings:", group.name)).cyan());
            for (key, value) in group.entries {
                println!("  {key}: {value}");
            }
        }
        Ok(())
    }
}

/// Run a read-only command, abandoning it on Ctrl-C.
async fn interruptible<F>(work: F) -> paperdb_core::Result<()>
where
    F: Future<Output = paperdb_core::Result<()>>,
{
    until_signal(work, tokio::signal::ctrl_c()).await
}

async fn until_signal<F, S>(work: F, signal: S) -> paperdb_core::Result<()>
where
    F: Future<Output = paperdb_core::Result<()>>,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = work => result,
        Ok(()) = signal => {
            println!("\n{}", style("Interrupted.").yellow());
            Ok(())
        }
    }
}

/// The file itself, or the loader-accepted files directly inside a folder.
fn documents_at(loader: &dyn DocumentLoader, path: &Path) -> paperdb_core::Result<Vec<PathBuf>> {
    if path.is_file() {
        if !loader.accepts(path) {
            return Err(Error::Input(format!("{} is not a supported document", path.display())));
        }
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::Input(format!("Path does not exist: {}", path.display())));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && loader.accepts(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn print_help() {
    println!("\nAvailable commands:");
    for (usage, about) in HELP {
        println!("{} - {about}", style(usage).green());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use paperdb_loader::LopdfLoader;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn a_single_pdf_is_its_own_document() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("manual.PDF");
        fs::write(&pdf, b"%PDF-1.5").unwrap();
        assert_eq!(documents_at(&LopdfLoader, &pdf).unwrap(), vec![pdf]);
    }

    #[test]
    fn unsupported_or_missing_paths_are_input_errors() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "plain text").unwrap();
        assert!(matches!(documents_at(&LopdfLoader, &notes), Err(Error::Input(_))));
        let missing = dir.path().join("gone.pdf");
        assert!(matches!(documents_at(&LopdfLoader, &missing), Err(Error::Input(_))));
    }

    #[test]
    fn a_folder_yields_the_pdfs_directly_inside_it() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.pdf", "notes.txt"] {
            fs::write(dir.path().join(name), b"%PDF-1.5").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.pdf"), b"%PDF-1.5").unwrap();

        let files = documents_at(&LopdfLoader, dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.pdf"), dir.path().join("b.pdf")]);

        let empty = TempDir::new().unwrap();
        assert!(documents_at(&LopdfLoader, empty.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_signal_abandons_the_command() {
        let result = until_signal(std::future::pending(), std::future::ready(Ok(()))).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn without_a_signal_the_command_result_passes_through() {
        let failed = until_signal(
            std::future::ready(Err(Error::Input("no".into()))),
            std::future::pending(),
        )
        .await;
        assert!(matches!(failed, Err(Error::Input(_))));

        // a signal handler that cannot be installed does not cancel the work
        let done = until_signal(
            async { Ok(()) },
            std::future::ready(Err(std::io::Error::other("no handler"))),
        )
        .await;
        assert!(done.is_ok());
    }
}

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use paperdb_rag::IngestObserver;

/// Ingestion progress on stderr.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl IngestObserver for ProgressObserver {
    fn scanned(&self, _found: usize, to_process: usize) {
        if to_process == 0 {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_length(to_process as u64);
        }
    }

    fn document_started(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn document_finished(&self, name: &str, result: Result<usize, &str>) {
        match result {
            Ok(chunks) => self.bar.println(format!("Indexed {chunks} chunks from {name}")),
            Err(reason) => self.bar.println(style(format!("Error processing {name}: {reason}")).red().to_string()),
        }
        self.bar.inc(1);
    }
}

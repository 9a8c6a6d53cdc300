use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// Typed progress events emitted by the batch runner and the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Work list is known; `total` documents will be visited.
    Started { total: usize },
    /// A document is about to be read.
    Document { label: String },
    /// The current document is done (successfully or not).
    Advanced,
    Finished,
}

/// Progress bar over documents, hidden when stderr is not a terminal.
pub struct DocumentProgress {
    bar: ProgressBar,
}

impl DocumentProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet || !std::io::stderr().is_terminal() {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => self.bar.set_length(total as u64),
            ProgressEvent::Document { label } => self.bar.set_message(label),
            ProgressEvent::Advanced => self.bar.inc(1),
            ProgressEvent::Finished => self.bar.finish_and_clear(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_still_counts() {
        let progress = DocumentProgress::new(true);
        progress.handle(ProgressEvent::Started { total: 3 });
        progress.handle(ProgressEvent::Document {
            label: "nota.pdf".to_string(),
        });
        progress.handle(ProgressEvent::Advanced);
        progress.handle(ProgressEvent::Advanced);
        assert_eq!(progress.position(), 2);
        progress.handle(ProgressEvent::Finished);
    }
}

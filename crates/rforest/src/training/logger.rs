//! Training progress logging.
//!
//! Messages go through `tracing`; [`Verbosity`] decides which of them the
//! trainer emits at all.

use std::time::Instant;

/// How much the trainer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Nothing.
    #[default]
    Silent,
    /// Degenerate inputs and results only.
    Warning,
    /// Start and end of training.
    Info,
    /// One line per tree.
    Debug,
}

impl Verbosity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Logger for one training run.
#[derive(Debug)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    started: Option<Instant>,
    n_trees: usize,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            started: None,
            n_trees: 0,
        }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn start_training(&mut self, n_trees: usize, n_rows: usize, n_features: usize, objective: &str) {
        self.started = Some(Instant::now());
        self.n_trees = n_trees;
        if self.verbosity >= Verbosity::Info {
            tracing::info!(n_trees, n_rows, n_features, objective, "starting forest training");
        }
    }

    pub fn log_tree(&self, round: usize, n_leaves: usize, n_in_bag: usize) {
        if self.verbosity >= Verbosity::Debug {
            tracing::debug!(
                tree = round + 1,
                of = self.n_trees,
                n_leaves,
                n_in_bag,
                "grew tree"
            );
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Warning {
            tracing::warn!("{message}");
        }
    }

    pub fn finish_training(&self, n_trees: usize) {
        if self.verbosity >= Verbosity::Info {
            let elapsed_ms = self.started.map_or(0, |t| t.elapsed().as_millis() as u64);
            tracing::info!(n_trees, elapsed_ms, "finished forest training");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_is_ordered() {
        assert!(Verbosity::Silent < Verbosity::Warning);
        assert!(Verbosity::Warning < Verbosity::Info);
        assert!(Verbosity::Info < Verbosity::Debug);
        assert_eq!(Verbosity::default(), Verbosity::Silent);
    }

    #[test]
    fn silent_logger_runs() {
        let mut logger = TrainingLogger::new(Verbosity::Silent);
        logger.start_training(3, 10, 2, "regression");
        logger.log_tree(0, 4, 7);
        logger.warn("ignored");
        logger.finish_training(3);
        assert_eq!(logger.verbosity(), Verbosity::Silent);
    }
}

//! Batch configuration.

/// Options controlling how a mutation batch is executed.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// When true, every index operation is recorded in an undo log so a
    /// failed batch can be rolled back. Costs memory proportional to the
    /// number of index operations in the batch.
    pub undo_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            undo_on_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_enabled_by_default() {
        assert!(BatchOptions::default().undo_on_error);
    }
}

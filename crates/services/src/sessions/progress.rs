/// Aggregated view of the active module's progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleProgress {
    pub module_index: usize,
    pub module_count: usize,
    pub answered: usize,
    pub flagged: usize,
    pub total: usize,
}

impl ModuleProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }

    #[must_use]
    pub fn is_last_module(&self) -> bool {
        self.module_index + 1 >= self.module_count
    }
}

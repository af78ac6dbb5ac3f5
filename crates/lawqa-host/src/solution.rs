//! Best partial result seen so far for one question.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Immutable snapshot of a [`SolutionSpace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub result: String,
    pub code: String,
    /// Incremented on every accepted write.
    pub version: u64,
}

/// Per-question holder of the most substantive result and the code that
/// produced it.
///
/// Written by the execution loop, read by the timeout fallback while the
/// writer may still be running. Every write swaps in a whole new snapshot,
/// so a reader sees either the old pair or the new one.
#[derive(Debug, Default)]
pub struct SolutionSpace {
    state: ArcSwap<Snapshot>,
}

impl SolutionSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the result only when `result` is strictly longer (in code
    /// points) than the current one. Returns whether it was replaced.
    pub fn set_result(&self, result: &str) -> bool {
        self.update(|cur| {
            longer(result, &cur.result).then(|| Snapshot {
                result: result.to_string(),
                code: cur.code.clone(),
                version: cur.version + 1,
            })
        })
    }

    pub fn set_executed_code(&self, code: &str) {
        self.update(|cur| {
            Some(Snapshot {
                result: cur.result.clone(),
                code: code.to_string(),
                version: cur.version + 1,
            })
        });
    }

    /// Store `result` and `code` together when `result` is strictly longer.
    pub fn promote(&self, result: &str, code: &str) -> bool {
        self.update(|cur| {
            longer(result, &cur.result).then(|| Snapshot {
                result: result.to_string(),
                code: code.to_string(),
                version: cur.version + 1,
            })
        })
    }

    pub fn get_result(&self) -> String {
        self.state.load().result.clone()
    }

    pub fn get_executed_code(&self) -> String {
        self.state.load().code.clone()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.load_full()
    }

    fn update(&self, f: impl Fn(&Snapshot) -> Option<Snapshot>) -> bool {
        let mut changed = false;
        self.state.rcu(|cur| match f(cur) {
            Some(next) => {
                changed = true;
                Arc::new(next)
            }
            None => {
                changed = false;
                Arc::clone(cur)
            }
        });
        changed
    }
}

fn longer(new: &str, current: &str) -> bool {
    new.chars().count() > current.chars().count()
}

//! Navigation surface.

use parking_lot::Mutex;

/// Moves the page to another location. One-way from the guard's view.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Mock navigator for testing.
#[derive(Debug, Default)]
pub struct MockNavigator {
    visits: Mutex<Vec<String>>,
}

impl MockNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }

    #[must_use]
    pub fn visit_count(&self) -> usize {
        self.visits.lock().len()
    }

    #[must_use]
    pub fn last_visit(&self) -> Option<String> {
        self.visits.lock().last().cloned()
    }
}

impl Navigator for MockNavigator {
    fn navigate(&self, path: &str) {
        self.visits.lock().push(path.to_string());
    }
}

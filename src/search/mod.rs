/// Quiescence window before a raw search term settles.
pub(crate) const SEARCH_DEBOUNCE_MS: i64 = 300;

#[derive(Clone, Debug)]
struct Pending {
    value: String,
    deadline_ms: i64,
}

/// Debounces raw keystrokes into a settled search term.
///
/// Driven by explicit timestamps so tests never need real timers: the
/// caller arms whatever timer it likes and calls `try_settle` when it
/// fires. Each `feed` replaces the pending value and pushes the
/// deadline out by the full window.
#[derive(Clone, Debug)]
pub(crate) struct SearchDebounce {
    window_ms: i64,
    pending: Option<Pending>,
    settled: String,
}

impl SearchDebounce {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            pending: None,
            settled: String::new(),
        }
    }

    pub fn feed(&mut self, value: &str, now_ms: i64) {
        self.pending = Some(Pending {
            value: value.to_string(),
            deadline_ms: now_ms + self.window_ms,
        });
    }

    /// Returns the newly settled value once the input has been
    /// quiescent for the full window. Settling consumes the pending
    /// value, so a burst of keystrokes yields exactly one update.
    pub fn try_settle(&mut self, now_ms: i64) -> Option<String> {
        let pending = self.pending.as_ref()?;
        if now_ms < pending.deadline_ms {
            return None;
        }
        let value = self.pending.take().map(|p| p.value)?;
        self.settled = value.clone();
        Some(value)
    }

    /// Drops any pending value. Called on teardown so a timer firing
    /// after disposal has nothing to apply.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[allow(dead_code)]
    pub fn settled(&self) -> &str {
        &self.settled
    }
}

impl Default for SearchDebounce {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE_MS)
    }
}

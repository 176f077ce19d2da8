//! Run card: the markdown summary stored with each cycle.
//!
//! The card is the monitoring surface of a run: which previous run the
//! cycle compared against, whether the override was forced, and the
//! change/no-change banner. It is rendered once and stored with the run
//! record for whatever UI reads the run store.

/// Accumulates markdown fragments over one cycle.
#[derive(Debug, Default, Clone)]
pub struct RunCard {
    sections: Vec<String>,
}

impl RunCard {
    /// Create an empty card.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a markdown fragment.
    pub fn append(&mut self, markdown: impl Into<String>) {
        self.sections.push(markdown.into());
    }

    /// Render the card as one markdown document.
    pub fn render(&self) -> String {
        self.sections.join("\n\n")
    }

    /// True if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

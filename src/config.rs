//! Render configuration.

/// Selector text that targets the document as a whole instead of elements.
pub const GLOBAL_SELECTOR: &str = "script";

/// Options controlling how rules are compiled.
///
/// ```
/// use csspipe::RenderOptions;
///
/// let options = RenderOptions::default()
///     .with_global_selector(":root")
///     .with_legacy_aliases(false);
/// assert_eq!(options.global_selector(), ":root");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    builtin_modes: bool,
    global_selector: String,
    legacy_aliases: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            builtin_modes: true,
            global_selector: GLOBAL_SELECTOR.to_string(),
            legacy_aliases: true,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the engine with the built-in modes registered (default: on).
    pub fn with_builtin_modes(mut self, enabled: bool) -> Self {
        self.builtin_modes = enabled;
        self
    }

    /// Selector text that runs once against the global target.
    pub fn with_global_selector(mut self, selector: impl Into<String>) -> Self {
        self.global_selector = selector.into();
        self
    }

    /// Honor `--html` and `--js` when `--body` and `--script` are absent
    /// (default: on).
    pub fn with_legacy_aliases(mut self, enabled: bool) -> Self {
        self.legacy_aliases = enabled;
        self
    }

    pub fn builtin_modes(&self) -> bool {
        self.builtin_modes
    }

    pub fn global_selector(&self) -> &str {
        &self.global_selector
    }

    pub fn legacy_aliases(&self) -> bool {
        self.legacy_aliases
    }

    /// Whether a rule's selector text names the global target.
    pub fn is_global_selector(&self, selector_text: &str) -> bool {
        selector_text.trim() == self.global_selector
    }
}

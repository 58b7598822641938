/// Operator-visible display: three decimal digits or one status character.
pub trait Display: Send + Sync + 'static {
    /// Renders three digits (each `0..=9`).
    fn show_digits(&self, digits: [u8; 3]);

    /// Renders a single status character.
    fn show_char(&self, c: char);
}

/// Display that renders nothing (headless runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn show_digits(&self, _digits: [u8; 3]) {}

    fn show_char(&self, _c: char) {}
}

//! Download file naming.

use std::fmt;

use ink_harmony_pipeline::Rendered;

/// What a download contains, which decides its file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    /// Ink composited over a background.
    Processed,
    /// The uploaded image, passed through unchanged.
    Original,
}

impl ExportKind {
    /// File name prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Processed => "ink_harmony",
            Self::Original => "original",
        }
    }

    /// Kind matching a render.
    #[must_use]
    pub const fn for_render(rendered: &Rendered) -> Self {
        if rendered.passthrough {
            Self::Original
        } else {
            Self::Processed
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `<prefix>_<unix-millis>.jpg`
#[must_use]
pub fn export_filename(kind: ExportKind, unix_millis: u128) -> String {
    format!("{}_{unix_millis}.jpg", kind.prefix())
}

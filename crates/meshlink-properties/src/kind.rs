use std::fmt;

/// Which of the three Antithesis-style property categories a hit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyKind {
    /// Must hold on every evaluation.
    Always,
    /// Tracked for coverage only; never asserted.
    Sometimes,
    /// Must never hold on any evaluation.
    Never,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyKind::Always => "always",
            PropertyKind::Sometimes => "sometimes",
            PropertyKind::Never => "never",
        };
        f.write_str(s)
    }
}

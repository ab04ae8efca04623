pub mod media;
pub mod probe;

/// One resource of a load set, identified by its source and its position in the set.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct AssetDescriptor {
    pub source: String,
    pub index: usize,
}

impl AssetDescriptor {
    pub fn new(source: impl Into<String>, index: usize) -> Self {
        Self {
            source: source.into(),
            index,
        }
    }

    /// 1-based ordinal used in log lines.
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }
}

/// Builds descriptors in the order the sources were given.
pub fn describe<S: AsRef<str>>(sources: &[S]) -> Vec<AssetDescriptor> {
    sources
        .iter()
        .enumerate()
        .map(|(index, s)| AssetDescriptor::new(s.as_ref(), index))
        .collect()
}

/// Which readiness signal settled a [`AssetOutcome::Loaded`] probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadySignal {
    CanPlayThrough,
    LoadedData,
}

/// Result of probing one asset. Every kind counts as settled.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetOutcome {
    Loaded { signal: ReadySignal },
    Errored { info: String },
    TimedOut,
}

impl AssetOutcome {
    pub fn errored(info: impl Into<String>) -> Self {
        Self::Errored { info: info.into() }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "loaded",
            Self::Errored { .. } => "errored",
            Self::TimedOut => "timed_out",
        }
    }
}

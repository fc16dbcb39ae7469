use super::{TechniqueId, ALL_TECHNIQUES, CATALOG};

/// One requested stage, as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageToken {
    Known(TechniqueId),
    /// Not a catalog key. Kept so the orchestrator can report and skip it.
    Unknown(String),
}

impl std::fmt::Display for StageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageToken::Known(id) => write!(f, "{id}"),
            StageToken::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// Ordered stage list. Duplicates are allowed and run twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TechniqueSelection {
    stages: Vec<StageToken>,
}

impl TechniqueSelection {
    pub fn new(stages: Vec<StageToken>) -> Self {
        Self { stages }
    }

    /// The whole catalog in declaration order.
    pub fn all() -> Self {
        Self::new(CATALOG.iter().map(|d| StageToken::Known(d.id)).collect())
    }

    pub fn stages(&self) -> &[StageToken] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn unknown(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                StageToken::Unknown(raw) => Some(raw.as_str()),
                StageToken::Known(_) => None,
            })
            .collect()
    }

    pub fn known(&self) -> Vec<TechniqueId> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                StageToken::Known(id) => Some(*id),
                StageToken::Unknown(_) => None,
            })
            .collect()
    }
}

impl std::fmt::Display for TechniqueSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
        f.write_str(&rendered.join(", "))
    }
}

/// Split a comma separated technique list.
///
/// Tokens are trimmed and lowercased; empty tokens are dropped. If any token
/// is the `all` sentinel the result is the whole catalog, whatever else was
/// listed.
pub fn parse_selection(input: &str) -> TechniqueSelection {
    let tokens: Vec<String> = input
        .split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.iter().any(|token| token == ALL_TECHNIQUES) {
        return TechniqueSelection::all();
    }

    TechniqueSelection::new(
        tokens
            .into_iter()
            .map(|token| match TechniqueId::from_key(&token) {
                Some(id) => StageToken::Known(id),
                None => StageToken::Unknown(token),
            })
            .collect(),
    )
}

use std::fmt::Display;

/// A `from:to` selection as written in a document, e.g. "A1:C4", "B2:" or ":".
/// Either endpoint may be missing, meaning unbounded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Selection {
    /// Splits a selection at its first colon. Text without a colon is a
    /// start cell only, so "A1" reads as "A1:". Endpoints are validated
    /// when the range is resolved.
    pub fn parse(text: &str) -> Selection {
        let (from, to) = text.split_once(':').unwrap_or((text, ""));
        let endpoint = |part: &str| Some(part.trim()).filter(|it| !it.is_empty()).map(str::to_owned);
        Selection {
            from: endpoint(from),
            to: endpoint(to),
        }
    }
}

impl From<&str> for Selection {
    fn from(text: &str) -> Self {
        Selection::parse(text)
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            self.from.as_deref().unwrap_or_default(),
            self.to.as_deref().unwrap_or_default()
        )
    }
}

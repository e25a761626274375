// Composite span identifier: <ring (4 tokens)>-<site>-<far end>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanId {
    pub ring_id: String,
    pub site_id: String,
    pub far_end_id: String,
}

impl SpanId {
    /// Split an extracted span identifier. Needs at least six tokens.
    pub fn parse(raw: &str, delimiter: &str) -> Option<Self> {
        let tokens: Vec<&str> = raw.trim().split(delimiter).collect();
        if tokens.len() < 6 {
            return None;
        }

        Some(Self {
            ring_id: tokens[..4].join(delimiter),
            site_id: tokens[4].to_string(),
            far_end_id: tokens[5].to_string(),
        })
    }

    /// Rebuild the composite from its parts.
    pub fn compose(ring_id: &str, site_id: &str, far_end_id: &str, delimiter: &str) -> String {
        [ring_id, site_id, far_end_id].join(delimiter)
    }
}

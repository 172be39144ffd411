#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentifyEdge {
    Start,
    Stop,
}

impl IdentifyEdge {
    pub fn is_identifying(self) -> bool {
        self == IdentifyEdge::Start
    }
}

/// Collapses the stack's repeated identify notifications into transitions.
#[derive(Debug, Default)]
pub struct IdentifyEdgeDetector {
    identifying: bool,
}

impl IdentifyEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_raw_signal(&mut self, active: bool) -> Option<IdentifyEdge> {
        let was_identifying = std::mem::replace(&mut self.identifying, active);
        match (was_identifying, active) {
            (false, true) => Some(IdentifyEdge::Start),
            (true, false) => Some(IdentifyEdge::Stop),
            _ => None,
        }
    }

    pub fn is_identifying(&self) -> bool {
        self.identifying
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_only() {
        let mut detector = IdentifyEdgeDetector::new();
        let edges: Vec<_> = [false, true, true, true, false, false]
            .into_iter()
            .filter_map(|active| detector.on_raw_signal(active))
            .collect();

        assert_eq!(edges, vec![IdentifyEdge::Start, IdentifyEdge::Stop]);
        assert!(!detector.is_identifying());
    }
}

use std::collections::BTreeSet;

/// Fewest participants a run can be launched with.
pub const MIN_PARTICIPANTS: usize = 2;

/// Set of agent identifiers chosen for the next run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    pub fn select(&mut self, id: &str) {
        self.selected.insert(id.to_string());
    }

    pub fn deselect(&mut self, id: &str) {
        self.selected.remove(id);
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn can_launch(&self) -> bool {
        self.selected.len() >= MIN_PARTICIPANTS
    }

    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_gate_follows_selection_size() {
        let mut selection = Selection::new();
        assert!(selection.toggle("mei_chen"));
        assert!(!selection.can_launch());

        assert!(selection.toggle("carlos_mendez"));
        assert!(selection.can_launch());

        assert!(!selection.toggle("carlos_mendez"));
        assert!(!selection.can_launch());
        assert_eq!(selection.ids(), vec!["mei_chen".to_string()]);
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut selection = Selection::new();
        selection.select("a");
        selection.select("a");
        assert_eq!(selection.len(), 1);
        selection.deselect("missing");
        selection.deselect("a");
        assert!(selection.is_empty());
    }
}

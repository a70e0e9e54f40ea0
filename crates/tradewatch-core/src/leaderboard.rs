//! Stateless ranking view re-rendered from each leaderboard snapshot.

use crate::model::leaderboard::LeaderboardEntry;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based position in the backend's ordering.
    pub rank: usize,
    pub entry: LeaderboardEntry,
}

impl RankedEntry {
    pub fn badge(&self) -> String {
        match self.rank {
            1 => "🥇".to_string(),
            2 => "🥈".to_string(),
            3 => "🥉".to_string(),
            n => format!("{n}."),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderboardView {
    pub rows: Vec<RankedEntry>,
}

impl LeaderboardView {
    /// Replace the whole view with `entries`, keeping the backend's order.
    pub fn project(entries: Vec<LeaderboardEntry>) -> Self {
        let rows = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| RankedEntry { rank: i + 1, entry })
            .collect();
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, agent: &str) -> Option<&RankedEntry> {
        self.rows.iter().find(|row| row.entry.agent == agent)
    }
}

impl std::fmt::Display for LeaderboardView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "Waiting for trades...");
        }
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{} {}  Sales: ${:.2} • Purchases: ${:.2} • Net: ${:.2}",
                row.badge(),
                row.entry.agent,
                row.entry.sales,
                row.entry.purchases,
                row.entry.net_value
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(agent: &str, sales: f64, purchases: f64) -> LeaderboardEntry {
        LeaderboardEntry {
            agent: agent.to_string(),
            sales,
            purchases,
            net_value: sales - purchases,
            trade_count: 1,
        }
    }

    #[test]
    fn test_project_keeps_backend_order_without_tie_breaking() {
        let view = LeaderboardView::project(vec![
            entry("Zed", 10.0, 0.0),
            entry("Amy", 10.0, 0.0),
            entry("Bob", 0.0, 20.0),
        ]);
        let agents: Vec<&str> = view.rows.iter().map(|r| r.entry.agent.as_str()).collect();
        assert_eq!(agents, ["Zed", "Amy", "Bob"]);
        assert_eq!(view.get("Bob").unwrap().rank, 3);
    }

    #[test]
    fn test_badges_and_rendering() {
        let view = LeaderboardView::project(vec![
            entry("A", 50.0, 0.0),
            entry("B", 0.0, 0.0),
            entry("C", 0.0, 0.0),
            entry("D", 0.0, 50.0),
        ]);
        let text = view.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("🥇 A"));
        assert!(lines[0].contains("Sales: $50.00"));
        assert!(lines[1].starts_with("🥈 B"));
        assert!(lines[2].starts_with("🥉 C"));
        assert!(lines[3].starts_with("4. D"));
        assert!(lines[3].contains("Net: $-50.00"));
    }

    #[test]
    fn test_empty_snapshot_renders_placeholder() {
        let view = LeaderboardView::project(Vec::new());
        assert!(view.is_empty());
        assert_eq!(view.to_string(), "Waiting for trades...");
    }
}

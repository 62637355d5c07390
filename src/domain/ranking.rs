//! Ranking entries and the views fetched from upstream.

/// Rank of the last entry of the top-100 view.
///
/// The border view repeats this rank; the merge drops it so the top view
/// stays authoritative.
pub const TOP_VIEW_BOUNDARY_RANK: i64 = 100;

/// Ranks reported by the ranking-lines query for normal events.
pub const NORMAL_RANKING_LINES: &[i64] = &[
    10, 20, 30, 40, 50, 100, 200, 300, 400, 500, 1_000, 1_500, 2_000, 2_500, 3_000, 4_000, 5_000,
    10_000, 20_000, 30_000, 40_000, 50_000, 100_000, 200_000, 300_000,
];

/// Ranks reported by the ranking-lines query for WorldBloom chapters.
pub const WORLD_BLOOM_RANKING_LINES: &[i64] = &[
    10, 20, 30, 40, 50, 100, 200, 300, 400, 500, 1_000, 2_000, 3_000, 4_000, 5_000, 7_000, 10_000,
    20_000, 30_000, 40_000, 50_000, 70_000, 100_000,
];

/// One player's position on a leaderboard at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRankingEntry {
    /// Upstream user id, kept as text.
    pub user_id: String,
    /// Position on the leaderboard.
    pub rank: i64,
    /// Event points.
    pub score: i64,
    /// Display name at fetch time.
    pub name: String,
    /// Cheerful Carnival team, when the event has teams.
    pub cheerful_team_id: Option<i64>,
    /// Chapter character, for chapter leaderboards.
    pub character_id: Option<i64>,
}

/// Entries of one WorldBloom chapter leaderboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterRankings {
    /// Character the chapter belongs to.
    pub character_id: i64,
    /// Entries in upstream order.
    pub entries: Vec<PlayerRankingEntry>,
}

/// One upstream leaderboard view: either top-100 or border.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingView {
    /// Main leaderboard entries.
    pub entries: Vec<PlayerRankingEntry>,
    /// Per-character chapter leaderboards.
    pub chapters: Vec<ChapterRankings>,
}

impl RankingView {
    /// Returns the chapter entries for `character_id`, or an empty slice.
    #[must_use]
    pub fn chapter(&self, character_id: i64) -> &[PlayerRankingEntry] {
        self.chapters
            .iter()
            .find(|c| c.character_id == character_id)
            .map_or(&[], |c| c.entries.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user: &str, rank: i64) -> PlayerRankingEntry {
        PlayerRankingEntry {
            user_id: user.into(),
            rank,
            score: 1_000 - rank,
            name: user.into(),
            cheerful_team_id: None,
            character_id: Some(3),
        }
    }

    #[test]
    fn chapter_lookup_by_character() {
        let view = RankingView {
            entries: Vec::new(),
            chapters: vec![ChapterRankings {
                character_id: 3,
                entries: vec![entry("a", 1), entry("b", 2)],
            }],
        };
        assert_eq!(view.chapter(3).len(), 2);
        assert!(view.chapter(4).is_empty());
    }

    #[test]
    fn ranking_lines_are_ascending() {
        assert!(NORMAL_RANKING_LINES.windows(2).all(|w| w.first() < w.get(1)));
        assert!(WORLD_BLOOM_RANKING_LINES.windows(2).all(|w| w.first() < w.get(1)));
    }
}

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Higher score ranks first.
    Descending,
    /// Lower score ranks first.
    Ascending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked<T> {
    pub item: T,
    pub score: i64,
    pub rank: u32,
}

/// Olympic ranking: equal scores share a rank and the next distinct score
/// takes its 1-based position, e.g. `1, 1, 3`. Ties are listed in `T`
/// order so output is deterministic.
pub fn olympic_rank<T: Ord>(mut scored: Vec<(T, i64)>, direction: Direction) -> Vec<Ranked<T>> {
    scored.sort_by(|a, b| compare_scores(a.1, b.1, direction).then_with(|| a.0.cmp(&b.0)));

    let mut ranked: Vec<Ranked<T>> = Vec::with_capacity(scored.len());
    for (position, (item, score)) in scored.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(previous) if previous.score == score => previous.rank,
            _ => position as u32 + 1,
        };
        ranked.push(Ranked { item, score, rank });
    }
    ranked
}

/// Keeps entries whose rank is `<= max_rank`.
pub fn within_rank<T>(ranked: Vec<Ranked<T>>, max_rank: u32) -> Vec<Ranked<T>> {
    ranked
        .into_iter()
        .take_while(|entry| entry.rank <= max_rank)
        .collect()
}

/// Keeps entries belonging to the first `limit` distinct rank values, so a
/// tie at the boundary widens the head count.
pub fn first_distinct_ranks<T>(ranked: Vec<Ranked<T>>, limit: usize) -> Vec<Ranked<T>> {
    let mut distinct = 0usize;
    let mut last_rank: Option<u32> = None;
    let mut kept = Vec::new();

    for entry in ranked {
        if last_rank != Some(entry.rank) {
            distinct += 1;
            last_rank = Some(entry.rank);
        }
        if distinct > limit {
            break;
        }
        kept.push(entry);
    }
    kept
}

fn compare_scores(a: i64, b: i64, direction: Direction) -> Ordering {
    match direction {
        Direction::Descending => b.cmp(&a),
        Direction::Ascending => a.cmp(&b),
    }
}

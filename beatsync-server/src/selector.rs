//! Next-Track Selector
//!
//! Picks the queued track with the strictly highest net score. Ties go to the
//! earliest-enqueued entry. A queue where no entry scores above
//! [`SCORE_FLOOR`] falls back to the oldest entry, so a non-empty queue always
//! yields a choice.

use beatsync_common::db::{QueueEntry, VoteCounts};
use serde::{Deserialize, Serialize};

/// Scores at or below this never count as a best candidate
pub const SCORE_FLOOR: i64 = -999;

/// The track chosen to play next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackChoice {
    /// Queue row the choice was made from; used to detect replacement
    pub entry_id: i64,
    pub track_uri: String,
    pub track_name: String,
    pub up_votes: i64,
    pub down_votes: i64,
    pub net_score: i64,
}

impl TrackChoice {
    fn new(entry: &QueueEntry, counts: VoteCounts) -> Self {
        Self {
            entry_id: entry.id,
            track_uri: entry.track_uri.clone(),
            track_name: entry.track_name.clone(),
            up_votes: counts.up,
            down_votes: counts.down,
            net_score: counts.net_score(),
        }
    }
}

/// Select the next track from `entries` (FIFO order).
///
/// `counts_fn` supplies vote counts per entry. Returns None only for an empty
/// queue.
pub fn select_next<F>(entries: &[QueueEntry], mut counts_fn: F) -> Option<TrackChoice>
where
    F: FnMut(&QueueEntry) -> VoteCounts,
{
    let mut fallback: Option<TrackChoice> = None;
    let mut best: Option<TrackChoice> = None;

    for entry in entries {
        let choice = TrackChoice::new(entry, counts_fn(entry));

        if fallback.is_none() {
            fallback = Some(choice.clone());
        }

        // Strict comparison: the first entry seen keeps a tie
        let to_beat = best.as_ref().map_or(SCORE_FLOOR, |current| current.net_score);
        let beats_best = choice.net_score > to_beat;
        if beats_best {
            best = Some(choice);
        }
    }

    best.or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn entries(uris: &[&str]) -> Vec<QueueEntry> {
        uris.iter()
            .enumerate()
            .map(|(i, uri)| QueueEntry {
                id: i as i64 + 1,
                track_uri: uri.to_string(),
                track_name: format!("Track {}", uri),
                enqueued_at: Utc::now(),
            })
            .collect()
    }

    fn counts(table: &[(&str, i64, i64)]) -> HashMap<String, VoteCounts> {
        table
            .iter()
            .map(|(uri, up, down)| (uri.to_string(), VoteCounts::new(*up, *down)))
            .collect()
    }

    fn select(queue: &[QueueEntry], table: &HashMap<String, VoteCounts>) -> Option<TrackChoice> {
        select_next(queue, |e| table.get(&e.track_uri).copied().unwrap_or_default())
    }

    #[test]
    fn test_empty_queue_selects_nothing() {
        assert!(select_next(&[], |_| VoteCounts::default()).is_none());
    }

    #[test]
    fn test_highest_score_wins() {
        let queue = entries(&["t1", "t2", "t3"]);
        let table = counts(&[("t1", 1, 0), ("t2", 4, 1), ("t3", 2, 0)]);

        let choice = select(&queue, &table).unwrap();
        assert_eq!(choice.track_uri, "t2");
        assert_eq!(choice.up_votes, 4);
        assert_eq!(choice.down_votes, 1);
        assert_eq!(choice.net_score, 3);
        assert_eq!(choice.entry_id, 2);
    }

    #[test]
    fn test_tie_goes_to_earliest_enqueued() {
        let queue = entries(&["t1", "t2", "t3"]);
        let table = counts(&[("t2", 2, 0), ("t3", 2, 0)]);

        assert_eq!(select(&queue, &table).unwrap().track_uri, "t2");
    }

    #[test]
    fn test_equal_negative_scores_fall_back_to_first() {
        let queue = entries(&["t1", "t2"]);
        let table = counts(&[("t1", 0, 2), ("t2", 0, 2)]);

        let choice = select(&queue, &table).unwrap();
        assert_eq!(choice.track_uri, "t1");
        assert_eq!(choice.net_score, -2);
    }

    #[test]
    fn test_later_entry_wins_only_when_strictly_greater() {
        let queue = entries(&["t1", "t2"]);
        let table = counts(&[("t1", 0, 2), ("t2", 0, 1)]);

        assert_eq!(select(&queue, &table).unwrap().track_uri, "t2");
    }

    #[test]
    fn test_all_negative_queue_still_yields_choice() {
        let queue = entries(&["t1", "t2", "t3"]);
        let table = counts(&[("t1", 0, 9), ("t2", 0, 5), ("t3", 0, 7)]);

        assert_eq!(select(&queue, &table).unwrap().track_uri, "t2");
    }

    #[test]
    fn test_scores_at_floor_fall_back_to_oldest() {
        let queue = entries(&["t1", "t2", "t3"]);
        let table = counts(&[("t1", 0, 1001), ("t2", 0, 999), ("t3", 0, 1000)]);

        let choice = select(&queue, &table).unwrap();
        assert_eq!(choice.track_uri, "t1");
        assert_eq!(choice.net_score, -1001);
    }

    #[test]
    fn test_score_above_floor_beats_buried_entries() {
        let queue = entries(&["t1", "t2", "t3"]);
        let table = counts(&[("t1", 0, 1001), ("t2", 0, 1000), ("t3", 0, 998)]);

        assert_eq!(select(&queue, &table).unwrap().track_uri, "t3");
    }

    #[test]
    fn test_every_nonempty_queue_yields_some() {
        // Deterministic sweep over assorted score layouts
        for len in 1..=6usize {
            let uris: Vec<String> = (0..len).map(|i| format!("t{}", i)).collect();
            let refs: Vec<&str> = uris.iter().map(String::as_str).collect();
            let queue = entries(&refs);

            for seed in 0..20i64 {
                let choice = select_next(&queue, |e| {
                    let k = e.id * 7 + seed * 3;
                    VoteCounts::new(k % 5, (k / 2) % 6)
                })
                .expect("non-empty queue must yield a choice");

                // Winner has the maximal score and is the earliest among ties
                let scores: Vec<i64> = queue
                    .iter()
                    .map(|e| {
                        let k = e.id * 7 + seed * 3;
                        VoteCounts::new(k % 5, (k / 2) % 6).net_score()
                    })
                    .collect();
                let max = *scores.iter().max().unwrap();
                let first_max = scores.iter().position(|s| *s == max).unwrap();
                assert_eq!(choice.track_uri, queue[first_max].track_uri);
            }
        }
    }
}

//! Candidate ordering for the readiness scheduler.

use crate::domain::Story;
use std::cmp::Ordering;

/// Compare two stories in scheduling order.
///
/// Highest priority first; within a priority, oldest `created_at` first so
/// long-waiting stories are not starved by a stream of same-priority
/// newcomers. Remaining ties break on ascending id, which keeps repeated
/// calls against unchanged data deterministic and test assertions stable.
pub(super) fn schedule_order(a: &Story, b: &Story) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}

/// Sort stories into scheduling order.
pub(super) fn sort_candidates(stories: &mut [Story]) {
    stories.sort_by(schedule_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EpicId, StoryId, StoryStatus};
    use chrono::{Duration, Utc};

    fn story(id: &str, priority: i32, age_minutes: i64) -> Story {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Story {
            id: StoryId::new(id),
            epic_id: EpicId::new("epic-1"),
            title: id.to_string(),
            description: String::new(),
            status: StoryStatus::Todo,
            priority,
            tasks: vec![],
            acceptance_criteria: vec![],
            comments: vec![],
            depends_on: vec![],
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn higher_priority_sorts_first() {
        let mut stories = vec![story("low", 1, 10), story("high", 10, 10), story("mid", 5, 10)];
        sort_candidates(&mut stories);
        let ids: Vec<&str> = stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["high", "mid", "low"]);
    }

    #[test]
    fn age_breaks_priority_ties_oldest_first() {
        let mut stories = vec![story("newer", 5, 1), story("older", 5, 60)];
        sort_candidates(&mut stories);
        let ids: Vec<&str> = stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["older", "newer"]);
    }

    #[test]
    fn id_breaks_remaining_ties() {
        let created = Utc::now();
        let mut a = story("bbb", 5, 0);
        let mut b = story("aaa", 5, 0);
        a.created_at = created;
        b.created_at = created;

        let mut stories = vec![a, b];
        sort_candidates(&mut stories);
        let ids: Vec<&str> = stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["aaa", "bbb"]);
    }

    #[test]
    fn negative_priority_sorts_last() {
        let mut stories = vec![story("deferred", -3, 10), story("normal", 0, 10)];
        sort_candidates(&mut stories);
        assert_eq!(stories[0].id.as_str(), "normal");
    }
}

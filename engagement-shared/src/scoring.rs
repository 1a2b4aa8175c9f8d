//! Derived engagement metrics.

/// Weight applied to total engagement before subtracting the vote margin.
///
/// Any margin is at most `up + down`, so the weight keeps the score
/// monotonic in engagement first and in evenness second.
pub const ENGAGEMENT_WEIGHT: i64 = 1000;

/// Computes the contested score of an item from its vote tallies.
///
/// The score rewards items with many votes that are evenly split:
/// `(up + down) * 1000 - |up - down|`. It is pure integer arithmetic because
/// scores are compared and sorted.
///
/// ```
/// use engagement_shared::contested_score;
///
/// assert_eq!(contested_score(100, 98), 197_998);
/// ```
pub fn contested_score(upvotes: i64, downvotes: i64) -> i64 {
    (upvotes + downvotes) * ENGAGEMENT_WEIGHT - (upvotes - downvotes).abs()
}

//! Score derivation: per-point raw scores, running totals and the
//! sign-split polyline used by the cumulative line overlay.

use crate::document::Point;
use crate::geometry::{grid_index, CENTER, HASH_STEP};

/// Derived scores for an ordered run of points
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scores {
    pub individual: Vec<i32>,
    pub cumulative: Vec<i32>,
    pub total: i32,
}

/// Signed distance from the center line in hash marks; above center is positive.
pub fn raw_score(offset: f64) -> i32 {
    if offset > CENTER {
        -((offset - CENTER) / HASH_STEP).round() as i32
    } else {
        ((CENTER - offset) / HASH_STEP).round() as i32
    }
}

/// Offset at which a (possibly fractional) score sits
pub fn score_to_offset(score: f64) -> f64 {
    CENTER - score * HASH_STEP
}

pub fn compute_scores(points: &[Point]) -> Scores {
    let individual: Vec<i32> = points.iter().map(|p| raw_score(p.offset)).collect();
    let mut total = 0;
    let cumulative = individual
        .iter()
        .map(|score| {
            total += score;
            total
        })
        .collect();
    Scores {
        individual,
        cumulative,
        total,
    }
}

/// A run of the cumulative line that stays on one side of zero.
///
/// Points are (sequence coordinate, score) pairs in data space.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeSegment {
    pub positive: bool,
    pub points: Vec<(f64, f64)>,
}

/// Split the cumulative polyline wherever consecutive values change sign.
///
/// Zero counts as positive. The split point is interpolated between the two
/// magnitudes and lands on the zero line, where it ends one segment and
/// starts the next.
pub fn cumulative_segments(cumulative: &[i32]) -> Vec<CumulativeSegment> {
    let Some(&first) = cumulative.first() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = CumulativeSegment {
        positive: first >= 0,
        points: Vec::new(),
    };

    for (i, &score) in cumulative.iter().enumerate() {
        let seq = grid_index(i);
        let value = f64::from(score);
        if i > 0 && (score >= 0) != current.positive {
            let prev = f64::from(cumulative[i - 1]);
            let prev_seq = grid_index(i - 1);
            let ratio = prev.abs() / (prev.abs() + value.abs());
            let crossing = (prev_seq + (seq - prev_seq) * ratio, 0.0);

            current.points.push(crossing);
            segments.push(current);
            current = CumulativeSegment {
                positive: score >= 0,
                points: vec![crossing, (seq, value)],
            };
        } else {
            current.points.push((seq, value));
        }
    }
    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Point, PointId};

    fn pts(offsets: &[f64]) -> Vec<Point> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &o)| Point::new(PointId(i as u64 + 1), o))
            .collect()
    }

    #[test]
    fn empty_flow_scores_zero() {
        assert_eq!(compute_scores(&[]), Scores::default());
    }

    #[test]
    fn centered_points_score_zero() {
        let scores = compute_scores(&pts(&[50.0, 50.0, 50.0]));
        assert_eq!(scores.individual, vec![0, 0, 0]);
        assert_eq!(scores.cumulative, vec![0, 0, 0]);
        assert_eq!(scores.total, 0);
    }

    #[test]
    fn sign_convention() {
        assert_eq!(raw_score(25.0), 5);
        assert_eq!(raw_score(75.0), -5);
        assert_eq!(raw_score(0.0), 10);
        assert_eq!(raw_score(100.0), -10);
        // mid-drag values round to the nearest mark
        assert_eq!(raw_score(47.4), 1);
        assert_eq!(raw_score(52.6), -1);
    }

    #[test]
    fn running_total() {
        let scores = compute_scores(&pts(&[40.0, 70.0, 10.0]));
        assert_eq!(scores.individual, vec![2, -4, 8]);
        assert_eq!(scores.cumulative, vec![2, -2, 6]);
        assert_eq!(scores.total, 6);
    }

    #[test]
    fn score_offset_inverse() {
        assert_eq!(score_to_offset(f64::from(raw_score(25.0))), 25.0);
        assert_eq!(score_to_offset(0.0), 50.0);
    }

    #[test]
    fn segments_stay_whole_without_sign_change() {
        let segs = cumulative_segments(&[1, 3, 0, 2]);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].positive);
        assert_eq!(segs[0].points.len(), 4);
    }

    #[test]
    fn segments_split_at_zero_crossing() {
        // 3 -> -1 crosses zero three quarters of the way along
        let segs = cumulative_segments(&[3, -1]);
        assert_eq!(segs.len(), 2);
        assert!(segs[0].positive);
        assert!(!segs[1].positive);

        let crossing = (75.0 + 75.0 * 0.75, 0.0);
        assert_eq!(segs[0].points, vec![(75.0, 3.0), crossing]);
        assert_eq!(segs[1].points, vec![crossing, (150.0, -1.0)]);
    }

    #[test]
    fn no_segments_for_empty_input() {
        assert!(cumulative_segments(&[]).is_empty());
    }
}

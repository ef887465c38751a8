use crate::model::*;

// ── Interval algebra ──────────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both inputs must be sorted by start.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

/// Overlap of two sorted, disjoint span lists.
pub fn intersect_intervals(a: &[Span], b: &[Span]) -> Vec<Span> {
    let (mut i, mut j) = (0, 0);
    let mut result = Vec::new();
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start < end {
            result.push(Span::new(start, end));
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

/// True when `span` lies entirely inside the union of `open` (any order).
pub fn covered_by(span: &Span, open: &[Span]) -> bool {
    let mut sorted = open.to_vec();
    sorted.sort_by_key(|s| s.start);
    let merged = merge_overlapping(&sorted);
    subtract_intervals(&[*span], &merged).is_empty()
}

// ── Lane predicates ───────────────────────────────────────────────

/// Staff lane check: no booking or unavailability overlaps `span`, and `span`
/// lies within `working` hours widened by any `Available` override rows.
pub fn staff_lane_free(lane: &Lane, working: &[Span], span: &Span) -> bool {
    let mut open: Vec<Span> = working.to_vec();
    for interval in lane.overlapping(span) {
        match interval.kind {
            IntervalKind::Booking | IntervalKind::Unavailable | IntervalKind::Block => return false,
            IntervalKind::Available => open.push(interval.span),
        }
    }
    covered_by(span, &open)
}

/// Resource lane check: no booking or administrative block overlaps `span`.
pub fn resource_lane_free(lane: &Lane, span: &Span) -> bool {
    !lane.overlapping(span).any(Interval::is_busy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const H: Ms = 3_600_000;

    fn lane(intervals: Vec<(Ms, Ms, IntervalKind)>) -> Lane {
        let mut lane = Lane::new(Ulid::new());
        for (start, end, kind) in intervals {
            lane.insert_interval(Interval {
                id: Ulid::new(),
                span: Span::new(start, end),
                kind,
            });
        }
        lane
    }

    #[test]
    fn merge_adjacent_and_overlapping() {
        let merged = merge_overlapping(&[Span::new(0, 10), Span::new(10, 20), Span::new(15, 30), Span::new(40, 50)]);
        assert_eq!(merged, vec![Span::new(0, 30), Span::new(40, 50)]);
        assert!(merge_overlapping(&[]).is_empty());
    }

    #[test]
    fn subtract_fragments_base() {
        let free = subtract_intervals(
            &[Span::new(0, 100)],
            &[Span::new(10, 20), Span::new(50, 60)],
        );
        assert_eq!(free, vec![Span::new(0, 10), Span::new(20, 50), Span::new(60, 100)]);
        assert_eq!(subtract_intervals(&[], &[Span::new(0, 1)]), Vec::<Span>::new());
        assert_eq!(subtract_intervals(&[Span::new(0, 5)], &[]), vec![Span::new(0, 5)]);
    }

    #[test]
    fn intersect_clips_to_both_lists() {
        let staff = [Span::new(7, 22), Span::new(30, 40)];
        let business = [Span::new(9, 18), Span::new(32, 35), Span::new(50, 60)];
        assert_eq!(
            intersect_intervals(&staff, &business),
            vec![Span::new(9, 18), Span::new(32, 35)]
        );
        assert!(intersect_intervals(&staff, &[]).is_empty());
        assert!(intersect_intervals(&[Span::new(0, 5)], &[Span::new(5, 9)]).is_empty());
    }

    #[test]
    fn covered_by_unsorted_union() {
        let open = [Span::new(12, 20), Span::new(0, 12)];
        assert!(covered_by(&Span::new(5, 15), &open));
        assert!(!covered_by(&Span::new(5, 25), &open));
        assert!(!covered_by(&Span::new(5, 15), &[]));
    }

    #[test]
    fn staff_free_inside_working_hours() {
        let l = lane(vec![]);
        let working = [Span::new(9 * H, 18 * H)];
        assert!(staff_lane_free(&l, &working, &Span::new(9 * H, 10 * H)));
        assert!(staff_lane_free(&l, &working, &Span::new(17 * H, 18 * H)));
        assert!(!staff_lane_free(&l, &working, &Span::new(17 * H, 19 * H)));
        assert!(!staff_lane_free(&l, &working, &Span::new(8 * H, 9 * H)));
    }

    #[test]
    fn staff_booking_blocks_but_back_to_back_is_fine() {
        let l = lane(vec![(10 * H, 11 * H, IntervalKind::Booking)]);
        let working = [Span::new(9 * H, 18 * H)];
        assert!(!staff_lane_free(&l, &working, &Span::new(10 * H, 11 * H)));
        assert!(!staff_lane_free(&l, &working, &Span::new(10 * H + 30 * 60_000, 11 * H + 30 * 60_000)));
        assert!(staff_lane_free(&l, &working, &Span::new(9 * H, 10 * H)));
        assert!(staff_lane_free(&l, &working, &Span::new(11 * H, 12 * H)));
    }

    #[test]
    fn unavailability_overrides_working_hours() {
        let l = lane(vec![(12 * H, 14 * H, IntervalKind::Unavailable)]);
        let working = [Span::new(9 * H, 18 * H)];
        assert!(!staff_lane_free(&l, &working, &Span::new(13 * H, 14 * H)));
        assert!(staff_lane_free(&l, &working, &Span::new(14 * H, 15 * H)));
    }

    #[test]
    fn available_override_widens_working_hours() {
        let l = lane(vec![(18 * H, 20 * H, IntervalKind::Available)]);
        let working = [Span::new(9 * H, 18 * H)];
        assert!(staff_lane_free(&l, &working, &Span::new(17 * H, 19 * H)));
        assert!(!staff_lane_free(&l, &working, &Span::new(19 * H, 21 * H)));
        // Override alone on a day off.
        assert!(staff_lane_free(&l, &[], &Span::new(18 * H, 19 * H)));
    }

    #[test]
    fn resource_free_ignores_touching_block() {
        let l = lane(vec![
            (14 * H, 15 * H, IntervalKind::Block),
            (16 * H, 17 * H, IntervalKind::Booking),
        ]);
        assert!(resource_lane_free(&l, &Span::new(13 * H, 14 * H)));
        assert!(!resource_lane_free(&l, &Span::new(14 * H + 1, 14 * H + 2)));
        assert!(resource_lane_free(&l, &Span::new(15 * H, 16 * H)));
        assert!(!resource_lane_free(&l, &Span::new(15 * H, 16 * H + 1)));
    }
}

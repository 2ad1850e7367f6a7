//! Flag repositioning after edits.
//!
//! The editor reports the file's new line count and the ranges it touched.
//! When the line count changed by `delta`, every flag at or after the start
//! line of the *first* reported range moves by `delta`; flags above it stay
//! put. Later ranges in the same batch are ignored, so a multi-cursor edit
//! that adds lines in two places shifts flags by the combined delta from the
//! first range only.
//!
//! # Policies
//!
//! | Policy | Out-of-range lines | Two flags on one line |
//! |--------|--------------------|-----------------------|
//! | [`ShiftPolicy::Repair`] | clamped into `[0, new_count)` | lower original line kept, other dropped |
//! | [`ShiftPolicy::Legacy`] | left as computed (floored at 0) | both kept |

use serde::{Deserialize, Serialize};

use crate::models::{Document, Flag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPolicy {
    #[default]
    Repair,
    Legacy,
}

/// One contiguous change range reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRange {
    pub start_line: usize,
}

/// An editor change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    pub file_id: String,
    pub new_line_count: usize,
    pub changes: Vec<ChangeRange>,
}

impl EditEvent {
    pub fn new(file_id: impl Into<String>, new_line_count: usize, start_line: usize) -> Self {
        Self {
            file_id: file_id.into(),
            new_line_count,
            changes: vec![ChangeRange { start_line }],
        }
    }
}

/// What a reconcile pass did to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub delta: i64,
    /// Number of flags whose line changed.
    pub moved: usize,
    /// Flags discarded because they collided with a lower flag.
    pub dropped: Vec<Flag>,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.moved > 0 || !self.dropped.is_empty()
    }
}

fn apply_delta(line: usize, delta: i64) -> usize {
    (line as i64).saturating_add(delta).max(0) as usize
}

/// Reposition `doc`'s flags for `event`.
///
/// Returns `None` when the line count is unchanged (nothing can have
/// moved) or the event carries no change ranges.
pub fn reconcile(
    doc: &mut Document,
    event: &EditEvent,
    policy: ShiftPolicy,
) -> Option<ReconcileOutcome> {
    let old_count = doc.line_count;
    let new_count = event.new_line_count;
    if old_count == new_count {
        return None;
    }
    let start = event.changes.first()?.start_line;
    let delta = new_count as i64 - old_count as i64;
    doc.line_count = new_count;

    let mut outcome = ReconcileOutcome {
        delta,
        ..Default::default()
    };

    for flag in doc.flags.iter_mut().filter(|f| f.line_num >= start) {
        let mut line = apply_delta(flag.line_num, delta);
        if policy == ShiftPolicy::Repair && new_count > 0 {
            line = line.min(new_count - 1);
        }
        if line != flag.line_num {
            flag.line_num = line;
            outcome.moved += 1;
        }
    }

    // Stable sort: among flags now sharing a line, the one that started
    // lower stays first.
    doc.flags.sort_by_key(|f| f.line_num);

    if policy == ShiftPolicy::Repair {
        let mut kept: Vec<Flag> = Vec::with_capacity(doc.flags.len());
        for flag in doc.flags.drain(..) {
            match kept.last() {
                Some(prev) if prev.line_num == flag.line_num => outcome.dropped.push(flag),
                _ => kept.push(flag),
            }
        }
        doc.flags = kept;
    }

    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::catalog;

    fn doc_with(lines: &[usize], line_count: usize) -> Document {
        let mut doc = Document::new("/w/notes.txt", line_count);
        for (i, line) in lines.iter().enumerate() {
            doc.insert_flag(Flag::new(*line, catalog()[i].clone()))
                .unwrap();
        }
        doc
    }

    fn lines(doc: &Document) -> Vec<usize> {
        doc.flags.iter().map(|f| f.line_num).collect()
    }

    #[test]
    fn test_insert_lines_shifts_flags_after_start() {
        let mut doc = doc_with(&[2, 7], 10);
        let out = reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 13, 5),
            ShiftPolicy::Repair,
        )
        .unwrap();
        assert_eq!(lines(&doc), vec![2, 10]);
        assert_eq!(doc.line_count, 13);
        assert_eq!(out.delta, 3);
        assert_eq!(out.moved, 1);
    }

    #[test]
    fn test_remove_lines_shifts_flags_up() {
        let mut doc = doc_with(&[2, 7], 10);
        reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 8, 1),
            ShiftPolicy::Repair,
        )
        .unwrap();
        assert_eq!(lines(&doc), vec![0, 5]);
        assert_eq!(doc.line_count, 8);
    }

    #[test]
    fn test_unchanged_line_count_is_noop() {
        let mut doc = doc_with(&[2, 7], 10);
        let before = doc.clone();
        let out = reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 10, 0),
            ShiftPolicy::Repair,
        );
        assert!(out.is_none());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_flag_on_start_line_moves() {
        let mut doc = doc_with(&[4], 10);
        reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 11, 4),
            ShiftPolicy::Repair,
        )
        .unwrap();
        assert_eq!(lines(&doc), vec![5]);
    }

    #[test]
    fn test_only_first_change_range_is_consulted() {
        let mut doc = doc_with(&[1, 8], 10);
        let event = EditEvent {
            file_id: "/w/notes.txt".into(),
            new_line_count: 12,
            changes: vec![ChangeRange { start_line: 5 }, ChangeRange { start_line: 0 }],
        };
        reconcile(&mut doc, &event, ShiftPolicy::Repair).unwrap();
        assert_eq!(lines(&doc), vec![1, 10]);
    }

    #[test]
    fn test_repair_drops_higher_flag_on_collision() {
        let mut doc = doc_with(&[1, 4], 10);
        // Deleting three lines at line 2 pulls line 4 onto line 1, which sits
        // above the start and stays.
        let mut doc2 = doc.clone();
        let out = reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 7, 2),
            ShiftPolicy::Repair,
        )
        .unwrap();
        assert_eq!(lines(&doc), vec![1]);
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].tone.name, "Piano2");
        assert!(doc.invariants_hold());

        let out = reconcile(
            &mut doc2,
            &EditEvent::new("/w/notes.txt", 7, 2),
            ShiftPolicy::Legacy,
        )
        .unwrap();
        assert_eq!(lines(&doc2), vec![1, 1]);
        assert!(out.dropped.is_empty());
        assert!(!doc2.invariants_hold());
    }

    #[test]
    fn test_repair_clamps_stale_line_into_range() {
        // A flag already past the end (stale count) cannot be pushed further out.
        let mut doc = doc_with(&[5], 4);
        let mut legacy = doc.clone();
        let event = EditEvent::new("/w/notes.txt", 10, 0);

        reconcile(&mut doc, &event, ShiftPolicy::Repair).unwrap();
        assert_eq!(lines(&doc), vec![9]);

        reconcile(&mut legacy, &event, ShiftPolicy::Legacy).unwrap();
        assert_eq!(lines(&legacy), vec![11]);
    }

    #[test]
    fn test_legacy_can_reorder_past_untouched_flags() {
        let mut doc = doc_with(&[3, 8], 10);
        reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 2, 8),
            ShiftPolicy::Legacy,
        )
        .unwrap();
        assert_eq!(lines(&doc), vec![0, 3]);
        assert_eq!(doc.flags[0].tone.name, "Piano2");
    }

    #[test]
    fn test_shift_never_goes_below_zero() {
        let mut doc = doc_with(&[1], 10);
        reconcile(
            &mut doc,
            &EditEvent::new("/w/notes.txt", 2, 0),
            ShiftPolicy::Repair,
        )
        .unwrap();
        assert_eq!(lines(&doc), vec![0]);
    }

    #[test]
    fn test_empty_change_list_is_ignored() {
        let mut doc = doc_with(&[1], 10);
        let event = EditEvent {
            file_id: "/w/notes.txt".into(),
            new_line_count: 12,
            changes: Vec::new(),
        };
        assert!(reconcile(&mut doc, &event, ShiftPolicy::Repair).is_none());
        assert_eq!(doc.line_count, 10);
    }
}

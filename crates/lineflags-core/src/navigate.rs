//! Forward navigation through a candidate set of flags.

use crate::error::{FlagError, FlagResult};
use crate::models::Flag;

/// Pick the flag to jump to from `cursor_line`.
///
/// `candidates` must be sorted ascending by line. The target is the first
/// candidate strictly below the cursor; when the cursor is at or past the
/// last candidate, navigation wraps to the first one. A flag on the cursor
/// line itself is never the target, so repeated jumps while parked on a
/// flag always advance.
pub fn next_target(candidates: &[Flag], cursor_line: usize) -> FlagResult<&Flag> {
    let last = candidates.last().ok_or(FlagError::NotFound)?;
    if cursor_line >= last.line_num {
        return Ok(&candidates[0]);
    }
    candidates
        .iter()
        .find(|f| f.line_num > cursor_line)
        .ok_or(FlagError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::catalog;

    fn flags(lines: &[usize]) -> Vec<Flag> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| Flag::new(*l, catalog()[i].clone()))
            .collect()
    }

    #[test]
    fn test_empty_candidates_not_found() {
        assert_eq!(next_target(&[], 0).unwrap_err(), FlagError::NotFound);
    }

    #[test]
    fn test_wraps_from_last() {
        let c = flags(&[3, 9]);
        assert_eq!(next_target(&c, 9).unwrap().line_num, 3);
        assert_eq!(next_target(&c, 40).unwrap().line_num, 3);
    }

    #[test]
    fn test_moves_to_next_below_cursor() {
        let c = flags(&[3, 9]);
        assert_eq!(next_target(&c, 5).unwrap().line_num, 9);
        assert_eq!(next_target(&c, 0).unwrap().line_num, 3);
    }

    #[test]
    fn test_parked_on_flag_skips_it() {
        let c = flags(&[3, 9]);
        assert_eq!(next_target(&c, 3).unwrap().line_num, 9);
    }

    #[test]
    fn test_single_candidate_always_targets_itself() {
        let c = flags(&[6]);
        assert_eq!(next_target(&c, 6).unwrap().line_num, 6);
        assert_eq!(next_target(&c, 1).unwrap().line_num, 6);
    }
}

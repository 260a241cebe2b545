//! Task matrix expansion.
//!
//! Expands the configured URL set against the fixed device and privacy
//! mode sets into an ordered task list. Pure and deterministic: the same
//! input always yields the same sequence.

use crate::models::{Task, ALL_DEVICES, ALL_MODES};

/// Expand `{urls} x {devices} x {modes}` into the ordered task list.
///
/// URL-major order, then device, then mode. Each task carries its own
/// sequence index and the shared total count.
pub fn build_matrix(urls: &[String]) -> Vec<Task> {
    let total = urls.len() * ALL_DEVICES.len() * ALL_MODES.len();
    let mut tasks = Vec::with_capacity(total);

    for url in urls {
        for device in ALL_DEVICES {
            for mode in ALL_MODES {
                tasks.push(Task {
                    url: url.clone(),
                    device,
                    privacy: mode,
                    sequence_index: tasks.len(),
                    total_count: total,
                });
            }
        }
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://example.com/page-{}", i))
            .collect()
    }

    #[test]
    fn test_matrix_size() {
        for n in [1, 3, 7] {
            let tasks = build_matrix(&urls(n));
            assert_eq!(tasks.len(), n * 4);
            assert!(tasks.iter().all(|t| t.total_count == n * 4));
        }
    }

    #[test]
    fn test_identity_unique() {
        let tasks = build_matrix(&urls(5));
        let identities: HashSet<_> = tasks
            .iter()
            .map(|t| (t.url.clone(), t.device, t.privacy))
            .collect();
        assert_eq!(identities.len(), tasks.len());
    }

    #[test]
    fn test_sequence_indexes_are_positional() {
        let tasks = build_matrix(&urls(2));
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.sequence_index, i);
        }
    }

    #[test]
    fn test_deterministic() {
        let input = urls(4);
        assert_eq!(build_matrix(&input), build_matrix(&input));
    }

    #[test]
    fn test_empty_input() {
        assert!(build_matrix(&[]).is_empty());
    }
}

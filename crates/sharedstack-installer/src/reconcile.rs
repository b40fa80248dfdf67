use std::collections::BTreeSet;

use sharedstack_core::{sort_most_recent_first, Tag};

pub fn candidate_tags(
    fetched: &BTreeSet<Tag>,
    retired: &BTreeSet<String>,
    installed: &[Tag],
) -> Vec<Tag> {
    let installed = installed.iter().collect::<BTreeSet<_>>();
    let mut candidates = fetched
        .iter()
        .filter(|tag| !retired.contains(tag.as_str()))
        .filter(|tag| !installed.contains(tag))
        .cloned()
        .collect::<Vec<_>>();
    sort_most_recent_first(&mut candidates);
    candidates
}

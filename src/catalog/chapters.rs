// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use super::model::Chapter;

/// Fill in each chapter's `end_time` from the next chapter in the same file
///
/// Chapters are grouped by their audio file (`stream_url`). Inside a group,
/// ordered by track number, a chapter ends where the next one starts and the
/// last chapter of the file is open-ended. The result is ordered by track
/// number across all files.
pub fn assign_end_times(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut by_file: BTreeMap<String, Vec<Chapter>> = BTreeMap::new();
    for chapter in chapters {
        by_file
            .entry(chapter.stream_url.clone())
            .or_default()
            .push(chapter);
    }

    let mut ranged = Vec::new();
    for (_, mut group) in by_file {
        group.sort_by_key(|chapter| chapter.track_number);

        let next_starts: Vec<Option<u64>> = group
            .iter()
            .skip(1)
            .map(|chapter| Some(chapter.start_time))
            .chain(std::iter::once(None))
            .collect();

        for (chapter, end_time) in group.iter_mut().zip(next_starts) {
            chapter.end_time = end_time;
        }

        ranged.extend(group);
    }

    ranged.sort_by_key(|chapter| chapter.track_number);
    ranged
}

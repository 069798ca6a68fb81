//! Groups a file listing into image/data pairs sharing an identifier.
//!
//! Files are sorted by full path and cut into consecutive groups of two. A group is kept
//! only when both files carry the same identifier and exactly one of them is a `json`
//! data file. Everything else is dropped and counted.

use crate::domain::model::{ApplicationPair, FileRole};

const DATA_EXTENSION: &str = "json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingOutcome {
    pub pairs: Vec<ApplicationPair>,
    pub discarded_groups: usize,
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Basename up to the first `.`.
pub fn file_identifier(path: &str) -> &str {
    let name = basename(path);
    name.split('.').next().unwrap_or(name)
}

/// Text between the first and second `.` of the basename, empty when there is none.
pub fn file_extension(path: &str) -> &str {
    basename(path).split('.').nth(1).unwrap_or("")
}

pub fn file_role(path: &str) -> FileRole {
    if file_extension(path) == DATA_EXTENSION {
        FileRole::Data(path.to_string())
    } else {
        FileRole::Image(path.to_string())
    }
}

fn pair_group(group: &[&String]) -> Option<ApplicationPair> {
    let [first, second] = group else {
        return None;
    };

    let application_id = file_identifier(first);
    if application_id != file_identifier(second) {
        return None;
    }

    match (file_role(first), file_role(second)) {
        (FileRole::Image(image_path), FileRole::Data(data_path))
        | (FileRole::Data(data_path), FileRole::Image(image_path)) => Some(ApplicationPair {
            application_id: application_id.to_string(),
            image_path,
            data_path,
        }),
        _ => None,
    }
}

pub fn pair_files(paths: &[String]) -> PairingOutcome {
    let mut sorted: Vec<&String> = paths.iter().collect();
    sorted.sort();

    let mut outcome = PairingOutcome::default();
    for group in sorted.chunks(2) {
        match pair_group(group) {
            Some(pair) => outcome.pairs.push(pair),
            None => {
                tracing::debug!("Discarding unpaired group {:?}", group);
                outcome.discarded_groups += 1;
            }
        }
    }
    outcome
}

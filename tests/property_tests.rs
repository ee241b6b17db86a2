use photodedup::duplicates::{group_by_size, group_candidates, CandidateGroup};
use photodedup::scanner::hasher::Hasher;
use photodedup::scanner::{parse_file_name, FileRecord};
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn record(i: usize, name: &str, size: u64) -> FileRecord {
    FileRecord::new(
        PathBuf::from(format!("/fake/{i}/{name}")),
        size,
        SystemTime::UNIX_EPOCH + Duration::from_secs(i as u64),
    )
}

proptest! {
    #[test]
    fn test_fingerprint_determinism(content in prop::collection::vec(any::<u8>(), 0..20_000)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.bin");
        fs::write(&path, &content).unwrap();
        let size = content.len() as u64;

        let hasher = Hasher::new();
        prop_assert_eq!(
            hasher.full_fingerprint(&path, size).unwrap(),
            hasher.full_fingerprint(&path, size).unwrap()
        );
        prop_assert_eq!(
            hasher.quick_fingerprint(&path, size).unwrap(),
            hasher.quick_fingerprint(&path, size).unwrap()
        );
    }

    #[test]
    fn test_small_files_quick_equals_full(content in prop::collection::vec(any::<u8>(), 0..=4096)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.bin");
        fs::write(&path, &content).unwrap();
        let size = content.len() as u64;

        let hasher = Hasher::new();
        prop_assert_eq!(
            hasher.quick_fingerprint(&path, size).unwrap(),
            hasher.full_fingerprint(&path, size).unwrap()
        );
    }

    #[test]
    fn test_group_by_size_invariants(sizes in prop::collection::vec(0u64..50, 0..60)) {
        let records: Vec<FileRecord> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| record(i, "a.jpg", size))
            .collect();

        let (buckets, stats) = group_by_size(records.clone());

        for (size, members) in &buckets {
            for member in members {
                prop_assert_eq!(member.size, *size);
            }
        }
        prop_assert_eq!(stats.total_files, records.len());
        prop_assert_eq!(buckets.values().map(Vec::len).sum::<usize>(), records.len());
    }

    #[test]
    fn test_candidate_groups_never_mix(
        files in prop::collection::vec((0u64..8, 0usize..4, 0u64..4), 0..60)
    ) {
        let stems = ["IMG_001", "IMG_002", "beach", "clip"];
        let records: Vec<FileRecord> = files
            .iter()
            .enumerate()
            .map(|(i, &(size, stem, copy))| {
                let name = if copy == 0 {
                    format!("{}.jpg", stems[stem])
                } else {
                    format!("{}_{}.jpg", stems[stem], copy)
                };
                record(i, &name, size)
            })
            .collect();

        let (groups, stats) = group_candidates(records.clone());

        let mut seen = std::collections::HashSet::new();
        for group in &groups {
            prop_assert!(group.len() >= 2);
            for member in group.members() {
                prop_assert_eq!(member.size, group.size());
                prop_assert_eq!(&*member.derived_key, group.derived_key());
                prop_assert!(seen.insert(member.path.clone()), "record in two groups");
            }
            let keeper = &group.members()[0];
            for other in &group.members()[1..] {
                prop_assert_ne!(
                    FileRecord::keeper_order(keeper, other),
                    std::cmp::Ordering::Greater
                );
            }
        }
        prop_assert_eq!(stats.candidate_files, seen.len());
    }

    #[test]
    fn test_singletons_never_form_groups(size in 0u64..1000) {
        prop_assert!(CandidateGroup::new(vec![record(0, "x.jpg", size)]).is_none());
        prop_assert!(CandidateGroup::new(Vec::new()).is_none());
    }

    #[test]
    fn test_marker_sequence_recovered(stem in "[A-Za-z][A-Za-z0-9_]{0,12}", n in 1u64..100) {
        let name = format!("{stem}_{n}.jpg");
        let once = parse_file_name(&name);
        let twice = parse_file_name(&once.derived_key);
        prop_assert!(twice.derived_key.len() <= once.derived_key.len());
        prop_assert_eq!(once.sequence, n);
    }
}

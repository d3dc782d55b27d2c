//! Randomized add/remove/clear sequences checked against a plain set of names

#[macro_use(quickcheck)]
extern crate quickcheck_macros;

mod common;

use common::*;
use lifeguard_cluster::cluster::{ChildRef, RelationManager};
use lifeguard_cluster::store::MemoryStore;
use quickcheck::{Arbitrary, Gen};
use std::collections::BTreeSet;

/// One staging call. Saved members are addressed by key (ids 1-4), unsaved
/// members by a slot in a pool of shared handles.
#[derive(Debug, Clone, Copy)]
enum Op {
    AddSaved(i64),
    AddNew(usize),
    RemoveSaved(i64),
    RemoveNew(usize),
    Clear,
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        let id = i64::from(u8::arbitrary(g) % 4) + 1;
        let slot = usize::from(u8::arbitrary(g) % 3);
        match u8::arbitrary(g) % 9 {
            0 | 1 => Op::AddSaved(id),
            2 | 3 => Op::AddNew(slot),
            4 | 5 => Op::RemoveSaved(id),
            6 | 7 => Op::RemoveNew(slot),
            _ => Op::Clear,
        }
    }
}

fn saved_name(id: i64) -> String {
    format!("s{}", id)
}

/// Band 1 owns members 1-3; member 4 belongs to band 2.
fn fixture(store: &MemoryStore) -> Band {
    let band = Band::saved(1, "The Beatles");
    seed_band(
        store,
        &band,
        &[
            BandMember::saved(1, 1, "s1"),
            BandMember::saved(2, 1, "s2"),
            BandMember::saved(3, 1, "s3"),
            BandMember::saved(4, 2, "s4"),
        ],
    );
    band
}

/// Apply `ops` to both the relation and the expected name set
fn run(ops: &[Op], store: &MemoryStore, band: &mut Band) -> BTreeSet<String> {
    let pool: Vec<ChildRef<BandMember>> = (0..3)
        .map(|slot| ChildRef::new(BandMember::named(&format!("n{}", slot))))
        .collect();
    let mut expected: BTreeSet<String> = (1..=3).map(saved_name).collect();

    let mut members = MEMBERS.of(band, store);
    for op in ops {
        match *op {
            Op::AddSaved(id) => {
                members
                    .add([BandMember::saved(id, 1, &saved_name(id))])
                    .unwrap();
                expected.insert(saved_name(id));
            }
            Op::AddNew(slot) => {
                members.add([pool[slot].clone()]).unwrap();
                expected.insert(format!("n{}", slot));
            }
            Op::RemoveSaved(id) => {
                members
                    .remove([BandMember::saved(id, 1, &saved_name(id))])
                    .unwrap();
                expected.remove(&saved_name(id));
            }
            Op::RemoveNew(slot) => {
                members.remove([pool[slot].clone()]).unwrap();
                expected.remove(&format!("n{}", slot));
            }
            Op::Clear => {
                members.clear();
                expected.clear();
            }
        }
    }
    expected
}

#[quickcheck]
fn staged_read_matches_net_changes(ops: Vec<Op>) -> bool {
    let store = MemoryStore::new();
    let mut band = fixture(&store);
    let expected = run(&ops, &store, &mut band);

    let members = MEMBERS.of(&mut band, &store);
    let names = member_names(&members.read().unwrap().items());
    let expected: Vec<String> = expected.into_iter().collect();

    names == expected && store.operations().iter().all(|op| !op.is_write())
}

#[quickcheck]
fn commit_makes_live_rows_match_staged_rows(ops: Vec<Op>) -> bool {
    let store = MemoryStore::new();
    let mut band = fixture(&store);
    let expected = run(&ops, &store, &mut band);

    let mut members = MEMBERS.of(&mut band, &store);
    members.commit().unwrap();
    let live = members.read_live().unwrap();
    let expected: Vec<String> = expected.into_iter().collect();

    member_names(&live) == expected
        && live.iter().all(|member| member.borrow().band_id == Some(1))
        && !members.is_staged()
}

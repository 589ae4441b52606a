// ── Diff and job planning ──
//
// Partitions the desired set against the applied set into add, update and
// delete jobs. IDs land in at most one job; the three sets are disjoint.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{User, UserMap};

/// How deletions are treated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyncMode {
    /// The desired set is the full truth; applied-only IDs are deleted.
    #[default]
    Replace,
    /// Never delete; only add and update.
    Upsert,
}

/// An applied record that must be replaced by a desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub old: User,
    pub new: User,
}

/// One unit of work for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Add(User),
    Update(Change),
    Delete(User),
}

impl Job {
    pub fn id(&self) -> &str {
        &self.user().id
    }

    /// The record the job is about: the new record for an update.
    pub fn user(&self) -> &User {
        match self {
            Job::Add(u) | Job::Delete(u) => u,
            Job::Update(change) => &change.new,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Job::Add(_) => "add",
            Job::Update(_) => "update",
            Job::Delete(_) => "delete",
        }
    }
}

/// The work a reconciliation run will perform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub adds: Vec<User>,
    pub updates: Vec<Change>,
    pub deletes: Vec<User>,
}

impl Plan {
    /// Diff `desired` against `applied`.
    ///
    /// With `reseed`, every desired ID that is not an update becomes an add
    /// (even if unchanged) and nothing is deleted, regardless of `mode`.
    pub fn compute(applied: &UserMap, desired: &UserMap, mode: SyncMode, reseed: bool) -> Self {
        let mut plan = Plan::default();

        for (id, want) in desired {
            match applied.get(id) {
                None => plan.adds.push(want.clone()),
                Some(have) if !have.same_as(want) => plan.updates.push(Change {
                    old: have.clone(),
                    new: want.clone(),
                }),
                Some(_) => {}
            }
        }

        if reseed {
            let updating: HashSet<&str> = plan.updates.iter().map(|c| c.new.id.as_str()).collect();
            plan.adds = desired
                .iter()
                .filter(|(id, _)| !updating.contains(id.as_str()))
                .map(|(_, u)| u.clone())
                .collect();
            return plan;
        }

        if mode == SyncMode::Replace {
            plan.deletes = applied
                .iter()
                .filter(|(id, _)| !desired.contains_key(*id))
                .map(|(_, u)| u.clone())
                .collect();
        }

        plan
    }

    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Jobs in feed order: adds, then updates, then deletes.
    pub fn into_jobs(self) -> impl Iterator<Item = Job> {
        self.adds
            .into_iter()
            .map(Job::Add)
            .chain(self.updates.into_iter().map(Job::Update))
            .chain(self.deletes.into_iter().map(Job::Delete))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::VISION_FLOW;

    fn map(users: &[User]) -> UserMap {
        users.iter().map(|u| (u.id.clone(), u.clone())).collect()
    }

    fn ids(users: &[User]) -> BTreeSet<String> {
        users.iter().map(|u| u.id.clone()).collect()
    }

    fn update_ids(plan: &Plan) -> BTreeSet<String> {
        plan.updates.iter().map(|c| c.new.id.clone()).collect()
    }

    /// Every subset combination of a small universe, with variants per ID.
    fn universes() -> Vec<UserMap> {
        let variants = |id: &str| {
            vec![
                None,
                Some(User::vless(id, "u1", 0, "")),
                Some(User::vless(id, "u1", 0, VISION_FLOW)),
                Some(User::vmess(id, "u2", 1)),
            ]
        };
        let mut out = Vec::new();
        for a in variants("a") {
            for b in variants("b") {
                for c in variants("c") {
                    let users: Vec<User> = [a.clone(), b.clone(), c].into_iter().flatten().collect();
                    out.push(map(&users));
                }
            }
        }
        out
    }

    #[test]
    fn partition_is_disjoint_and_covers_desired() {
        for applied in universes() {
            for desired in universes() {
                for mode in [SyncMode::Replace, SyncMode::Upsert] {
                    for reseed in [false, true] {
                        let plan = Plan::compute(&applied, &desired, mode, reseed);
                        let adds = ids(&plan.adds);
                        let upds = update_ids(&plan);
                        let dels = ids(&plan.deletes);

                        assert!(adds.is_disjoint(&upds));
                        assert!(adds.is_disjoint(&dels));
                        assert!(upds.is_disjoint(&dels));
                        assert_eq!(adds.len(), plan.adds.len());

                        for (id, want) in &desired {
                            let noop = applied.get(id).is_some_and(|have| have.same_as(want));
                            let hits = usize::from(adds.contains(id)) + usize::from(upds.contains(id));
                            if reseed {
                                assert_eq!(hits, 1, "reseed must schedule {id}");
                            } else {
                                assert_eq!(hits, usize::from(!noop), "{id} placed wrongly");
                            }
                        }
                        assert!(dels.iter().all(|id| !desired.contains_key(id)));
                    }
                }
            }
        }
    }

    #[test]
    fn upsert_and_reseed_never_delete() {
        for applied in universes() {
            for desired in universes() {
                assert!(Plan::compute(&applied, &desired, SyncMode::Upsert, false).deletes.is_empty());
                assert!(Plan::compute(&applied, &desired, SyncMode::Replace, true).deletes.is_empty());
            }
        }
    }

    #[test]
    fn applying_a_plan_reaches_a_fixed_point() {
        for applied in universes() {
            for desired in universes() {
                let plan = Plan::compute(&applied, &desired, SyncMode::Replace, false);
                let mut next = applied.clone();
                for job in plan.into_jobs() {
                    match job {
                        Job::Add(u) => {
                            next.insert(u.id.clone(), u);
                        }
                        Job::Update(c) => {
                            next.insert(c.new.id.clone(), c.new);
                        }
                        Job::Delete(u) => {
                            next.remove(&u.id);
                        }
                    }
                }
                assert!(Plan::compute(&next, &desired, SyncMode::Replace, false).is_empty());
            }
        }
    }

    #[test]
    fn replace_deletes_applied_only_ids() {
        let a = User::vless("a", "u1", 0, "");
        let b = User::vless("b", "u2", 0, "");
        let plan = Plan::compute(&map(&[a.clone(), b.clone()]), &map(&[a]), SyncMode::Replace, false);
        assert!(plan.adds.is_empty());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.deletes, vec![b]);
    }

    #[test]
    fn reseed_re_adds_unchanged_users() {
        let a = User::vless("a", "u1", 0, "");
        let b_old = User::vless("b", "u2", 0, "");
        let b_new = User::vless("b", "u3", 0, "");
        let stale = User::vless("z", "u9", 0, "");

        let plan = Plan::compute(
            &map(&[a.clone(), b_old.clone(), stale]),
            &map(&[a.clone(), b_new.clone()]),
            SyncMode::Replace,
            true,
        );

        assert_eq!(plan.adds, vec![a]);
        assert_eq!(plan.updates, vec![Change { old: b_old, new: b_new }]);
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn jobs_are_fed_adds_then_updates_then_deletes() {
        let plan = Plan {
            adds: vec![User::vless("a", "u1", 0, "")],
            updates: vec![Change {
                old: User::vless("b", "u2", 0, ""),
                new: User::vless("b", "u3", 0, ""),
            }],
            deletes: vec![User::vless("c", "u4", 0, "")],
        };
        let ops: Vec<_> = plan.into_jobs().map(|j| (j.op(), j.id().to_owned())).collect();
        assert_eq!(
            ops,
            vec![
                ("add", "a".to_owned()),
                ("update", "b".to_owned()),
                ("delete", "c".to_owned())
            ]
        );
    }
}

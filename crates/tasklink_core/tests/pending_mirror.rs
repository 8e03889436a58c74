//! Cross-reference consistency between task assignment and owner pending
//! sets, exercised through the service entry points.

use rusqlite::Connection;
use std::collections::BTreeSet;
use tasklink_core::db::open_db_in_memory;
use tasklink_core::{
    AssignmentFilter, Owner, OwnerCreateRequest, OwnerReplaceRequest, OwnerService,
    SqliteOwnerRepository, SqliteTaskRepository, Task, TaskFilter, TaskListQuery, TaskRequest,
    TaskService, UNASSIGNED_NAME,
};
use uuid::Uuid;

type Tasks<'conn> = TaskService<SqliteTaskRepository<'conn>, SqliteOwnerRepository<'conn>>;
type Owners<'conn> = OwnerService<SqliteTaskRepository<'conn>, SqliteOwnerRepository<'conn>>;

fn services(conn: &Connection) -> (Tasks<'_>, Owners<'_>) {
    (
        TaskService::new(
            SqliteTaskRepository::new(conn),
            SqliteOwnerRepository::new(conn),
        ),
        OwnerService::new(
            SqliteTaskRepository::new(conn),
            SqliteOwnerRepository::new(conn),
        ),
    )
}

fn make_owner(owners: &Owners<'_>, name: &str, email: &str) -> Owner {
    owners
        .create_owner(&OwnerCreateRequest {
            name: name.to_string(),
            email: email.to_string(),
        })
        .unwrap()
}

fn make_assigned_task(tasks: &Tasks<'_>, name: &str, owner: Uuid) -> Task {
    let mut request = TaskRequest::new(name, 1_735_689_600_000);
    request.assigned_owner = Some(owner);
    tasks.create_task(&request).unwrap()
}

fn replace_request(task: &Task) -> TaskRequest {
    TaskRequest {
        name: task.name.clone(),
        description: task.description.clone(),
        deadline: task.deadline,
        completed: task.completed,
        assigned_owner: task.assigned_owner,
    }
}

fn pending_of(owners: &Owners<'_>, owner: Uuid) -> BTreeSet<Uuid> {
    owners.get_owner(owner).unwrap().unwrap().pending_tasks
}

/// Checks the pending-mirror invariant in both directions over full scans.
fn assert_mirror_consistent(tasks: &Tasks<'_>, owners: &Owners<'_>) {
    let all_tasks = tasks
        .list_tasks(&TaskListQuery {
            limit: Some(10_000),
            ..TaskListQuery::default()
        })
        .unwrap();
    let all_owners = owners
        .list_owners(&Default::default())
        .unwrap();

    for task in &all_tasks {
        let should_be_pending = task.assigned_owner.is_some() && !task.completed;
        for owner in &all_owners {
            let in_set = owner.pending_tasks.contains(&task.uuid);
            let expected = should_be_pending && task.assigned_owner == Some(owner.uuid);
            assert_eq!(
                in_set, expected,
                "task {} vs owner {} pending membership",
                task.uuid, owner.uuid
            );
        }
    }

    for owner in &all_owners {
        for pending_id in &owner.pending_tasks {
            let task = all_tasks
                .iter()
                .find(|task| task.uuid == *pending_id)
                .unwrap_or_else(|| panic!("pending id {pending_id} references no task"));
            assert_eq!(task.assigned_owner, Some(owner.uuid));
            assert!(!task.completed);
        }
    }
}

#[test]
fn assigned_creation_mirrors_into_pending_set() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let task = make_assigned_task(&tasks, "T1", alice.uuid);

    assert_eq!(task.assigned_owner_name, "Alice");
    assert_eq!(pending_of(&owners, alice.uuid), BTreeSet::from([task.uuid]));
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn completed_creation_stays_out_of_pending() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let mut request = TaskRequest::new("done on arrival", 0);
    request.assigned_owner = Some(alice.uuid);
    request.completed = true;
    let task = tasks.create_task(&request).unwrap();

    assert_eq!(task.assigned_owner, Some(alice.uuid));
    assert_eq!(task.assigned_owner_name, "Alice");
    assert!(pending_of(&owners, alice.uuid).is_empty());
}

#[test]
fn completing_task_clears_pending_but_keeps_owner() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let task = make_assigned_task(&tasks, "T1", alice.uuid);

    let mut request = replace_request(&task);
    request.completed = true;
    let replaced = tasks.replace_task(task.uuid, &request).unwrap();

    assert_eq!(replaced.assigned_owner, Some(alice.uuid));
    assert!(pending_of(&owners, alice.uuid).is_empty());
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn reassignment_moves_pending_between_owners() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let bob = make_owner(&owners, "Bob", "b@x.com");
    let alice_other = make_assigned_task(&tasks, "A-keep", alice.uuid);
    let bob_other = make_assigned_task(&tasks, "B-keep", bob.uuid);
    let moved = make_assigned_task(&tasks, "moved", alice.uuid);

    let mut request = replace_request(&moved);
    request.assigned_owner = Some(bob.uuid);
    let replaced = tasks.replace_task(moved.uuid, &request).unwrap();

    assert_eq!(replaced.assigned_owner_name, "Bob");
    assert_eq!(
        pending_of(&owners, alice.uuid),
        BTreeSet::from([alice_other.uuid])
    );
    assert_eq!(
        pending_of(&owners, bob.uuid),
        BTreeSet::from([bob_other.uuid, moved.uuid])
    );
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn unassigning_clears_pending_and_name_cache() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let task = make_assigned_task(&tasks, "T1", alice.uuid);

    let mut request = replace_request(&task);
    request.assigned_owner = None;
    let replaced = tasks.replace_task(task.uuid, &request).unwrap();

    assert_eq!(replaced.assigned_owner, None);
    assert_eq!(replaced.assigned_owner_name, UNASSIGNED_NAME);
    assert!(pending_of(&owners, alice.uuid).is_empty());
}

#[test]
fn replace_keeping_same_owner_keeps_membership() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let task = make_assigned_task(&tasks, "T1", alice.uuid);

    let mut request = replace_request(&task);
    request.name = "T1 renamed".to_string();
    tasks.replace_task(task.uuid, &request).unwrap();

    assert_eq!(pending_of(&owners, alice.uuid), BTreeSet::from([task.uuid]));
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn task_delete_clears_pending() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let task = make_assigned_task(&tasks, "T1", alice.uuid);

    tasks.delete_task(task.uuid).unwrap();

    assert!(pending_of(&owners, alice.uuid).is_empty());
    assert_eq!(tasks.get_task(task.uuid).unwrap(), None);
}

#[test]
fn owner_delete_releases_all_their_tasks() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let t1 = make_assigned_task(&tasks, "T1", alice.uuid);
    let t2 = make_assigned_task(&tasks, "T2", alice.uuid);

    owners.delete_owner(alice.uuid).unwrap();

    for id in [t1.uuid, t2.uuid] {
        let task = tasks.get_task(id).unwrap().unwrap();
        assert_eq!(task.assigned_owner, None);
        assert_eq!(task.assigned_owner_name, UNASSIGNED_NAME);
    }
    assert_eq!(
        tasks
            .count_tasks(&TaskFilter {
                assignment: AssignmentFilter::To(alice.uuid),
                ..TaskFilter::default()
            })
            .unwrap(),
        0
    );
    assert_eq!(owners.get_owner(alice.uuid).unwrap(), None);
}

#[test]
fn owner_replace_reconciles_assignment_to_desired_set() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let dropped = make_assigned_task(&tasks, "dropped", alice.uuid);
    let kept = make_assigned_task(&tasks, "kept", alice.uuid);
    let picked_up = tasks.create_task(&TaskRequest::new("picked up", 0)).unwrap();

    owners
        .replace_owner(
            alice.uuid,
            &OwnerReplaceRequest {
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                pending_tasks: vec![kept.uuid, picked_up.uuid],
            },
        )
        .unwrap();

    let dropped_now = tasks.get_task(dropped.uuid).unwrap().unwrap();
    assert_eq!(dropped_now.assigned_owner, None);
    assert_eq!(dropped_now.assigned_owner_name, UNASSIGNED_NAME);

    for id in [kept.uuid, picked_up.uuid] {
        let task = tasks.get_task(id).unwrap().unwrap();
        assert_eq!(task.assigned_owner, Some(alice.uuid));
        assert_eq!(task.assigned_owner_name, "Alice");
    }
    assert_eq!(
        pending_of(&owners, alice.uuid),
        BTreeSet::from([kept.uuid, picked_up.uuid])
    );
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn owner_replace_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let t1 = make_assigned_task(&tasks, "T1", alice.uuid);
    let t2 = tasks.create_task(&TaskRequest::new("T2", 0)).unwrap();

    let request = OwnerReplaceRequest {
        name: "Alice".to_string(),
        email: "a@x.com".to_string(),
        pending_tasks: vec![t1.uuid, t2.uuid, t2.uuid],
    };

    owners.replace_owner(alice.uuid, &request).unwrap();
    let first_tasks: Vec<_> = [t1.uuid, t2.uuid]
        .iter()
        .map(|id| tasks.get_task(*id).unwrap().unwrap())
        .collect();
    let first_pending = pending_of(&owners, alice.uuid);

    owners.replace_owner(alice.uuid, &request).unwrap();
    let second_tasks: Vec<_> = [t1.uuid, t2.uuid]
        .iter()
        .map(|id| tasks.get_task(*id).unwrap().unwrap())
        .collect();

    assert_eq!(first_tasks, second_tasks);
    assert_eq!(pending_of(&owners, alice.uuid), first_pending);
    assert_eq!(first_pending, BTreeSet::from([t1.uuid, t2.uuid]));
}

#[test]
fn owner_replace_records_unknown_ids_verbatim() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let ghost = Uuid::new_v4();

    owners
        .replace_owner(
            alice.uuid,
            &OwnerReplaceRequest {
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                pending_tasks: vec![ghost],
            },
        )
        .unwrap();

    // The unknown id updates zero task rows but is recorded as supplied.
    assert_eq!(pending_of(&owners, alice.uuid), BTreeSet::from([ghost]));
    assert_eq!(tasks.count_tasks(&TaskFilter::default()).unwrap(), 0);

    // A later replacement with a real set heals the latent entry.
    let real = make_assigned_task(&tasks, "real", alice.uuid);
    owners
        .replace_owner(
            alice.uuid,
            &OwnerReplaceRequest {
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                pending_tasks: vec![real.uuid],
            },
        )
        .unwrap();
    assert_eq!(pending_of(&owners, alice.uuid), BTreeSet::from([real.uuid]));
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn owner_rename_refreshes_assigned_name_caches() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let task = make_assigned_task(&tasks, "T1", alice.uuid);

    owners
        .replace_owner(
            alice.uuid,
            &OwnerReplaceRequest {
                name: "Alicia".to_string(),
                email: "a@x.com".to_string(),
                pending_tasks: vec![task.uuid],
            },
        )
        .unwrap();

    let refreshed = tasks.get_task(task.uuid).unwrap().unwrap();
    assert_eq!(refreshed.assigned_owner, Some(alice.uuid));
    assert_eq!(refreshed.assigned_owner_name, "Alicia");
}

#[test]
fn owner_replace_can_claim_tasks_from_another_owner() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let bob = make_owner(&owners, "Bob", "b@x.com");
    let task = make_assigned_task(&tasks, "contested", alice.uuid);

    owners
        .replace_owner(
            bob.uuid,
            &OwnerReplaceRequest {
                name: "Bob".to_string(),
                email: "b@x.com".to_string(),
                pending_tasks: vec![task.uuid],
            },
        )
        .unwrap();

    let claimed = tasks.get_task(task.uuid).unwrap().unwrap();
    assert_eq!(claimed.assigned_owner, Some(bob.uuid));
    assert_eq!(claimed.assigned_owner_name, "Bob");
    assert_eq!(pending_of(&owners, bob.uuid), BTreeSet::from([task.uuid]));

    // The previous owner's stale entry survives until their own record is
    // replaced; a full replacement recomputed from scratch heals it.
    assert_eq!(pending_of(&owners, alice.uuid), BTreeSet::from([task.uuid]));
    owners
        .replace_owner(
            alice.uuid,
            &OwnerReplaceRequest {
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                pending_tasks: Vec::new(),
            },
        )
        .unwrap();
    assert!(pending_of(&owners, alice.uuid).is_empty());

    let still_bobs = tasks.get_task(task.uuid).unwrap().unwrap();
    assert_eq!(still_bobs.assigned_owner, Some(bob.uuid));
    assert_mirror_consistent(&tasks, &owners);
}

#[test]
fn invariant_holds_after_mixed_operation_sequence() {
    let conn = open_db_in_memory().unwrap();
    let (tasks, owners) = services(&conn);

    let alice = make_owner(&owners, "Alice", "a@x.com");
    let bob = make_owner(&owners, "Bob", "b@x.com");

    let t1 = make_assigned_task(&tasks, "t1", alice.uuid);
    let t2 = make_assigned_task(&tasks, "t2", alice.uuid);
    let t3 = make_assigned_task(&tasks, "t3", bob.uuid);
    let t4 = tasks.create_task(&TaskRequest::new("t4", 0)).unwrap();
    assert_mirror_consistent(&tasks, &owners);

    // Move t1 to Bob, complete t2, assign t4 to Alice.
    let mut request = replace_request(&t1);
    request.assigned_owner = Some(bob.uuid);
    tasks.replace_task(t1.uuid, &request).unwrap();

    let mut request = replace_request(&t2);
    request.completed = true;
    tasks.replace_task(t2.uuid, &request).unwrap();

    let mut request = replace_request(&t4);
    request.assigned_owner = Some(alice.uuid);
    tasks.replace_task(t4.uuid, &request).unwrap();
    assert_mirror_consistent(&tasks, &owners);

    // Bob hands everything back through a full replacement, then leaves.
    owners
        .replace_owner(
            bob.uuid,
            &OwnerReplaceRequest {
                name: "Bob".to_string(),
                email: "b@x.com".to_string(),
                pending_tasks: Vec::new(),
            },
        )
        .unwrap();
    assert_mirror_consistent(&tasks, &owners);

    owners.delete_owner(bob.uuid).unwrap();
    assert_mirror_consistent(&tasks, &owners);

    tasks.delete_task(t3.uuid).unwrap();
    tasks.delete_task(t4.uuid).unwrap();
    assert_mirror_consistent(&tasks, &owners);

    assert_eq!(pending_of(&owners, alice.uuid), BTreeSet::new());
    let t1_now = tasks.get_task(t1.uuid).unwrap().unwrap();
    assert_eq!(t1_now.assigned_owner, None);
}

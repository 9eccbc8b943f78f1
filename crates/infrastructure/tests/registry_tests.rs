use diesel::prelude::*;
use domain::{
    DomainError, FileDeclaration, FileMeta, RegistryRepository, TrackerService,
};
use infrastructure::database::peers;
use infrastructure::{Database, SqliteRegistryRepository};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (tempfile::TempDir, Database, SqliteRegistryRepository) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("registry.db");
    let database = Database::new(db_path.to_str().unwrap());
    database.run_migrations().unwrap();
    let repository = SqliteRegistryRepository::new(database.get_pool().clone());
    (dir, database, repository)
}

fn meta(file_name: &str, file_hash: &str, total_pieces: i32) -> FileMeta {
    FileMeta::new(file_name.to_string(), file_hash.to_string(), 512, total_pieces)
}

fn hashes(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("piecehash{i}")).collect()
}

fn declaration(file_hash: &str, pieces: &[u32]) -> FileDeclaration {
    FileDeclaration {
        file_hash: file_hash.to_string(),
        pieces: pieces.to_vec(),
    }
}

#[tokio::test]
async fn duplicate_registration_returns_the_original_record() {
    let (_dir, _db, repo) = setup();

    let first = repo
        .register_file(&meta("a.txt", "abc123", 3), &hashes(3))
        .await
        .unwrap();
    let second = repo
        .register_file(&meta("a-renamed.txt", "abc123", 3), &hashes(3))
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.file.id, second.file.id);
    assert_eq!(second.file.file_name, "a.txt");

    let listing = repo.list_files().await.unwrap();
    assert_eq!(listing.len(), 1);
}

#[tokio::test]
async fn registered_piece_hashes_come_back_with_the_holders() {
    let (_dir, _db, repo) = setup();

    let piece_hashes = hashes(2);
    repo.register_file(&meta("a.txt", "abc123", 2), &piece_hashes)
        .await
        .unwrap();

    let holders = repo.piece_holders("abc123").await.unwrap();
    assert_eq!(holders.piece_hashes.len(), 2);
    assert_eq!(holders.piece_hashes[&0], piece_hashes[0]);
    assert_eq!(holders.piece_hashes[&1], piece_hashes[1]);
}

#[tokio::test]
async fn announce_with_an_unknown_hash_commits_nothing() {
    let (_dir, _db, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 3), &hashes(3))
        .await
        .unwrap();

    let err = repo
        .record_announce(
            "10.0.0.1",
            7000,
            &[
                declaration("known", &[0, 1]),
                declaration("unknown", &[0]),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::FileNotFoundByHash(hash) if hash == "unknown"));

    // The valid declaration must have rolled back with the bad one.
    let holders = repo.piece_holders("known").await.unwrap();
    assert!(holders.holders.is_empty());
}

#[tokio::test]
async fn announce_rejects_out_of_range_piece_index() {
    let (_dir, _db, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 3), &hashes(3))
        .await
        .unwrap();

    let err = repo
        .record_announce("10.0.0.1", 7000, &[declaration("known", &[0, 3])])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(_)));

    let holders = repo.piece_holders("known").await.unwrap();
    assert!(holders.holders.is_empty());
}

#[tokio::test]
async fn announce_rejects_indices_that_overflow_the_column_type() {
    let (_dir, _db, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 2), &hashes(2))
        .await
        .unwrap();

    // 2^31 wraps to i32::MIN under a plain cast and would sail past a
    // comparison done in i32.
    let err = repo
        .record_announce("10.0.0.1", 7000, &[declaration("known", &[2_147_483_648])])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(_)));

    let holders = repo.piece_holders("known").await.unwrap();
    assert!(holders.holders.is_empty());
}

#[tokio::test]
async fn concurrent_registrations_of_one_hash_create_a_single_file() {
    let (_dir, _db, repo) = setup();
    let repo = Arc::new(repo);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let repo = Arc::clone(&repo);
        tasks.push(tokio::spawn(async move {
            repo.register_file(&meta("a.txt", "abc123", 3), &hashes(3))
                .await
        }));
    }

    let mut created = 0;
    for task in tasks {
        let registered = task.await.unwrap().unwrap();
        if registered.created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(repo.list_files().await.unwrap().len(), 1);
    assert_eq!(repo.piece_holders("abc123").await.unwrap().piece_hashes.len(), 3);
}

#[tokio::test]
async fn repeated_announces_are_insert_or_ignore() {
    let (_dir, _db, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 3), &hashes(3))
        .await
        .unwrap();

    repo.record_announce("10.0.0.1", 7000, &[declaration("known", &[0, 1])])
        .await
        .unwrap();
    repo.record_announce("10.0.0.1", 7000, &[declaration("known", &[0, 1, 2])])
        .await
        .unwrap();

    let holders = repo.piece_holders("known").await.unwrap();
    assert_eq!(holders.holders.len(), 3);

    // One peer row, not one per announce.
    let ids: Vec<Option<i32>> = holders.holders.iter().map(|h| h.peer.id).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn availability_is_a_union_across_peers() {
    let (_dir, _db, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 3), &hashes(3))
        .await
        .unwrap();
    repo.record_announce("10.0.0.1", 7000, &[declaration("known", &[0, 2])])
        .await
        .unwrap();
    repo.record_announce("10.0.0.2", 7001, &[declaration("known", &[1, 2])])
        .await
        .unwrap();

    let service = TrackerService::new(Arc::new(repo), None);
    let swarm = service.peers_for_piece("known").await.unwrap();

    assert_eq!(swarm.pieces[&0], vec!["10.0.0.1:7000".to_string()]);
    assert_eq!(swarm.pieces[&1], vec!["10.0.0.2:7001".to_string()]);
    let mut both = swarm.pieces[&2].clone();
    both.sort();
    assert_eq!(
        both,
        vec!["10.0.0.1:7000".to_string(), "10.0.0.2:7001".to_string()]
    );
}

#[tokio::test]
async fn announce_refreshes_last_active() {
    let (_dir, _db, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 1), &hashes(1))
        .await
        .unwrap();
    repo.record_announce("10.0.0.1", 7000, &[declaration("known", &[0])])
        .await
        .unwrap();
    let first = repo.piece_holders("known").await.unwrap().holders[0]
        .peer
        .last_active;

    tokio::time::sleep(Duration::from_millis(20)).await;
    repo.record_announce("10.0.0.1", 7000, &[])
        .await
        .unwrap();
    let second = repo.piece_holders("known").await.unwrap().holders[0]
        .peer
        .last_active;

    assert!(second > first);
}

#[tokio::test]
async fn stale_peers_are_dropped_from_swarm_results() {
    let (_dir, database, repo) = setup();

    repo.register_file(&meta("a.txt", "known", 2), &hashes(2))
        .await
        .unwrap();
    repo.record_announce("10.0.0.1", 7000, &[declaration("known", &[0])])
        .await
        .unwrap();
    repo.record_announce("10.0.0.2", 7001, &[declaration("known", &[1])])
        .await
        .unwrap();

    // Backdate the first peer beyond the activity window.
    let stale = (chrono::Utc::now() - chrono::Duration::hours(2)).naive_utc();
    let mut conn = database.get_pool().get().unwrap();
    diesel::update(peers::table.filter(peers::ip.eq("10.0.0.1")))
        .set(peers::last_active.eq(stale))
        .execute(&mut conn)
        .unwrap();

    let service = TrackerService::new(Arc::new(repo), Some(Duration::from_secs(30 * 60)));
    let swarm = service.peers_for_piece("known").await.unwrap();

    assert!(!swarm.pieces.contains_key(&0));
    assert_eq!(swarm.pieces[&1], vec!["10.0.0.2:7001".to_string()]);
}

#[tokio::test]
async fn unknown_hash_is_not_found() {
    let (_dir, _db, repo) = setup();
    let err = repo.piece_holders("nope").await.unwrap_err();
    assert!(matches!(err, DomainError::FileNotFoundByHash(_)));
}

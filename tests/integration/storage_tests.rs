//! Integration tests for the on-disk listing store
//!
//! These tests open real SQLite files in a temporary directory and check that
//! what one process writes is what the next one reads.

use job_harvest::storage::{open_storage, InsertOutcome, NewIdentity, NewListing, Storage};
use job_harvest::url::canonicalize_url;
use tempfile::TempDir;

fn listing(raw_url: &str, title: &str) -> NewListing {
    let url = canonicalize_url(raw_url, None, &[]).expect("valid listing URL");
    NewListing {
        platform: "LinkedIn".to_string(),
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "São Paulo, Brasil".to_string(),
        work_format: "Remote".to_string(),
        url: url.to_string(),
    }
}

#[test]
fn test_listings_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("harvest.db");

    {
        let mut storage = open_storage(&db_path).unwrap();
        let first = storage
            .insert_listing(&listing(
                "https://www.linkedin.com/jobs/view/101/?refId=a&trackingId=b",
                "Engineer",
            ))
            .unwrap();
        assert!(first.is_inserted());
        storage
            .insert_listing(&listing("https://www.linkedin.com/jobs/view/102/", "Analyst"))
            .unwrap();
    }

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 2);

    let stored = storage
        .get_listing_by_url("https://www.linkedin.com/jobs/view/101")
        .unwrap()
        .expect("listing persisted");
    assert_eq!(stored.title, "Engineer");
    assert_eq!(stored.work_format, "Remote");
    assert!(!stored.processed);
}

#[test]
fn test_dedup_holds_across_processes() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    {
        let mut storage = open_storage(&db_path).unwrap();
        storage
            .insert_listing(&listing(
                "https://www.linkedin.com/jobs/view/7/?trackingId=first",
                "Engineer",
            ))
            .unwrap();
    }

    // Same listing seen again with different tracking parameters
    let mut storage = open_storage(&db_path).unwrap();
    let again = listing(
        "https://www.linkedin.com/jobs/view/7/?trackingId=second#top",
        "Engineer (reposted)",
    );
    assert!(storage.listing_exists(&again.url).unwrap());
    assert_eq!(storage.insert_listing(&again).unwrap(), InsertOutcome::Duplicate);
    assert_eq!(storage.count_listings().unwrap(), 1);

    let stored = storage.get_listing_by_url(&again.url).unwrap().unwrap();
    assert_eq!(stored.title, "Engineer");
}

#[test]
fn test_processed_flag_persists() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    {
        let mut storage = open_storage(&db_path).unwrap();
        for id in 1..=3 {
            storage
                .insert_listing(&listing(
                    &format!("https://www.linkedin.com/jobs/view/{}", id),
                    "Engineer",
                ))
                .unwrap();
        }
        let oldest = storage.get_unprocessed_listings(1).unwrap();
        storage.mark_listing_processed(oldest[0].id).unwrap();
    }

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_unprocessed_listings().unwrap(), 2);

    let pending = storage.get_unprocessed_listings(10).unwrap();
    let urls: Vec<_> = pending.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.linkedin.com/jobs/view/2",
            "https://www.linkedin.com/jobs/view/3"
        ]
    );
}

#[test]
fn test_session_artifact_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    let identity_id = {
        let mut storage = open_storage(&db_path).unwrap();
        let id = storage
            .create_identity(&NewIdentity {
                name: "Bot".to_string(),
                email: "bot@example.com".to_string(),
                encrypted_password: vec![1, 2, 3],
                profile: None,
            })
            .unwrap();
        storage
            .save_session_artifact(id, "LinkedIn", b"old cookies")
            .unwrap();
        storage
            .save_session_artifact(id, "LinkedIn", b"new cookies")
            .unwrap();
        id
    };

    let storage = open_storage(&db_path).unwrap();
    let artifact = storage
        .load_session_artifact(identity_id, "LinkedIn")
        .unwrap()
        .expect("artifact persisted");
    assert_eq!(artifact.cookies, b"new cookies".to_vec());
    assert!(artifact.active);
    assert_eq!(storage.count_session_artifacts().unwrap(), 1);
}

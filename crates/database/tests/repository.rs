//! Storage tests against a real PostgreSQL.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p database -- --ignored`.
//! Every test labels its rows with a fresh tag, so tests can share one
//! database and run in parallel.

use configuration::DatabaseSettings;
use core_types::{
    Association, CoreError, ListRequest, NewShow, ShowFields, ShowId, ShowUpdate,
};
use database::{DbError, DbRepository, connect, reconciler, run_migrations};
use std::collections::BTreeSet;

async fn repository() -> DbRepository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at PostgreSQL");
    let settings = DatabaseSettings {
        url: Some(url),
        max_connections: 4,
        ..DatabaseSettings::default()
    };
    let pool = connect(&settings).await.expect("connect");
    run_migrations(&pool).await.expect("migrations");
    DbRepository::new(pool)
}

fn tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn new_show(show_type: &str, title: &str) -> NewShow {
    NewShow {
        fields: ShowFields::new(show_type, title),
        ..NewShow::default()
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn create_then_get_returns_the_stored_show() {
    let repo = repository().await;
    let t = tag();
    let mut show = new_show("TV Show", &format!("Welcome Back, Kotter {t}"));
    show.fields.country = "United States".to_string();
    show.fields.release_year = "1975".to_string();
    show.cast = set(&["John Travolta", "Gabe Kaplan", "Ron Palillo"]);
    show.listed_in = set(&["TV Shows"]);

    let created = repo.create(show).await.unwrap();
    assert!(!created.fields.date_added.is_empty());
    assert_eq!(created.uri, format!("/shows/{}", created.show_id));
    assert_eq!(created.cast, vec!["Gabe Kaplan", "John Travolta", "Ron Palillo"]);

    let fetched = repo.get(&created.show_id).await.unwrap();
    assert_eq!(fetched, created);

    repo.delete(&created.show_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn caller_supplied_id_is_kept_and_duplicates_write_nothing() {
    let repo = repository().await;
    let id = ShowId::new(format!("s-{}", tag()));

    let mut first = new_show("Movie", "First");
    first.show_id = Some(id.clone());
    first.cast = set(&["A"]);
    let created = repo.create(first).await.unwrap();
    assert_eq!(created.show_id, id);

    let mut second = new_show("Movie", "Second");
    second.show_id = Some(id.clone());
    second.cast = set(&["B"]);
    let err = repo.create(second).await.unwrap_err();
    assert!(matches!(err, DbError::DuplicateId(ref taken) if taken == id.as_str()));
    assert!(!err.is_retryable());

    let stored = repo.get(&id).await.unwrap();
    assert_eq!(stored.fields.title, "First");
    assert_eq!(stored.cast, vec!["A"]);

    repo.delete(&id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn patch_merges_scalars_but_replaces_associations() {
    let repo = repository().await;
    let mut show = new_show("Movie", "Original Title");
    show.fields.rating = "R".to_string();
    show.fields.director = "Someone".to_string();
    show.cast = set(&["Alice", "Bob"]);
    show.listed_in = set(&["Dramas", "Thrillers"]);
    let created = repo.create(show).await.unwrap();

    let update = ShowUpdate {
        fields: ShowFields {
            title: String::new(),
            rating: "PG".to_string(),
            ..ShowFields::default()
        },
        cast: set(&["Bob", "Carol"]),
        listed_in: BTreeSet::new(),
    };
    let patched = repo.patch(&created.show_id, update).await.unwrap();

    assert_eq!(patched.fields.title, "Original Title");
    assert_eq!(patched.fields.director, "Someone");
    assert_eq!(patched.fields.rating, "PG");
    assert_eq!(patched.cast, vec!["Bob", "Carol"]);
    assert!(patched.listed_in.is_empty());

    let fetched = repo.get(&created.show_id).await.unwrap();
    assert_eq!(fetched, patched);

    repo.delete(&created.show_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn patch_of_missing_show_is_not_found() {
    let repo = repository().await;
    let err = repo
        .patch(&ShowId::new(tag()), ShowUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn removing_a_listing_leaves_other_shows_untouched() {
    let repo = repository().await;
    let drama = format!("Drama {}", tag());

    let mut a = new_show("Movie", "A");
    a.listed_in = set(&[&drama, "Comedies"]);
    let a = repo.create(a).await.unwrap();

    let mut b = new_show("Movie", "B");
    b.listed_in = set(&[&drama]);
    let b = repo.create(b).await.unwrap();

    let update = ShowUpdate {
        listed_in: set(&["Comedies"]),
        ..ShowUpdate::default()
    };
    repo.patch(&a.show_id, update).await.unwrap();

    assert_eq!(repo.get(&a.show_id).await.unwrap().listed_in, vec!["Comedies"]);
    assert_eq!(repo.get(&b.show_id).await.unwrap().listed_in, vec![drama.clone()]);

    repo.delete(&a.show_id).await.unwrap();
    repo.delete(&b.show_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn reconciling_the_same_set_twice_changes_nothing_the_second_time() {
    let repo = repository().await;
    let created = repo.create(new_show("Movie", "Idempotent")).await.unwrap();
    let desired = set(&["X", "Y", "Z"]);

    let mut tx = repo.pool().begin().await.unwrap();
    let first = reconciler::sync(&mut tx, &created.show_id, Association::Cast, &desired)
        .await
        .unwrap();
    assert_eq!(first.to_add, desired);
    let second = reconciler::sync(&mut tx, &created.show_id, Association::Cast, &desired)
        .await
        .unwrap();
    assert!(second.is_empty());
    tx.commit().await.unwrap();

    let stored = repo.get(&created.show_id).await.unwrap();
    assert_eq!(stored.cast, vec!["X", "Y", "Z"]);

    repo.delete(&created.show_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn reconcile_rejects_unknown_show_before_writing() {
    let repo = repository().await;
    let mut tx = repo.pool().begin().await.unwrap();
    let err = reconciler::reconcile(
        &mut tx,
        &ShowId::new(tag()),
        Association::ListedIn,
        &BTreeSet::new(),
        &set(&["Dramas"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn abandoned_transaction_leaves_no_partial_delta() {
    let repo = repository().await;
    let mut show = new_show("Movie", "Rollback");
    show.cast = set(&["Keep"]);
    let created = repo.create(show).await.unwrap();

    {
        let mut tx = repo.pool().begin().await.unwrap();
        reconciler::sync(&mut tx, &created.show_id, Association::Cast, &set(&["Other"]))
            .await
            .unwrap();
        let failed = sqlx::query("SELECT no_such_column FROM shows")
            .execute(&mut *tx)
            .await;
        assert!(failed.is_err());
        // dropped without commit
    }

    assert_eq!(repo.get(&created.show_id).await.unwrap().cast, vec!["Keep"]);
    repo.delete(&created.show_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn get_of_missing_show_is_not_found() {
    let repo = repository().await;
    let err = repo.get(&ShowId::new(tag())).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn delete_is_idempotent() {
    let repo = repository().await;
    let created = repo.create(new_show("Movie", "Short-lived")).await.unwrap();
    repo.delete(&created.show_id).await.unwrap();
    repo.delete(&created.show_id).await.unwrap();
    assert!(matches!(
        repo.get(&created.show_id).await,
        Err(DbError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn invalid_sort_field_is_rejected() {
    let repo = repository().await;
    let request = ListRequest {
        sort: vec!["not_a_field".to_string()],
        ..ListRequest::default()
    };
    let err = repo.list(&request).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidField(CoreError::InvalidSortField(_))
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn pages_match_a_bytewise_sort_of_the_filtered_set() {
    let repo = repository().await;
    let show_type = format!("Type {}", tag());
    let prefixes = ["b", "A", "a", "Z", "_", "é"];

    let mut ids = Vec::new();
    let mut titles = Vec::new();
    for i in 0..50 {
        let title = format!("{} {:02}", prefixes[i % prefixes.len()], (i * 37) % 50);
        let created = repo.create(new_show(&show_type, &title)).await.unwrap();
        ids.push(created.show_id);
        titles.push(title);
    }
    titles.sort();

    let mut request = ListRequest::default();
    request.filters.insert("type".to_string(), show_type.clone());

    let full: Vec<String> = repo
        .list(&request)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.fields.title)
        .collect();
    assert_eq!(full, titles);

    request.limit = 10;
    request.offset = 5;
    let page: Vec<String> = repo
        .list(&request)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.fields.title)
        .collect();
    assert_eq!(page, titles[5..15].to_vec());

    let again: Vec<String> = repo
        .list(&request)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.fields.title)
        .collect();
    assert_eq!(again, page);

    request.offset = 45;
    assert_eq!(repo.list(&request).await.unwrap().len(), 5);

    for id in &ids {
        repo.delete(id).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn association_filter_matches_substring_of_any_value() {
    let repo = repository().await;
    let t = tag();

    let mut hit = new_show("Movie", "Hit");
    hit.listed_in = set(&[&format!("International Dramas {t}"), "Comedies"]);
    let hit = repo.create(hit).await.unwrap();

    let mut miss = new_show("Movie", "Miss");
    miss.listed_in = set(&["Comedies"]);
    let miss = repo.create(miss).await.unwrap();

    let mut request = ListRequest::default();
    request
        .filters
        .insert("listed_in".to_string(), format!("Dramas {t}"));
    let found = repo.list(&request).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].show_id, hit.show_id);

    repo.delete(&hit.show_id).await.unwrap();
    repo.delete(&miss.show_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn summary_tracks_creates_and_deletes() {
    let repo = repository().await;
    let t = tag();
    let show_type = format!("Type {t}");
    let x = format!("X {t}");
    let y = format!("Y {t}");

    let before = repo.summarize().await.unwrap();

    let mut show = new_show(&show_type, "Counted");
    show.listed_in = set(&[&x, &y]);
    let created = repo.create(show).await.unwrap();

    let summary = repo.summarize().await.unwrap();
    assert_eq!(summary.total_by_listing.get(&x), Some(&1));
    assert_eq!(summary.total_by_listing.get(&y), Some(&1));
    assert_eq!(summary.total_by_type.get(&show_type), Some(&1));
    assert!(summary.total >= 1);
    assert!(before.total_by_type.get(&show_type).is_none());

    repo.delete(&created.show_id).await.unwrap();

    let after = repo.summarize().await.unwrap();
    assert!(after.total_by_type.get(&show_type).is_none());
    assert!(after.total_by_listing.get(&x).is_none());
    assert!(after.total_by_listing.get(&y).is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn alive_reports_reachable_database() {
    let repo = repository().await;
    assert!(repo.alive().await);
}

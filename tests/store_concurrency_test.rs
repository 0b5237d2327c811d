use local_notes::db::Pool;
use local_notes::notes::store;
use local_notes::notes::types::{NoteUpdate, Tenant};
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_keep_every_fragment() {
    let tmp = TempDir::new().unwrap();
    let pool = Pool::open(tmp.path().join("notes.db"), 4).unwrap();
    let tenant = Tenant::Anonymous;

    let note = pool
        .run(move |conn| store::create_note(conn, tenant, "log", "start"))
        .await
        .unwrap();
    let id = note.id;

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.run(move |conn| store::append_note(conn, tenant, id, &format!("fragment-{i}")))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let finished = pool.run(move |conn| store::get_note(conn, tenant, id)).await.unwrap();
    assert!(finished.content.starts_with("start"));
    for i in 0..8 {
        assert!(
            finished.content.contains(&format!("fragment-{i}")),
            "lost fragment-{i}: {}",
            finished.content
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tenants_do_not_interleave() {
    let tmp = TempDir::new().unwrap();
    let pool = Pool::open(tmp.path().join("notes.db"), 4).unwrap();

    let mut handles = Vec::new();
    for user in 1..=4_i64 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let tenant = Tenant::User(user);
            for n in 0..5 {
                pool.run(move |conn| store::create_note(conn, tenant, &format!("u{user}-{n}"), ""))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for user in 1..=4_i64 {
        let tenant = Tenant::User(user);
        let notes = pool.run(move |conn| store::list_notes(conn, tenant)).await.unwrap();
        assert_eq!(notes.len(), 5);
        assert!(notes.iter().all(|n| n.title.starts_with(&format!("u{user}-"))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn updates_and_appends_on_one_note_serialize() {
    let tmp = TempDir::new().unwrap();
    let pool = Pool::open(tmp.path().join("notes.db"), 4).unwrap();
    let tenant = Tenant::User(1);

    let id = pool
        .run(move |conn| store::create_note(conn, tenant, "shared", "start"))
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for i in 0..12 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            if i % 3 == 0 {
                let update = NoteUpdate {
                    content: Some(format!("base-{i}:")),
                    ..NoteUpdate::default()
                };
                pool.run(move |conn| store::update_note(conn, tenant, id, &update))
                    .await
                    .unwrap()
                    .content
            } else {
                let fragment = format!("frag-{i}:");
                let note = pool
                    .run({
                        let fragment = fragment.clone();
                        move |conn| store::append_note(conn, tenant, id, &fragment)
                    })
                    .await
                    .unwrap();
                assert!(note.content.ends_with(&fragment), "append lost its own text: {}", note.content);
                note.content
            }
        }));
    }
    let mut seen = Vec::new();
    for handle in handles {
        seen.push(handle.await.unwrap());
    }

    let finished = pool
        .run(move |conn| store::get_note(conn, tenant, id))
        .await
        .unwrap()
        .content;

    // The last writer wins wholesale: every write that landed on top of the
    // final base must still be there, and nothing appears twice.
    let base = finished.split("\n\n").next().unwrap().to_string();
    assert!(base.starts_with("base-"), "{finished}");
    let on_final_base: Vec<&String> = seen.iter().filter(|c| c.starts_with(&base)).collect();
    let longest = on_final_base.iter().map(|c| c.len()).max().unwrap();
    assert_eq!(finished.len(), longest, "final state is not the last committed write");

    for content in on_final_base {
        for piece in content.split("\n\n") {
            assert!(finished.contains(piece), "lost {piece}: {finished}");
        }
    }
    let pieces: Vec<&str> = finished.split("\n\n").collect();
    let mut unique = pieces.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(pieces.len(), unique.len(), "duplicated fragment: {finished}");
}

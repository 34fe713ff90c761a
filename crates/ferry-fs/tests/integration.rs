use ferry_fs::{PartialFile, ensure_dir};
use tempfile::tempdir;

#[tokio::test]
async fn test_commit_replaces_existing_destination() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("existing.txt");
    std::fs::write(&dest, "previous").unwrap();

    let mut partial = PartialFile::create(&dest, ".existing.part").await.unwrap();
    partial.write(b"new content").await.unwrap();
    partial.commit().await.unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new content");
}

#[tokio::test]
async fn test_create_builds_missing_parents() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("x").join("y").join("z.bin");

    let partial = PartialFile::create(&dest, ".z.part").await.unwrap();

    assert!(dir.path().join("x").join("y").is_dir());
    assert!(partial.path().exists());
    assert_eq!(partial.destination(), dest);
}

#[tokio::test]
async fn test_commit_after_partial_vanished_reports_rename() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("missing.bin");
    let partial = PartialFile::create(&dest, ".missing.part").await.unwrap();
    std::fs::remove_file(partial.path()).unwrap();

    let err = partial.commit().await.unwrap_err();
    assert!(matches!(err, ferry_fs::Error::Rename { .. }));
    assert_eq!(err.path(), dest);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_create_in_file_parent_reports_create_dir() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let err = PartialFile::create(blocker.join("out.bin"), ".out.part")
        .await
        .unwrap_err();
    assert!(matches!(err, ferry_fs::Error::CreateDir { .. }));
}

#[tokio::test]
async fn test_ensure_dir_on_existing_dir() {
    let dir = tempdir().unwrap();
    ensure_dir(dir.path()).await.unwrap();
}

// File store persistence tests through the document mapper.
use colmap::api::{
    CodecRegistry, Document, ErrorKind, FileStore, Mapper, MapperConfig, SchemaFile, Value,
};
use serde_json::json;

fn schema() -> SchemaFile {
    SchemaFile::from_json_str(
        &json!({
            "collection": "users",
            "namespace": "app",
            "fields": [
                {"name": "id", "type": "text", "role": "key"},
                {"name": "name", "type": "text"},
                {"name": "visits", "type": "int64"}
            ]
        })
        .to_string(),
    )
    .expect("schema")
}

fn mapper(path: &std::path::Path) -> Mapper<Document, FileStore> {
    Mapper::with_declaration(
        &schema().to_decl(),
        &MapperConfig::default(),
        CodecRegistry::standard(),
        FileStore::open(path),
    )
    .expect("mapper")
}

#[test]
fn rows_survive_reopening_the_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("store.json");

    let writer = mapper(&path);
    let doc = Document::new()
        .with("id", "u1")
        .with("name", "Ada")
        .with("visits", 3_i64);
    writer.insert(&doc).expect("insert");
    drop(writer);

    let reader = mapper(&path);
    let loaded = reader.get("u1").expect("get").expect("present");
    assert_eq!(loaded.get("name"), Some(&Value::Text("Ada".to_string())));
    assert_eq!(loaded.get("visits"), Some(&Value::Int64(3)));

    reader.delete_key("u1").expect("delete");
    assert!(mapper(&path).get("u1").expect("get").is_none());
}

#[test]
fn namespaces_share_one_file_without_mixing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("store.json");
    let decl = schema().to_decl();
    let staging: Mapper<Document, FileStore> = Mapper::with_declaration(
        &decl,
        &MapperConfig::default().with_namespace("staging"),
        CodecRegistry::standard(),
        FileStore::open(&path),
    )
    .expect("mapper");
    staging
        .insert(&Document::new().with("id", "u1").with("name", "Staged"))
        .expect("insert");

    assert!(mapper(&path).get("u1").expect("get").is_none());
    assert!(staging.get("u1").expect("get").is_some());
}

#[test]
fn corrupt_snapshot_is_a_store_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("store.json");
    std::fs::write(&path, b"{ not json").expect("write");

    let err = mapper(&path).get("u1").err().expect("corrupt");
    assert_eq!(err.kind(), ErrorKind::Store);
    let cause = std::error::Error::source(&err).expect("cause").to_string();
    assert!(cause.starts_with("Corrupt"), "unexpected cause: {cause}");
}

#[test]
fn missing_parent_directory_is_a_store_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nope").join("store.json");
    let err = mapper(&path)
        .insert(&Document::new().with("id", "u1"))
        .expect_err("no directory");
    assert_eq!(err.kind(), ErrorKind::Store);
}

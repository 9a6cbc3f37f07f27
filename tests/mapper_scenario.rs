// Scenario tests for the access operations through the public API.
use colmap::api::{
    CodecRegistry, Column, Declared, EnumDecl, Error, ErrorKind, FieldDecl, FieldType, Mapper,
    MapperConfig, MemoryStore, NamedEnum, Record, RecordDecl, RowMutation, SerializationPolicy,
    SlicePredicate, StoreClient, SuperColumn, Value, unknown_field,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Role {
    Admin,
    #[default]
    Member,
}

impl NamedEnum for Role {
    fn decl() -> EnumDecl {
        EnumDecl::new("Role", ["ADMIN", "MEMBER"])
    }

    fn name(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ADMIN" => Some(Role::Admin),
            "MEMBER" => Some(Role::Member),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct User {
    id: String,
    name: String,
    role: Role,
}

impl User {
    fn new(id: &str, name: &str, role: Role) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role,
        }
    }
}

impl Record for User {
    fn instantiate() -> Result<Self, Error> {
        Ok(Self::default())
    }

    fn read_field(&self, name: &str) -> Result<Value, Error> {
        match name {
            "id" => Ok(self.id.clone().into()),
            "name" => Ok(self.name.clone().into()),
            "role" => Ok(Value::from_enum(self.role)),
            other => Err(unknown_field(other)),
        }
    }

    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        match name {
            "id" => self.id = value.into_field()?,
            "name" => self.name = value.into_field()?,
            "role" => self.role = value.into_enum()?.unwrap_or_default(),
            other => return Err(unknown_field(other)),
        }
        Ok(())
    }
}

impl Declared for User {
    fn declare() -> RecordDecl {
        RecordDecl::new("users", "app")
            .field(FieldDecl::new("id", FieldType::Text).key())
            .field(FieldDecl::new("name", FieldType::Text))
            .field(FieldDecl::new("role", FieldType::enumeration::<Role>()))
    }
}

fn users(store: &MemoryStore) -> Mapper<User, MemoryStore> {
    Mapper::new(&MapperConfig::default(), CodecRegistry::standard(), store.clone()).expect("mapper")
}

#[test]
fn user_lifecycle() {
    let store = MemoryStore::new();
    let mapper = users(&store);

    mapper.insert(&User::new("u1", "Ada", Role::Admin)).expect("insert u1");
    mapper.insert(&User::new("u2", "Bob", Role::Member)).expect("insert u2");

    let ada = mapper.get("u1").expect("get").expect("u1 present");
    assert_eq!(ada, User::new("u1", "Ada", Role::Admin));
    assert!(mapper.get("ghost").expect("get ghost").is_none());

    let range = mapper.get_range("u1", "u2", 10).expect("range");
    let ids = range.iter().map(|user| user.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["u1", "u2"]);

    mapper.delete(&ada).expect("delete");
    assert!(mapper.get("u1").expect("get after delete").is_none());
    let range = mapper.get_range("u1", "u2", 10).expect("range after delete");
    assert_eq!(range, vec![User::new("u2", "Bob", Role::Member)]);
}

#[test]
fn enum_is_stored_by_member_name() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    mapper.insert(&User::new("u1", "Ada", Role::Admin)).expect("insert");

    let columns = store
        .execute(mapper.endpoint(), |keyspace| {
            keyspace.get_slice(
                "u1",
                "users",
                &SlicePredicate::new(vec![b"role".to_vec()]),
            )
        })
        .expect("raw read");
    assert_eq!(columns[0].value, b"ADMIN");
}

#[test]
fn one_insert_stamps_every_column_alike() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    let read_columns = || {
        store
            .execute(mapper.endpoint(), |keyspace| {
                keyspace.get_slice(
                    "u1",
                    "users",
                    &SlicePredicate::new(vec![b"name".to_vec(), b"role".to_vec()]),
                )
            })
            .expect("raw read")
    };

    mapper.insert(&User::new("u1", "Ada", Role::Admin)).expect("insert");
    let first = read_columns();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].timestamp, first[1].timestamp);

    std::thread::sleep(std::time::Duration::from_millis(2));
    mapper.insert(&User::new("u1", "Ada", Role::Member)).expect("second insert");
    let second = read_columns();
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].timestamp, second[1].timestamp);
    assert!(second[0].timestamp >= first[0].timestamp);
    assert_eq!(mapper.get("u1").expect("get").expect("u1").role, Role::Member);
}

#[test]
fn get_many_skips_absent_rows_and_orders_by_key() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    for (id, name) in [("u3", "Cy"), ("u1", "Ada"), ("u2", "Bob")] {
        mapper.insert(&User::new(id, name, Role::Member)).expect("insert");
    }
    let found = mapper.get_many(["u3", "ghost", "u1"]).expect("get_many");
    let ids = found.iter().map(|user| user.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["u1", "u3"]);
}

#[test]
fn range_respects_limit_and_open_bounds() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    for id in ["a", "b", "c", "d"] {
        mapper.insert(&User::new(id, id, Role::Member)).expect("insert");
    }
    let first_two = mapper.get_range("", "", 2).expect("range");
    assert_eq!(first_two.len(), 2);
    assert_eq!(first_two[0].id, "a");
    let tail = mapper.get_range("c", "", 10).expect("range");
    let ids = tail.iter().map(|user| user.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["c", "d"]);
    assert!(mapper.get_range("x", "z", 10).expect("empty range").is_empty());
}

#[test]
fn missing_key_makes_no_store_call() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    let err = mapper
        .insert(&User::new("", "Nobody", Role::Member))
        .expect_err("missing key");
    assert_eq!(err.kind(), ErrorKind::MissingKey);
    let err = mapper
        .delete(&User::new("", "Nobody", Role::Member))
        .expect_err("missing key");
    assert_eq!(err.kind(), ErrorKind::MissingKey);
    assert_eq!(store.executions(), 0);
}

#[test]
fn unknown_columns_are_tolerated_on_read() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    store
        .execute(mapper.endpoint(), |keyspace| {
            keyspace.batch_insert(
                "u9",
                "users",
                RowMutation::Columns(vec![
                    Column::new(&b"name"[..], &b"Legacy"[..], 1),
                    Column::new(&b"retired_field"[..], &b"\x00\x01"[..], 1),
                ]),
            )
        })
        .expect("raw insert");
    let user = mapper.get("u9").expect("get").expect("present");
    assert_eq!(user, User::new("u9", "Legacy", Role::Member));
}

#[test]
fn later_insert_overwrites_columns() {
    let store = MemoryStore::new();
    let mapper = users(&store);
    mapper.insert(&User::new("u1", "Ada", Role::Member)).expect("insert");
    std::thread::sleep(std::time::Duration::from_millis(2));
    mapper.insert(&User::new("u1", "Ada L.", Role::Admin)).expect("overwrite");
    let user = mapper.get("u1").expect("get").expect("present");
    assert_eq!(user, User::new("u1", "Ada L.", Role::Admin));
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Comment {
    post: String,
    comment_id: String,
    body: String,
}

impl Record for Comment {
    fn instantiate() -> Result<Self, Error> {
        Ok(Self::default())
    }

    fn read_field(&self, name: &str) -> Result<Value, Error> {
        match name {
            "post" => Ok(self.post.clone().into()),
            "comment_id" => Ok(self.comment_id.clone().into()),
            "body" => Ok(self.body.clone().into()),
            other => Err(unknown_field(other)),
        }
    }

    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        match name {
            "post" => self.post = value.into_field()?,
            "comment_id" => self.comment_id = value.into_field()?,
            "body" => self.body = value.into_field()?,
            other => return Err(unknown_field(other)),
        }
        Ok(())
    }
}

impl Declared for Comment {
    fn declare() -> RecordDecl {
        RecordDecl::new("comments", "app")
            .field(FieldDecl::new("post", FieldType::Text).key())
            .field(FieldDecl::new("comment_id", FieldType::Text).super_column())
            .field(FieldDecl::new("body", FieldType::Text))
    }
}

fn comment(id: &str, body: &str) -> Comment {
    Comment {
        post: "p1".to_string(),
        comment_id: id.to_string(),
        body: body.to_string(),
    }
}

#[test]
fn super_columns_group_records_under_one_row() {
    let store = MemoryStore::new();
    let mapper: Mapper<Comment, MemoryStore> =
        Mapper::new(&MapperConfig::default(), CodecRegistry::standard(), store.clone())
            .expect("mapper");
    mapper.insert(&comment("c1", "first")).expect("insert c1");
    mapper.insert(&comment("c2", "second")).expect("insert c2");
    mapper.insert(&comment("c3", "third")).expect("insert c3");

    let names = [Value::from("c3"), Value::from("c1"), Value::from("c9")];
    let found = mapper.get_super("p1", &names).expect("get_super");
    assert_eq!(found, vec![comment("c1", "first"), comment("c3", "third")]);

    let missing = mapper.get_super("p9", &names).expect("absent row");
    assert!(missing.is_empty());
}

#[test]
fn get_super_skips_inner_columns_with_undecodable_names() {
    let store = MemoryStore::new();
    let mapper: Mapper<Comment, MemoryStore> =
        Mapper::new(&MapperConfig::default(), CodecRegistry::standard(), store.clone())
            .expect("mapper");
    store
        .execute(mapper.endpoint(), |keyspace| {
            keyspace.batch_insert(
                "p1",
                "comments",
                RowMutation::SuperColumns(vec![SuperColumn {
                    name: b"c1".to_vec(),
                    columns: vec![
                        Column::new(&b"body"[..], &b"hello"[..], 1),
                        Column::new(&b"\xff\xfe"[..], &b"junk"[..], 1),
                    ],
                }]),
            )
        })
        .expect("raw insert");

    let found = mapper
        .get_super("p1", &[Value::from("c1")])
        .expect("get_super");
    assert_eq!(found, vec![comment("c1", "hello")]);
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Address {
    city: String,
    zip: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Customer {
    id: String,
    address: Option<Address>,
}

impl Record for Customer {
    fn instantiate() -> Result<Self, Error> {
        Ok(Self::default())
    }

    fn read_field(&self, name: &str) -> Result<Value, Error> {
        match name {
            "id" => Ok(self.id.clone().into()),
            "address" => match &self.address {
                Some(address) => Value::serialized("Address", address),
                None => Ok(Value::Null),
            },
            other => Err(unknown_field(other)),
        }
    }

    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        match name {
            "id" => self.id = value.into_field()?,
            "address" => self.address = value.into_serialized()?,
            other => return Err(unknown_field(other)),
        }
        Ok(())
    }
}

impl Declared for Customer {
    fn declare() -> RecordDecl {
        RecordDecl::new("customers", "app")
            .field(FieldDecl::new("id", FieldType::Text).key())
            .field(FieldDecl::new("address", FieldType::Serialized("Address".to_string())))
    }
}

#[test]
fn serialized_fields_need_an_opt_in() {
    let customer = Customer {
        id: "c1".to_string(),
        address: Some(Address {
            city: "Oslo".to_string(),
            zip: None,
        }),
    };

    let store = MemoryStore::new();
    let denied: Mapper<Customer, MemoryStore> =
        Mapper::new(&MapperConfig::default(), CodecRegistry::standard(), store.clone())
            .expect("mapper");
    let err = denied.insert(&customer).expect_err("denied");
    assert_eq!(err.kind(), ErrorKind::UnmappableType);
    assert_eq!(err.field(), Some("address"));
    assert_eq!(store.executions(), 0);

    let config = MapperConfig::default().with_serialization(SerializationPolicy::Allow);
    let allowed: Mapper<Customer, MemoryStore> =
        Mapper::new(&config, CodecRegistry::standard(), store.clone()).expect("mapper");
    allowed.insert(&customer).expect("insert");
    assert_eq!(allowed.get("c1").expect("get"), Some(customer));
}

#[test]
fn schema_errors_surface_at_construction() {
    struct Keyless;

    impl Record for Keyless {
        fn instantiate() -> Result<Self, Error> {
            Ok(Keyless)
        }

        fn read_field(&self, name: &str) -> Result<Value, Error> {
            Err(unknown_field(name))
        }

        fn write_field(&mut self, name: &str, _value: Value) -> Result<(), Error> {
            Err(unknown_field(name))
        }
    }

    let decl = RecordDecl::new("things", "app").field(FieldDecl::new("name", FieldType::Text));
    let err = Mapper::<Keyless, MemoryStore>::with_declaration(
        &decl,
        &MapperConfig::default(),
        CodecRegistry::standard(),
        MemoryStore::new(),
    )
    .err()
    .expect("schema error");
    assert_eq!(err.kind(), ErrorKind::Schema);
}

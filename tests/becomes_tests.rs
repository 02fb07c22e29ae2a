use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stimap::{
    Column, DataType, Hierarchy, MemoryStore, OneOf, Record, RecordMapper, RecordWriter,
    Required, Row, RowKey, RuleValidator, StiError, TableSchema, Value,
};

fn hierarchy() -> Arc<Hierarchy> {
    let hierarchy = Hierarchy::builder("animals", "Animal")
        .subtype("Dog", "Animal")
        .subtype("Cat", "Animal")
        .subtype("Robot", "Animal")
        .disable_sti("Robot")
        .build()
        .unwrap();
    Arc::new(hierarchy)
}

fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .create_table(TableSchema::new(
            "animals",
            vec![
                Column::new("id", DataType::Integer).primary_key(),
                Column::new("type", DataType::Text),
                Column::new("name", DataType::Text),
                Column::new("lives", DataType::Integer),
            ],
        ))
        .unwrap();
    for (kind, name) in [(None, "Generic"), (Some("Dog"), "Fido")] {
        let mut row = Row::new();
        row.insert("type".into(), Value::from(kind));
        row.insert("name".into(), Value::from(name));
        store.insert_row("animals", row).unwrap();
    }
    store
}

fn stored_type(store: &MemoryStore, id: i64) -> Value {
    store
        .rows("animals")
        .unwrap()
        .into_iter()
        .find(|row| row.get("id") == Some(&Value::Integer(id)))
        .and_then(|row| row.get("type").cloned())
        .unwrap_or(Value::Null)
}

fn load_dog(mapper: &RecordMapper) -> Record {
    mapper.find_by_key("Dog", 2).unwrap().unwrap()
}

/// Writer that only counts calls and forwards them.
struct CountingWriter {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
}

impl RecordWriter for CountingWriter {
    fn persist_update(&self, table: &str, key: &RowKey, changes: &Row) -> stimap::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.persist_update(table, key, changes)
    }

    fn persist_full_save(&self, table: &str, record: &Record) -> stimap::Result<Row> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.persist_full_save(table, record)
    }
}

#[test]
fn test_dog_becomes_cat() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());
    let dog = load_dog(&mapper);

    let cat = mapper.becomes(dog, "Cat", true).unwrap();
    assert_eq!(cat.entity(), "Cat");
    assert_eq!(cat.get("type"), Some(&Value::from("Cat")));
    assert_eq!(cat.get("name"), Some(&Value::from("Fido")));
    assert_eq!(cat.get("id"), Some(&Value::Integer(2)));
    assert!(!cat.is_new_record());
    assert!(!cat.is_dirty());

    assert_eq!(stored_type(&store, 2), Value::from("Cat"));
    assert_eq!(store.stats().updates, 1);
    assert!(mapper.find_by_key("Dog", 2).unwrap().is_none());
    assert_eq!(mapper.find_by_key("Cat", 2).unwrap().unwrap(), cat);
}

#[test]
fn test_converted_record_saves_as_update() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());
    let mut cat = mapper.becomes(load_dog(&mapper), "Cat", true).unwrap();

    cat.set("lives", 9);
    mapper.save(&mut cat).unwrap();
    assert_eq!(store.rows("animals").unwrap().len(), 2);
    assert_eq!(store.stats().inserts, 0);
    assert_eq!(store.stats().updates, 2);
}

#[test]
fn test_only_discriminator_column_is_written() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());
    let mut dog = load_dog(&mapper);
    dog.set("name", "Renamed");

    let cat = mapper.becomes(dog, "Cat", true).unwrap();
    assert_eq!(cat.dirty_attributes(), vec!["name"]);

    let stored = mapper.find_by_key("Cat", 2).unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&Value::from("Fido")));
}

#[test]
fn test_validation_failure_keeps_storage_and_source() {
    let store = store();
    let hierarchy = hierarchy();
    let validator = RuleValidator::new(hierarchy.clone()).rule("Cat", Required("lives".into()));
    let mapper =
        RecordMapper::with_store(hierarchy, store.clone()).with_validator(Arc::new(validator));

    let err = mapper.becomes(load_dog(&mapper), "Cat", true).unwrap_err();
    let (error, dog) = err.into_parts();
    match error {
        StiError::ConversionValidationFailed { entity, errors } => {
            assert_eq!(entity, "Cat");
            assert_eq!(errors.get("lives"), ["cannot be blank"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(dog.entity(), "Dog");
    assert_eq!(dog.get("type"), Some(&Value::from("Dog")));
    assert!(!dog.is_dirty());
    assert_eq!(stored_type(&store, 2), Value::from("Dog"));
    assert_eq!(store.stats().updates, 0);
}

#[test]
fn test_validation_runs_with_target_rules() {
    let store = store();
    let hierarchy = hierarchy();
    let validator = RuleValidator::new(hierarchy.clone())
        .rule("Animal", Required("name".into()))
        .rule("Cat", OneOf("lives".into(), vec![Value::Null, 7.into(), 9.into()]));
    let mapper =
        RecordMapper::with_store(hierarchy, store.clone()).with_validator(Arc::new(validator));

    let mut dog = load_dog(&mapper);
    dog.set("lives", 3);
    let err = mapper.becomes(dog, "Cat", true).unwrap_err();
    assert!(matches!(err.error, StiError::ConversionValidationFailed { .. }));

    let mut dog = *err.record;
    dog.set("lives", 9);
    let cat = mapper.becomes(dog, "Cat", true).unwrap();
    assert_eq!(cat.dirty_attributes(), vec!["lives"]);
}

#[test]
fn test_in_memory_conversion_never_writes() {
    let store = store();
    let writer = Arc::new(CountingWriter {
        inner: store.clone(),
        calls: AtomicUsize::new(0),
    });
    let mapper = RecordMapper::new(
        hierarchy(),
        store.clone(),
        store.clone(),
        writer.clone(),
        Arc::new(stimap::AcceptAll),
    );

    let cat = mapper.becomes(load_dog(&mapper), "Cat", false).unwrap();
    assert_eq!(cat.entity(), "Cat");
    assert_eq!(cat.get("type"), Some(&Value::from("Cat")));
    assert_eq!(cat.dirty_attributes(), vec!["type"]);
    assert_eq!(writer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(stored_type(&store, 2), Value::from("Dog"));

    let mut cat = cat;
    mapper.save(&mut cat).unwrap();
    assert_eq!(writer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stored_type(&store, 2), Value::from("Cat"));
}

#[test]
fn test_persistence_failure_rolls_back() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());
    store.fail_updates(true);

    let err = mapper.becomes(load_dog(&mapper), "Cat", true).unwrap_err();
    assert!(matches!(
        err.error,
        StiError::ConversionPersistenceFailed { ref entity, .. } if entity == "Cat"
    ));
    assert_eq!(err.record.entity(), "Dog");
    assert_eq!(err.record.get("type"), Some(&Value::from("Dog")));
    assert_eq!(stored_type(&store, 2), Value::from("Dog"));
}

#[test]
fn test_unsaved_record_cannot_be_persisted() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());
    let dog = Record::raw("Dog").with("name", "Stray");

    let err = mapper.becomes(dog, "Cat", true).unwrap_err();
    assert!(matches!(err.error, StiError::ConversionPersistenceFailed { .. }));
    assert_eq!(err.record.get("type"), None);
    assert_eq!(store.stats().updates, 0);
}

#[test]
fn test_invalid_targets_are_rejected() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());

    let err = mapper.becomes(load_dog(&mapper), "Horse", true).unwrap_err();
    assert!(matches!(
        err.error,
        StiError::ConversionTargetInvalid { ref from, ref to } if from == "Dog" && to == "Horse"
    ));

    let robot = Record::raw("Robot").with("name", "R2");
    let err = mapper.becomes(robot, "Cat", false).unwrap_err();
    assert!(matches!(err.error, StiError::ConversionTargetInvalid { .. }));
    assert_eq!(err.record.entity(), "Robot");
    assert_eq!(store.stats().updates, 0);
}

#[test]
fn test_becoming_root_clears_discriminator() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());

    let animal = mapper.becomes(load_dog(&mapper), "Animal", true).unwrap();
    assert_eq!(animal.entity(), "Animal");
    assert_eq!(animal.get("type"), Some(&Value::Null));
    assert_eq!(stored_type(&store, 2), Value::Null);
    assert_eq!(mapper.all(mapper.find("Animal").unwrap()).unwrap().len(), 2);
}

#[test]
fn test_becoming_same_type_succeeds() {
    let store = store();
    let mapper = RecordMapper::with_store(hierarchy(), store.clone());
    let dog = mapper.becomes(load_dog(&mapper), "Dog", true).unwrap();
    assert_eq!(dog.entity(), "Dog");
    assert_eq!(stored_type(&store, 2), Value::from("Dog"));
}

#[test]
fn test_become_error_converts_with_question_mark() {
    fn convert(mapper: &RecordMapper, dog: Record) -> stimap::Result<Record> {
        Ok(mapper.becomes(dog, "Unicorn", false)?)
    }

    let mapper = RecordMapper::with_store(hierarchy(), store());
    let err = convert(&mapper, Record::raw("Dog")).unwrap_err();
    assert!(err.to_string().contains("Can not become 'Unicorn'"));
}

#[test]
fn test_become_error_reports_cause_once() {
    use std::error::Error;

    let mapper = RecordMapper::with_store(hierarchy(), store());
    let err = mapper.becomes(Record::raw("Dog"), "Unicorn", false).unwrap_err();

    let outer = err.to_string();
    let cause = err.source().map(ToString::to_string).unwrap();
    assert_eq!(outer, "Record of 'Dog' could not be converted");
    assert!(cause.starts_with("Can not become 'Unicorn'"));
    assert!(!outer.contains(&cause));
}

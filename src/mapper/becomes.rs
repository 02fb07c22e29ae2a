use super::RecordMapper;
use crate::core::{BecomeError, Row, StiError, Value};
use crate::record::Record;
use tracing::{Level, event, info_span};

impl RecordMapper {
    /// Converts `record` into a record of `target` in the same hierarchy.
    ///
    /// The source record is consumed; use the returned one from now on. When
    /// `persist` is set, only the discriminator column of the stored row is
    /// updated and the persisted snapshot moves to the returned record, so a
    /// later save is an update. On failure the source comes back inside the
    /// error unchanged and nothing has been written.
    pub fn becomes(
        &self,
        record: Record,
        target: &str,
        persist: bool,
    ) -> std::result::Result<Record, BecomeError> {
        let span = info_span!("sti.becomes", from = %record.entity(), to = %target, persist);
        let _enter = span.enter();

        let enabled = self.hierarchy.is_sti_enabled(record.entity()).unwrap_or(false);
        let value = match self.hierarchy.discriminator_value(target, None) {
            Ok(value) if enabled => value.map(str::to_string),
            _ => {
                let error = StiError::ConversionTargetInvalid {
                    from: record.entity().to_string(),
                    to: target.to_string(),
                };
                return Err(BecomeError::new(error, record));
            }
        };

        let column = self.hierarchy.column_name().to_string();
        let mut source = record;
        let previous = source.get(&column).cloned();
        source.set(column.as_str(), Value::from(value.clone()));

        let mut converted = match self.instantiate(target, source.attributes()) {
            Ok(converted) => converted,
            Err(error) => return Err(rollback(source, &column, previous, error)),
        };
        converted.set_attributes(source.attributes());

        if let Err(errors) = self.validator.validate(&converted) {
            event!(Level::DEBUG, errors = %errors, "conversion rejected by validation");
            let error = StiError::ConversionValidationFailed {
                entity: converted.entity().to_string(),
                errors,
            };
            return Err(rollback(source, &column, previous, error));
        }

        if !persist {
            converted.set_old_attributes(source.old_attributes().cloned());
            return Ok(converted);
        }

        let key = match self.row_key(&source) {
            Ok(key) => key,
            Err(error) => {
                let error = StiError::ConversionPersistenceFailed {
                    entity: target.to_string(),
                    reason: error.to_string(),
                };
                return Err(rollback(source, &column, previous, error));
            }
        };
        let mut changes = Row::new();
        changes.insert(column.clone(), Value::from(value.clone()));

        let reason = match self
            .writer
            .persist_update(self.hierarchy.table_name(), &key, &changes)
        {
            Ok(true) => None,
            Ok(false) => Some(format!("no row matched {}", key)),
            Err(error) => Some(error.to_string()),
        };
        if let Some(reason) = reason {
            event!(Level::DEBUG, reason = %reason, "conversion not persisted");
            let error = StiError::ConversionPersistenceFailed {
                entity: target.to_string(),
                reason,
            };
            return Err(rollback(source, &column, previous, error));
        }

        let mut snapshot = source.take_old_attributes();
        if let Some(snapshot) = snapshot.as_mut() {
            snapshot.insert(column, Value::from(value));
        }
        converted.set_old_attributes(snapshot);
        event!(Level::DEBUG, entity = %converted.entity(), "record converted");
        Ok(converted)
    }
}

/// Puts the discriminator back the way the caller handed it in.
fn rollback(mut source: Record, column: &str, previous: Option<Value>, error: StiError) -> BecomeError {
    match previous {
        Some(value) => source.set(column, value),
        None => {
            source.remove(column);
        }
    }
    BecomeError::new(error, source)
}

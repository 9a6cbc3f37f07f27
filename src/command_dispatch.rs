//! Purpose: Hold top-level CLI command dispatch for `colmap`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command runs at most one mapper operation.
//! Invariants: A missing row on `get` is reported as `NotFound` so the exit code reflects it.

use super::*;
use colmap::api::{FieldType, Marshaller, value_from_json};

pub(super) fn dispatch_command(
    command: Command,
    session: &Session,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    let mapper = &session.mapper;
    let decl = &session.decl;
    match command {
        Command::Put { record } => {
            let json = read_record_arg(&record)?;
            let document = Document::from_json(decl, &json)?;
            let key = Marshaller::new(mapper.schema(), mapper.codecs()).row_key(&document)?;
            mapper.insert(&document)?;
            emit_json(json!({ "inserted": key }), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Get { key } => {
            let document = mapper.get(&key)?.ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("no record stored under key {key}"))
                    .with_collection(mapper.schema().collection())
            })?;
            emit_json(document.to_json(decl), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::GetMany { keys } => {
            let documents = mapper.get_many(keys)?;
            emit_documents(&documents, decl, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Range { start, end, limit } => {
            let documents = mapper.get_range(&start, &end, limit)?;
            emit_documents(&documents, decl, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::GetSuper { key, names } => {
            let property = mapper.schema().super_column_property().ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("schema has no super-column field")
                    .with_hint("Mark one field with \"role\": \"super_column\".")
                    .with_collection(mapper.schema().collection())
            })?;
            let values = names
                .iter()
                .map(|name| super_column_name(property.ty(), name))
                .collect::<Result<Vec<_>, Error>>()
                .map_err(|err| err.with_field(property.name()))?;
            let documents = mapper.get_super(&key, &values)?;
            emit_documents(&documents, decl, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Delete { key } => {
            mapper.delete_key(&key)?;
            emit_json(json!({ "deleted": key }), color_mode);
            Ok(RunOutcome::ok())
        }
    }
}

fn emit_documents(documents: &[Document], decl: &RecordDecl, color_mode: ColorMode) {
    let values = documents
        .iter()
        .map(|document| document.to_json(decl))
        .collect::<Vec<_>>();
    emit_json(Value::Array(values), color_mode);
}

/// Text super-columns take the argument verbatim; other types parse it as JSON.
fn super_column_name(ty: &FieldType, arg: &str) -> Result<colmap::api::Value, Error> {
    let json = match ty {
        FieldType::Text | FieldType::Enum(_) => Value::String(arg.to_string()),
        _ => serde_json::from_str(arg).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("super-column name {arg} is not valid JSON: {err}"))
        })?,
    };
    value_from_json(ty, &json)
}

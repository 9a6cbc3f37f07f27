//! Purpose: `colmap` CLI entry point.
//! Role: Binary crate root; parses args, builds a document mapper over a file store, emits JSON.
//! Invariants: Successful commands emit exactly one JSON value on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use colmap::api::{
    CodecRegistry, Document, Error, ErrorKind, FileStore, Mapper, MapperConfig, RecordDecl,
    SchemaFile, SerializationPolicy, to_exit_code,
};

const LOG_ENV: &str = "COLMAP_LOG";
const DEFAULT_RANGE_LIMIT: usize = 100;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `colmap --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    let result = Session::open(&cli)
        .and_then(|session| command_dispatch::dispatch_command(cli.command, &session, color_mode));

    result
        .map_err(add_store_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "colmap",
    version,
    about = "Map JSON records onto rows of a column store file",
    long_about = None,
    after_help = r#"EXAMPLES
  $ colmap --store users.json --schema user.schema.json put '{"id":"u1","name":"Ada","role":"ADMIN"}'
  $ colmap --store users.json --schema user.schema.json get u1
  $ colmap --store users.json --schema user.schema.json range u1 u9 --limit 10
  $ colmap --store users.json --schema user.schema.json delete u1

Set COLMAP_LOG=debug to trace store calls on stderr."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, help = "Store file (created on first write)", value_hint = ValueHint::FilePath)]
    store: PathBuf,
    #[arg(long, help = "Record schema file (JSON)", value_hint = ValueHint::FilePath)]
    schema: PathBuf,
    #[arg(long, help = "Mapper config file (JSON)", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long, help = "Override the namespace named by the schema")]
    namespace: Option<String>,
    #[arg(long, help = "Allow serialized fields to use the blob format")]
    allow_serialized: bool,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Insert one record (JSON object, or `-` to read stdin)")]
    Put { record: String },
    #[command(about = "Fetch the record stored under a key")]
    Get { key: String },
    #[command(name = "get-many", about = "Fetch several records; absent keys are skipped")]
    GetMany {
        #[arg(required = true, num_args = 1..)]
        keys: Vec<String>,
    },
    #[command(about = "Fetch records with keys in an inclusive range (empty bound = open)")]
    Range {
        start: String,
        end: String,
        #[arg(long, default_value_t = DEFAULT_RANGE_LIMIT)]
        limit: usize,
    },
    #[command(name = "get-super", about = "Fetch named super-columns of one row")]
    GetSuper {
        key: String,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    #[command(about = "Remove the row stored under a key")]
    Delete { key: String },
}

/// Everything a command needs: the declaration and a mapper bound to the store file.
struct Session {
    decl: RecordDecl,
    mapper: Mapper<Document, FileStore>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, Error> {
        let schema = SchemaFile::load(&cli.schema)?;
        let decl = schema.to_decl();
        let mut config = match &cli.config {
            Some(path) => MapperConfig::load(path)?,
            None => MapperConfig::default(),
        };
        if let Some(namespace) = &cli.namespace {
            config = config.with_namespace(namespace.clone());
        }
        if cli.allow_serialized {
            config = config.with_serialization(SerializationPolicy::Allow);
        }
        let store = FileStore::open(&cli.store);
        let mapper = Mapper::with_declaration(&decl, &config, CodecRegistry::standard(), store)
            .map_err(|err| err.with_path(&cli.schema))?;
        Ok(Self { decl, mapper })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn read_record_arg(arg: &str) -> Result<Value, Error> {
    let text = if arg == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read stdin")
                .with_source(err)
        })?;
        buf
    } else {
        arg.to_string()
    };
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("record is not valid JSON: {err}"))
            .with_hint("Pass a JSON object, e.g. '{\"id\":\"u1\"}'.")
    })
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::Schema => "invalid record schema",
        ErrorKind::UnmappableType => "no codec for value type",
        ErrorKind::MissingKey => "record key is empty",
        ErrorKind::Instantiation => "could not instantiate record",
        ErrorKind::Store => "store call failed",
        ErrorKind::NotFound => "not found",
        ErrorKind::Corrupt => "corrupt data",
        ErrorKind::Busy => "resource is busy",
        ErrorKind::Permission => "permission denied",
        ErrorKind::Io => "i/o error",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(collection) = err.collection() {
        inner.insert("collection".to_string(), json!(collection));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(field) = err.field() {
        lines.push(format!(
            "{} {field}",
            colorize_label("field:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn add_store_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Store || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check that the --store file is readable, writable, and not damaged.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Re-run with COLMAP_LOG=debug and report the output.")
}

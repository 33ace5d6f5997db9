use fetchgrid::config::{ControlParameters, GridConfig, HostContext};
use fetchgrid::data::{QueryError, QueryRunner, load_grid};
use fetchgrid::export::export_csv;
use fetchgrid::grid::{Grid, SortDirection, grid_columns};
use fetchgrid::record::{Record, records_from_json};
use fetchgrid::table::TableRenderer;
use std::env;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

const NIL_RECORD_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Answers every query with the records stored in a JSON file.
struct FileQueryRunner {
    path: String,
}

impl QueryRunner for FileQueryRunner {
    fn run_query(&self, _entity_name: &str, _fetch_xml: &str) -> Result<Vec<Record>, QueryError> {
        let source = fs::read_to_string(&self.path)
            .map_err(|e| QueryError::Host(format!("Failed to read {}: {}", self.path, e)))?;
        Ok(records_from_json(&source)?)
    }
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Text,
    Csv,
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <records.json> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -c, --columns <file>   Column layout JSON (default: columns from the first record)");
        eprintln!("  -x, --fetch <file>     FetchXML query (default: a query on --entity)");
        eprintln!("  -r, --record-id <id>   Record id substituted into the query");
        eprintln!("  -e, --entity <name>    Primary entity name (default: record)");
        eprintln!("  -s, --sort <key>       Sort by column key");
        eprintln!("      --desc             Sort descending");
        eprintln!("  -f, --format <fmt>     Output format: text, csv (default: text)");
        eprintln!("  -b, --base-url <url>   Base environment URL for link templates");
        eprintln!("  -o, --output <file>    Output file (default: stdout)");
        eprintln!("      --debug            Verbose cell resolution logging");
        process::exit(1);
    }

    let records_path = &args[1];
    let mut columns_path: Option<String> = None;
    let mut fetch_path: Option<String> = None;
    let mut record_id: Option<String> = None;
    let mut entity = "record".to_string();
    let mut sort_key: Option<String> = None;
    let mut direction = SortDirection::Ascending;
    let mut format = OutputFormat::Text;
    let mut base_url: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut debug = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--columns" => {
                i += 1;
                if i < args.len() {
                    columns_path = Some(args[i].clone());
                }
            }
            "-x" | "--fetch" => {
                i += 1;
                if i < args.len() {
                    fetch_path = Some(args[i].clone());
                }
            }
            "-r" | "--record-id" => {
                i += 1;
                if i < args.len() {
                    record_id = Some(args[i].clone());
                }
            }
            "-e" | "--entity" => {
                i += 1;
                if i < args.len() {
                    entity = args[i].clone();
                }
            }
            "-s" | "--sort" => {
                i += 1;
                if i < args.len() {
                    sort_key = Some(args[i].clone());
                }
            }
            "--desc" => direction = SortDirection::Descending,
            "-f" | "--format" => {
                i += 1;
                if i < args.len() {
                    format = match args[i].as_str() {
                        "text" => OutputFormat::Text,
                        "csv" => OutputFormat::Csv,
                        other => {
                            eprintln!("Invalid format: {}", other);
                            process::exit(1);
                        }
                    };
                }
            }
            "-b" | "--base-url" => {
                i += 1;
                if i < args.len() {
                    base_url = Some(args[i].clone());
                }
            }
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "--debug" => debug = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let default_filter = if debug { "fetchgrid=debug" } else { "fetchgrid=warn" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let fetch_xml = match &fetch_path {
        Some(path) => read_file(path),
        None => format!("<fetch><entity name='{}'></entity></fetch>", entity),
    };

    // Without a layout, every attribute of the first record becomes a column.
    let column_layout_json = match &columns_path {
        Some(path) => read_file(path),
        None => {
            let rows = match records_from_json(&read_file(records_path)) {
                Ok(rows) => rows,
                Err(e) => {
                    eprintln!("Invalid records in {}: {}", records_path, e);
                    process::exit(1);
                }
            };
            let columns: Vec<serde_json::Value> = rows
                .first()
                .map(|row| {
                    row.keys()
                        .filter(|k| !fetchgrid::record::is_metadata_key(k))
                        .map(|k| serde_json::json!({ "key": k, "fieldName": k, "name": k }))
                        .collect()
                })
                .unwrap_or_default();
            serde_json::Value::Array(columns).to_string()
        }
    };

    let params = ControlParameters {
        fetch_xml: Some(fetch_xml),
        column_layout_json: Some(column_layout_json),
        debug_mode: Some(if debug { "1" } else { "0" }.to_string()),
        overridden_record_id: record_id,
        ..Default::default()
    };
    // Queries only run for a GUID record id; a standalone query has none.
    let host = HostContext {
        record_id: Some(NIL_RECORD_ID.to_string()),
        base_environment_url: base_url,
    };

    let config = match GridConfig::from_parameters(&params, &host) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let runner = FileQueryRunner {
        path: records_path.clone(),
    };
    let loaded = load_grid(&runner, &config);
    if let Some(message) = &loaded.announced_message {
        eprintln!("{}", message);
    }

    let columns = grid_columns(loaded.columns.clone(), &config.cell_context());
    let mut grid = Grid::new("cli", columns, loaded.items, &loaded.primary_entity);
    if let Some(key) = &sort_key {
        if !grid.sort_by(key, direction) {
            eprintln!("Unknown sort column: {}", key);
            process::exit(1);
        }
    }

    let output = match format {
        OutputFormat::Text => TableRenderer::default().render(&grid),
        OutputFormat::Csv => match export_csv(grid.rows(), &loaded.columns) {
            Ok(csv) => csv,
            Err(e) => {
                eprintln!("Export error: {}", e);
                process::exit(1);
            }
        },
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &output) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => print!("{}", output),
    }
}

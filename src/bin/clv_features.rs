use std::fs;
use std::path::PathBuf;

use clv::{
    build_output_schema, calculate, clv_config_from_env, engineer_features, init_logging,
    load_csv_table, load_sqlite_table, log_run_finish, log_run_start, log_source_selected,
    logging_config_from_env, output_dir_from_env, write_features_jsonl, write_schema_json,
    write_summary_csv, OutputKind, Table,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Calculate,
    Features,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Calculate => "calculate",
            Self::Features => "features",
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let mode = parse_mode()?;
    log_run_start(&logging_cfg, mode.as_str());

    let cfg = clv_config_from_env()?;
    let input = std::env::var("CLV_INPUT")
        .map(PathBuf::from)
        .map_err(|_| "CLV_INPUT must point at a CSV file or SQLite database")?;
    let output_dir = output_dir_from_env();

    let table = load_input(&input)?;
    fs::create_dir_all(&output_dir)?;

    let (churned, active) = match mode {
        Mode::Calculate => {
            let output = calculate(&table, &cfg)?;
            let churned_schema = build_output_schema(OutputKind::ChurnedSummary);
            let active_schema = build_output_schema(OutputKind::ActiveSummary);

            write_summary_csv(
                &output_dir.join("churned.csv"),
                &churned_schema,
                &output.churned,
            )?;
            write_summary_csv(&output_dir.join("active.csv"), &active_schema, &output.active)?;
            write_schema_json(
                &output_dir.join("schema.json"),
                &[churned_schema, active_schema],
            )?;
            (output.churned.len(), output.active.len())
        }
        Mode::Features => {
            let output = engineer_features(&table, &cfg)?;

            write_features_jsonl(&output_dir.join("churned.jsonl"), &output.churned)?;
            write_features_jsonl(&output_dir.join("active.jsonl"), &output.active)?;
            write_schema_json(
                &output_dir.join("schema.json"),
                &[
                    build_output_schema(OutputKind::ChurnedFeatures),
                    build_output_schema(OutputKind::ActiveFeatures),
                ],
            )?;
            (output.churned.len(), output.active.len())
        }
    };

    log_run_finish(mode.as_str(), &output_dir, churned, active);
    println!(
        "{} | churned={} active={} output_dir={}",
        mode.as_str(),
        churned,
        active,
        output_dir.display()
    );

    Ok(())
}

fn parse_mode() -> Result<Mode, String> {
    match std::env::var("CLV_MODE") {
        Err(_) => Ok(Mode::Features),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "features" => Ok(Mode::Features),
            "calculate" => Ok(Mode::Calculate),
            other => Err(format!(
                "CLV_MODE must be 'calculate' or 'features', got '{other}'"
            )),
        },
    }
}

fn load_input(input: &std::path::Path) -> Result<Table, clv::LoadError> {
    match std::env::var("CLV_SQLITE_TABLE") {
        Ok(table_name) if !table_name.trim().is_empty() => {
            let table_name = table_name.trim();
            log_source_selected("sqlite", input, Some(table_name));
            load_sqlite_table(input, table_name)
        }
        _ => {
            log_source_selected("csv", input, None);
            load_csv_table(input)
        }
    }
}


use clap::Parser;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Row, Table};
use console::style;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use metawipe::{MetaWiper, OperationKind, OperationOptions, OperationRequest, OperationResult};

/// Lee, limpia, sobrescribe o exporta la metadata de PDF, JPEG/PNG y documentos Office.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operación: read, clean, overwrite, export o restore
    operation: OperationKind,

    /// Archivos o directorios a procesar
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directorio donde se escriben los JSON exportados
    #[arg(long, value_name = "DIR", env = "METAWIPE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Valor a escribir en overwrite (repetible)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    values: Vec<(String, String)>,

    /// Opciones en JSON; `--set` y `--output-dir` tienen prioridad
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Recorre los directorios de forma recursiva
    #[arg(short, long)]
    recursive: bool,

    /// Imprime los resultados como JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn build_options(&self) -> Result<OperationOptions, String> {
        let mut options = match &self.config {
            Some(path) => load_config(path)?,
            None => OperationOptions::default(),
        };

        if let Some(directory) = &self.output_dir {
            options.output_directory = Some(directory.clone());
        }
        options.overwrite_metadata.extend(self.values.iter().cloned());
        Ok(options)
    }

    fn expand_paths(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in &self.paths {
            if path.is_dir() {
                files.extend(MetaWiper::collect_candidate_files(path, self.recursive));
            } else {
                files.push(path.clone());
            }
        }
        files
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Se esperaba CLAVE=VALOR y se recibió `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("La clave de `{raw}` está vacía"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_config(path: &Path) -> Result<OperationOptions, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("No se pudo leer la configuración {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("Configuración inválida en {}: {}", path.display(), e))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let options = match cli.build_options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", style(message).red());
            return ExitCode::from(2);
        }
    };
    let request = OperationRequest::with_options(cli.operation, options);

    let files = cli.expand_paths();
    if files.is_empty() {
        eprintln!(
            "{}",
            style("No se encontraron archivos compatibles en las rutas indicadas.").yellow()
        );
        return ExitCode::FAILURE;
    }

    let wiper = MetaWiper::new();
    let results = wiper.process_files(&files, &request);

    if cli.json {
        if let Err(message) = print_json(&files, &results) {
            eprintln!("{}", style(message).red());
            return ExitCode::from(2);
        }
    } else {
        for (path, result) in files.iter().zip(&results) {
            render_result(path, result);
        }
        render_summary(&results);
    }

    if results.iter().all(|result| result.success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    #[serde(flatten)]
    result: &'a OperationResult,
}

fn print_json(files: &[PathBuf], results: &[OperationResult]) -> Result<(), String> {
    let reports: Vec<FileReport<'_>> = files
        .iter()
        .zip(results)
        .map(|(path, result)| FileReport {
            path: path.display().to_string(),
            result,
        })
        .collect();
    let json = serde_json::to_string_pretty(&reports)
        .map_err(|e| format!("No se pudo serializar el resultado: {}", e))?;
    println!("{json}");
    Ok(())
}

fn render_result(path: &Path, result: &OperationResult) {
    let marker = if result.success {
        style("✔").green().bold()
    } else {
        style("✘").red().bold()
    };
    println!(
        "\n{} {}",
        marker,
        style(path.display().to_string()).cyan().bold()
    );

    let message = if result.success {
        style(result.message.as_str()).green()
    } else {
        style(result.message.as_str()).red()
    };
    println!("  {message}");

    for warning in &result.warnings {
        println!("  {} {}", style("⚠").yellow(), style(warning).yellow());
    }

    if result.metadata.is_empty() {
        return;
    }

    let mut table = build_table();
    for (key, value) in &result.metadata {
        let color = if key.starts_with("Total.") {
            Color::DarkGrey
        } else {
            Color::White
        };
        table.add_row(build_row(key, value, color));
    }
    println!("{table}");
}

fn render_summary(results: &[OperationResult]) {
    let succeeded = results.iter().filter(|result| result.success).count();
    let failed = results.len() - succeeded;
    let summary = format!(
        "{} archivo(s) procesado(s): {} correcto(s), {} con error",
        results.len(),
        succeeded,
        failed
    );
    if failed == 0 {
        println!("\n{}", style(summary).green());
    } else {
        println!("\n{}", style(summary).yellow());
    }
}

fn build_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![header_cell("Propiedad"), header_cell("Valor")]);

    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
        .add_attribute(Attribute::Underlined)
}

fn build_row(label: &str, value: &str, value_color: Color) -> Row {
    Row::from(vec![
        Cell::new(label).fg(Color::Rgb {
            r: 160,
            g: 196,
            b: 255,
        }),
        Cell::new(value).fg(value_color),
    ])
}

//! schemaql shell
//!
//! Usage: schemaql [--foreign-keys] [SCRIPT]
//!
//! Runs SQL from SCRIPT, or from stdin when no script is given, against a
//! fresh in-memory database and prints result rows `|`-separated.

use schemaql::{libversion, Connection, EngineConfig, ExecResult, ResultSet};
use std::env;
use std::io::{self, BufRead, IsTerminal, Write};

/// Shell state
struct Shell {
    conn: Connection,
    headers: bool,
    bail: bool,
}

impl Shell {
    fn new(config: EngineConfig) -> Self {
        Shell {
            conn: Connection::with_config(config),
            headers: false,
            bail: false,
        }
    }

    /// Process a dot command; Ok(false) means exit
    fn process_dot_command(&mut self, line: &str) -> Result<bool, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Ok(true);
        };

        let cmd = first.to_lowercase();
        match cmd.as_str() {
            ".quit" | ".exit" | ".q" => return Ok(false),
            ".help" => print_help(),
            ".headers" => match parts.get(1) {
                Some(arg) => self.headers = switch(arg),
                None => println!("headers: {}", if self.headers { "on" } else { "off" }),
            },
            ".bail" => match parts.get(1) {
                Some(arg) => self.bail = switch(arg),
                None => println!("bail: {}", if self.bail { "on" } else { "off" }),
            },
            ".tables" => {
                let mut names = self.conn.table_names();
                names.sort();
                if !names.is_empty() {
                    println!("{}", names.join("  "));
                }
            }
            ".indexes" | ".indices" => {
                for name in self.conn.index_names(parts.get(1).copied()) {
                    println!("{}", name);
                }
            }
            ".schema" => {
                let table = parts.get(1).copied();
                for entry in self.conn.schema_entries() {
                    let wanted = table.map_or(true, |t| entry.tbl_name.eq_ignore_ascii_case(t));
                    if let (true, Some(sql)) = (wanted, entry.sql) {
                        println!("{};", sql);
                    }
                }
            }
            ".version" => println!("schemaql {}", libversion()),
            _ => {
                let msg = format!("unknown command: {}", cmd);
                eprintln!("Error: {}", msg);
                if self.bail {
                    return Err(msg);
                }
            }
        }
        Ok(true)
    }

    /// Execute SQL and display results
    fn execute_sql(&mut self, sql: &str) -> Result<(), String> {
        match self.conn.execute_batch(sql) {
            Ok(results) => {
                for result in &results {
                    if let ExecResult::Rows(rows) = result {
                        self.print_rows(rows);
                    }
                }
                Ok(())
            }
            Err(e) => {
                let msg = e.to_string();
                eprintln!("Error: {}", msg);
                if self.bail {
                    return Err(msg);
                }
                Ok(())
            }
        }
    }

    fn print_rows(&self, rows: &ResultSet) {
        if self.headers && !rows.columns.is_empty() {
            println!("{}", rows.columns.join("|"));
        }
        for row in &rows.rows {
            let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("{}", values.join("|"));
        }
    }

    /// Feed lines to the shell, running SQL at each terminating semicolon
    fn run<R: BufRead>(&mut self, input: R, interactive: bool) -> Result<(), String> {
        let mut stdout = io::stdout();
        let mut sql_buffer = String::new();
        let mut lines = input.lines();

        loop {
            if interactive {
                let prompt = if sql_buffer.is_empty() {
                    "schemaql> "
                } else {
                    "     ...> "
                };
                print!("{}", prompt);
                stdout.flush().ok();
            }

            let line = match lines.next() {
                Some(line) => line.map_err(|e| e.to_string())?,
                None => break,
            };
            let line = line.trim();

            // Dot commands only between statements
            if sql_buffer.is_empty() && line.starts_with('.') {
                if !self.process_dot_command(line)? {
                    return Ok(());
                }
                continue;
            }
            if line.is_empty() || line.starts_with("--") {
                continue;
            }

            if !sql_buffer.is_empty() {
                sql_buffer.push('\n');
            }
            sql_buffer.push_str(line);

            if sql_buffer.trim_end().ends_with(';') {
                self.execute_sql(&sql_buffer)?;
                sql_buffer.clear();
            }
        }

        if !sql_buffer.trim().is_empty() {
            self.execute_sql(&sql_buffer)?;
        }
        Ok(())
    }
}

fn switch(arg: &str) -> bool {
    matches!(arg.to_lowercase().as_str(), "on" | "yes" | "1" | "true")
}

fn print_help() {
    println!(
        r#".bail ON|OFF           Stop after hitting an error
.headers ON|OFF        Turn display of headers on or off
.help                  Show this message
.indexes ?TABLE?       Show names of indexes
.quit                  Exit this program
.schema ?TABLE?        Show CREATE statements
.tables                List names of tables
.version               Show version"#
    );
}

fn print_usage() {
    println!("Usage: schemaql [OPTIONS] [SCRIPT]");
    println!();
    println!("Options:");
    println!("  --foreign-keys     Enforce FOREIGN KEY constraints");
    println!("  --help             Show this help");
    println!("  --version          Show version");
    println!();
    println!("If SCRIPT is omitted, statements are read from stdin.");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init()
        .ok();

    let mut config = EngineConfig::default();
    let mut script: Option<String> = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-help" | "--help" | "-?" => {
                print_usage();
                return;
            }
            "-version" | "--version" => {
                println!("schemaql {}", libversion());
                return;
            }
            "--foreign-keys" => config.foreign_keys = true,
            other if !other.starts_with('-') => script = Some(other.to_string()),
            other => {
                eprintln!("Error: unknown option: {}", other);
                std::process::exit(1);
            }
        }
    }

    let mut shell = Shell::new(config);
    let result = match script {
        Some(path) => match std::fs::File::open(&path) {
            Ok(file) => shell.run(io::BufReader::new(file), false),
            Err(e) => Err(format!("cannot open \"{}\": {}", path, e)),
        },
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            shell.run(stdin.lock(), interactive)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

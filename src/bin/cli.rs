//! Meterscope CLI
//!
//! Command-line client for a Meterscope API server:
//! - List and inspect meters
//! - Query meter values as a table, JSON or CSV
//! - Check status

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meterscope-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query usage meters from a Meterscope server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8888", global = true)]
    pub api_url: String,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show server status
    Status,

    /// List meters
    Meters,

    /// Show one meter
    Meter {
        /// Meter id or slug
        id_or_slug: String,
    },

    /// List the subjects of a meter
    Subjects {
        /// Meter id or slug
        id_or_slug: String,
    },

    /// Query meter values
    Query {
        /// Meter id or slug
        id_or_slug: String,
        /// Range start (RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Range end (RFC 3339)
        #[arg(long)]
        to: Option<String>,
        /// Relative range ending now (e.g., 7d, 4w, 3m); overrides --from
        #[arg(short, long)]
        last: Option<String>,
        /// Window size (MINUTE, HOUR, DAY, MONTH); omit for totals
        #[arg(short, long)]
        window_size: Option<String>,
        /// Time zone for window alignment (e.g., Europe/Berlin)
        #[arg(long)]
        tz: Option<String>,
        /// Group-by dimensions
        #[arg(short, long)]
        group_by: Vec<String>,
        /// Subjects to restrict to
        #[arg(short, long)]
        subject: Vec<String>,
        /// Filters in key=expression format, e.g. region='{"$ne":"test"}'
        #[arg(long)]
        filter: Vec<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;

                    println!("Meterscope v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!(
                        "API Status: {}",
                        health["status"].as_str().unwrap_or("unknown")
                    );
                    println!(
                        "Namespace:  {}",
                        health["namespace"].as_str().unwrap_or("-")
                    );
                    println!("Meters:     {}", health["meters"].as_u64().unwrap_or(0));

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to Meterscope API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the Meterscope API server is running:");
                    eprintln!("  cargo run --bin meterscope");
                    std::process::exit(1);
                }
            }
        }

        Commands::Meters => {
            let data = get_json(&client, &format!("{}/api/v1/meters", cli.api_url)).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            let meters = data["meters"].as_array().cloned().unwrap_or_default();
            if meters.is_empty() {
                println!("No meters defined.");
                println!();
                println!("Add [[meters]] tables to the server config, see:");
                println!("  meterscope-cli config");
            } else {
                println!(
                    "{:<24} {:<14} {:<8} {:<20} {}",
                    "Slug", "Aggregation", "Window", "Event type", "Group by"
                );
                println!("{}", "-".repeat(84));

                for meter in meters {
                    let group_by = meter["groupBy"]
                        .as_object()
                        .map(|g| g.keys().cloned().collect::<Vec<_>>().join(","))
                        .unwrap_or_default();
                    println!(
                        "{:<24} {:<14} {:<8} {:<20} {}",
                        meter["slug"].as_str().unwrap_or("-"),
                        meter["aggregation"].as_str().unwrap_or("-"),
                        meter["windowSize"].as_str().unwrap_or("-"),
                        meter["eventType"].as_str().unwrap_or("-"),
                        group_by
                    );
                }
            }
        }

        Commands::Meter { id_or_slug } => {
            let url = format!("{}/api/v1/meters/{}", cli.api_url, id_or_slug);
            let meter = get_json(&client, &url).await?;
            println!("{}", serde_json::to_string_pretty(&meter)?);
        }

        Commands::Subjects { id_or_slug } => {
            let url = format!("{}/api/v1/meters/{}/subjects", cli.api_url, id_or_slug);
            let data = get_json(&client, &url).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                for subject in data["subjects"].as_array().into_iter().flatten() {
                    println!("{}", subject.as_str().unwrap_or("-"));
                }
            }
        }

        Commands::Query {
            id_or_slug,
            from,
            to,
            last,
            window_size,
            tz,
            group_by,
            subject,
            filter,
            output,
        } => {
            let mut params: Vec<(String, String)> = Vec::new();

            match last {
                Some(last) => {
                    let now = Utc::now();
                    params.push(("from".into(), rfc3339(now - parse_duration(&last)?)));
                    params.push(("to".into(), rfc3339(now)));
                }
                None => {
                    if let Some(from) = from {
                        params.push(("from".into(), from));
                    }
                    if let Some(to) = to {
                        params.push(("to".into(), to));
                    }
                }
            }
            if let Some(window_size) = window_size {
                params.push(("windowSize".into(), window_size));
            }
            if let Some(tz) = tz {
                params.push(("windowTimeZone".into(), tz));
            }
            params.extend(group_by.into_iter().map(|g| ("groupBy".to_string(), g)));
            params.extend(subject.into_iter().map(|s| ("subject".to_string(), s)));
            for f in filter {
                match f.split_once('=') {
                    Some((key, expr)) => params.push((format!("filter[{}]", key), expr.to_string())),
                    None => {
                        eprintln!("Invalid filter '{}', expected key=expression", f);
                        std::process::exit(1);
                    }
                }
            }

            let accept = if cli.format == "csv" {
                "text/csv"
            } else {
                "application/json"
            };

            let response = client
                .get(format!("{}/api/v1/meters/{}/query", cli.api_url, id_or_slug))
                .query(&params)
                .header(reqwest::header::ACCEPT, accept)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Query failed ({}): {}", status, problem_detail(&text));
                std::process::exit(1);
            }

            let rendered = match cli.format.as_str() {
                "csv" => response.text().await?,
                "json" => {
                    let data: serde_json::Value = response.json().await?;
                    format!("{}\n", serde_json::to_string_pretty(&data)?)
                }
                _ => {
                    let data: serde_json::Value = response.json().await?;
                    format_table(&data)
                }
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &rendered)?;
                    println!("Written to {:?}", path);
                }
                None => print!("{}", rendered),
            }
        }

        Commands::Config { output } => {
            let config = meterscope::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn get_json(
    client: &reqwest::Client,
    url: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        eprintln!("Request failed ({}): {}", status, problem_detail(&text));
        std::process::exit(1);
    }

    Ok(response.json().await?)
}

/// The `detail` of a problem body, or the raw text
fn problem_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn parse_duration(s: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let s = s.trim().to_lowercase();

    if let Some(hours) = s.strip_suffix('h') {
        Ok(Duration::hours(hours.parse()?))
    } else if let Some(days) = s.strip_suffix('d') {
        Ok(Duration::days(days.parse()?))
    } else if let Some(weeks) = s.strip_suffix('w') {
        Ok(Duration::weeks(weeks.parse()?))
    } else if let Some(months) = s.strip_suffix('m') {
        Ok(Duration::days(months.parse::<i64>()? * 30))
    } else {
        Err(format!("Invalid duration format: {}. Use: 12h, 7d, 4w, 3m", s).into())
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

fn format_table(data: &serde_json::Value) -> String {
    let rows = match data["data"].as_array() {
        Some(r) if !r.is_empty() => r,
        _ => return "No data for the selected range\n".to_string(),
    };

    // Group-by columns in first-seen order
    let mut dimensions: Vec<String> = Vec::new();
    for row in rows {
        for key in row["groupBy"].as_object().into_iter().flat_map(|g| g.keys()) {
            if !dimensions.contains(key) {
                dimensions.push(key.clone());
            }
        }
    }

    let mut out = format!("{:<22} {:<22} {:<16}", "Window start", "Window end", "Subject");
    for dim in &dimensions {
        out.push_str(&format!(" {:<14}", dim));
    }
    out.push_str(" Value\n");
    out.push_str(&"-".repeat(68 + dimensions.len() * 15));
    out.push('\n');

    for row in rows {
        out.push_str(&format!(
            "{:<22} {:<22} {:<16}",
            row["windowStart"].as_str().unwrap_or("-"),
            row["windowEnd"].as_str().unwrap_or("-"),
            row["subject"].as_str().unwrap_or("-"),
        ));
        for dim in &dimensions {
            out.push_str(&format!(
                " {:<14}",
                row["groupBy"][dim.as_str()].as_str().unwrap_or("-")
            ));
        }
        let value = row["value"]
            .as_f64()
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(" {}\n", value));
    }

    out
}

//! growwise-cli: command-line client for the GrowWise HTTP API
//!
//! # Subcommands
//! - `weather --city <name>` or `weather --lat <lat> --lon <lon>`
//! - `predict <image>`:           upload a leaf photo for analysis
//! - `prices [--category <c>]`:   market prices
//! - `ask <query>`:               ask the farming assistant
//! - `stats`:                     usage statistics
//! - `status`:                    show server health
//!
//! `--json` prints the `data` payload as returned by the server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "growwise-cli",
    version,
    about = "GrowWise farming assistant: command-line client"
)]
struct Cli {
    /// GrowWise HTTP server URL (overrides GROWWISE_HTTP_URL env var)
    #[arg(long, env = "GROWWISE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON payload instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Current weather for a city or coordinates
    Weather {
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Analyze a leaf photo for disease symptoms
    Predict {
        /// PNG, JPG, JPEG or GIF file
        image: PathBuf,
    },

    /// List market prices
    Prices {
        /// vegetable or fruit; omit for all
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Ask the farming assistant a question
    Ask {
        /// Question text
        query: Vec<String>,
    },

    /// Show usage statistics
    Stats,

    /// Show GrowWise server status
    Status,
}

// ============================================================================
// API envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Unwrap an envelope into its `data`, or turn it into an error carrying the
/// server's message.
pub fn into_data(envelope: Envelope) -> anyhow::Result<Value> {
    if envelope.success {
        Ok(envelope.data.unwrap_or(Value::Null))
    } else {
        Err(anyhow!(envelope
            .error
            .unwrap_or_else(|| "unknown error".to_string())))
    }
}

// ============================================================================
// Formatting (pure)
// ============================================================================

pub fn format_weather(data: &Value) -> String {
    let place = match data["country"].as_str().filter(|c| !c.is_empty()) {
        Some(country) => format!("{}, {}", data["city"].as_str().unwrap_or("?"), country),
        None => data["city"].as_str().unwrap_or("?").to_string(),
    };
    format!(
        "{}\n  {}\n  Temperature: {:.1}°C\n  Humidity:    {}%\n  Wind:        {:.1} m/s",
        place,
        data["description"].as_str().unwrap_or(""),
        data["temperature"].as_f64().unwrap_or(f64::NAN),
        data["humidity"].as_i64().unwrap_or(0),
        data["wind_speed"].as_f64().unwrap_or(0.0),
    )
}

pub fn format_diagnosis(data: &Value) -> String {
    format!(
        "{} ({:.1}% confidence)\n  Treatment: {}",
        data["formatted_name"].as_str().unwrap_or("Unknown"),
        data["confidence"].as_f64().unwrap_or(0.0),
        data["treatment"].as_str().unwrap_or(""),
    )
}

/// `₹30-40/kg` for a range, `₹245/kg` for a single price.
pub fn format_price(entry: &Value) -> String {
    let price = entry["price"].as_f64().unwrap_or(0.0);
    let unit = entry["unit"].as_str().unwrap_or("kg");
    match entry["price_max"].as_f64() {
        Some(max) if max > price => format!("₹{}-{}/{}", price, max, unit),
        _ => format!("₹{}/{}", price, unit),
    }
}

pub fn format_prices(data: &Value) -> String {
    let entries = data.as_array().map(Vec::as_slice).unwrap_or(&[]);
    if entries.is_empty() {
        return "No prices found".to_string();
    }

    let width = entries
        .iter()
        .filter_map(|e| e["name"].as_str())
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(0);

    entries
        .iter()
        .map(|e| {
            format!(
                "{:<9}  {:<width$}  {}",
                e["category"].as_str().unwrap_or(""),
                e["name"].as_str().unwrap_or(""),
                format_price(e),
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_stats(data: &Value) -> String {
    let mut out = format!(
        "Predictions:     {}\nWeather queries: {}\nVoice queries:   {}",
        data["total_predictions"].as_i64().unwrap_or(0),
        data["weather_queries"].as_i64().unwrap_or(0),
        data["voice_queries"].as_i64().unwrap_or(0),
    );
    if let Some(diseases) = data["common_diseases"].as_array().filter(|d| !d.is_empty()) {
        out.push_str("\nMost common:");
        for d in diseases {
            out.push_str(&format!(
                "\n  {:<15} {}",
                d["disease"].as_str().unwrap_or("?"),
                d["count"].as_i64().unwrap_or(0)
            ));
        }
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> anyhow::Result<Value> {
        let resp = request
            .send()
            .with_context(|| format!("connection failed to {}", self.server))?;
        let status = resp.status();
        let envelope: Envelope = resp
            .json()
            .with_context(|| format!("server returned {} with an unreadable body", status))?;
        into_data(envelope)
    }

    fn weather(&self, city: Option<String>, lat: Option<f64>, lon: Option<f64>) -> anyhow::Result<Value> {
        let body = serde_json::json!({ "city": city, "lat": lat, "lon": lon });
        self.send(self.client.post(self.url("/api/weather")).json(&body))
    }

    fn predict(&self, image: &Path) -> anyhow::Result<Value> {
        let form = reqwest::blocking::multipart::Form::new()
            .file("image", image)
            .with_context(|| format!("cannot read {}", image.display()))?;
        self.send(self.client.post(self.url("/api/disease-detection")).multipart(form))
    }

    fn prices(&self, category: Option<&str>) -> anyhow::Result<Value> {
        let mut request = self.client.get(self.url("/api/market-prices"));
        if let Some(c) = category {
            request = request.query(&[("category", c)]);
        }
        self.send(request)
    }

    fn ask(&self, query: &str) -> anyhow::Result<Value> {
        let body = serde_json::json!({ "query": query });
        self.send(self.client.post(self.url("/api/voice-query")).json(&body))
    }

    fn stats(&self) -> anyhow::Result<Value> {
        self.send(self.client.get(self.url("/api/stats")))
    }

    /// Health is not enveloped under `data`; return the whole body.
    fn health(&self) -> anyhow::Result<Value> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .with_context(|| format!("cannot reach {}", self.server))?;
        if !resp.status().is_success() {
            bail!("server unhealthy (HTTP {})", resp.status());
        }
        Ok(resp.json()?)
    }
}

fn print(value: &Value, json: bool, human: fn(&Value) -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human(value));
    }
    Ok(())
}

fn format_status(body: &Value) -> String {
    format!(
        "GrowWise server: {}\nVersion:         {}\nStore:           {}\nDatabase:        {}",
        body["status"].as_str().unwrap_or("unknown"),
        body["version"].as_str().unwrap_or("?"),
        body["store"].as_str().unwrap_or("?"),
        body["database"].as_str().unwrap_or("?"),
    )
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let api = Api::new(&cli.server)?;

    match cli.command {
        Commands::Weather { city, lat, lon } => {
            if city.is_none() && lat.is_none() {
                bail!("give --city or --lat/--lon");
            }
            print(&api.weather(city, lat, lon)?, cli.json, format_weather)
        }
        Commands::Predict { image } => print(&api.predict(&image)?, cli.json, format_diagnosis),
        Commands::Prices { category } => {
            print(&api.prices(category.as_deref())?, cli.json, format_prices)
        }
        Commands::Ask { query } => {
            let query = query.join(" ");
            let data = api.ask(&query)?;
            print(&data, cli.json, |d| d["response"].as_str().unwrap_or("").to_string())
        }
        Commands::Stats => print(&api.stats()?, cli.json, format_stats),
        Commands::Status => print(&api.health()?, cli.json, format_status),
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("growwise-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use inlay_common::telemetry::{self, TelemetryConfig};
use inlay_common::wire::ChatRequest;
use inlay_common::{
    ApiClient, CancellationToken, ChatStreamError, ChatStreamHandler, EditorConfig,
    merge_manifests,
};
use inlay_renderer::scan_html;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use url::Url;

#[derive(Parser)]
#[command(version, about = "Inlay - inspect and drive the visual editor API", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Site origin, overriding INLAY_SITE_URL
    #[arg(long, global = true)]
    site: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a rendered HTML page and print its manifest
    Scan {
        /// Rendered page
        page: PathBuf,

        /// Print only the component instances
        #[arg(long)]
        components: bool,
    },
    /// Fetch and merge the manifest the editor would load for a page
    Manifest {
        /// Page path, e.g. /blog/hello
        #[arg(default_value = "/")]
        path: String,
    },
    /// Send a message to the site assistant and stream the reply
    Chat {
        message: String,

        /// Element the message is about
        #[arg(long)]
        cms_id: Option<String>,

        /// Page the message is about
        #[arg(long)]
        page: Option<String>,
    },
    /// Print recent assistant conversation
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the latest deployment status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette()?;
    telemetry::init(TelemetryConfig::from_env("inlay-cli"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { page, components } => scan_page(page, components)?,
        Commands::Manifest { path } => {
            let client = ApiClient::new(&load_config(cli.site)?);
            let manifest = client.fetch_manifest(&path).await?;
            print_json(&manifest)?;
        }
        Commands::Chat {
            message,
            cms_id,
            page,
        } => {
            let client = ApiClient::new(&load_config(cli.site)?);
            let request = ChatRequest {
                message,
                cms_id,
                page_url: page,
            };
            chat(&client, request).await?;
        }
        Commands::History { limit } => {
            let client = ApiClient::new(&load_config(cli.site)?);
            let history = client.chat_history(limit).await?;
            for message in history.messages {
                println!("{}: {}", message.role, message.content);
            }
        }
        Commands::Status => {
            let client = ApiClient::new(&load_config(cli.site)?);
            let status = client.deployment_status().await?;
            match status.url {
                Some(url) => println!("{} ({url})", status.status),
                None => println!("{}", status.status),
            }
        }
    }

    Ok(())
}

fn load_config(site: Option<Url>) -> Result<EditorConfig> {
    let config = match site {
        Some(site) => EditorConfig::for_site(site)?,
        None => EditorConfig::from_env()?,
    };
    tracing::debug!(api_base = %config.api_base, "loaded config");
    Ok(config)
}

fn scan_page(page: PathBuf, components_only: bool) -> Result<()> {
    let html = std::fs::read_to_string(&page).into_diagnostic()?;
    let scan = scan_html(&html)?;
    tracing::info!(
        page = %page.display(),
        entries = scan.entries.len(),
        components = scan.components.len(),
        "scanned page"
    );

    if components_only {
        return print_json(&scan.components);
    }
    let manifest = merge_manifests(Some(scan.into_manifest_source()), None)?;
    print_json(&manifest)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

/// Prints tokens as they arrive.
#[derive(Default)]
struct ConsoleChat {
    outcome: Option<std::result::Result<Option<String>, ChatStreamError>>,
}

impl ChatStreamHandler for ConsoleChat {
    fn on_token(&mut self, token: &str, _full_text: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    fn on_status(&mut self, status: &str, message: Option<&str>) {
        tracing::info!(status, detail = message, "assistant status");
    }

    fn on_action(&mut self, action: &serde_json::Value) {
        tracing::info!(%action, "assistant action");
    }

    fn on_done(&mut self, summary: Option<String>) {
        self.outcome = Some(Ok(summary));
    }

    fn on_error(&mut self, error: ChatStreamError) {
        self.outcome = Some(Err(error));
    }
}

async fn chat(client: &ApiClient, request: ChatRequest) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut console = ConsoleChat::default();
    client.stream_chat(&request, &mut console, &cancel).await;
    println!();

    match console.outcome {
        Some(Ok(Some(summary))) => println!("{summary}"),
        Some(Ok(None)) | None => {}
        Some(Err(error)) => return Err(error.into()),
    }
    Ok(())
}

fn init_miette() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    miette::set_panic_hook();
    Ok(())
}

//! Meshy CLI - submit, poll and inspect Meshy generation jobs
//!
//! The API key comes from `MESHY_API_KEY` (a `.env` file is honoured) or a
//! `.meshy` file in the working directory, a parent, or home.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use meshy::{
    ArtStyle, BinaryPayload, ImageTo3DRequest, JobFamily, ListQuery, MeshyClient, PreviewRequest,
    ProgressView, RefineRequest, SortOrder, Status, TaskRef, TaskRequest, TaskResult,
    TextTo3DLegacyRequest, TextureRequest, TextureRichness,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshy")]
#[command(author, version, about = "Generate and inspect 3D assets with the Meshy API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Ascending,
            Order::Desc => SortOrder::Descending,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an untextured preview from a prompt, optionally refining it
    TextTo3d {
        /// Description of the model
        prompt: String,

        /// What the model should not look like
        #[arg(long)]
        negative: Option<String>,

        /// Art style (realistic, sculpture, pbr, ...)
        #[arg(long)]
        art_style: Option<ArtStyle>,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<i64>,

        /// Texture the preview once it succeeds
        #[arg(long)]
        refine: bool,

        /// Texture detail for --refine (high, medium, low, none)
        #[arg(long, default_value = "medium")]
        texture_richness: TextureRichness,
    },

    /// Generate a textured model with the v1 text-to-3D endpoint
    LegacyTextTo3d {
        /// What the object is
        object_prompt: String,

        /// How it should look
        style_prompt: String,

        #[arg(long)]
        negative: Option<String>,

        #[arg(long)]
        art_style: Option<ArtStyle>,

        /// Skip PBR maps
        #[arg(long)]
        no_pbr: bool,
    },

    /// Texture an existing model
    Texture {
        /// What the object is
        object_prompt: String,

        /// How the texture should look
        style_prompt: String,

        /// Publicly reachable model URL
        #[arg(long, conflicts_with = "model_file", required_unless_present = "model_file")]
        model_url: Option<String>,

        /// Local model file to upload (.glb, .fbx, .obj, ...)
        #[arg(long)]
        model_file: Option<PathBuf>,

        #[arg(long)]
        negative: Option<String>,

        #[arg(long)]
        art_style: Option<ArtStyle>,

        /// Generate new UVs instead of keeping the model's layout
        #[arg(long)]
        no_original_uv: bool,
    },

    /// Generate a model from a single image
    ImageTo3d {
        /// Publicly reachable image URL
        #[arg(long, conflicts_with = "image_file", required_unless_present = "image_file")]
        image_url: Option<String>,

        /// Local image to upload (.png, .jpg)
        #[arg(long)]
        image_file: Option<PathBuf>,

        /// Skip PBR maps
        #[arg(long)]
        no_pbr: bool,
    },

    /// List tasks of a family
    List {
        /// texture, text-to-3d-legacy, text-to-3d-preview or text-to-3d-refine
        family: JobFamily,

        /// Page number, starting at 1
        #[arg(short, long)]
        page: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,

        /// Sort by creation time
        #[arg(long, value_enum)]
        order: Option<Order>,
    },

    /// Show the current state of a task
    Retrieve {
        family: JobFamily,
        id: String,
    },

    /// Follow a task until it finishes
    Poll {
        family: JobFamily,
        id: String,
    },

    /// Show credit balance and subscription tier
    Account,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = MeshyClient::from_env().context("Failed to create Meshy client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::TextTo3d {
            prompt,
            negative,
            art_style,
            seed,
            refine,
            texture_richness,
        } => {
            let mut request = PreviewRequest::new(&prompt);
            if let Some(negative) = negative {
                request = request.with_negative_prompt(negative);
            }
            if let Some(style) = art_style {
                request = request.with_art_style(style);
            }
            if let Some(seed) = seed {
                request = request.with_seed(seed);
            }

            let preview = run(&client, request.into(), &cancel).await?;
            if !refine {
                print_result(&preview);
                return Ok(());
            }

            let request =
                RefineRequest::from_preview(&preview)?.with_texture_richness(texture_richness);
            let refined = run(&client, request.into(), &cancel).await?;
            print_result(&refined);
        }

        Commands::LegacyTextTo3d {
            object_prompt,
            style_prompt,
            negative,
            art_style,
            no_pbr,
        } => {
            let mut request =
                TextTo3DLegacyRequest::new(object_prompt, style_prompt).with_pbr(!no_pbr);
            if let Some(negative) = negative {
                request = request.with_negative_prompt(negative);
            }
            if let Some(style) = art_style {
                request = request.with_art_style(style);
            }
            let result = run(&client, request.into(), &cancel).await?;
            print_result(&result);
        }

        Commands::Texture {
            object_prompt,
            style_prompt,
            model_url,
            model_file,
            negative,
            art_style,
            no_original_uv,
        } => {
            let mut request = TextureRequest::new(object_prompt, style_prompt)
                .with_original_uv(!no_original_uv);
            request = match (model_url, model_file) {
                (Some(url), _) => request.with_model_url(url),
                (None, Some(path)) => request.with_model_file(read_payload(&path).await?),
                (None, None) => bail!("Either --model-url or --model-file is required"),
            };
            if let Some(negative) = negative {
                request = request.with_negative_prompt(negative);
            }
            if let Some(style) = art_style {
                request = request.with_art_style(style);
            }
            let result = run(&client, request.into(), &cancel).await?;
            print_result(&result);
        }

        Commands::ImageTo3d {
            image_url,
            image_file,
            no_pbr,
        } => {
            let request = match (image_url, image_file) {
                (Some(url), _) => ImageTo3DRequest::from_url(url),
                (None, Some(path)) => ImageTo3DRequest::from_file(read_payload(&path).await?),
                (None, None) => bail!("Either --image-url or --image-file is required"),
            };
            let result = run(&client, request.with_pbr(!no_pbr).into(), &cancel).await?;
            print_result(&result);
        }

        Commands::List {
            family,
            page,
            page_size,
            order,
        } => {
            let query = ListQuery {
                page_num: page,
                page_size,
                sort: order.map(SortOrder::from),
            };
            let tasks = client.list(family, &query).await?;
            if tasks.is_empty() {
                println!("No {} tasks", family);
            }
            for task in &tasks {
                let created = task
                    .created_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {:<11}  {:>3}%  {:<16}  {}",
                    task.id,
                    task.status,
                    task.progress,
                    created,
                    task.display_prompt().unwrap_or("")
                );
            }
        }

        Commands::Retrieve { family, id } => {
            let result = client.retrieve(&TaskRef::new(family, id)).await?;
            print_result(&result);
        }

        Commands::Poll { family, id } => {
            let result = follow(&client, &TaskRef::new(family, id), &cancel).await?;
            print_result(&result);
        }

        Commands::Account => {
            let credits = client.credit_balance().await?;
            let subscription = client.subscription().await?;
            println!("Tier:        {}", subscription.tier);
            println!("Credits:     {}", credits.credit_balance);
            println!("Free:        {}", credits.free_credit_balance);
            println!(
                "Earned:      {} ({} today)",
                credits.share_credit_earned, credits.share_credit_earned_today
            );
            if let Some(refill) = subscription.refill_time() {
                println!("Refills at:  {}", refill.format("%Y-%m-%d %H:%M"));
            }
        }
    }

    Ok(())
}

async fn read_payload(path: &Path) -> anyhow::Result<BinaryPayload> {
    BinaryPayload::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Submit and follow a task; anything other than success is an error
async fn run(
    client: &MeshyClient,
    request: TaskRequest,
    cancel: &CancellationToken,
) -> anyhow::Result<TaskResult> {
    let task = client.submit(&request).await?;
    println!("Submitted {}", task);
    let result = follow(client, &task, cancel).await?;
    ensure_succeeded(&task, &result)?;
    Ok(result)
}

fn ensure_succeeded(task: &TaskRef, result: &TaskResult) -> anyhow::Result<()> {
    if result.status == Status::Succeeded {
        return Ok(());
    }
    match result.error_message() {
        Some(message) => bail!("Task {} ended {}: {}", task, result.status, message),
        None => bail!("Task {} ended {}", task, result.status),
    }
}

async fn follow(
    client: &MeshyClient,
    task: &TaskRef,
    cancel: &CancellationToken,
) -> anyhow::Result<TaskResult> {
    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message(format!("Waiting for {}", task));

    let outcome = client
        .poll(
            task,
            |snapshot| match snapshot.progress_report().view() {
                ProgressView::Queued(ahead) => {
                    progress.set_message(format!("{} ahead in queue", ahead));
                }
                ProgressView::Percent(p) => {
                    progress.set_position(u64::from(p));
                    progress.set_message(snapshot.status.to_string());
                }
            },
            cancel,
        )
        .await;

    match outcome {
        Ok(result) => {
            progress.finish_with_message(result.status.to_string());
            Ok(result)
        }
        Err(e) => {
            progress.abandon_with_message(e.to_string());
            Err(e.into())
        }
    }
}

fn print_result(result: &TaskResult) {
    println!();
    println!("Task:        {}", result.id);
    println!("Status:      {}", result.status);
    if let Some(prompt) = result.display_prompt() {
        println!("Prompt:      {}", prompt);
    }
    if let Some(mode) = &result.mode {
        println!("Mode:        {}", mode);
    }
    if let Some(urls) = &result.model_urls {
        for (format, url) in [
            ("glb", &urls.glb),
            ("fbx", &urls.fbx),
            ("usdz", &urls.usdz),
            ("obj", &urls.obj),
            ("mtl", &urls.mtl),
        ] {
            if let Some(url) = url {
                println!("Model {:<5} {}", format, url);
            }
        }
    }
    for (i, textures) in result.texture_urls.iter().enumerate() {
        if let Some(url) = &textures.base_color {
            println!("Texture {}:   {}", i, url);
        }
    }
    if let Some(thumbnail) = &result.thumbnail_url {
        println!("Thumbnail:   {}", thumbnail);
    }
    if let Some(finished) = result.finished_at() {
        println!("Finished:    {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(message) = result.error_message() {
        println!("Error:       {}", message);
    }
}

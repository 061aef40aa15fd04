//! Protodesk CLI
//!
//! The `protodesk` command exposes the schema form engine and the remote
//! repository tools from a terminal.
//!
//! ## Commands
//!
//! - `render`: render a schema + data document into field descriptors
//! - `set` / `append` / `remove`: path-copy edits on a data document
//! - `summarize`: list summaries for an array of objects
//! - `scan`: fetch the text files of a GitHub branch
//! - `commit`: commit local files to a GitHub branch as one commit

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use protodesk_core::AppConfig;
use protodesk_remote::{
    AtomicCommitter, FileChange, GitHubClient, RemoteObjectStore, RepoCoordinates, ScanLimits,
    TreeScanner,
};
use protodesk_schema::{
    append_item, coerce_boolean, coerce_numeric, edit, remove_item, resolve_list, DataValue,
    FieldPath, Mode, NodeKind, Renderer, SchemaNode,
};

#[derive(Parser)]
#[command(name = "protodesk")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schema-driven data editing with atomic GitHub commits", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a data document against a schema as field descriptors (JSON)
    Render {
        /// Schema document (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Data document (JSON); an empty object when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Render editors instead of read-only values
        #[arg(long)]
        edit: bool,

        /// Field names to leave out at every level
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Path prefix for every rendered field
        #[arg(long, default_value = "")]
        prefix: String,

        /// Nesting depth past which fields render as raw values
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Set the value at a field path
    Set {
        /// Data document (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Dotted field path, e.g. `apis.0.name`
        #[arg(short, long)]
        path: String,

        /// New value as JSON; anything that is not valid JSON is a string
        #[arg(long)]
        value: String,

        /// Schema for the document; numeric and boolean fields coerce the value
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append a default element to the array at a field path
    Append {
        #[arg(short, long)]
        data: PathBuf,

        /// Schema used to build the new element
        #[arg(short, long)]
        schema: PathBuf,

        #[arg(short, long)]
        path: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove one element from the array at a field path
    Remove {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        path: String,

        /// Element index
        #[arg(short, long)]
        index: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize the elements of an array field for list display
    Summarize {
        #[arg(short, long)]
        schema: PathBuf,

        #[arg(short, long)]
        data: PathBuf,

        /// Path of the array field
        #[arg(short, long)]
        path: String,

        /// Style override (compact, badge, badge-image)
        #[arg(long)]
        style: Option<String>,
    },

    /// Fetch the text files of a repository branch
    Scan {
        /// Repository, `owner/name` or a GitHub URL
        #[arg(short, long)]
        repo: String,

        /// Branch to scan (default: the repository's default branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// Print the full result, file contents included, as JSON
        #[arg(long)]
        contents: bool,

        /// Access token (overrides GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Commit local files to a branch as a single commit
    Commit {
        #[arg(short, long)]
        repo: String,

        #[arg(short, long)]
        branch: String,

        #[arg(short, long)]
        message: String,

        /// Files as `REPO_PATH=LOCAL_PATH`, or `PATH` when both are the same
        #[arg(required = true)]
        files: Vec<String>,

        /// Access token (overrides GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log.tracing_level()?
    };
    protodesk_core::init_tracing(cli.json || config.log.json, level);

    match cli.command {
        Commands::Render {
            schema,
            data,
            edit,
            exclude,
            prefix,
            max_depth,
        } => {
            let mode = if edit { Mode::Edit } else { Mode::View };
            cmd_render(&schema, data.as_deref(), mode, &exclude, &prefix, max_depth)
        }
        Commands::Set {
            data,
            path,
            value,
            schema,
            output,
        } => cmd_set(&data, &path, &value, schema.as_deref(), output.as_deref()),
        Commands::Append {
            data,
            schema,
            path,
            output,
        } => cmd_append(&data, &schema, &path, output.as_deref()),
        Commands::Remove {
            data,
            path,
            index,
            output,
        } => cmd_remove(&data, &path, index, output.as_deref()),
        Commands::Summarize {
            schema,
            data,
            path,
            style,
        } => cmd_summarize(&schema, &data, &path, style.as_deref()),
        Commands::Scan {
            repo,
            branch,
            contents,
            token,
        } => {
            let repo = parse_repo(&repo)?;
            let store = github_store(&config, token.as_deref())?;
            cmd_scan(store, config.scan, &repo, branch.as_deref(), contents).await
        }
        Commands::Commit {
            repo,
            branch,
            message,
            files,
            token,
        } => {
            let repo = parse_repo(&repo)?;
            let store = github_store(&config, token.as_deref())?;
            cmd_commit(store, &repo, &branch, &message, &files).await
        }
    }
}

fn parse_repo(repo: &str) -> Result<RepoCoordinates> {
    repo.parse::<RepoCoordinates>()
        .with_context(|| format!("Invalid repository: {repo}"))
}

fn github_store(config: &AppConfig, token: Option<&str>) -> Result<Arc<dyn RemoteObjectStore>> {
    let client =
        GitHubClient::new(config.github.clone()).context("Failed to create GitHub client")?;
    let client = match token {
        Some(token) => client.with_token(token),
        None => client,
    };
    Ok(Arc::new(client))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {} as JSON", path.display()))
}

/// Schemas go through the lenient parser: an unusable document renders as
/// an empty form rather than failing the command.
fn read_schema(path: &Path) -> Result<SchemaNode> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    Ok(SchemaNode::from_document_str(&text))
}

fn read_data(path: &Path) -> Result<DataValue> {
    Ok(DataValue::from(read_json(path)?))
}

fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            info!(path = %path.display(), "wrote document");
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> DataValue {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(DataValue::from)
        .unwrap_or_else(|_| DataValue::string(raw))
}

/// Value for a field of the given schema node. Numeric and boolean fields
/// never store text, and string fields store the input verbatim.
fn typed_value(field: Option<&SchemaNode>, raw: &str) -> DataValue {
    match field.map(|node| &node.kind) {
        Some(NodeKind::Number) => coerce_numeric(raw, false),
        Some(NodeKind::Integer) => coerce_numeric(raw, true),
        Some(NodeKind::Boolean) => DataValue::Bool(coerce_boolean(Some(&parse_value(raw)))),
        Some(NodeKind::String { .. }) => DataValue::string(raw),
        _ => parse_value(raw),
    }
}

/// Split a `REPO_PATH=LOCAL_PATH` argument.
fn parse_file_arg(arg: &str) -> Result<(String, PathBuf)> {
    let (remote, local) = match arg.split_once('=') {
        Some((remote, local)) => (remote, local),
        None => (arg, arg),
    };
    let remote = remote.trim_start_matches("./");
    if remote.is_empty() || local.is_empty() {
        bail!("Invalid file argument: {arg:?}");
    }
    Ok((remote.to_string(), PathBuf::from(local)))
}

fn cmd_render(
    schema_path: &Path,
    data_path: Option<&Path>,
    mode: Mode,
    exclude: &[String],
    prefix: &str,
    max_depth: Option<usize>,
) -> Result<()> {
    let schema = read_schema(schema_path)?;
    let data = match data_path {
        Some(path) => read_data(path)?,
        None => DataValue::empty_object(),
    };
    let prefix = FieldPath::parse(prefix)?;

    let mut renderer = Renderer::new(mode).excluding(exclude.iter().cloned());
    if let Some(depth) = max_depth {
        renderer = renderer.with_max_depth(depth);
    }

    if prefix.is_root() {
        write_json(None, &renderer.render_form(&schema, &data))
    } else {
        write_json(None, &renderer.render(&schema, &data, &prefix))
    }
}

fn cmd_set(
    data_path: &Path,
    path: &str,
    value: &str,
    schema_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let data = read_data(data_path)?;
    let path = FieldPath::parse_non_root(path)?;
    let schema = schema_path.map(read_schema).transpose()?;
    let field = schema.as_ref().and_then(|schema| schema.at_path(&path));
    let updated = edit(&data, &path, typed_value(field, value));
    write_json(output, &updated)
}

fn cmd_append(data_path: &Path, schema_path: &Path, path: &str, output: Option<&Path>) -> Result<()> {
    let data = read_data(data_path)?;
    let schema = read_schema(schema_path)?;
    let path = FieldPath::parse_non_root(path)?;

    let item_schema = schema
        .at_path(&path)
        .and_then(SchemaNode::items)
        .with_context(|| format!("Schema has no array at {path}"))?;
    let updated = append_item(&data, &path, item_schema);
    write_json(output, &updated)
}

fn cmd_remove(data_path: &Path, path: &str, index: usize, output: Option<&Path>) -> Result<()> {
    let data = read_data(data_path)?;
    let path = FieldPath::parse_non_root(path)?;

    let len = path
        .lookup(&data)
        .and_then(DataValue::as_array)
        .map(<[DataValue]>::len)
        .with_context(|| format!("No array at {path}"))?;
    if index >= len {
        bail!("Index {index} is out of range for {path} (length {len})");
    }
    write_json(output, &remove_item(&data, &path, index))
}

#[derive(Serialize)]
struct SummaryOutput {
    style: protodesk_schema::DisplayStyle,
    items: Vec<protodesk_schema::DisplaySummary>,
}

fn cmd_summarize(schema_path: &Path, data_path: &Path, path: &str, style: Option<&str>) -> Result<()> {
    let schema = read_schema(schema_path)?;
    let data = read_data(data_path)?;
    let path = FieldPath::parse_non_root(path)?;

    let array_schema = schema
        .at_path(&path)
        .with_context(|| format!("Schema has nothing at {path}"))?;
    let items = path.lookup(&data).and_then(DataValue::as_array).unwrap_or(&[]);

    let (style, items) = resolve_list(items, array_schema, style);
    write_json(None, &SummaryOutput { style, items })
}

async fn cmd_scan(
    store: Arc<dyn RemoteObjectStore>,
    limits: ScanLimits,
    repo: &RepoCoordinates,
    branch: Option<&str>,
    contents: bool,
) -> Result<()> {
    let scanner = TreeScanner::with_limits(store, limits);
    let result = scanner
        .scan(repo, branch)
        .await
        .with_context(|| format!("Failed to scan {repo}"))?;

    if contents {
        return write_json(None, &result);
    }

    println!(
        "{}@{}: {} files ({} entries{})",
        repo,
        result.branch,
        result.files.len(),
        result.total_entries,
        if result.truncated { ", truncated" } else { "" }
    );
    for (path, text) in &result.files {
        println!("  {path} ({} bytes)", text.len());
    }
    Ok(())
}

async fn cmd_commit(
    store: Arc<dyn RemoteObjectStore>,
    repo: &RepoCoordinates,
    branch: &str,
    message: &str,
    files: &[String],
) -> Result<()> {
    let mut changes = Vec::with_capacity(files.len());
    for arg in files {
        let (remote, local) = parse_file_arg(arg)?;
        let content = std::fs::read_to_string(&local)
            .with_context(|| format!("Failed to read {}", local.display()))?;
        changes.push(FileChange::new(remote, content));
    }

    let committer = AtomicCommitter::new(store);
    let outcome = match committer.commit_files(repo, branch, changes, message).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_conflict() => {
            return Err(e).context(format!(
                "Branch {branch} moved while committing; re-run to commit on top of the new head"
            ));
        }
        Err(e) => return Err(e).context(format!("Failed to commit to {repo}")),
    };

    let short = &outcome.commit_sha[..7.min(outcome.commit_sha.len())];
    println!("[{}] {} ({})", outcome.branch, message, short);
    println!("Commit: {}", outcome.commit_sha);
    println!("Files:  {}", outcome.files_count);
    Ok(())
}

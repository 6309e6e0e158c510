use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use comp_gateway::client::{ApiResponse, Download, GatewayClient, NewComment};
use serde_json::Value;

/// Failures reported by the gateway; the CLI exits non-zero on these.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("download failed with status {status}: {body}")]
    Download { status: u16, body: String },
}

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the compliance API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Authorization header value, e.g. "Bearer <token>"
    #[arg(short, long)]
    token: String,

    /// Organization id sent as X-Organization-Id
    #[arg(short, long)]
    org: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Task attachments
    #[command(subcommand)]
    Attachments(AttachmentCommands),
    /// Comments on any entity
    #[command(subcommand)]
    Comments(CommentCommands),
}

#[derive(Subcommand)]
enum AttachmentCommands {
    /// List attachments for a task
    List { task_id: String },
    /// Upload a file to a task
    Upload {
        task_id: String,
        file: PathBuf,
        /// MIME type (defaults to application/octet-stream)
        #[arg(long)]
        file_type: Option<String>,
    },
    /// Delete an attachment
    Delete {
        task_id: String,
        attachment_id: String,
    },
    /// Download an attachment, printing JSON or writing the body to a file
    Download {
        attachment_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// List comments for an entity
    List {
        #[arg(long)]
        entity_id: String,
        #[arg(long)]
        entity_type: String,
    },
    /// Create a comment
    Create {
        #[arg(long)]
        entity_id: String,
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        content: String,
    },
    /// Replace a comment's content
    Update { comment_id: String, content: String },
    /// Delete a comment
    Delete { comment_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = GatewayClient::new(&cli.url, cli.token, cli.org);

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Attachments(cmd) => match cmd {
            AttachmentCommands::List { task_id } => {
                print_response(client.list_attachments(&task_id).await?)?;
            }
            AttachmentCommands::Upload {
                task_id,
                file,
                file_type,
            } => {
                print_response(
                    client
                        .upload_file(&task_id, &file, file_type.as_deref())
                        .await?,
                )?;
            }
            AttachmentCommands::Delete {
                task_id,
                attachment_id,
            } => {
                print_response(client.delete_attachment(&task_id, &attachment_id).await?)?;
            }
            AttachmentCommands::Download {
                attachment_id,
                output,
            } => {
                let download = client.download_attachment(&attachment_id).await?;
                check_download(&download)?;
                match output {
                    Some(path) => {
                        tokio::fs::write(&path, &download.body).await?;
                        println!("Wrote {} bytes to {}", download.body.len(), path.display());
                    }
                    None => println!("{}", String::from_utf8_lossy(&download.body)),
                }
            }
        },
        Commands::Comments(cmd) => match cmd {
            CommentCommands::List {
                entity_id,
                entity_type,
            } => {
                print_response(client.list_comments(&entity_id, &entity_type).await?)?;
            }
            CommentCommands::Create {
                entity_id,
                entity_type,
                content,
            } => {
                let comment = NewComment {
                    content,
                    entity_id,
                    entity_type,
                };
                print_response(client.create_comment(&comment).await?)?;
            }
            CommentCommands::Update {
                comment_id,
                content,
            } => {
                print_response(client.update_comment(&comment_id, &content).await?)?;
            }
            CommentCommands::Delete { comment_id } => {
                print_response(client.delete_comment(&comment_id).await?)?;
            }
        },
    }

    Ok(())
}

fn check_download(download: &Download) -> Result<(), CliError> {
    if download.status.is_success() {
        return Ok(());
    }
    Err(CliError::Download {
        status: download.status.as_u16(),
        body: String::from_utf8_lossy(&download.body).into_owned(),
    })
}

fn print_response(res: ApiResponse<Value>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(message) = res.error {
        return Err(CliError::Gateway {
            status: res.status,
            message,
        }
        .into());
    }

    match res.data {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("OK ({})", res.status),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use reqwest::StatusCode;

    #[test]
    fn test_gateway_error_is_failure() {
        let res = ApiResponse {
            data: None,
            error: Some("Unauthorized".to_string()),
            status: 401,
        };
        let err = print_response(res).unwrap_err();
        assert_eq!(err.to_string(), "gateway returned 401: Unauthorized");
    }

    #[test]
    fn test_success_is_ok() {
        let res = ApiResponse {
            data: None,
            error: None,
            status: 204,
        };
        assert!(print_response(res).is_ok());
    }

    #[test]
    fn test_failed_download_is_failure() {
        let download = Download {
            status: StatusCode::NOT_FOUND,
            content_type: None,
            body: Bytes::from_static(br#"{"message":"Not Found"}"#),
        };
        assert!(matches!(
            check_download(&download),
            Err(CliError::Download { status: 404, .. })
        ));

        let ok = Download {
            status: StatusCode::OK,
            ..download
        };
        assert!(check_download(&ok).is_ok());
    }
}

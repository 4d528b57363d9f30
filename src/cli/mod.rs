//! CLI scaffolding: argument parsing, command definitions, and dispatch.
pub mod args;
pub mod commands;

pub use args::{
    ArtifactArgs, DeleteArgs, DownloadAllArgs, DownloadArgs, ListArgs, MessagesArgs, RunArgs,
    StatusArgs, SubmitArgs, TemplatesArgs, UploadArgs,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "atlana")]
#[command(version = crate::VERSION)]
#[command(about = "Containerised image-processing workflow engine")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Submit a workflow for execution",
        after_help = "Example:\n    atlana submit --id 1 params.json"
    )]
    Submit(SubmitArgs),
    #[command(
        about = "Execute a queued workflow (the detached executor entry point)",
        after_help = "Example:\n    atlana run /tmp/atlana/<workflow-id>"
    )]
    Run(RunArgs),
    #[command(about = "Report the status of a workflow")]
    Status(StatusArgs),
    #[command(about = "Report the accumulated output and error messages of a workflow")]
    Messages(MessagesArgs),
    #[command(about = "List recoverable workflows in the run area")]
    List(ListArgs),
    #[command(about = "Delete a finished workflow")]
    Delete(DeleteArgs),
    #[command(about = "Fetch a declared artifact of a workflow")]
    Artifact(ArtifactArgs),
    #[command(about = "Serialise a workflow and its parameters to a saved document")]
    Download(DownloadArgs),
    #[command(
        name = "download-all",
        about = "Serialise the workflow definition catalogue"
    )]
    DownloadAll(DownloadAllArgs),
    #[command(about = "Open a saved workflow document")]
    Upload(UploadArgs),
    #[command(about = "List the workflow template catalogue")]
    Templates(TemplatesArgs),
}

use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct SubmitArgs {
    /// Parameter bindings JSON file
    #[arg(value_name = "PARAMS")]
    pub params: PathBuf,

    /// Workflow template JSON file to run
    #[arg(long, value_name = "FILE", conflicts_with = "id")]
    pub template: Option<PathBuf>,

    /// Catalogue identifier of a stored workflow definition
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Run the executor inside this process and wait for completion
    #[arg(long)]
    pub foreground: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Workflow root directory (or its queue file) to execute
    #[arg(value_name = "WORKDIR")]
    pub workdir: PathBuf,

    /// Enable debug logging (default: warn)
    #[arg(long)]
    pub debug: bool,

    /// Enable info logging (default: warn)
    #[arg(long, conflicts_with = "debug")]
    pub info: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Workflow identifier returned by submit
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: String,
}

#[derive(Args)]
pub struct MessagesArgs {
    /// Workflow identifier returned by submit
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: String,
}

#[derive(Args)]
pub struct ListArgs {}

#[derive(Args)]
pub struct DeleteArgs {
    /// Workflow identifier returned by submit
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: String,
}

#[derive(Args)]
pub struct ArtifactArgs {
    /// Workflow identifier returned by submit
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: String,

    /// Step command that produced the artifact
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Declared result name of the artifact
    #[arg(value_name = "RESULT")]
    pub result: String,

    /// Copy the artifact to this path instead of printing its location
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Workflow identifier returned by submit
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: String,

    /// Passcode sealing any credential blobs in the document
    #[arg(long, value_name = "PASSCODE")]
    pub passcode: String,

    /// Write the document to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DownloadAllArgs {
    /// Write the document to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct UploadArgs {
    /// Saved workflow document to open
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Passcode that sealed the document's credential blobs
    #[arg(long, value_name = "PASSCODE")]
    pub passcode: String,

    /// Also add the contained template to the catalogue
    #[arg(long)]
    pub register: bool,
}

#[derive(Args)]
pub struct TemplatesArgs {}

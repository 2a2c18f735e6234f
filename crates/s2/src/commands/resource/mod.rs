use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::BufReader, path::Path};

use s2_resource::{Resource, ResourceOptions};

pub mod dump;
pub mod info;
pub mod scan;

#[derive(clap::Subcommand)]
pub enum ResourceCommands {
    /// Print the header and block directory of a resource
    Info(info::InfoArgs),
    /// Print the decoded contents of a resource as JSON
    Dump(dump::DumpArgs),
    /// Parse every compiled resource below a directory
    Scan(scan::ScanArgs),
}

impl ResourceCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            ResourceCommands::Info(info) => info.handle(),
            ResourceCommands::Dump(dump) => dump.handle(),
            ResourceCommands::Scan(scan) => scan.handle(),
        }
    }
}

/// Open and parse the resource at `path`
fn open(path: &Path, options: ResourceOptions) -> Result<(Resource, BufReader<File>)> {
    let f = File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;
    let mut reader = BufReader::new(f);
    let resource = Resource::from_reader(&mut reader, options)
        .context(format!("reading {}", path.display()))?;
    Ok((resource, reader))
}

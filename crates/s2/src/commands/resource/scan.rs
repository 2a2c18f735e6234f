use clap::Args;
use miette::{miette, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::info;
use walkdir::WalkDir;

use s2_resource::ResourceOptions;

#[derive(Args)]
pub struct ScanArgs {
    /// A directory of compiled resources
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,
}

impl ScanArgs {
    pub fn handle(&self) -> Result<()> {
        let files = WalkDir::new(&self.directory)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().ends_with("_c"))
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("no compiled resources below {}", self.directory.display()));
        }
        info!("scanning {} files", files.len());

        let mut failed = 0;
        for file in &files {
            let name = file
                .path()
                .strip_prefix(&self.directory)
                .unwrap_or(file.path());

            match super::open(file.path(), ResourceOptions::default()) {
                Ok((resource, _)) => {
                    println!("✅ {} ({})", name.display().green(), resource.resource_type())
                }
                Err(error) => {
                    failed += 1;
                    println!("❌ {}: {:?}", name.display().red(), error);
                }
            }
        }

        if failed > 0 {
            return Err(miette!("{} of {} resources failed to parse", failed, files.len()));
        }
        Ok(())
    }
}

use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use s2_resource::ResourceOptions;

#[derive(Args)]
pub struct InfoArgs {
    /// An input resource file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let (resource, _) = super::open(&self.file, ResourceOptions::default())?;

        println!("{}", self.file.display().bold());
        println!("  header version: {}", resource.header().header_version);
        println!("  version:        {}", resource.version());
        println!("  block offset:   {}", resource.block_offset());
        println!("  type:           {}", resource.resource_type().cyan());

        let blocks = resource
            .blocks()
            .iter()
            .map(|block| {
                format!(
                    "  {} offset {:>8} size {:>8}",
                    block.block_type.yellow(),
                    block.offset,
                    block.size
                )
            })
            .join("\n");
        println!("{blocks}");

        if let Some(data) = resource.data() {
            println!("  data:           {}", data.kind());
        }
        Ok(())
    }
}

use clap::Args;
use miette::{miette, IntoDiagnostic, Result};
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, warn};

use s2_resource::{
    resource::{Block, BlockContents},
    BlockType, FileSystemLoader, ResourceData, ResourceOptions,
};

#[derive(Args)]
pub struct DumpArgs {
    /// An input resource file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The block to print instead of DATA
    #[arg(short, long, value_name = "TAG", value_parser = parse_block_type)]
    block: Option<BlockType>,

    /// A directory that referenced resources are loaded from
    #[arg(short, long, value_name = "DIR")]
    search_path: Option<PathBuf>,
}

fn parse_block_type(tag: &str) -> Result<BlockType, String> {
    <[u8; 4]>::try_from(tag.as_bytes())
        .ok()
        .and_then(|tag| BlockType::from_tag(&tag))
        .ok_or_else(|| format!("unknown block type {tag:?}"))
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let options = match &self.search_path {
            Some(root) => ResourceOptions::builder()
                .loader(Arc::new(FileSystemLoader::new(root)))
                .build(),
            None => ResourceOptions::default(),
        };
        let (resource, _) = super::open(&self.file, options)?;

        let block_type = self.block.unwrap_or(BlockType::DATA);
        let block = resource
            .find_block(block_type)
            .ok_or(miette!("{} has no {} block", self.file.display(), block_type))?;
        debug!("dumping {} block of {}", block_type, resource.resource_type());

        println!("{}", render(block)?);
        Ok(())
    }
}

/// JSON for key-value contents, debug output for everything else
fn render(block: &Block) -> Result<String> {
    let json = match &block.contents {
        BlockContents::KeyValues(data) => serde_json::to_string_pretty(data),
        BlockContents::Data(ResourceData::Ntro(data)) => serde_json::to_string_pretty(data),
        BlockContents::Data(ResourceData::KeyValues(data)) => serde_json::to_string_pretty(data),
        BlockContents::Data(ResourceData::Material(material)) => {
            serde_json::to_string_pretty(&material.data)
        }
        BlockContents::Data(ResourceData::SoundEventScript(script)) => {
            serde_json::to_string_pretty(script)
        }
        BlockContents::Unsupported => {
            warn!("{} blocks are not decoded", block.block_type);
            return Ok(String::new());
        }
        other => return Ok(format!("{other:#?}")),
    };
    json.into_diagnostic()
}

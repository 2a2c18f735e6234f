pub mod resource;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle compiled resource files
    Resource {
        #[command(subcommand)]
        command: resource::ResourceCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Resource { command } => command.handle(),
        }
    }
}

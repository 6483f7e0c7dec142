use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Image similarity search and classification for marketplace listings", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP service.
    ///
    /// Settings come from defaults, then the optional config file,
    /// then environment variables (QDRANT_URL, CLIP_MODEL, BIND_ADDR, ...).
    Serve {
        /// YAML config file
        #[clap(short, long)]
        config: Option<PathBuf>,
    },

    /// Bulk-index listing images from a CSV file through a running service.
    ///
    /// The CSV needs the headers `listing_id,image_url,local_path_to_image`.
    /// A row's local file is uploaded when it exists, otherwise the image is
    /// downloaded from `image_url` first.
    IndexCsv {
        /// Service base url, e.g. http://localhost:9000
        base_url: String,

        /// CSV file with one image per row
        csv: PathBuf,
    },

    /// Print the classification label table as JSON
    Vocabulary,
}

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Parser;
use maplibre_braille::{
    config::Config,
    coords::{LatLon, TileCoords},
    io::source_client::{SourceFetchError, TileSource},
    render::Renderer,
    style::Styler,
};

/// Renders a single frame of a vector tile map to the terminal.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Style document (JSON).
    #[arg(long)]
    style: PathBuf,
    /// Directory holding `{z}/{x}/{y}.pbf` tiles.
    #[arg(long)]
    tiles: PathBuf,
    /// Renderer configuration (JSON); defaults apply to omitted fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 52.51298, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, default_value_t = 13.42012, allow_negative_numbers = true)]
    lon: f64,
    #[arg(long, default_value_t = 0.0)]
    zoom: f64,
    #[arg(long, default_value_t = 160)]
    width: usize,
    #[arg(long, default_value_t = 80)]
    height: usize,
    /// Draw with block characters instead of braille.
    #[arg(long)]
    ascii: bool,
}

struct FileTileSource {
    root: PathBuf,
}

#[async_trait]
impl TileSource for FileTileSource {
    async fn fetch(&self, coords: &TileCoords) -> Result<Vec<u8>, SourceFetchError> {
        let path = self
            .root
            .join(coords.z.to_string())
            .join(coords.x.to_string())
            .join(format!("{}.pbf", coords.y));
        log::debug!("reading {coords} from {}", path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| SourceFetchError(Box::new(e)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();

    let styler = Styler::from_json(&tokio::fs::read_to_string(&cli.style).await?)?;
    let mut config = match &cli.config {
        Some(path) => Config::from_json(&tokio::fs::read_to_string(path).await?)?,
        None => Config::default(),
    };
    if cli.ascii {
        config.use_braille = false;
    }
    let zoom = cli.zoom.clamp(0.0, config.max_zoom);

    let renderer = Renderer::new(
        FileTileSource { root: cli.tiles },
        styler,
        config,
        cli.width,
        cli.height,
    );
    let frame = renderer.draw(LatLon::new(cli.lat, cli.lon), zoom).await?;
    print!("{frame}");
    println!();

    Ok(())
}

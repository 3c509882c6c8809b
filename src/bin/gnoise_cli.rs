use anyhow::Result;
use clap::Parser;

use gnoise::audio_io::{self, AudioSink};
use gnoise::config::{Cli, Config};
use gnoise::pipeline::BlockPipeline;
use gnoise::{logging, render};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;
    logging::init(config.quiet);
    config.validate()?;
    log::debug!("resolved config: {config:?}");

    if let Some(path) = cli.dump.as_deref() {
        return render::dump_block(&config, path);
    }
    if let Some(path) = cli.render.as_deref() {
        return render::render_wav(&config, path);
    }

    let sink = AudioSink::new(BlockPipeline::start(&config));
    audio_io::play(&config, sink)
}

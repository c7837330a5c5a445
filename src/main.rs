use clap::Parser;
use slime_format::{CompressionKind, EncodeOptions, SlimeSource};
use slime_logger::log::{log, set_min_severity};
use slime_logger::severity::LogSeverity::{Debug, Fatal, Info};
use slimeloader::args::{Args, Command};
use slimeloader::report::WorldSummary;
use slimeloader::{ChunkLoader, FileSlimeSource, LoaderOptions, Result, SlimeCodec, SlimeLoader};
use std::io;
use std::path::PathBuf;
use tokio::time::Instant;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if args.debug {
        set_min_severity(Debug);
    }

    let result = match args.command {
        Command::Info {
            file,
            compression,
            json,
        } => info(file, compression, json).await,
        Command::Resave {
            input,
            output,
            input_compression,
            compression,
            minimal,
        } => resave(input, output, input_compression, compression, minimal).await,
    };

    if let Err(err) = result {
        log(err.to_string(), Fatal);
        std::process::exit(1);
    }
}

async fn info(file: PathBuf, compression: CompressionKind, json: bool) -> Result<()> {
    let options = LoaderOptions {
        read_only: true,
        compression,
        ..Default::default()
    };
    let start = Instant::now();
    let loader = SlimeLoader::open(FileSlimeSource::new(file), options).await?;
    let elapsed = start.elapsed();

    let world = loader.world();
    let summary = WorldSummary::new(&*world.read().await, elapsed)?;
    if json {
        let text = summary
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        println!("{}", text);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

async fn resave(
    input: PathBuf,
    output: PathBuf,
    input_compression: CompressionKind,
    compression: CompressionKind,
    minimal: bool,
) -> Result<()> {
    let source = FileSlimeSource::new(&input);
    let world = tokio::task::spawn_blocking(move || {
        let codec = SlimeCodec::new().with_compression(input_compression);
        codec.read_from(source.load()?)
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

    let options = LoaderOptions {
        compression,
        encode: EncodeOptions { minimal },
        ..Default::default()
    };
    let loader = SlimeLoader::from_world(world, FileSlimeSource::new(&output), options);
    loader.save_world().await?;
    log(
        format!("Resaved {} to {}", input.display(), output.display()),
        Info,
    );
    Ok(())
}

use crate::options::LoaderOptions;
use futures::future::{BoxFuture, FutureExt};
use slime_common::{Result, SlimeError};
use slime_format::{ChunkColumn, EntitySpawn, SlimeCodec, SlimeSource, SlimeWorld};
use slime_logger::log::log;
use slime_logger::severity::LogSeverity::{Debug, Info};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tokio::task::JoinError;
use tokio::time::Instant;

/// Chunk persistence as a host world engine sees it.
pub trait ChunkLoader: Send + Sync {
    /// The stored chunk, or `None` when the world has no chunk there.
    fn load_chunk(&self, x: i32, z: i32) -> BoxFuture<'_, Result<Option<ChunkColumn>>>;

    /// Replaces the stored chunk in memory.
    fn save_chunk(&self, chunk: ChunkColumn) -> BoxFuture<'_, Result<()>>;

    /// Writes the whole world through the underlying source.
    fn save_world(&self) -> BoxFuture<'_, Result<()>>;

    fn save_chunks(&self, chunks: Vec<ChunkColumn>) -> BoxFuture<'_, Result<()>> {
        async move {
            for chunk in chunks {
                self.save_chunk(chunk).await?;
            }
            Ok::<(), SlimeError>(())
        }
        .boxed()
    }
}

fn join_error(err: JoinError) -> SlimeError {
    SlimeError::IoError(io::Error::new(io::ErrorKind::Other, err))
}

/// Serves chunks out of one decoded slime world.
///
/// The world sits behind a single `RwLock`, so chunk saves are applied one at a
/// time. Entities are handed to subscribers when their chunk is first loaded.
pub struct SlimeLoader {
    codec: Arc<SlimeCodec>,
    source: Arc<dyn SlimeSource>,
    world: Arc<RwLock<SlimeWorld>>,
    read_only: bool,
    subscribers: Mutex<Vec<UnboundedSender<EntitySpawn>>>,
}

impl SlimeLoader {
    /// Reads and decodes the source on the blocking pool.
    pub async fn open<S>(source: S, options: LoaderOptions) -> Result<Self>
    where
        S: SlimeSource + 'static,
    {
        let source: Arc<dyn SlimeSource> = Arc::new(source);
        let codec = Arc::new(codec_for(&options));

        let start = Instant::now();
        let world = {
            let source = Arc::clone(&source);
            let codec = Arc::clone(&codec);
            tokio::task::spawn_blocking(move || codec.read_from(source.load()?))
                .await
                .map_err(join_error)??
        };
        log(
            format!(
                "Took {}ms to load a world of {} chunks",
                start.elapsed().as_millis(),
                world.chunk_count()
            ),
            Info,
        );

        Ok(Self::with_world(world, source, codec, options.read_only))
    }

    /// Wraps an existing world, e.g. one built in memory.
    pub fn from_world<S>(world: SlimeWorld, source: S, options: LoaderOptions) -> Self
    where
        S: SlimeSource + 'static,
    {
        Self::with_world(
            world,
            Arc::new(source),
            Arc::new(codec_for(&options)),
            options.read_only,
        )
    }

    fn with_world(
        world: SlimeWorld,
        source: Arc<dyn SlimeSource>,
        codec: Arc<SlimeCodec>,
        read_only: bool,
    ) -> Self {
        SlimeLoader {
            codec,
            source,
            world: Arc::new(RwLock::new(world)),
            read_only,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Receives an event for every entity released by a chunk load.
    pub fn subscribe(&self) -> UnboundedReceiver<EntitySpawn> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        receiver
    }

    /// Shared handle to the world for read access.
    pub fn world(&self) -> Arc<RwLock<SlimeWorld>> {
        Arc::clone(&self.world)
    }

    fn notify(&self, spawns: Vec<EntitySpawn>) {
        if spawns.is_empty() {
            return;
        }
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Dropped receivers are forgotten.
        subscribers.retain(|sender| {
            spawns
                .iter()
                .all(|spawn| sender.send(spawn.clone()).is_ok())
        });
    }

    async fn load(&self, x: i32, z: i32) -> Result<Option<ChunkColumn>> {
        let (chunk, spawns) = {
            let mut world = self.world.write().await;
            let spawns = world.activate_chunk(x, z);
            (world.chunk(x, z).cloned(), spawns)
        };
        self.notify(spawns);
        Ok(chunk)
    }

    async fn save(&self, chunk: ChunkColumn) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let (x, z) = chunk.coords();
        self.world.write().await.insert_chunk(chunk);
        log(format!("Stored chunk ({}, {})", x, z), Debug);
        Ok(())
    }

    async fn save_all(&self) -> Result<()> {
        if self.read_only {
            log("Read-only world, skipping save".to_string(), Debug);
            return Ok(());
        }
        let snapshot = self.world.read().await.clone();
        let codec = Arc::clone(&self.codec);
        let source = Arc::clone(&self.source);

        let start = Instant::now();
        // Nothing touches the source until the whole world has encoded.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let bytes = codec.encode(&snapshot)?;
            source.store(&bytes)?;
            Ok(())
        })
        .await
        .map_err(join_error)??;
        log(
            format!("Saved world in {}ms", start.elapsed().as_millis()),
            Info,
        );
        Ok(())
    }
}

fn codec_for(options: &LoaderOptions) -> SlimeCodec {
    SlimeCodec::new()
        .with_compression(options.compression)
        .with_decode_options(options.decode)
        .with_encode_options(options.encode)
}

impl ChunkLoader for SlimeLoader {
    fn load_chunk(&self, x: i32, z: i32) -> BoxFuture<'_, Result<Option<ChunkColumn>>> {
        self.load(x, z).boxed()
    }

    fn save_chunk(&self, chunk: ChunkColumn) -> BoxFuture<'_, Result<()>> {
        self.save(chunk).boxed()
    }

    fn save_world(&self) -> BoxFuture<'_, Result<()>> {
        self.save_all().boxed()
    }
}

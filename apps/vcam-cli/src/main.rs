use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use camera_intercept::{ApiGeneration, HookManager, MockPlatform};
use feed_source::{FeedConfig, FeedManager, Frame, PixelFormat, DEFAULT_SEEK_STEP_MS};
use virt_registry::launch::{diagnose_launch_failure, prepare_for_launch};
use virt_registry::{DirCatalog, HostCatalog, MemoryCatalog, VirtualEnv};

#[derive(Parser, Debug)]
#[command(
    name = "vcam",
    version,
    about = "Virtual environment manager with camera feed substitution",
    disable_help_subcommand = true
)]
struct Cli {
    /// Storage root for the virtual environment
    #[arg(long, default_value = "vcam-data", global = true)]
    root: String,

    /// Directory of host package manifests (*.json)
    #[arg(long, global = true)]
    host_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a host package into a user space
    Install {
        package: String,
        #[arg(long, default_value_t = 0)]
        user: u32,
        /// Install even when the package is absent from the host
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Install from a bundle (directory with manifest.json, or a manifest file)
    InstallBundle {
        path: String,
        #[arg(long, default_value_t = 0)]
        user: u32,
    },
    /// Remove a package from a user space
    Uninstall {
        package: String,
        #[arg(long, default_value_t = 0)]
        user: u32,
    },
    /// List packages installed in a user space
    List {
        #[arg(long, default_value_t = 0)]
        user: u32,
    },
    /// List user spaces
    Spaces,
    /// Create a user space
    SpaceCreate { id: u32 },
    /// Delete a user space (cascades storage erasure)
    SpaceDelete { id: u32 },
    /// Prepare a package for launch and print its launch descriptor
    Launch {
        package: String,
        #[arg(long, default_value_t = 0)]
        user: u32,
    },
    /// Render the current substitute frame from a photo feed to a PNG
    FeedPreview {
        /// Photo to substitute
        #[arg(long)]
        photo: String,
        /// Output PNG path
        #[arg(long, default_value = "preview.png")]
        out: String,
    },
    /// Open a video feed and report the frame at a playback position
    FeedProbe {
        /// Local video path or http(s)/rtsp URL
        #[arg(long)]
        video: String,
        /// Seek to this position before probing (ms)
        #[arg(long, default_value_t = 0)]
        seek: u64,
        /// Apply one forward step after seeking (ms)
        #[arg(long, default_value_t = DEFAULT_SEEK_STEP_MS)]
        step: u64,
        #[arg(long, action = ArgAction::SetTrue)]
        forward: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        no_audio: bool,
    },
    /// Run the interception pipeline end to end with a simulated camera
    HookDemo {
        /// Photo to substitute; omit to demonstrate real-frame fallback
        #[arg(long)]
        photo: Option<String>,
    },
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn open_env(cli: &Cli) -> Result<VirtualEnv> {
    let host: Arc<dyn HostCatalog> = match &cli.host_dir {
        Some(dir) => Arc::new(DirCatalog::new(dir.clone())),
        None => Arc::new(MemoryCatalog::new()),
    };
    let env = VirtualEnv::new(cli.root.clone(), host);
    if !env.initialize() {
        bail!("failed to initialize the virtual environment at {}", cli.root);
    }
    Ok(env)
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Install {
            package,
            user,
            force,
        } => {
            let env = open_env(&cli)?;
            if env.install_from_host(package, *user, *force) {
                println!("installed {package} into user space {user}");
            } else {
                bail!("failed to install {package} into user space {user}");
            }
        }
        Commands::InstallBundle { path, user } => {
            let env = open_env(&cli)?;
            if env.install_from_bundle(path, *user) {
                println!("installed bundle {path} into user space {user}");
            } else {
                bail!("failed to install bundle {path}");
            }
        }
        Commands::Uninstall { package, user } => {
            let env = open_env(&cli)?;
            if env.uninstall(package, *user) {
                println!("uninstalled {package} from user space {user}");
            } else {
                bail!("{package} is not installed in user space {user}");
            }
        }
        Commands::List { user } => {
            let env = open_env(&cli)?;
            let installed = env.list_installed(*user);
            if installed.is_empty() {
                println!("no packages installed in user space {user}");
            }
            for meta in installed {
                println!(
                    "{}  {}  {}",
                    meta.package(),
                    meta.manifest.version_name.as_deref().unwrap_or("-"),
                    meta.data_root.display()
                );
            }
        }
        Commands::Spaces => {
            let env = open_env(&cli)?;
            for id in env.user_spaces() {
                println!("{id}  ({} packages)", env.list_installed(id).len());
            }
        }
        Commands::SpaceCreate { id } => {
            let env = open_env(&cli)?;
            if env.create_user_space(*id) {
                println!("created user space {id}");
            } else {
                bail!("user space {id} already exists");
            }
        }
        Commands::SpaceDelete { id } => {
            let env = open_env(&cli)?;
            if env.delete_user_space(*id) {
                println!("deleted user space {id}");
            } else {
                bail!("cannot delete user space {id}");
            }
        }
        Commands::Launch { package, user } => {
            let env = open_env(&cli)?;
            if !prepare_for_launch(&env, package, *user) {
                for issue in diagnose_launch_failure(&env, package, *user) {
                    eprintln!("issue: {issue}");
                }
                bail!("launch preparation failed for {package}");
            }
            let descriptor = env
                .launch_descriptor(package, *user)
                .context("no launch descriptor")?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Commands::FeedPreview { photo, out } => {
            let feed = FeedManager::new();
            feed.initialize();
            if !feed.configure(FeedConfig::photo(photo.clone())) {
                bail!("failed to prepare photo feed from {photo}");
            }
            feed.play();
            let frame = feed.current_frame().context("no substitute frame")?;
            save_rgb_png(&frame, out)?;
            println!(
                "wrote {}x{} substitute frame to {out}",
                frame.width, frame.height
            );
        }
        Commands::FeedProbe {
            video,
            seek,
            step,
            forward,
            no_audio,
        } => {
            let feed = FeedManager::new();
            feed.initialize();
            let config = if video.contains("://") {
                FeedConfig::network_video(video.clone(), !no_audio)
            } else {
                FeedConfig::local_video(video.clone(), !no_audio)
            };
            if !feed.configure(config) {
                bail!("failed to prepare video feed from {video}");
            }
            wait_for_duration(&feed)?;
            feed.play();
            feed.seek_to(*seek);
            if *forward {
                feed.seek_forward(*step);
            }
            let position = feed.position_ms();
            match feed.current_frame() {
                Some(frame) => println!(
                    "frame at {position} ms: {}x{} ({:?}), duration {} ms",
                    frame.width,
                    frame.height,
                    frame.pixel_format,
                    feed.duration_ms()
                ),
                None => println!("no frame available at {position} ms"),
            }
        }
        Commands::HookDemo { photo } => {
            run_hook_demo(photo.as_deref())?;
        }
    }

    Ok(())
}

/// Network preparation is asynchronous; wait briefly for readiness.
fn wait_for_duration(feed: &FeedManager) -> Result<()> {
    for _ in 0..200 {
        if feed.duration_ms() > 0 {
            return Ok(());
        }
        std::thread::sleep(std::time::Duration::from_millis(25));
    }
    bail!("feed never became ready");
}

fn save_rgb_png(frame: &Frame, out: &str) -> Result<()> {
    if frame.pixel_format != PixelFormat::Rgb8 {
        bail!("frame is not RGB");
    }
    let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer does not match its dimensions")?;
    img.save(out).with_context(|| format!("writing {out}"))?;
    Ok(())
}

/// End-to-end demonstration of the interception data flow: a simulated
/// camera frame arrives at a hooked sink and either gets substituted or
/// passes through untouched.
fn run_hook_demo(photo: Option<&str>) -> Result<()> {
    let feed = FeedManager::new();
    feed.initialize();
    match photo {
        Some(path) => {
            if !feed.configure(FeedConfig::photo(path.to_string())) {
                bail!("failed to prepare photo feed from {path}");
            }
            info!(path, "substitute feed prepared");
        }
        None => {
            feed.configure(FeedConfig::disabled());
            info!("feed disabled; expecting real-frame fallback");
        }
    }

    let hooks = HookManager::new(feed);
    let platform = MockPlatform::full();
    hooks.install(&platform);

    let api = hooks
        .api(ApiGeneration::Device)
        .context("device generation unavailable")?;
    let handle = api.open_device("cam0").map_err(anyhow::Error::new)?;
    api.register_frame_sink(
        &handle,
        Arc::new(|frame: &Frame| {
            println!(
                "application received: {}x{} ({:?}, {} bytes)",
                frame.width,
                frame.height,
                frame.pixel_format,
                frame.data.len()
            );
        }),
    )
    .map_err(anyhow::Error::new)?;

    // A captured frame as the platform would deliver it.
    let real = Frame {
        width: 640,
        height: 480,
        pixel_format: PixelFormat::Nv21,
        data: vec![16; 640 * 480 * 3 / 2],
        ts: None,
    };
    println!("camera delivered: 640x480 (Nv21, {} bytes)", real.data.len());
    handle.deliver(&real);

    hooks.uninstall();
    Ok(())
}

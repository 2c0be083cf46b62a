use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use stereo_sequencer::config::SessionConfig;
use stereo_sequencer::session::{DatasetSession, FrameData};
use stereo_sequencer::source::{FrameSource, PoseSource};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "session.yaml".to_string());

    println!("Loading session config from: {}", config_path);
    let config = SessionConfig::from_yaml_file(&config_path)
        .with_context(|| format!("Failed to load session config {:?}", config_path))?;
    let mut session = DatasetSession::init(&config).context("Failed to initialize session")?;

    println!(
        "Loaded {} stereo frames, {} ground truth poses, {} timestamps",
        session.frame_count(),
        session.trajectory().pose_count(),
        session.timestamps().len()
    );
    if session.frame_index().has_labels() {
        println!("Label images found in {:?}", config.label_dir);
    }
    if let Some(store) = session.calibration_store() {
        print!("{}", store);
    }

    let compute_depth = config.compute_depth && session.depth_engine().is_ok();
    if config.compute_depth && !compute_depth {
        warn!("Depth requested but no calibration is loaded; skipping depth");
    }
    if let (true, Ok(engine)) = (compute_depth, session.depth_engine()) {
        let sgbm = engine.sgbm_params();
        println!(
            "Stereo matcher: {} disparities, block size {}, fill {}",
            sgbm.num_disparities(),
            sgbm.block_size,
            engine.fill_policy().enabled
        );
    }

    if !session.open() {
        println!("No frames to play");
        return Ok(());
    }

    let mut played = 0usize;
    loop {
        let frame = match session.fetch_next() {
            Ok(frame) => frame,
            Err(e) if e.is_end_of_sequence() => break,
            Err(e) => return Err(e).context("Failed to read frame"),
        };

        let depth_summary = if compute_depth {
            let depth = session
                .depth(&frame)
                .with_context(|| format!("Failed to compute depth for frame {}", frame.index))?;
            let median = median_depth(depth.as_matrix().iter().copied());
            format!(", median depth {:.2}", median.unwrap_or(f32::NAN))
        } else {
            String::new()
        };

        println!("{}{}", describe(&frame), depth_summary);
        played += 1;
    }

    session.close();
    println!("Played {} of {} frames", played, session.frame_count());
    Ok(())
}

fn describe(frame: &FrameData) -> String {
    let mut line = format!("Frame {:6}", frame.index);
    if let Some(t) = frame.timestamp {
        line.push_str(&format!(" t={:.3}s", t));
    }
    if let Some(pose) = &frame.abs_pose {
        line.push_str(&format!(
            " pos: [{:.2}, {:.2}, {:.2}]",
            pose.translation.x, pose.translation.y, pose.translation.z
        ));
    }
    if let Some(rel) = &frame.rel_pose {
        line.push_str(&format!(" step {:.3}", rel.translation.norm()));
    }
    line
}

fn median_depth(values: impl Iterator<Item = f32>) -> Option<f32> {
    let mut finite: Vec<f32> = values.filter(|z| z.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    Some(finite[finite.len() / 2])
}

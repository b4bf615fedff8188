use trajectory_core::visualization::MarkerCategory;
use trajectory_core::{PipelineConfig, TrajectoryPipeline, Waypoint};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Generating trajectory along a straight line...");

    let waypoints = vec![
        Waypoint::spatial(0.0, 0.0, 0.0),
        Waypoint::spatial(5.0, 0.0, 0.0),
        Waypoint::spatial(10.0, 0.0, 0.0),
    ];

    let pipeline = TrajectoryPipeline::new(PipelineConfig::default());
    let output = match pipeline.run(&waypoints)? {
        Some(output) => output,
        None => {
            tracing::warn!("Not enough waypoints to plan");
            return Ok(());
        }
    };

    println!("Segment times: {:?}", output.segment_times);
    if let Some(sample) = &output.sample {
        println!(
            "Position at t = {}: {}",
            pipeline.config().sampling.sample_time,
            sample.transpose()
        );
    }
    println!("Range samples: {}", output.range.len());
    if let (Some(first), Some(last)) = (output.range.first(), output.range.last()) {
        println!("  first t = {:.2}: {}", first.0, first.1.transpose());
        println!("  last  t = {:.2}: {}", last.0, last.1.transpose());
    }
    println!(
        "Markers: {} poses, {} path points",
        output.markers.markers_in(MarkerCategory::Pose).count(),
        output.markers.path.len()
    );

    Ok(())
}

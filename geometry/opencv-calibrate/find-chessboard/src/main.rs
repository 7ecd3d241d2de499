use clap::Parser;
use eyre::{Context, Result};
use opencv::imgcodecs;
use opencv_calibrate::PatternSize;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct CliArgs {
    /// Pattern width (the number of inner corners along each row)
    pattern_width: u32,
    /// Pattern height (the number of rows of inner corners)
    pattern_height: u32,
    /// Input image
    image: std::path::PathBuf,
    /// Skip sub-pixel refinement of the detected corners
    #[arg(long)]
    no_refine: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let fname = args.image.to_string_lossy();
    let img = imgcodecs::imread(&fname, imgcodecs::IMREAD_COLOR)
        .with_context(|| format!("reading {fname}"))?;
    let gray = opencv_calibrate::to_gray(&img).with_context(|| format!("decoding {fname}"))?;

    let pattern = PatternSize::new(args.pattern_width, args.pattern_height);
    let start = std::time::Instant::now();
    let corners = opencv_calibrate::find_chessboard_corners(&gray, pattern)?;
    let corners = match corners {
        Some(mut corners) => {
            if !args.no_refine {
                opencv_calibrate::refine_corners(&gray, &mut corners)?;
            }
            Some(corners)
        }
        None => None,
    };
    let seconds = start.elapsed().as_secs_f64();
    println!("# processing duration: {}", seconds);
    if let Some(corners) = corners {
        let corners: Vec<(f32, f32)> = corners.iter().map(|p| (p.x, p.y)).collect();
        let corners_yaml = serde_yaml::to_string(&corners)?;
        println!("{}", corners_yaml);
    }
    Ok(())
}

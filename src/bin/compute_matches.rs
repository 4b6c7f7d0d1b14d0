use std::process::ExitCode;

use clap::Parser;
use pairwise_matching::artifact::DirStore;
use pairwise_matching::detect::CornerPatchDetector;
use pairwise_matching::geometry::GeometricModel;
use pairwise_matching::matching::BruteForceMatcher;
use pairwise_matching::pipeline::{MatchingConfig, MatchingPipeline};

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModelArg {
    Fundamental,
    Essential,
    Homography,
}

impl From<ModelArg> for GeometricModel {
    fn from(arg: ModelArg) -> GeometricModel {
        match arg {
            ModelArg::Fundamental => GeometricModel::Fundamental,
            ModelArg::Essential => GeometricModel::Essential,
            ModelArg::Homography => GeometricModel::Homography,
        }
    }
}

/// Compute geometrically verified pairwise matches for an image collection.
///
/// Expects a `lists.json` image list inside the output directory. All
/// artifacts land next to it; rerunning against the same directory resumes
/// at the first incomplete stage.
#[derive(Parser)]
#[command(version, about, author)]
struct ComputeMatchesCli {
    /// input image directory
    #[arg(short, long)]
    img_dir: String,

    /// output directory for artifacts and resume state
    #[arg(short, long)]
    out_dir: String,

    /// nearest-neighbor distance ratio
    #[arg(short = 'r', long, default_value_t = 0.6)]
    dist_ratio: f32,

    /// geometric model to verify against
    #[arg(short = 'g', long, value_enum, default_value = "fundamental")]
    geometric_model: ModelArg,

    /// sequence matching with an overlap of N images
    #[arg(short = 'v', long, conflicts_with = "pair_list")]
    video_overlap: Option<usize>,

    /// predefined pair list file
    #[arg(short = 'l', long)]
    pair_list: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = ComputeMatchesCli::parse();

    let store = match DirStore::create(&cli.out_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("cannot open output directory {:?}: {}", cli.out_dir, e);
            return ExitCode::from(1);
        }
    };

    let mut config = MatchingConfig::new(&cli.img_dir);
    config.dist_ratio = cli.dist_ratio;
    config.model = cli.geometric_model.into();
    config.overlap = cli.video_overlap;
    config.pair_list = cli.pair_list.map(Into::into);

    let detector = CornerPatchDetector::default();
    let matcher = BruteForceMatcher::new(config.dist_ratio);
    let pipeline = MatchingPipeline {
        config,
        store: &store,
        detector: &detector,
        matcher: &matcher,
        fitter: None,
    };

    match pipeline.run() {
        Ok(report) => {
            println!(
                "{} images ({} skipped), {} putative pairs, {} verified pairs",
                report.images, report.skipped_images, report.putative_pairs, report.geometric_pairs
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("run with --help for usage");
            ExitCode::from(e.exit_code())
        }
    }
}

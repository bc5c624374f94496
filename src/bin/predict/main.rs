//! `db-predict`: run the DB text detector on one image.
//!
//! ```text
//! db-predict --image_path page.jpg --device cpu --threshold 0.6
//! ```

mod cli;

use clap::Parser;
use cli::Args;
use dbtext::predictor::DbPredictor;
use dbtext::utils::init_tracing;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.build_config()?;
    info!(
        model = %config.model_path.display(),
        device = %config.device,
        use_jit = config.use_jit,
        "building detector"
    );
    let predictor = DbPredictor::from_config(config)?;

    let mut failures = 0usize;
    for iteration in 1..=args.repeat {
        match predictor.predict(&args.image_path) {
            Ok(output) => info!(
                iteration,
                detections = output.detections.len(),
                path = %output.output_path.display(),
                "prediction finished"
            ),
            Err(e) => {
                failures += 1;
                error!(iteration, "Prediction failed for {:?}: {}", args.image_path, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} of {} predictions failed", args.repeat).into());
    }
    Ok(())
}

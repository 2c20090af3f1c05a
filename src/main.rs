use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{value_parser, Arg, ArgAction, Command, ValueEnum};
use superpixelization::{DegeneratePolicy, LabImage, SlicSegmenter};

#[derive(ValueEnum, Clone, Debug)]
enum EmptyClusters {
    Retain,
    Discard,
}

fn main() -> Result<(), Box<dyn Error>> {
    let matches = Command::new("segment")
        .version("0.1")
        .about("Segment the input image into SLIC superpixels.")
        .arg(
            Arg::new("input")
                .help("Sets the input file to use")
                .required(true)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Sets an optional output file"),
        )
        .arg(
            Arg::new("clusters")
                .short('k')
                .long("clusters")
                .help("The approximate number of superpixels.")
                .default_value("100")
                .value_parser(value_parser!(usize))
                .value_name("UINT"),
        )
        .arg(
            Arg::new("compactness")
                .short('m')
                .long("compactness")
                .help("Weight of spatial distance against color distance, usually 1 to 40.")
                .default_value("10")
                .value_parser(value_parser!(f32))
                .value_name("FLOAT"),
        )
        .arg(
            Arg::new("iterations")
                .short('i')
                .long("iterations")
                .help("The number of assignment and update rounds.")
                .default_value("10")
                .value_parser(value_parser!(usize))
                .value_name("UINT"),
        )
        .arg(
            Arg::new("until_converged")
                .long("until-converged")
                .help("Stop early once no centroid moves.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("empty_clusters")
                .long("empty-clusters")
                .help("What to do with clusters that lose all their pixels.")
                .action(ArgAction::Set)
                .value_name("POLICY")
                .value_parser(value_parser!(EmptyClusters))
                .default_value("retain"),
        )
        .arg(
            Arg::new("snapshots")
                .long("snapshots")
                .help("Directory in which to save the segmentation after every round.")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Prints debug information verbosely.")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" }),
    )
    .init();

    // Safe to use unwrap() on arguments that are required or have defaults.
    let input_path = matches.get_one::<PathBuf>("input").unwrap();
    let num_clusters = *matches.get_one::<usize>("clusters").unwrap();
    let compactness = *matches.get_one::<f32>("compactness").unwrap();
    let iterations = *matches.get_one::<usize>("iterations").unwrap();
    let policy = match matches.get_one::<EmptyClusters>("empty_clusters").unwrap() {
        EmptyClusters::Retain => DegeneratePolicy::Retain,
        EmptyClusters::Discard => DegeneratePolicy::Discard,
    };

    println!("Using input file: {}", input_path.display());
    let img = LabImage::open(input_path)?;
    println!("Image size: {}x{}", img.width(), img.height());

    let segmenter = SlicSegmenter::new(num_clusters, compactness)
        .with_iterations(iterations)
        .with_convergence_check(matches.get_flag("until_converged"))
        .with_degenerate_policy(policy);

    let snapshot_dir = matches.get_one::<PathBuf>("snapshots");
    if let Some(dir) = snapshot_dir {
        std::fs::create_dir_all(dir)?;
    }
    let stem = input_path.file_stem().unwrap_or_default().to_string_lossy().into_owned();

    let mut snapshot_error = None;
    let segmentation = segmenter.segment_with(&img, |round, engine| {
        let Some(dir) = snapshot_dir else { return };
        if snapshot_error.is_some() {
            return;
        }
        let name = format!("{stem}_M{compactness}_K{num_clusters}_loop{round}.png");
        if let Err(e) = engine.snapshot().save(dir.join(name)) {
            snapshot_error = Some(e);
        }
    })?;
    if let Some(e) = snapshot_error {
        return Err(format!("Snapshot error: {e}").into());
    }

    println!(
        "{} superpixels after {} rounds.",
        segmentation.clusters().len(),
        segmentation.rounds()
    );

    let output_path = match matches.get_one::<PathBuf>("output") {
        Some(path) => path.clone(),
        None => default_output(input_path),
    };
    segmentation.snapshot(&img).save(&output_path)?;
    println!("Output saved to: {}", output_path.display());

    Ok(())
}

fn default_output(input_path: &Path) -> PathBuf {
    let file_stem = input_path.file_stem().unwrap_or_default();
    let mut new_name = file_stem.to_os_string();
    new_name.push("_segmented.png");
    input_path.with_file_name(new_name)
}

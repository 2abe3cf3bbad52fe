//! subspace CLI: learn PCA/LDA subspaces and run nearest-neighbour
//! experiments in them.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};

use single_subspace::local::{LocalSubspace, LocalSubspaceGenerator, LocalSubspaceProjector};
use single_subspace::sample::{save_pgm, SampleType};
use single_subspace::subspace::{LdaSubspaceGenerator, PcaSubspaceGenerator};
use single_subspace::{
    DistanceMetric, OneNNClassifier, SampleSet, Subspace, SubspaceGenerator, SubspaceProjector,
};

#[derive(Parser)]
#[command(name = "subspace")]
#[command(about = "Learns linear subspaces and runs classification experiments in them")]
#[command(version)]
struct Cli {
    /// Print progress information and misclassified samples
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a subspace from a set of labelled samples
    Learn {
        /// Text file with one `<sample file> <class>` pair per line
        #[arg(long)]
        learnset: PathBuf,

        /// Output subspace file
        #[arg(long)]
        subfile: PathBuf,

        /// Kind of subspace to learn
        #[arg(long, value_enum)]
        subtype: SubspaceType,

        /// Dimension of the PCA run before LDA, chosen automatically when 0
        #[arg(long, default_value_t = 0)]
        npca: usize,

        /// Number of ranked local features to keep, all when 0
        #[arg(long, default_value_t = 0)]
        dim: usize,

        #[command(flatten)]
        samples: SampleArgs,

        #[command(flatten)]
        local: LocalArgs,
    },

    /// Classify samples in a learned subspace
    ///
    /// With only one of --learnset/--testset a leave-one-out experiment is run.
    Test {
        /// Subspace file written by `learn`
        #[arg(long)]
        subfile: PathBuf,

        /// Gallery samples
        #[arg(long)]
        learnset: Option<PathBuf>,

        /// Probe samples
        #[arg(long)]
        testset: Option<PathBuf>,

        /// Distance measure: euclid, nc or hamming
        #[arg(long, default_value = "euclid")]
        dist: DistanceMetric,

        /// Number of features used for matching, all when 0
        #[arg(long, default_value_t = 0)]
        dim: usize,

        /// The subspace file holds a local subspace
        #[arg(long)]
        local: bool,

        #[command(flatten)]
        samples: SampleArgs,
    },

    /// Write subspace axes (or a local feature coverage map) as PGM images
    Visualize {
        /// Subspace file written by `learn`
        #[arg(long)]
        subfile: PathBuf,

        /// Output file name prefix
        #[arg(long)]
        out: PathBuf,

        /// Number of axes (or ranked local features) to render
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Image width, square images assumed when 0
        #[arg(long, default_value_t = 0)]
        width: usize,

        /// Image height, square images assumed when 0
        #[arg(long, default_value_t = 0)]
        height: usize,

        /// The subspace file holds a local subspace
        #[arg(long)]
        local: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SubspaceType {
    Pca,
    Lda,
}

#[derive(Args)]
struct SampleArgs {
    /// Sample format: char, uchar, int, uint, float, double or img
    #[arg(long, default_value = "double", value_parser = parse_sample_type)]
    sample_type: SampleType,

    /// Features per sample, derived from the file size when 0
    #[arg(long, default_value_t = 0)]
    sample_size: usize,
}

#[derive(Args)]
struct LocalArgs {
    /// Learn a local (patch) subspace instead of a global one
    #[arg(long)]
    local: bool,

    /// Image width
    #[arg(long, default_value_t = 0)]
    width: usize,

    /// Image height
    #[arg(long, default_value_t = 0)]
    height: usize,

    /// Side of the sliding window
    #[arg(long, default_value_t = 0)]
    winsize: usize,

    /// Translation step of the sliding window
    #[arg(long, default_value_t = 1)]
    winstep: usize,
}

enum LearnedSubspace {
    Global(Subspace),
    Local(LocalSubspace),
}

impl LearnedSubspace {
    fn load(path: &Path, local: bool) -> anyhow::Result<Self> {
        let subspace = if local {
            LocalSubspace::load(path).map(LearnedSubspace::Local)
        } else {
            Subspace::load(path).map(LearnedSubspace::Global)
        };
        subspace.with_context(|| format!("failed to read {}", path.display()))
    }

    fn project(&self, samples: &SampleSet) -> single_subspace::Result<SampleSet> {
        match self {
            LearnedSubspace::Global(s) => SubspaceProjector::new(s).project_set(samples, 0),
            LearnedSubspace::Local(s) => LocalSubspaceProjector::new(s).project_set(samples, 0),
        }
    }
}

fn parse_sample_type(name: &str) -> Result<SampleType, String> {
    SampleType::from_name(name).ok_or_else(|| format!("unknown sample type '{}'", name))
}

fn load_samples(path: &Path, args: &SampleArgs) -> anyhow::Result<SampleSet> {
    let samples = SampleSet::load(path, args.sample_type, args.sample_size)
        .with_context(|| format!("failed to load samples listed in {}", path.display()))?;
    info!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

#[allow(clippy::too_many_arguments)]
fn cmd_learn(
    learnset: &Path,
    subfile: &Path,
    subtype: SubspaceType,
    npca: usize,
    dim: usize,
    samples: &SampleArgs,
    local: &LocalArgs,
    verbose: bool,
) -> anyhow::Result<()> {
    let learn = load_samples(learnset, samples)?;

    let generator: Box<dyn SubspaceGenerator> = match subtype {
        SubspaceType::Pca => Box::new(PcaSubspaceGenerator::builder().verbose(verbose).build()),
        SubspaceType::Lda => Box::new(
            LdaSubspaceGenerator::builder()
                .pca_dim(npca)
                .verbose(verbose)
                .build(),
        ),
    };

    if local.local {
        if dim == 0 {
            warn!("No feature count given, all local features will be kept");
        }
        let local_subspace = LocalSubspaceGenerator::builder(generator)
            .image_size(local.width, local.height)
            .patch_size(local.winsize)
            .patch_stride(local.winstep)
            .max_features(dim)
            .verbose(verbose)
            .build()
            .context("invalid local subspace configuration")?
            .generate(&learn)
            .context("failed to learn local subspace")?;
        local_subspace
            .save(subfile)
            .with_context(|| format!("failed to write {}", subfile.display()))?;
        info!(
            "Saved {} local features to {}",
            local_subspace.num_features(),
            subfile.display()
        );
    } else {
        let subspace = generator
            .generate(&learn)
            .context("failed to learn subspace")?;
        subspace
            .save(subfile)
            .with_context(|| format!("failed to write {}", subfile.display()))?;
        info!(
            "Saved {}-dimensional subspace to {}",
            subspace.subspace_dim(),
            subfile.display()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_test(
    subfile: &Path,
    learnset: Option<&Path>,
    testset: Option<&Path>,
    dist: DistanceMetric,
    dim: usize,
    local: bool,
    samples: &SampleArgs,
    verbose: bool,
) -> anyhow::Result<f64> {
    let (gallery, probes) = match (learnset, testset) {
        (Some(l), Some(t)) => (load_samples(l, samples)?, Some(load_samples(t, samples)?)),
        (Some(only), None) | (None, Some(only)) => (load_samples(only, samples)?, None),
        (None, None) => bail!("at least one of --learnset and --testset is required"),
    };

    let subspace = LearnedSubspace::load(subfile, local)?;
    let classifier = OneNNClassifier::new(dist).verbose(verbose);
    let gallery = subspace
        .project(&gallery)
        .context("failed to project samples")?;
    let accuracy = match probes {
        Some(probes) => {
            let probes = subspace
                .project(&probes)
                .context("failed to project samples")?;
            classifier.evaluate(&gallery, &probes, dim)?
        }
        None => classifier.evaluate(&gallery, &gallery, dim)?,
    };
    Ok(accuracy)
}

fn cmd_visualize(
    subfile: &Path,
    out: &Path,
    count: usize,
    width: usize,
    height: usize,
    local: bool,
) -> anyhow::Result<()> {
    let prefix = out.to_string_lossy();
    if local {
        if width == 0 || height == 0 {
            bail!("--width and --height are required for local subspaces");
        }
        let subspace = LocalSubspace::load(subfile)
            .with_context(|| format!("failed to read {}", subfile.display()))?;
        let path = PathBuf::from(format!("{}.pgm", prefix));
        save_pgm(&path, &subspace.coverage_image(width, height, count))
            .with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        let subspace = Subspace::load(subfile)
            .with_context(|| format!("failed to read {}", subfile.display()))?;
        for i in 0..count.min(subspace.subspace_dim()) {
            let path = PathBuf::from(format!("{}{:03}.pgm", prefix, i));
            save_pgm(&path, &subspace.axis_image(i, width, height)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Learn {
            learnset,
            subfile,
            subtype,
            npca,
            dim,
            samples,
            local,
        } => cmd_learn(
            &learnset,
            &subfile,
            subtype,
            npca,
            dim,
            &samples,
            &local,
            cli.verbose,
        ),
        Commands::Test {
            subfile,
            learnset,
            testset,
            dist,
            dim,
            local,
            samples,
        } => {
            let accuracy = cmd_test(
                &subfile,
                learnset.as_deref(),
                testset.as_deref(),
                dist,
                dim,
                local,
                &samples,
                cli.verbose,
            )?;
            println!("Classification accuracy: {:.2}%", accuracy * 100.0);
            Ok(())
        }
        Commands::Visualize {
            subfile,
            out,
            count,
            width,
            height,
            local,
        } => cmd_visualize(&subfile, &out, count, width, height, local),
    }
}

// bookbind-cli/src/main.rs
//
// Command-line interface for the Bookbind audiobook conversion tool.
//
// Responsibilities include:
// - Parsing user-provided arguments.
// - Setting up console logging.
// - Probing input files into media descriptors.
// - Wiring per-file progress bars to the core progress reporter.
// - Invoking the core conversion pipeline and mapping its outcome to exit codes.

use anyhow::Context;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;

use bookbind_core::{
    CancelToken, Job, MediaDescriptor, OUTPUT_KEY, Outcome, PipelineOptions, ProgressEvent,
    ProgressReporter, format_bytes, format_duration, probe_media, run_job,
};

mod cli;
use cli::{Cli, Commands, ConvertArgs, ProbeArgs};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Probe(args) => run_probe(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn probe_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<MediaDescriptor>> {
    let mut media = Vec::with_capacity(inputs.len());
    for input in inputs {
        let descriptor = probe_media(input)
            .with_context(|| format!("failed to probe {}", input.display()))?;
        media.push(descriptor);
    }
    Ok(media)
}

fn run_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let mut media = probe_inputs(&args.inputs)?;
    if let Some(bitrate) = args.bitrate {
        for m in &mut media {
            m.bitrate = bitrate;
        }
    }

    let reporter = ProgressReporter::new();
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{msg:30!} [{bar:40.cyan/blue}] {percent:>3}%")
        .expect("valid progress template")
        .progress_chars("=> ");

    let mut total_ms = 0u64;
    for m in &media {
        total_ms += m.duration_ms;

        let bar = multi.add(ProgressBar::new(m.duration_ms.max(1)));
        bar.set_style(style.clone());
        bar.set_message(m.title());

        let length = m.duration_ms.max(1);
        let progress_bar = bar.clone();
        reporter.register(&m.progress_key(), move |event: ProgressEvent| {
            progress_bar.set_position(event.elapsed_ms.min(length));
        });
        reporter.register_completion(&m.progress_key(), move || {
            bar.finish();
        });
    }

    log::info!(
        "converting {} files, total duration {}",
        media.len(),
        format_duration(total_ms)
    );

    let output_bar = multi.add(ProgressBar::new(total_ms.max(1)));
    output_bar.set_style(style);
    output_bar.set_message("merging");
    let merge_length = total_ms.max(1);
    {
        let bar = output_bar.clone();
        reporter.register(OUTPUT_KEY, move |event: ProgressEvent| {
            bar.set_position(event.elapsed_ms.min(merge_length));
        });
        reporter.register_completion(OUTPUT_KEY, move || {
            output_bar.finish();
        });
    }

    let job = Job::new(media, args.output.clone(), args.cover.clone());
    let job_id = job.id;
    let options = PipelineOptions {
        max_concurrent_jobs: args.jobs.unwrap_or_else(num_cpus::get),
        ..Default::default()
    };
    let token = CancelToken::new();

    log::info!("running conversion job {job_id}");
    match run_job(job, &options, &reporter, &token) {
        Ok(Outcome::Completed(path)) => {
            multi.clear()?;
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            println!(
                "Audiobook written to {} ({})",
                path.display(),
                format_bytes(size)
            );
            Ok(())
        }
        Ok(Outcome::Cancelled) => {
            multi.clear()?;
            println!("Conversion cancelled");
            Ok(())
        }
        Err(e) => Err(e).context("conversion failed"),
    }
}

fn run_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let media = probe_inputs(&args.inputs)?;
    println!("{}", serde_json::to_string_pretty(&media)?);
    Ok(())
}
